//! テスト用のワイヤリング（in-memory adapters + 固定時刻 + HS256 の鍵）

use crate::app::auth::TokenPolicy;
use crate::app::builder::{App, AppBuilder};
use crate::app::task_writer::TaskWriter;
use crate::codec::Entity;
use crate::config::{AppConfig, IdentityProviderConfig};
use crate::domain::records::{Assignee, Member, TaskFields, TaskStatus};
use crate::domain::{RequestContext, Role, TenantId, UserId};
use crate::impls::{InMemoryStore, InMemoryUserDirectory, LogMailer, StaticKeySet};
use crate::ports::{
    Clock, FixedClock, IdGenerator, IdentityError, KeyValueStore, RefreshedTokens, TokenExchange,
    TokenSet, UlidGenerator,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::TimeZone;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub const TEST_KID: &str = "test-key";
pub const TEST_SECRET: &[u8] = b"tasktable-test-signing-secret";
pub const TENANT_NAME: &str = "Acme";

pub fn test_config() -> AppConfig {
    AppConfig::new(IdentityProviderConfig {
        domain: "auth.example.com".to_string(),
        region: "eu-west-1".to_string(),
        client_id: "test-client".to_string(),
        client_secret: String::new(),
        redirect_url: "http://localhost:3000/callback".to_string(),
        user_pool_id: "eu-west-1_Test".to_string(),
    })
}

/// `TEST_SECRET` を `oct` JWK として公開する鍵セット
pub fn test_key_set(kid: &str) -> JwkSet {
    serde_json::from_value(json!({
        "keys": [{
            "kty": "oct",
            "kid": kid,
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(TEST_SECRET),
        }]
    }))
    .unwrap()
}

pub fn assignee(id: &str) -> Assignee {
    Assignee {
        user_id: UserId::new(id).unwrap(),
        username: id.to_string(),
        email: format!("{id}@example.com"),
    }
}

pub fn fields(title: &str) -> TaskFields {
    TaskFields {
        title: title.to_string(),
        description: String::new(),
        status: TaskStatus::pending(),
        deadline: "2026-06-30T00:00:00Z".to_string(),
    }
}

/// identity provider の token endpoint の代わり
#[derive(Clone, Default)]
pub struct StubTokenExchange {
    calls: Arc<Mutex<usize>>,
    reject_next: Arc<Mutex<Option<String>>>,
}

impl StubTokenExchange {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn reject_next(&self, reason: &str) {
        *self.reject_next.lock().unwrap() = Some(reason.to_string());
    }

    fn begin(&self) -> Result<usize, IdentityError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        match self.reject_next.lock().unwrap().take() {
            Some(reason) => Err(IdentityError::Rejected(reason)),
            None => Ok(*calls),
        }
    }
}

#[async_trait]
impl TokenExchange for StubTokenExchange {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, IdentityError> {
        let n = self.begin()?;
        Ok(TokenSet {
            access_token: format!("access-{code}-{n}"),
            id_token: format!("id-{code}-{n}"),
            refresh_token: format!("refresh-{code}-{n}"),
            token_type: "Bearer".to_string(),
            expires_in: 3_600,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, IdentityError> {
        let n = self.begin()?;
        Ok(RefreshedTokens {
            access_token: format!("access-{refresh_token}-{n}"),
            id_token: format!("id-{refresh_token}-{n}"),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3_600),
        })
    }
}

/// HS256 の id token を組み立てる
pub struct TokenBuilder {
    claims: serde_json::Map<String, Value>,
    kid: String,
    secret: Vec<u8>,
}

impl TokenBuilder {
    pub fn claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    pub fn expires_in(self, secs: i64) -> Self {
        self.claim("exp", chrono::Utc::now().timestamp() + secs)
    }

    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", aud)
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", iss)
    }

    pub fn signed_by(mut self, kid: &str, secret: &[u8]) -> Self {
        self.kid = kid.to_string();
        self.secret = secret.to_vec();
        self
    }

    pub fn build(self) -> String {
        let header = Header {
            kid: Some(self.kid),
            ..Header::new(Algorithm::HS256)
        };
        jsonwebtoken::encode(
            &header,
            &Value::Object(self.claims),
            &EncodingKey::from_secret(&self.secret),
        )
        .unwrap()
    }
}

pub struct Harness {
    pub config: AppConfig,
    pub store: InMemoryStore,
    pub directory: InMemoryUserDirectory,
    pub mailer: LogMailer,
    pub keys: StaticKeySet,
    pub tokens: StubTokenExchange,
    pub clock: Arc<FixedClock>,
    pub ids: Arc<dyn IdGenerator>,
    pub app: App,
    pub writer: TaskWriter,
    pub tenant: TenantId,
    pub admin: UserId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_mailer(LogMailer::new())
    }

    pub fn with_mailer(mailer: LogMailer) -> Self {
        let config = test_config();
        let store = InMemoryStore::new();
        let directory = InMemoryUserDirectory::new();
        let keys = StaticKeySet::new(test_key_set(TEST_KID));
        let tokens = StubTokenExchange::default();
        let clock = Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
        ));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

        let app = AppBuilder::new(config.clone())
            .store(Arc::new(store.clone()))
            .user_directory(Arc::new(directory.clone()))
            .token_exchange(Arc::new(tokens.clone()))
            .key_source(Arc::new(keys.clone()))
            .mailer(Arc::new(mailer.clone()))
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .id_generator(Arc::clone(&ids))
            .token_policy(
                TokenPolicy::from_identity(&config.identity)
                    .with_algorithms(vec![Algorithm::HS256]),
            )
            .build()
            .unwrap();

        Self {
            writer: app.writer.clone(),
            tenant: ids.tenant_id(),
            admin: UserId::new("admin-1").unwrap(),
            config,
            store,
            directory,
            mailer,
            keys,
            tokens,
            clock,
            ids,
            app,
        }
    }

    pub fn admin_ctx(&self) -> RequestContext {
        let mut ctx = RequestContext::new(self.admin.clone(), "admin@example.com")
            .with_tenant(self.tenant, Role::Admin)
            .with_username("admin");
        ctx.tenant_name = Some(TENANT_NAME.to_string());
        ctx
    }

    pub fn admin_assignee(&self) -> Assignee {
        Assignee {
            user_id: self.admin.clone(),
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
        }
    }

    /// admin の membership を書き込む
    pub async fn join_admin(&self) {
        let member = Member {
            tenant_id: self.tenant,
            user_id: self.admin.clone(),
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        };
        self.store.put(member.encode()).await.unwrap();
    }

    /// テナント未所属ユーザーの有効な id token
    pub fn token(&self, sub: &str, email: &str) -> TokenBuilder {
        TokenBuilder {
            claims: serde_json::Map::new(),
            kid: TEST_KID.to_string(),
            secret: TEST_SECRET.to_vec(),
        }
        .claim("sub", sub)
        .claim("email", email)
        .claim("token_use", "id")
        .claim("iat", chrono::Utc::now().timestamp())
        .expires_in(3_600)
        .issuer(&self.config.identity.issuer())
        .audience(&self.config.identity.client_id)
    }

    pub fn token_for_admin(&self) -> TokenBuilder {
        self.token(self.admin.as_str(), "admin@example.com")
            .claim("custom:tenantId", self.tenant.to_string())
            .claim("custom:role", "admin")
            .claim("custom:username", "admin")
            .claim("custom:tenantName", TENANT_NAME)
    }
}
