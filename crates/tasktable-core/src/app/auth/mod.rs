//! Auth - リクエスト認可パイプライン
//!
//! # 学習ポイント
//! - 1 リクエストの状態遷移: `NoToken → TokenPresent → (ParsedValid | ParsedInvalid)`
//! - `id_token` cookie を JWKS の鍵で検証し、claims を `RequestContext` に射影する
//! - 認可に失敗したら coordinator には到達しない（store にも触れない）
//! - refresh token の交換は別の操作（`SessionService::refresh_session`）

mod keys;
mod session;

pub use self::keys::{KeyRefresher, KeySetCache};
pub use self::session::{
    ACCESS_TOKEN_COOKIE, ID_TOKEN_COOKIE, IssuedSession, REFRESH_TOKEN_COOKIE, SessionCookies,
    SessionGrant, SessionService, session_set_cookies,
};

use crate::config::IdentityProviderConfig;
use crate::domain::{RequestContext, Role, TaskTableError, TenantId, UserId};
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;

/// 受け入れる token の条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// `iss` の期待値。None なら検査しない
    pub issuer: Option<String>,
    /// `aud` の期待値。None なら検査しない
    pub audience: Option<String>,
    pub algorithms: Vec<Algorithm>,
}

impl TokenPolicy {
    /// identity provider の issuer と client id（id token の aud）を検査する
    pub fn from_identity(identity: &IdentityProviderConfig) -> Self {
        Self {
            issuer: Some(identity.issuer()),
            audience: Some(identity.client_id.clone()),
            algorithms: vec![Algorithm::RS256],
        }
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_required_spec_claims(&["exp", "sub"]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }
        validation
    }
}

/// id token のうち使う claim だけ
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "custom:tenantId", default)]
    tenant_id: Option<String>,
    #[serde(rename = "custom:role", default)]
    role: Option<String>,
    #[serde(rename = "custom:username", default)]
    username: Option<String>,
    #[serde(rename = "custom:tenantName", default)]
    tenant_name: Option<String>,
}

impl IdTokenClaims {
    fn into_context(self) -> Result<RequestContext, String> {
        let user_id = UserId::new(self.sub).map_err(|err| format!("bad sub claim: {err}"))?;
        let email = self
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| "token has no email claim".to_string())?;
        let mut ctx = RequestContext::new(user_id, email);

        if let Some(raw) = self.tenant_id.filter(|raw| !raw.is_empty()) {
            let tenant_id: TenantId = raw
                .parse()
                .map_err(|err| format!("bad tenant claim: {err}"))?;
            let role = match self.role.as_deref() {
                Some(raw) => raw
                    .parse::<Role>()
                    .map_err(|err| format!("bad role claim: {err}"))?,
                None => Role::Member,
            };
            ctx = ctx.with_tenant(tenant_id, role);
        }
        ctx.username = self.username.filter(|name| !name.is_empty());
        ctx.tenant_name = self.tenant_name.filter(|name| !name.is_empty());
        Ok(ctx)
    }
}

/// 1 リクエスト分の認可状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    TokenPresent(String),
    ParsedValid(RequestContext),
    ParsedInvalid(String),
}

impl AuthState {
    pub fn from_cookie_header(cookie_header: Option<&str>) -> Self {
        match cookie_header
            .map(SessionCookies::from_cookie_header)
            .and_then(|cookies| cookies.id_token)
        {
            Some(token) => AuthState::TokenPresent(token),
            None => AuthState::NoToken,
        }
    }

    /// 検証済みでなければ `Unauthorized`
    pub fn into_context(self) -> Result<RequestContext, TaskTableError> {
        match self {
            AuthState::ParsedValid(ctx) => Ok(ctx),
            AuthState::NoToken => Err(TaskTableError::Unauthorized(
                "missing id_token cookie".to_string(),
            )),
            AuthState::TokenPresent(_) => Err(TaskTableError::Unauthorized(
                "token was not verified".to_string(),
            )),
            AuthState::ParsedInvalid(reason) => Err(TaskTableError::Unauthorized(reason)),
        }
    }
}

#[derive(Clone)]
pub struct Authorizer {
    keys: Arc<KeySetCache>,
    policy: TokenPolicy,
}

impl Authorizer {
    pub fn new(keys: Arc<KeySetCache>, policy: TokenPolicy) -> Self {
        Self { keys, policy }
    }

    /// `Cookie` ヘッダーの `id_token` を検証して claims を返す
    pub async fn authorize(
        &self,
        cookie_header: Option<&str>,
    ) -> Result<RequestContext, TaskTableError> {
        let state = match AuthState::from_cookie_header(cookie_header) {
            AuthState::TokenPresent(token) => self.verify(&token).await,
            other => other,
        };
        if let AuthState::ParsedInvalid(reason) = &state {
            tracing::debug!(reason = %reason, "request rejected");
        }
        state.into_context()
    }

    /// 認可に成功したときだけ `handler` を呼ぶ
    pub async fn with_session<F, Fut, T>(
        &self,
        cookie_header: Option<&str>,
        handler: F,
    ) -> Result<T, TaskTableError>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Result<T, TaskTableError>>,
    {
        let ctx = self.authorize(cookie_header).await?;
        handler(ctx).await
    }

    async fn verify(&self, token: &str) -> AuthState {
        let header = match jsonwebtoken::decode_header(token) {
            Ok(header) => header,
            Err(err) => return AuthState::ParsedInvalid(format!("malformed token: {err}")),
        };
        if !self.policy.algorithms.contains(&header.alg) {
            return AuthState::ParsedInvalid(format!("algorithm {:?} not accepted", header.alg));
        }
        let Some(kid) = header.kid.as_deref() else {
            return AuthState::ParsedInvalid("token has no kid".to_string());
        };
        let key = match self.keys.decoding_key(kid).await {
            Ok(key) => key,
            Err(err) => return AuthState::ParsedInvalid(err.to_string()),
        };

        let claims = match jsonwebtoken::decode::<IdTokenClaims>(
            token,
            &key,
            &self.policy.validation(header.alg),
        ) {
            Ok(data) => data.claims,
            Err(err) => return AuthState::ParsedInvalid(format!("token rejected: {err}")),
        };
        match claims.into_context() {
            Ok(ctx) => AuthState::ParsedValid(ctx),
            Err(reason) => AuthState::ParsedInvalid(reason),
        }
    }
}
