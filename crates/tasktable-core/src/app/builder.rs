//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! `build()` で確かめること
//! - 必須 port（store, user_directory, token_exchange, key_source, mailer）が揃っているか。
//!   足りない名前はまとめて `BuildError::MissingPorts` で返す
//! - IdP 設定から hosted login の URL が組めるか（`BuildError::Config`）
//!
//! clock / id generator / token policy は省略時に既定値を使う。

use crate::app::auth::{Authorizer, KeyRefresher, KeySetCache, SessionService, TokenPolicy};
use crate::app::directory::DirectoryService;
use crate::app::invites::InviteService;
use crate::app::journal::IntentJournal;
use crate::app::reconcile::EdgeReconciler;
use crate::app::status::StatusUpdater;
use crate::app::task_reader::TaskReader;
use crate::app::task_writer::TaskWriter;
use crate::app::tenants::TenantService;
use crate::config::{AppConfig, ConfigError};
use crate::ports::{
    Clock, IdGenerator, KeySetSource, KeyValueStore, Mailer, SystemClock, TokenExchange,
    UlidGenerator, UserDirectory,
};
use std::sync::Arc;

/// AppBuilder は ports を受け取って App を組み立てる
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(AppConfig::from_env()?)
///     .store(Arc::new(InMemoryStore::new()))
///     .user_directory(Arc::new(InMemoryUserDirectory::new()))
///     .token_exchange(Arc::new(HttpTokenExchange::new(config.identity.clone())?))
///     .key_source(Arc::new(HttpKeySetSource::new(config.identity.jwks_url())?))
///     .mailer(Arc::new(LogMailer::new()))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - 必須の port（store, user directory, token exchange, key source, mailer）が
///   1 つでも欠けていれば build() は BuildError を返す
/// - clock と id generator は省略時に SystemClock / UlidGenerator
pub struct AppBuilder {
    config: AppConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    directory: Option<Arc<dyn UserDirectory>>,
    tokens: Option<Arc<dyn TokenExchange>>,
    key_source: Option<Arc<dyn KeySetSource>>,
    mailer: Option<Arc<dyn Mailer>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    token_policy: Option<TokenPolicy>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These ports must be provided before build().")]
    MissingPorts(Vec<&'static str>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            directory: None,
            tokens: None,
            key_source: None,
            mailer: None,
            clock: None,
            ids: None,
            token_policy: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn token_exchange(mut self, tokens: Arc<dyn TokenExchange>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn key_source(mut self, key_source: Arc<dyn KeySetSource>) -> Self {
        self.key_source = Some(key_source);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 省略時は identity provider の issuer / client id と RS256
    pub fn token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = Some(policy);
        self
    }

    /// # 検証
    /// - 必須の port が全て設定されているかチェック
    /// - hosted login URL が組み立てられるかチェック
    pub fn build(self) -> Result<App, BuildError> {
        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.directory.is_none() {
            missing.push("user_directory");
        }
        if self.tokens.is_none() {
            missing.push("token_exchange");
        }
        if self.key_source.is_none() {
            missing.push("key_source");
        }
        if self.mailer.is_none() {
            missing.push("mailer");
        }
        let (Some(store), Some(directory), Some(tokens), Some(key_source), Some(mailer)) = (
            self.store,
            self.directory,
            self.tokens,
            self.key_source,
            self.mailer,
        ) else {
            return Err(BuildError::MissingPorts(missing));
        };

        let login_url = self.config.identity.login_url()?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self.ids.unwrap_or_else(|| {
            Arc::new(UlidGenerator::new(Arc::clone(&clock))) as Arc<dyn IdGenerator>
        });
        let policy = self
            .token_policy
            .unwrap_or_else(|| TokenPolicy::from_identity(&self.config.identity));

        let journal = IntentJournal::new(Arc::clone(&store), Arc::clone(&ids), Arc::clone(&clock));
        let keys = Arc::new(KeySetCache::new(key_source));

        tracing::debug!(table = %self.config.table_name, "app wired");
        Ok(App {
            writer: TaskWriter::new(
                Arc::clone(&store),
                Arc::clone(&ids),
                Arc::clone(&clock),
                journal.clone(),
            ),
            reader: TaskReader::new(Arc::clone(&store)),
            status: StatusUpdater::new(
                Arc::clone(&store),
                Arc::clone(&ids),
                Arc::clone(&clock),
                journal.clone(),
            ),
            invites: InviteService::new(
                Arc::clone(&store),
                Arc::clone(&ids),
                Arc::clone(&clock),
                Arc::clone(&directory),
                Arc::clone(&mailer),
                journal.clone(),
                self.config.web_url.clone(),
            ),
            tenants: TenantService::new(
                Arc::clone(&ids),
                Arc::clone(&clock),
                directory,
                mailer,
                journal.clone(),
            ),
            directory: DirectoryService::new(Arc::clone(&store)),
            reconciler: EdgeReconciler::new(store, journal.clone()),
            journal,
            auth: Authorizer::new(Arc::clone(&keys), policy),
            sessions: SessionService::new(tokens, clock, self.config.session_ttl()),
            keys,
            login_url,
            config: self.config,
        })
    }
}

/// App はワイヤリング済みの coordinator 一式
pub struct App {
    pub config: AppConfig,
    pub writer: TaskWriter,
    pub reader: TaskReader,
    pub status: StatusUpdater,
    pub invites: InviteService,
    pub tenants: TenantService,
    pub directory: DirectoryService,
    pub reconciler: EdgeReconciler,
    pub journal: IntentJournal,
    pub auth: Authorizer,
    pub sessions: SessionService,
    pub keys: Arc<KeySetCache>,
    /// hosted login へのリダイレクト先
    pub login_url: String,
}

impl App {
    /// 設定間隔で JWKS を取り直す background task を起動する
    pub fn spawn_key_refresher(&self) -> KeyRefresher {
        KeyRefresher::spawn(Arc::clone(&self.keys), self.config.jwks_refresh_interval())
    }
}
