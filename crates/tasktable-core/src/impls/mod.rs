//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore**: 開発・テスト用の単一テーブル（障害注入つき）
//! - **HttpKeySetSource** / **StaticKeySet**: JWKS の取得元
//! - **HttpTokenExchange**: OAuth2 token endpoint
//! - **InMemoryUserDirectory**: identity provider 管理 API の開発用実装
//! - **LogMailer**: tracing に出すだけの Mailer

pub mod http_key_set;
pub mod http_token;
pub mod inmem_directory;
pub mod inmem_store;
pub mod log_mailer;
pub mod static_key_set;

pub use self::http_key_set::HttpKeySetSource;
pub use self::http_token::HttpTokenExchange;
pub use self::inmem_directory::{DirectoryUser, InMemoryUserDirectory};
pub use self::inmem_store::{InMemoryStore, StoreStats};
pub use self::log_mailer::LogMailer;
pub use self::static_key_set::StaticKeySet;
