//! tasktable-core
//!
//! Multi-tenant task tracking on a single-table key-value store.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, keys, records, claims, errors）
//! - **codec**: Entity Codec（record ⇔ attribute map）
//! - **ports**: 抽象化レイヤー（KeyValueStore, Clock, IdGenerator, KeySetSource, TokenExchange, UserDirectory, Mailer）
//! - **impls**: 実装（InMemoryStore, HttpKeySetSource, HttpTokenExchange など）
//! - **app**: coordinator と認可パイプライン、AppBuilder
//! - **config**: 環境変数からの設定
//! - **validation**: 入力の境界検証

pub mod app;
pub mod codec;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod validation;

pub use app::{App, AppBuilder, BuildError};
pub use config::{AppConfig, ConfigError, IdentityProviderConfig};
pub use domain::{ErrorKind, RequestContext, Role, TaskTableError};
