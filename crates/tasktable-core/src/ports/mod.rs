//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。外部システム（KV store、
//! identity provider、メール配送）へのインターフェースを定義し、
//! 実装の詳細を隠蔽する。

pub mod clock;
pub mod id_generator;
pub mod identity;
pub mod key_source;
pub mod mailer;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::identity::{
    IdentityError, NewDirectoryUser, RefreshedTokens, TokenExchange, TokenSet, UserAttributes,
    UserDirectory,
};
pub use self::key_source::{KeySetError, KeySetSource};
pub use self::mailer::{MailError, MailMessage, Mailer};
pub use self::store::{BatchWriteOutput, KeyValueStore, StoreError, WriteOp};
