//! Errors - エラー型と分類
//!
//! 各 port は自前のエラー型を持ち、ここで `TaskTableError` に集約される。
//! coordinator は `?` で伝播するだけで、transport エラーを読み替えない。

use crate::codec::DecodeError;
use crate::domain::keys::ItemKey;
use crate::ports::identity::IdentityError;
use crate::ports::key_source::KeySetError;
use crate::ports::store::StoreError;
use thiserror::Error;

/// ErrorKind は呼び出し側のための運用分類
///
/// - Client: 入力が不正、または対象が存在しない（リトライ無意味）
/// - Auth: 認証・認可の失敗
/// - Consistency: 一部だけ適用された書き込み、または保存データの破損
/// - Transient: store / identity provider の一時的な障害（リトライ推奨）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Auth,
    Consistency,
    Transient,
}

#[derive(Debug, Error)]
pub enum TaskTableError {
    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid invite")]
    InvalidInvite,

    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("batch write partially applied; {} item(s) unapplied", .unapplied.len())]
    PartialWrite { unapplied: Vec<ItemKey> },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("identity provider error: {0}")]
    IdentityProvider(String),
}

impl TaskTableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskTableError::NotFound | TaskTableError::Validation(_) => ErrorKind::Client,
            TaskTableError::Unauthorized(_)
            | TaskTableError::InvalidInvite
            | TaskTableError::RefreshFailed(_) => ErrorKind::Auth,
            TaskTableError::PartialWrite { .. } | TaskTableError::Decode(_) => {
                ErrorKind::Consistency
            }
            TaskTableError::StoreUnavailable(_)
            | TaskTableError::Throttled(_)
            | TaskTableError::IdentityProvider(_) => ErrorKind::Transient,
        }
    }
}

impl From<StoreError> for TaskTableError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => TaskTableError::NotFound,
            StoreError::Unavailable(msg) => TaskTableError::StoreUnavailable(msg),
            StoreError::Throttled(msg) => TaskTableError::Throttled(msg),
            StoreError::MalformedItem(msg) => TaskTableError::Decode(DecodeError::BadKey(msg)),
        }
    }
}

impl From<IdentityError> for TaskTableError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Throttled(msg) => TaskTableError::Throttled(msg),
            IdentityError::UserExists(email) => {
                TaskTableError::Validation(format!("user already exists: {email}"))
            }
            other => TaskTableError::IdentityProvider(other.to_string()),
        }
    }
}

impl From<KeySetError> for TaskTableError {
    fn from(err: KeySetError) -> Self {
        TaskTableError::Unauthorized(err.to_string())
    }
}
