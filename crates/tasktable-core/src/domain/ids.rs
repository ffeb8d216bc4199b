//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! 生成する ID (task / invite / notification / history / tenant / intent) は ULID です。
//! `Id<T>` が共通実装を持ち、`T` はマーカー型としてコンパイル時の区別だけを担います。
//!
//! - **時刻でソート可能**: HISTORY# の sort key がそのまま作成順になる
//! - **分散生成可能**: 調整なしでどのノードからでも発行できる
//!
//! `UserId` だけは identity provider が払い出す外部 ID (subject) なので文字列です。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// エラーメッセージで使う名前（例: "task", "invite"）
    fn name() -> &'static str;
}

/// ジェネリック ID 型
///
/// `Display` は ULID の文字列表現そのもの。タグ (`TASK#` など) は
/// key schema 側で付与する。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ulid.fmt(f)
    }
}

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {value:?}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self::from_ulid)
            .map_err(|_| IdParseError {
                kind: T::name(),
                value: s.to_string(),
            })
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn name() -> &'static str {
                $name
            }
        }
    };
}

id_marker!(
    /// Tenant のマーカー型
    Tenant,
    "tenant"
);
id_marker!(
    /// Task のマーカー型
    Task,
    "task"
);
id_marker!(
    /// Invite のマーカー型
    Invite,
    "invite"
);
id_marker!(
    /// Notification のマーカー型
    Notification,
    "notification"
);
id_marker!(
    /// History entry のマーカー型
    History,
    "history"
);
id_marker!(
    /// Write intent (journal) のマーカー型
    Intent,
    "intent"
);

/// Identifier of a tenant (organization).
pub type TenantId = Id<Tenant>;

/// Identifier of a task within a tenant.
pub type TaskId = Id<Task>;

/// Single-use token embedded in an invite URL.
pub type InviteToken = Id<Invite>;

/// Identifier of a notification in a user's inbox.
pub type NotificationId = Id<Notification>;

/// Identifier of one entry of a task's status history.
pub type HistoryId = Id<History>;

/// Identifier of a pending write intent in the journal.
pub type IntentId = Id<Intent>;

/// External user identifier (the identity provider's `sub`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Accepts any non-empty subject that does not contain the key separator.
    pub fn new(value: impl Into<String>) -> Result<Self, IdParseError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.contains('#') {
            return Err(IdParseError { kind: "user", value });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid = Ulid::new();
        let task = TaskId::from_ulid(ulid);
        let invite = InviteToken::from_ulid(ulid);

        assert_eq!(task.as_ulid(), invite.as_ulid());
        assert_eq!(task.to_string(), ulid.to_string());
        // let _: TaskId = invite; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = HistoryId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = HistoryId::from_ulid(Ulid::new());

        assert!(id1 < id2);
        assert!(id1.to_string() < id2.to_string());
    }

    #[test]
    fn ids_parse_from_display() {
        let task = TaskId::from_ulid(Ulid::new());
        let parsed: TaskId = task.to_string().parse().unwrap();
        assert_eq!(parsed, task);

        let err = "not-a-ulid".parse::<TenantId>().unwrap_err();
        assert_eq!(err.kind, "tenant");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let task = TaskId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, format!("\"{task}\""));
    }

    #[test]
    fn user_id_rejects_empty_and_separator() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("USER#abc").is_err());
        assert_eq!(UserId::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<TaskId>(), std::mem::size_of::<Ulid>());
    }
}
