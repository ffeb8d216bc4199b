//! Key schema for the single shared table.
//!
//! Every item carries a `PartitionKey` and a `SortKey`. Entity kinds are told
//! apart by a tag prefix (`TASK#`, `USER#`, ...) followed by an identifier.
//! Keys are only ever built through the constructors on [`ItemKey`], so two
//! entity kinds can never collide on the same key shape.

use super::ids::{
    HistoryId, IdParseError, IntentId, InviteToken, NotificationId, TaskId, TenantId, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of entity tags used as key prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Tenant,
    User,
    Task,
    Invite,
    Notification,
    History,
    Intent,
}

impl Tag {
    pub const ALL: [Tag; 7] = [
        Tag::Tenant,
        Tag::User,
        Tag::Task,
        Tag::Invite,
        Tag::Notification,
        Tag::History,
        Tag::Intent,
    ];

    /// Prefix including the `#` separator.
    pub fn prefix(self) -> &'static str {
        match self {
            Tag::Tenant => "TENANT#",
            Tag::User => "USER#",
            Tag::Task => "TASK#",
            Tag::Invite => "INVITE#",
            Tag::Notification => "NOTIFICATION#",
            Tag::History => "HISTORY#",
            Tag::Intent => "INTENT#",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("unknown key tag in {0:?}")]
    UnknownTag(String),

    #[error(transparent)]
    Id(#[from] IdParseError),

    #[error("expected {expected} key, got {actual:?}")]
    UnexpectedTag { expected: Tag, actual: String },
}

/// A tagged identifier: one half of an [`ItemKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Tenant(TenantId),
    User(UserId),
    Task(TaskId),
    Invite(InviteToken),
    Notification(NotificationId),
    History(HistoryId),
    Intent(IntentId),
}

impl EntityRef {
    pub fn tag(&self) -> Tag {
        match self {
            EntityRef::Tenant(_) => Tag::Tenant,
            EntityRef::User(_) => Tag::User,
            EntityRef::Task(_) => Tag::Task,
            EntityRef::Invite(_) => Tag::Invite,
            EntityRef::Notification(_) => Tag::Notification,
            EntityRef::History(_) => Tag::History,
            EntityRef::Intent(_) => Tag::Intent,
        }
    }

    /// Parses a tagged key string such as `TASK#01H...`.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let tag = Tag::ALL
            .into_iter()
            .find(|tag| raw.starts_with(tag.prefix()))
            .ok_or_else(|| KeyError::UnknownTag(raw.to_string()))?;
        let rest = &raw[tag.prefix().len()..];
        let entity = match tag {
            Tag::Tenant => EntityRef::Tenant(rest.parse()?),
            Tag::User => EntityRef::User(rest.parse()?),
            Tag::Task => EntityRef::Task(rest.parse()?),
            Tag::Invite => EntityRef::Invite(rest.parse()?),
            Tag::Notification => EntityRef::Notification(rest.parse()?),
            Tag::History => EntityRef::History(rest.parse()?),
            Tag::Intent => EntityRef::Intent(rest.parse()?),
        };
        Ok(entity)
    }

    pub fn expect_tenant(raw: &str) -> Result<TenantId, KeyError> {
        match Self::parse(raw)? {
            EntityRef::Tenant(id) => Ok(id),
            _ => Err(unexpected(Tag::Tenant, raw)),
        }
    }

    pub fn expect_user(raw: &str) -> Result<UserId, KeyError> {
        match Self::parse(raw)? {
            EntityRef::User(id) => Ok(id),
            _ => Err(unexpected(Tag::User, raw)),
        }
    }

    pub fn expect_task(raw: &str) -> Result<TaskId, KeyError> {
        match Self::parse(raw)? {
            EntityRef::Task(id) => Ok(id),
            _ => Err(unexpected(Tag::Task, raw)),
        }
    }

    pub fn expect_invite(raw: &str) -> Result<InviteToken, KeyError> {
        match Self::parse(raw)? {
            EntityRef::Invite(id) => Ok(id),
            _ => Err(unexpected(Tag::Invite, raw)),
        }
    }

    pub fn expect_notification(raw: &str) -> Result<NotificationId, KeyError> {
        match Self::parse(raw)? {
            EntityRef::Notification(id) => Ok(id),
            _ => Err(unexpected(Tag::Notification, raw)),
        }
    }

    pub fn expect_history(raw: &str) -> Result<HistoryId, KeyError> {
        match Self::parse(raw)? {
            EntityRef::History(id) => Ok(id),
            _ => Err(unexpected(Tag::History, raw)),
        }
    }

    pub fn expect_intent(raw: &str) -> Result<IntentId, KeyError> {
        match Self::parse(raw)? {
            EntityRef::Intent(id) => Ok(id),
            _ => Err(unexpected(Tag::Intent, raw)),
        }
    }
}

fn unexpected(expected: Tag, raw: &str) -> KeyError {
    KeyError::UnexpectedTag {
        expected,
        actual: raw.to_string(),
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().prefix())?;
        match self {
            EntityRef::Tenant(id) => id.fmt(f),
            EntityRef::User(id) => id.fmt(f),
            EntityRef::Task(id) => id.fmt(f),
            EntityRef::Invite(id) => id.fmt(f),
            EntityRef::Notification(id) => id.fmt(f),
            EntityRef::History(id) => id.fmt(f),
            EntityRef::Intent(id) => id.fmt(f),
        }
    }
}

/// Full primary key of one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pk: String,
    sk: String,
}

impl ItemKey {
    fn of(pk: EntityRef, sk: EntityRef) -> Self {
        Self {
            pk: pk.to_string(),
            sk: sk.to_string(),
        }
    }

    /// Tenant membership: `TENANT#<tenant>` / `USER#<user>`.
    pub fn member(tenant_id: TenantId, user_id: &UserId) -> Self {
        Self::of(EntityRef::Tenant(tenant_id), EntityRef::User(user_id.clone()))
    }

    /// Canonical task record: `TENANT#<tenant>` / `TASK#<task>`.
    pub fn task(tenant_id: TenantId, task_id: TaskId) -> Self {
        Self::of(EntityRef::Tenant(tenant_id), EntityRef::Task(task_id))
    }

    /// Task→Assignee edge: `TASK#<task>` / `USER#<user>`.
    pub fn task_assignee(task_id: TaskId, user_id: &UserId) -> Self {
        Self::of(EntityRef::Task(task_id), EntityRef::User(user_id.clone()))
    }

    /// Assignee→Task mirror: `USER#<user>` / `TASK#<task>`.
    pub fn assignee_task(user_id: &UserId, task_id: TaskId) -> Self {
        Self::of(EntityRef::User(user_id.clone()), EntityRef::Task(task_id))
    }

    pub fn notification(user_id: &UserId, notification_id: NotificationId) -> Self {
        Self::of(
            EntityRef::User(user_id.clone()),
            EntityRef::Notification(notification_id),
        )
    }

    /// Pending invite: `INVITE#<token>` / `TENANT#<tenant>`.
    pub fn invite(token: InviteToken, tenant_id: TenantId) -> Self {
        Self::of(EntityRef::Invite(token), EntityRef::Tenant(tenant_id))
    }

    pub fn history(task_id: TaskId, history_id: HistoryId) -> Self {
        Self::of(EntityRef::Task(task_id), EntityRef::History(history_id))
    }

    /// Write intent. All intents share the journal partition `INTENT#`.
    pub fn intent(intent_id: IntentId) -> Self {
        Self {
            pk: Self::JOURNAL_PARTITION.to_string(),
            sk: EntityRef::Intent(intent_id).to_string(),
        }
    }

    pub const JOURNAL_PARTITION: &'static str = "INTENT#";

    /// Rebuilds a key read back from the store. Both halves must parse.
    pub fn from_raw(pk: &str, sk: &str) -> Result<Self, KeyError> {
        if pk != Self::JOURNAL_PARTITION {
            EntityRef::parse(pk)?;
        }
        EntityRef::parse(sk)?;
        Ok(Self {
            pk: pk.to_string(),
            sk: sk.to_string(),
        })
    }

    pub fn pk(&self) -> &str {
        &self.pk
    }

    pub fn sk(&self) -> &str {
        &self.sk
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pk, self.sk)
    }
}

/// Partition plus sort-key prefix for a range query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix {
    partition: String,
    sort_prefix: String,
}

impl KeyPrefix {
    /// Every item under `partition` whose sort key carries `tag`.
    pub fn tagged(partition: EntityRef, tag: Tag) -> Self {
        Self {
            partition: partition.to_string(),
            sort_prefix: tag.prefix().to_string(),
        }
    }

    /// Narrowed to one exact sort key.
    pub fn exact(partition: EntityRef, sort: EntityRef) -> Self {
        Self {
            partition: partition.to_string(),
            sort_prefix: sort.to_string(),
        }
    }

    pub fn tenant_tasks(tenant_id: TenantId) -> Self {
        Self::tagged(EntityRef::Tenant(tenant_id), Tag::Task)
    }

    pub fn tenant_members(tenant_id: TenantId) -> Self {
        Self::tagged(EntityRef::Tenant(tenant_id), Tag::User)
    }

    pub fn task_assignees(task_id: TaskId) -> Self {
        Self::tagged(EntityRef::Task(task_id), Tag::User)
    }

    pub fn task_history(task_id: TaskId) -> Self {
        Self::tagged(EntityRef::Task(task_id), Tag::History)
    }

    pub fn user_tasks(user_id: &UserId) -> Self {
        Self::tagged(EntityRef::User(user_id.clone()), Tag::Task)
    }

    pub fn user_notifications(user_id: &UserId) -> Self {
        Self::tagged(EntityRef::User(user_id.clone()), Tag::Notification)
    }

    pub fn pending_intents() -> Self {
        Self {
            partition: ItemKey::JOURNAL_PARTITION.to_string(),
            sort_prefix: Tag::Intent.prefix().to_string(),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn sort_prefix(&self) -> &str {
        &self.sort_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ulid::Ulid;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn edge_and_mirror_swap_halves() {
        let task = TaskId::from_ulid(Ulid::new());
        let u = user("u1");

        let edge = ItemKey::task_assignee(task, &u);
        let mirror = ItemKey::assignee_task(&u, task);

        assert_eq!(edge.pk(), mirror.sk());
        assert_eq!(edge.sk(), mirror.pk());
        assert_eq!(edge.pk(), format!("TASK#{task}"));
        assert_eq!(edge.sk(), "USER#u1");
    }

    #[test]
    fn task_record_lives_under_tenant_partition() {
        let tenant = TenantId::from_ulid(Ulid::new());
        let task = TaskId::from_ulid(Ulid::new());
        let key = ItemKey::task(tenant, task);

        assert_eq!(key.pk(), format!("TENANT#{tenant}"));
        assert_eq!(key.sk(), format!("TASK#{task}"));
    }

    #[test]
    fn invite_is_keyed_by_token_then_tenant() {
        let token = InviteToken::from_ulid(Ulid::new());
        let tenant = TenantId::from_ulid(Ulid::new());
        let key = ItemKey::invite(token, tenant);

        assert_eq!(key.pk(), format!("INVITE#{token}"));
        assert_eq!(EntityRef::expect_tenant(key.sk()).unwrap(), tenant);
    }

    #[rstest]
    #[case::tenant(EntityRef::Tenant(TenantId::from_ulid(Ulid::new())))]
    #[case::user(EntityRef::User(UserId::new("abc-123").unwrap()))]
    #[case::task(EntityRef::Task(TaskId::from_ulid(Ulid::new())))]
    #[case::invite(EntityRef::Invite(InviteToken::from_ulid(Ulid::new())))]
    #[case::notification(EntityRef::Notification(NotificationId::from_ulid(Ulid::new())))]
    #[case::history(EntityRef::History(HistoryId::from_ulid(Ulid::new())))]
    fn entity_ref_parses_its_own_rendering(#[case] entity: EntityRef) {
        let parsed = EntityRef::parse(&entity.to_string()).unwrap();
        assert_eq!(parsed, entity);
    }

    #[rstest]
    #[case("PROJECT#1")]
    #[case("task#01H")]
    #[case("")]
    fn unknown_tags_are_rejected(#[case] raw: &str) {
        assert!(matches!(
            EntityRef::parse(raw),
            Err(KeyError::UnknownTag(_))
        ));
    }

    #[test]
    fn wrong_tag_is_reported() {
        let raw = format!("TASK#{}", Ulid::new());
        let err = EntityRef::expect_user(&raw).unwrap_err();
        assert!(matches!(
            err,
            KeyError::UnexpectedTag {
                expected: Tag::User,
                ..
            }
        ));
    }

    #[test]
    fn malformed_id_after_tag_is_rejected() {
        assert!(matches!(
            EntityRef::parse("TASK#nope"),
            Err(KeyError::Id(_))
        ));
    }

    #[test]
    fn intents_share_journal_partition() {
        let a = ItemKey::intent(IntentId::from_ulid(Ulid::new()));
        let b = ItemKey::intent(IntentId::from_ulid(Ulid::new()));
        assert_eq!(a.pk(), b.pk());
        assert_eq!(KeyPrefix::pending_intents().partition(), a.pk());
        assert!(a.sk().starts_with(KeyPrefix::pending_intents().sort_prefix()));
        assert_eq!(ItemKey::from_raw(a.pk(), a.sk()).unwrap(), a);
    }

    #[test]
    fn exact_prefix_narrows_to_one_task() {
        let tenant = TenantId::from_ulid(Ulid::new());
        let task = TaskId::from_ulid(Ulid::new());
        let prefix = KeyPrefix::exact(EntityRef::Tenant(tenant), EntityRef::Task(task));
        let key = ItemKey::task(tenant, task);

        assert_eq!(prefix.partition(), key.pk());
        assert_eq!(prefix.sort_prefix(), key.sk());
    }
}
