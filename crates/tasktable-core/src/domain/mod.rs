//! Domain model (ids, key schema, records, claims, errors).

pub mod claims;
pub mod errors;
pub mod ids;
pub mod keys;
pub mod records;

pub use claims::{RequestContext, Role};
pub use errors::{ErrorKind, TaskTableError};
pub use ids::{
    HistoryId, IntentId, InviteToken, NotificationId, TaskId, TenantId, UserId,
};
pub use keys::{EntityRef, ItemKey, KeyPrefix, Tag};
pub use records::{
    Assignee, Assignment, EdgeDirection, HistoryEntry, Invite, Member, Notification, TaskFields,
    TaskRecord, TaskStatus, TaskView,
};
