//! Typed records stored in the table.

use super::claims::Role;
use super::ids::{HistoryId, InviteToken, NotificationId, TaskId, TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form task status (`pending`, `at_risk`, `completed`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStatus(String);

impl TaskStatus {
    pub const PENDING: &'static str = "pending";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn pending() -> Self {
        Self::new(Self::PENDING)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::pending()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attributes shared by the canonical record and every edge copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// RFC 3339 timestamp.
    pub deadline: String,
}

/// Canonical task record: `TENANT#<tenant>` / `TASK#<task>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub fields: TaskFields,
    pub created_at: String,
    pub created_by: UserId,
}

/// Identity of an assignee as copied onto edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignee {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
}

/// Which half of an edge pair an [`Assignment`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeDirection {
    /// `TASK#<task>` / `USER#<user>`
    TaskToUser,
    /// `USER#<user>` / `TASK#<task>`
    UserToTask,
}

impl EdgeDirection {
    pub fn flipped(self) -> Self {
        match self {
            EdgeDirection::TaskToUser => EdgeDirection::UserToTask,
            EdgeDirection::UserToTask => EdgeDirection::TaskToUser,
        }
    }
}

/// One half of a task↔user assignment edge pair.
///
/// Carries a denormalized copy of the task fields so either direction can be
/// listed without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub direction: EdgeDirection,
    pub task_id: TaskId,
    pub assignee: Assignee,
    pub fields: TaskFields,
    pub created_at: String,
    pub created_by: UserId,
}

impl Assignment {
    /// Both halves of the pair for `assignee` on `task`.
    pub fn pair(task: &TaskRecord, assignee: &Assignee) -> [Assignment; 2] {
        let forward = Assignment {
            direction: EdgeDirection::TaskToUser,
            task_id: task.task_id,
            assignee: assignee.clone(),
            fields: task.fields.clone(),
            created_at: task.created_at.clone(),
            created_by: task.created_by.clone(),
        };
        let mirror = forward.mirror();
        [forward, mirror]
    }

    /// The other half of this pair, with identical attributes.
    pub fn mirror(&self) -> Assignment {
        Assignment {
            direction: self.direction.flipped(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: UserId,
    pub notification_id: NotificationId,
    pub message: String,
    pub time: String,
}

impl Notification {
    pub fn assigned_message(title: &str) -> String {
        format!("'{title}' has been assigned to you")
    }
}

/// Pending invitation: `INVITE#<token>` / `TENANT#<tenant>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub token: InviteToken,
    pub tenant_id: TenantId,
    pub email: String,
    pub role: Role,
}

/// Immutable audit record of one status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub task_id: TaskId,
    pub history_id: HistoryId,
    pub status: TaskStatus,
    pub updated_by: UserId,
    pub updated_at: String,
    pub description: String,
}

/// Tenant membership: `TENANT#<tenant>` / `USER#<user>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl Member {
    pub fn as_assignee(&self) -> Assignee {
        Assignee {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// A task joined with its current assignee list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub task_id: TaskId,
    pub fields: TaskFields,
    pub created_at: String,
    pub created_by: UserId,
    pub assignees: Vec<Assignee>,
}

impl TaskView {
    pub fn from_record(record: TaskRecord, assignees: Vec<Assignee>) -> Self {
        Self {
            task_id: record.task_id,
            fields: record.fields,
            created_at: record.created_at,
            created_by: record.created_by,
            assignees,
        }
    }

    pub fn from_edge(edge: Assignment, assignees: Vec<Assignee>) -> Self {
        Self {
            task_id: edge.task_id,
            fields: edge.fields,
            created_at: edge.created_at,
            created_by: edge.created_by,
            assignees,
        }
    }
}
