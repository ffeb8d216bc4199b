use super::attribute::{item_key, key_part, optional_s, required_s, Item, ItemBuilder};
use super::DecodeError;
use crate::domain::keys::{EntityRef, ItemKey};
use crate::domain::records::{
    Assignee, Assignment, EdgeDirection, HistoryEntry, Invite, Member, Notification, TaskFields,
    TaskRecord, TaskStatus,
};
use crate::domain::{Role, UserId};

const TITLE: &str = "tasktitle";
const DESCRIPTION: &str = "description";
const STATUS: &str = "status";
const DEADLINE: &str = "deadline";
const CREATED_AT: &str = "createdAt";
const CREATED_BY: &str = "createdby";
const USER_NAME: &str = "userName";
const EMAIL: &str = "email";
const MESSAGE: &str = "message";
const TIME: &str = "time";
const ROLE: &str = "role";
const UPDATED_BY: &str = "updatedby";
const UPDATED_AT: &str = "updatedAt";
const UPDATE_DESCRIPTION: &str = "updateDescription";

/// A record with a fixed place in the key schema.
pub trait Entity: Sized {
    fn key(&self) -> ItemKey;

    fn encode(&self) -> Item;

    fn decode(item: &Item) -> Result<Self, DecodeError>;
}

fn with_fields(builder: ItemBuilder, fields: &TaskFields) -> ItemBuilder {
    builder
        .s(TITLE, fields.title.as_str())
        .s(DESCRIPTION, fields.description.as_str())
        .s(STATUS, fields.status.as_str())
        .s(DEADLINE, fields.deadline.as_str())
}

fn decode_fields(item: &Item) -> Result<TaskFields, DecodeError> {
    Ok(TaskFields {
        title: required_s(item, TITLE)?.to_string(),
        description: optional_s(item, DESCRIPTION)?,
        status: TaskStatus::new(required_s(item, STATUS)?),
        deadline: required_s(item, DEADLINE)?.to_string(),
    })
}

fn decode_user_ref(item: &Item, name: &str) -> Result<UserId, DecodeError> {
    key_part(required_s(item, name)?, EntityRef::expect_user)
}

fn decode_role(item: &Item) -> Result<Role, DecodeError> {
    required_s(item, ROLE)?
        .parse()
        .map_err(|_| DecodeError::WrongType {
            attribute: ROLE.to_string(),
            expected: "role",
            actual: "S",
        })
}

impl Entity for TaskRecord {
    fn key(&self) -> ItemKey {
        ItemKey::task(self.tenant_id, self.task_id)
    }

    fn encode(&self) -> Item {
        with_fields(ItemBuilder::new(&self.key()), &self.fields)
            .s(CREATED_AT, self.created_at.as_str())
            .entity(CREATED_BY, &EntityRef::User(self.created_by.clone()))
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = item_key(item)?;
        Ok(TaskRecord {
            tenant_id: key_part(key.pk(), EntityRef::expect_tenant)?,
            task_id: key_part(key.sk(), EntityRef::expect_task)?,
            fields: decode_fields(item)?,
            created_at: required_s(item, CREATED_AT)?.to_string(),
            created_by: decode_user_ref(item, CREATED_BY)?,
        })
    }
}

impl Entity for Assignment {
    fn key(&self) -> ItemKey {
        match self.direction {
            EdgeDirection::TaskToUser => {
                ItemKey::task_assignee(self.task_id, &self.assignee.user_id)
            }
            EdgeDirection::UserToTask => {
                ItemKey::assignee_task(&self.assignee.user_id, self.task_id)
            }
        }
    }

    fn encode(&self) -> Item {
        with_fields(ItemBuilder::new(&self.key()), &self.fields)
            .s(CREATED_AT, self.created_at.as_str())
            .entity(CREATED_BY, &EntityRef::User(self.created_by.clone()))
            .s(USER_NAME, self.assignee.username.as_str())
            .s(EMAIL, self.assignee.email.as_str())
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = item_key(item)?;
        let pk = key_part(key.pk(), EntityRef::parse)?;
        let sk = key_part(key.sk(), EntityRef::parse)?;
        let (direction, task_id, user_id) = match (pk, sk) {
            (EntityRef::Task(task), EntityRef::User(user)) => {
                (EdgeDirection::TaskToUser, task, user)
            }
            (EntityRef::User(user), EntityRef::Task(task)) => {
                (EdgeDirection::UserToTask, task, user)
            }
            _ => return Err(DecodeError::BadKey(format!("not an assignment edge: {key}"))),
        };
        Ok(Assignment {
            direction,
            task_id,
            assignee: Assignee {
                user_id,
                username: required_s(item, USER_NAME)?.to_string(),
                email: required_s(item, EMAIL)?.to_string(),
            },
            fields: decode_fields(item)?,
            created_at: required_s(item, CREATED_AT)?.to_string(),
            created_by: decode_user_ref(item, CREATED_BY)?,
        })
    }
}

impl Entity for Notification {
    fn key(&self) -> ItemKey {
        ItemKey::notification(&self.user_id, self.notification_id)
    }

    fn encode(&self) -> Item {
        ItemBuilder::new(&self.key())
            .s(MESSAGE, self.message.as_str())
            .s(TIME, self.time.as_str())
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = item_key(item)?;
        Ok(Notification {
            user_id: key_part(key.pk(), EntityRef::expect_user)?,
            notification_id: key_part(key.sk(), EntityRef::expect_notification)?,
            message: required_s(item, MESSAGE)?.to_string(),
            time: required_s(item, TIME)?.to_string(),
        })
    }
}

impl Entity for Invite {
    fn key(&self) -> ItemKey {
        ItemKey::invite(self.token, self.tenant_id)
    }

    fn encode(&self) -> Item {
        ItemBuilder::new(&self.key())
            .s(EMAIL, self.email.as_str())
            .s(ROLE, self.role.as_str())
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = item_key(item)?;
        Ok(Invite {
            token: key_part(key.pk(), EntityRef::expect_invite)?,
            tenant_id: key_part(key.sk(), EntityRef::expect_tenant)?,
            email: required_s(item, EMAIL)?.to_string(),
            role: decode_role(item)?,
        })
    }
}

impl Entity for HistoryEntry {
    fn key(&self) -> ItemKey {
        ItemKey::history(self.task_id, self.history_id)
    }

    fn encode(&self) -> Item {
        ItemBuilder::new(&self.key())
            .s(STATUS, self.status.as_str())
            .entity(UPDATED_BY, &EntityRef::User(self.updated_by.clone()))
            .s(UPDATED_AT, self.updated_at.as_str())
            .s(UPDATE_DESCRIPTION, self.description.as_str())
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = item_key(item)?;
        Ok(HistoryEntry {
            task_id: key_part(key.pk(), EntityRef::expect_task)?,
            history_id: key_part(key.sk(), EntityRef::expect_history)?,
            status: TaskStatus::new(required_s(item, STATUS)?),
            updated_by: decode_user_ref(item, UPDATED_BY)?,
            updated_at: required_s(item, UPDATED_AT)?.to_string(),
            description: optional_s(item, UPDATE_DESCRIPTION)?,
        })
    }
}

impl Entity for Member {
    fn key(&self) -> ItemKey {
        ItemKey::member(self.tenant_id, &self.user_id)
    }

    fn encode(&self) -> Item {
        ItemBuilder::new(&self.key())
            .s(USER_NAME, self.username.as_str())
            .s(EMAIL, self.email.as_str())
            .s(ROLE, self.role.as_str())
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = item_key(item)?;
        Ok(Member {
            tenant_id: key_part(key.pk(), EntityRef::expect_tenant)?,
            user_id: key_part(key.sk(), EntityRef::expect_user)?,
            username: required_s(item, USER_NAME)?.to_string(),
            email: required_s(item, EMAIL)?.to_string(),
            role: decode_role(item)?,
        })
    }
}
