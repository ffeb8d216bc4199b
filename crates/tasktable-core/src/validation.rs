//! Boundary validation of inbound requests.
//!
//! Everything here runs before a coordinator is called; coordinators assume
//! their inputs are already well-formed.

use crate::domain::records::{Assignee, TaskFields, TaskStatus};
use crate::domain::{Role, TaskTableError, UserId};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashSet;

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%B %d, %Y"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssigneeInput {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    pub deadline: String,
    #[serde(default)]
    pub assignees: Vec<AssigneeInput>,
}

/// Validated task fields plus a de-duplicated assignee list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTask {
    pub fields: TaskFields,
    pub assignees: Vec<Assignee>,
}

fn invalid(msg: impl Into<String>) -> TaskTableError {
    TaskTableError::Validation(msg.into())
}

pub fn validate_task(input: TaskInput) -> Result<ValidTask, TaskTableError> {
    let title = input.title.trim();
    if title.chars().count() < MIN_TITLE_LEN {
        return Err(invalid(format!(
            "title must be at least {MIN_TITLE_LEN} characters"
        )));
    }

    let status = match input.status.as_deref().map(str::trim) {
        None | Some("") => TaskStatus::pending(),
        Some(status) => TaskStatus::new(status.to_ascii_lowercase()),
    };

    let mut seen = HashSet::new();
    let mut assignees = Vec::with_capacity(input.assignees.len());
    for raw in input.assignees {
        let user_id =
            UserId::new(raw.user_id.as_str()).map_err(|err| invalid(err.to_string()))?;
        if !seen.insert(user_id.clone()) {
            continue;
        }
        assignees.push(Assignee {
            user_id,
            username: raw.username.trim().to_string(),
            email: validate_email(&raw.email)?,
        });
    }

    Ok(ValidTask {
        fields: TaskFields {
            title: title.to_string(),
            description: input.description.trim().to_string(),
            status,
            deadline: normalize_deadline(&input.deadline)?,
        },
        assignees,
    })
}

/// Normalises an accepted date spelling to an RFC 3339 UTC timestamp.
pub fn normalize_deadline(raw: &str) -> Result<String, TaskTableError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid("deadline is required"));
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            let at = date.and_time(chrono::NaiveTime::default()).and_utc();
            return Ok(at.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
    Err(invalid(format!("unrecognised deadline {raw:?}")))
}

pub fn validate_email(raw: &str) -> Result<String, TaskTableError> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(email.to_ascii_lowercase())
        }
        _ => Err(invalid(format!("invalid email {email:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InviteInput {
    pub email: String,
    pub role: String,
}

pub fn validate_invite(input: &InviteInput) -> Result<(String, Role), TaskTableError> {
    Ok((validate_email(&input.email)?, input.role.parse()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedeemInput {
    pub username: String,
    pub password: String,
}

pub fn validate_redemption(input: &RedeemInput) -> Result<(), TaskTableError> {
    validate_username(&input.username)?;
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterTenantInput {
    pub tenant_name: String,
    pub username: String,
}

pub fn validate_tenant_registration(input: &RegisterTenantInput) -> Result<(), TaskTableError> {
    if input.tenant_name.trim().is_empty() {
        return Err(invalid("tenant name is required"));
    }
    validate_username(&input.username)
}

fn validate_username(username: &str) -> Result<(), TaskTableError> {
    if username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(invalid(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}
