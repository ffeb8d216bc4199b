//! Verified identity of the caller, passed explicitly into every coordinator.

use super::errors::TaskTableError;
use super::ids::{TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a user inside their tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TaskTableError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "member" | "team_member" => Ok(Role::Member),
            other => Err(TaskTableError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Claims projected from a validated session token.
///
/// `tenant_id` and `role` are absent for a user who signed up but has not
/// registered or joined a tenant yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
    pub email: String,
    pub tenant_id: Option<TenantId>,
    pub role: Option<Role>,
    pub username: Option<String>,
    pub tenant_name: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            tenant_id: None,
            role: None,
            username: None,
            tenant_name: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId, role: Role) -> Self {
        self.tenant_id = Some(tenant_id);
        self.role = Some(role);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Tenant the caller acts in, or `Unauthorized` when they have none.
    pub fn require_tenant(&self) -> Result<TenantId, TaskTableError> {
        self.tenant_id.ok_or_else(|| {
            TaskTableError::Unauthorized(format!("user {} has no tenant", self.user_id))
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ulid::Ulid;

    #[rstest]
    #[case("admin", Role::Admin)]
    #[case(" Admin ", Role::Admin)]
    #[case("member", Role::Member)]
    #[case("TEAM_MEMBER", Role::Member)]
    fn roles_parse_case_insensitively(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(raw.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn unknown_role_is_a_validation_error() {
        assert!(matches!(
            "owner".parse::<Role>(),
            Err(TaskTableError::Validation(_))
        ));
    }

    #[test]
    fn require_tenant_rejects_tenantless_caller() {
        let user = UserId::new("sub-1").unwrap();
        let ctx = RequestContext::new(user.clone(), "a@example.com");
        assert!(matches!(
            ctx.require_tenant(),
            Err(TaskTableError::Unauthorized(_))
        ));

        let tenant = TenantId::from_ulid(Ulid::new());
        let ctx = ctx.with_tenant(tenant, Role::Admin);
        assert_eq!(ctx.require_tenant().unwrap(), tenant);
        assert!(ctx.is_admin());
    }
}
