//! DirectoryService - tenant の member 一覧と user の通知一覧

use crate::codec::Entity;
use crate::domain::keys::KeyPrefix;
use crate::domain::records::{Member, Notification};
use crate::domain::{TaskTableError, TenantId, UserId};
use crate::ports::KeyValueStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn KeyValueStore>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list_members(&self, tenant_id: TenantId) -> Result<Vec<Member>, TaskTableError> {
        let items = self
            .store
            .query(&KeyPrefix::tenant_members(tenant_id))
            .await?;
        let members = items
            .iter()
            .map(Member::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// 古い順
    pub async fn list_notifications(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Notification>, TaskTableError> {
        let items = self
            .store
            .query(&KeyPrefix::user_notifications(user_id))
            .await?;
        let notifications = items
            .iter()
            .map(Notification::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notifications)
    }
}
