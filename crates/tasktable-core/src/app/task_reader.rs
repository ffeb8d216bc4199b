//! TaskReader - task と assignee 一覧の 2 段階 query + join
//!
//! 1. tenant（または user）の partition を `TASK#` prefix で query
//! 2. task ごとに `TASK#<id>` を `USER#` prefix で query して assignee を解決
//!
//! 並び順は store の sort key 昇順のまま。

use crate::codec::Entity;
use crate::domain::keys::{EntityRef, ItemKey, KeyPrefix};
use crate::domain::records::{Assignee, Assignment, HistoryEntry, TaskRecord, TaskView};
use crate::domain::{TaskId, TaskTableError, TenantId, UserId};
use crate::ports::KeyValueStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct TaskReader {
    store: Arc<dyn KeyValueStore>,
}

impl TaskReader {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn tasks_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<TaskView>, TaskTableError> {
        let items = self.store.query(&KeyPrefix::tenant_tasks(tenant_id)).await?;
        let mut views = Vec::with_capacity(items.len());
        for item in &items {
            let record = TaskRecord::decode(item)?;
            let assignees = self.assignees_of(record.task_id).await?;
            views.push(TaskView::from_record(record, assignees));
        }
        Ok(views)
    }

    /// user の partition にある Assignee→Task edge から組み立てる
    pub async fn tasks_by_user(&self, user_id: &UserId) -> Result<Vec<TaskView>, TaskTableError> {
        let items = self.store.query(&KeyPrefix::user_tasks(user_id)).await?;
        let mut views = Vec::with_capacity(items.len());
        for item in &items {
            let edge = Assignment::decode(item)?;
            let assignees = self.assignees_of(edge.task_id).await?;
            views.push(TaskView::from_edge(edge, assignees));
        }
        Ok(views)
    }

    /// tenant に該当 task が無ければ `Ok(None)`
    pub async fn task_by_id(
        &self,
        tenant_id: TenantId,
        task_id: TaskId,
    ) -> Result<Option<TaskView>, TaskTableError> {
        let prefix = KeyPrefix::exact(EntityRef::Tenant(tenant_id), EntityRef::Task(task_id));
        let items = self.store.query(&prefix).await?;
        let Some(item) = items.first() else {
            return Ok(None);
        };
        let record = TaskRecord::decode(item)?;
        let assignees = self.assignees_of(task_id).await?;
        Ok(Some(TaskView::from_record(record, assignees)))
    }

    /// assignee が居なければ空の Vec
    pub async fn assignees_of(&self, task_id: TaskId) -> Result<Vec<Assignee>, TaskTableError> {
        let items = self.store.query(&KeyPrefix::task_assignees(task_id)).await?;
        let mut assignees = Vec::with_capacity(items.len());
        for item in &items {
            assignees.push(Assignment::decode(item)?.assignee);
        }
        Ok(assignees)
    }

    /// 作成順（HISTORY# の ULID 昇順）
    ///
    /// history の partition は tenant を含まないので、先に tenant 側の record を確かめる。
    /// 無ければ `Ok(None)`
    pub async fn task_history(
        &self,
        tenant_id: TenantId,
        task_id: TaskId,
    ) -> Result<Option<Vec<HistoryEntry>>, TaskTableError> {
        if self
            .store
            .try_get(&ItemKey::task(tenant_id, task_id))
            .await?
            .is_none()
        {
            return Ok(None);
        }
        let items = self.store.query(&KeyPrefix::task_history(task_id)).await?;
        let history = items
            .iter()
            .map(HistoryEntry::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{assignee, fields, Harness};
    use crate::domain::records::TaskStatus;
    use crate::ports::StoreError;
    use crate::validation::ValidTask;

    #[tokio::test]
    async fn task_without_assignees_has_empty_list() {
        let h = Harness::new();
        let ctx = h.admin_ctx();
        let record = h
            .writer
            .create_task(
                &ctx,
                ValidTask {
                    fields: fields("Solo task"),
                    assignees: vec![],
                },
            )
            .await
            .unwrap();

        let view = h
            .app
            .reader
            .task_by_id(h.tenant, record.task_id)
            .await
            .unwrap()
            .unwrap();
        assert!(view.assignees.is_empty());
    }

    #[tokio::test]
    async fn unknown_task_is_none_not_error() {
        let h = Harness::new();
        let found = h.app.reader.task_by_id(h.tenant, h.ids.task_id()).await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn tasks_from_other_tenants_are_invisible() {
        let h = Harness::new();
        let ctx = h.admin_ctx();
        let record = h
            .writer
            .create_task(
                &ctx,
                ValidTask {
                    fields: fields("Tenant scoped"),
                    assignees: vec![],
                },
            )
            .await
            .unwrap();

        let other = h.ids.tenant_id();
        assert!(h.app.reader.tasks_by_tenant(other).await.unwrap().is_empty());
        assert_eq!(h.app.reader.task_by_id(other, record.task_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn tasks_are_listed_in_sort_key_order() {
        let h = Harness::new();
        let ctx = h.admin_ctx();
        let mut created = Vec::new();
        for title in ["first", "second", "third"] {
            let record = h
                .writer
                .create_task(
                    &ctx,
                    ValidTask {
                        fields: fields(title),
                        assignees: vec![assignee("u1")],
                    },
                )
                .await
                .unwrap();
            created.push(record.task_id);
        }

        let by_tenant: Vec<_> = h
            .app
            .reader
            .tasks_by_tenant(h.tenant)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.task_id)
            .collect();
        assert_eq!(by_tenant, created);

        let by_user = h
            .app
            .reader
            .tasks_by_user(&UserId::new("u1").unwrap())
            .await
            .unwrap();
        assert_eq!(by_user.len(), 3);
        assert_eq!(by_user[0].assignees.len(), 1);
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_owning_tenant() {
        let h = Harness::new();
        let ctx = h.admin_ctx();
        let record = h
            .writer
            .create_task(
                &ctx,
                ValidTask {
                    fields: fields("Audited"),
                    assignees: vec![],
                },
            )
            .await
            .unwrap();
        h.app
            .status
            .update_status(&ctx, record.task_id, TaskStatus::new("at_risk"), "slipping")
            .await
            .unwrap();

        let own = h.app.reader.task_history(h.tenant, record.task_id).await.unwrap();
        assert_eq!(own.map(|entries| entries.len()), Some(1));

        let other = h.ids.tenant_id();
        let foreign = h.app.reader.task_history(other, record.task_id).await.unwrap();
        assert_eq!(foreign, None);
    }

    #[tokio::test]
    async fn store_errors_propagate_unchanged() {
        let h = Harness::new();
        h.store
            .fail_next_query(StoreError::Throttled("busy".into()))
            .await;
        let err = h.app.reader.tasks_by_tenant(h.tenant).await.unwrap_err();
        assert!(matches!(err, TaskTableError::Throttled(ref m) if m == "busy"));
    }
}
