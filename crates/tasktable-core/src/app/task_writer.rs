//! TaskWriter - task と assignment edge の作成・更新・削除
//!
//! edge は必ず Task→Assignee と Assignee→Task の組で同じ batch に載せる。
//! 更新は現在の edge 集合との差分だけを 1 batch で書く（task が消える瞬間を作らない）。

use crate::app::journal::{IntentJournal, IntentKind};
use crate::codec::{item_key, key_part, Entity};
use crate::domain::keys::{EntityRef, ItemKey, KeyPrefix};
use crate::domain::records::{Assignee, Assignment, Notification, TaskFields, TaskRecord};
use crate::domain::{RequestContext, TaskId, TaskTableError, UserId};
use crate::ports::{Clock, IdGenerator, KeyValueStore, WriteOp};
use crate::validation::ValidTask;
use std::collections::HashSet;
use std::sync::Arc;

/// `delete_task` の結果。edge の削除は best-effort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub task_id: TaskId,
    /// 試みた edge 削除の数（assignee 数 × 2）
    pub edges_attempted: usize,
    pub edges_deleted: usize,
    /// 削除できなかった edge の key
    pub failed: Vec<ItemKey>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct TaskWriter {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    journal: IntentJournal,
}

impl TaskWriter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        journal: IntentJournal,
    ) -> Self {
        Self {
            store,
            ids,
            clock,
            journal,
        }
    }

    /// 新しい task id を払い出して作成する
    pub async fn create_task(
        &self,
        ctx: &RequestContext,
        task: ValidTask,
    ) -> Result<TaskRecord, TaskTableError> {
        let task_id = self.ids.task_id();
        self.create_or_replace_task(ctx, task_id, task.fields, &task.assignees)
            .await
    }

    /// task record、assignee ごとの edge 組と通知を 1 batch で書く
    ///
    /// 一部だけ適用された場合は `PartialWrite`。原子性は保証しない。
    pub async fn create_or_replace_task(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        fields: TaskFields,
        assignees: &[Assignee],
    ) -> Result<TaskRecord, TaskTableError> {
        let tenant_id = ctx.require_tenant()?;
        let record = TaskRecord {
            tenant_id,
            task_id,
            fields,
            created_at: self.clock.now_rfc3339(),
            created_by: ctx.user_id.clone(),
        };

        let mut ops = vec![WriteOp::Put(record.encode())];
        for assignee in assignees {
            ops.extend(edge_pair_puts(&record, assignee));
            ops.push(WriteOp::Put(self.assigned_notification(&record, assignee).encode()));
        }

        self.journal
            .run_batch(IntentKind::CreateTask, &ctx.user_id, ops)
            .await?;
        tracing::info!(
            tenant_id = %tenant_id,
            task_id = %task_id,
            assignees = assignees.len(),
            "task created"
        );
        Ok(record)
    }

    /// 現在の edge 集合との差分を 1 batch で書く
    ///
    /// - record と残る / 増える assignee の edge 組は put（新しい fields で上書き）
    /// - 増えた assignee にだけ通知
    /// - 外れた assignee の edge 組は delete
    pub async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        task: ValidTask,
    ) -> Result<TaskRecord, TaskTableError> {
        let tenant_id = ctx.require_tenant()?;
        let current = self
            .store
            .try_get(&ItemKey::task(tenant_id, task_id))
            .await?
            .ok_or(TaskTableError::NotFound)?;
        let current = TaskRecord::decode(&current)?;
        let current_users = self.assigned_users(task_id).await?;

        let record = TaskRecord {
            fields: task.fields,
            ..current
        };
        let wanted: HashSet<&UserId> = task.assignees.iter().map(|a| &a.user_id).collect();

        let mut ops = vec![WriteOp::Put(record.encode())];
        for assignee in &task.assignees {
            ops.extend(edge_pair_puts(&record, assignee));
            if !current_users.contains(&assignee.user_id) {
                ops.push(WriteOp::Put(self.assigned_notification(&record, assignee).encode()));
            }
        }
        let mut removed = 0;
        for user_id in current_users.iter().filter(|u| !wanted.contains(u)) {
            ops.push(WriteOp::Delete(ItemKey::task_assignee(task_id, user_id)));
            ops.push(WriteOp::Delete(ItemKey::assignee_task(user_id, task_id)));
            removed += 1;
        }

        self.journal
            .run_batch(IntentKind::UpdateTask, &ctx.user_id, ops)
            .await?;
        tracing::info!(
            tenant_id = %tenant_id,
            task_id = %task_id,
            assignees = task.assignees.len(),
            removed,
            "task updated"
        );
        Ok(record)
    }

    /// task record を消し、edge を 1 件ずつ削除する
    ///
    /// 呼び出し元の tenant に record が無ければ何も触らず `NotFound`
    /// （edge の partition は tenant を含まない）。
    /// record の削除失敗はそのまま返す。edge の削除失敗は記録して続行し、
    /// intent を残して recovery に任せる。
    pub async fn delete_task(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
    ) -> Result<DeleteReport, TaskTableError> {
        let tenant_id = ctx.require_tenant()?;
        let record_key = ItemKey::task(tenant_id, task_id);
        if self.store.try_get(&record_key).await?.is_none() {
            return Err(TaskTableError::NotFound);
        }
        let users = self.assigned_users(task_id).await?;

        let mut edge_keys = Vec::with_capacity(users.len() * 2);
        for user_id in &users {
            edge_keys.push(ItemKey::task_assignee(task_id, user_id));
            edge_keys.push(ItemKey::assignee_task(user_id, task_id));
        }

        let mut ops = vec![WriteOp::Delete(record_key.clone())];
        ops.extend(edge_keys.iter().cloned().map(WriteOp::Delete));
        let intent = self
            .journal
            .begin(IntentKind::DeleteTask, &ctx.user_id, ops)
            .await?;

        if let Err(err) = self.store.delete(&record_key).await {
            // 何も消えていないので intent も取り消す
            self.journal.complete(&intent).await;
            return Err(err.into());
        }

        let mut report = DeleteReport {
            task_id,
            edges_attempted: edge_keys.len(),
            edges_deleted: 0,
            failed: Vec::new(),
        };
        for key in edge_keys {
            match self.store.delete(&key).await {
                Ok(()) => report.edges_deleted += 1,
                Err(err) => {
                    tracing::warn!(task_id = %task_id, key = %key, error = %err, "edge delete failed");
                    report.failed.push(key);
                }
            }
        }

        if report.is_complete() {
            self.journal.complete(&intent).await;
        } else {
            tracing::warn!(
                task_id = %task_id,
                intent_id = %intent.intent_id,
                failed = report.failed.len(),
                "task deleted with stale edges; intent kept for recovery"
            );
        }
        tracing::info!(tenant_id = %tenant_id, task_id = %task_id, "task deleted");
        Ok(report)
    }

    /// Task→Assignee edge の sort key から assignee を列挙する
    async fn assigned_users(&self, task_id: TaskId) -> Result<Vec<UserId>, TaskTableError> {
        let items = self
            .store
            .query(&KeyPrefix::task_assignees(task_id))
            .await?;
        let mut users = Vec::with_capacity(items.len());
        for item in &items {
            let key = item_key(item)?;
            users.push(key_part(key.sk(), EntityRef::expect_user)?);
        }
        Ok(users)
    }

    fn assigned_notification(&self, record: &TaskRecord, assignee: &Assignee) -> Notification {
        Notification {
            user_id: assignee.user_id.clone(),
            notification_id: self.ids.notification_id(),
            message: Notification::assigned_message(&record.fields.title),
            time: self.clock.now_rfc3339(),
        }
    }
}

fn edge_pair_puts(record: &TaskRecord, assignee: &Assignee) -> [WriteOp; 2] {
    Assignment::pair(record, assignee).map(|edge| WriteOp::Put(edge.encode()))
}
