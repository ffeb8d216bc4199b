//! Status - task のステータス更新と履歴
//!
//! 1 batch に次を載せる:
//! - task record（decode した record に新しい status を載せて丸ごと put）
//! - HISTORY# エントリ（追記のみ）
//! - 全 edge 組（decode した edge に新しい status を載せて両方向を put）

use crate::app::journal::{IntentJournal, IntentKind};
use crate::codec::Entity;
use crate::domain::keys::{ItemKey, KeyPrefix};
use crate::domain::records::{Assignment, HistoryEntry, TaskRecord, TaskStatus};
use crate::domain::{RequestContext, TaskId, TaskTableError};
use crate::ports::{Clock, IdGenerator, KeyValueStore, WriteOp};
use std::sync::Arc;

#[derive(Clone)]
pub struct StatusUpdater {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    journal: IntentJournal,
}

impl StatusUpdater {
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

    /// 追加した履歴エントリを返す
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        status: TaskStatus,
        description: &str,
    ) -> Result<HistoryEntry, TaskTableError> {
        let tenant_id = ctx.require_tenant()?;
        let item = self
            .store
            .try_get(&ItemKey::task(tenant_id, task_id))
            .await?
            .ok_or(TaskTableError::NotFound)?;
        let mut record = TaskRecord::decode(&item)?;
        record.fields.status = status.clone();

        let now = self.clock.now_rfc3339();
        let entry = HistoryEntry {
            task_id,
            history_id: self.ids.history_id(),
            status: status.clone(),
            updated_by: ctx.user_id.clone(),
            updated_at: now,
            description: description.trim().to_string(),
        };

        let edges = self
            .store
            .query(&KeyPrefix::task_assignees(task_id))
            .await?;
        let mut ops = Vec::with_capacity(2 + edges.len() * 2);
        ops.push(WriteOp::Put(record.encode()));
        ops.push(WriteOp::Put(entry.encode()));
        for item in &edges {
            let mut edge = Assignment::decode(item)?;
            edge.fields.status = status.clone();
            ops.push(WriteOp::Put(edge.mirror().encode()));
            ops.push(WriteOp::Put(edge.encode()));
        }

        self.journal
            .run_batch(IntentKind::UpdateStatus, &ctx.user_id, ops)
            .await?;
        tracing::info!(
            tenant_id = %tenant_id,
            task_id = %task_id,
            status = %status,
            edges = edges.len(),
            "task status updated"
        );
        Ok(entry)
    }
}
