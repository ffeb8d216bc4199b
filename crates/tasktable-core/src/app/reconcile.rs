//! EdgeReconciler - best-effort 削除や部分書き込みで崩れた edge 組の修復
//!
//! # 学習ポイント
//! - canonical な task record を正とし、edge はそこから作り直す
//! - 2 方向から走査する
//!   - tenant の task → Task→Assignee edge: mirror 欠落 / fields のずれを put で直す
//!   - tenant の member → Assignee→Task edge: record の無い edge 組を delete
//! - 修復は 1 batch（intent kind `repair`）

use crate::app::journal::{IntentJournal, IntentKind};
use crate::codec::Entity;
use crate::domain::keys::KeyPrefix;
use crate::domain::records::{Assignment, Member, TaskRecord};
use crate::domain::{RequestContext, TaskTableError};
use crate::ports::{KeyValueStore, WriteOp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tasks_checked: usize,
    /// record が無いので削除した edge 組
    pub orphans_removed: usize,
    /// mirror 欠落、または record と fields がずれていたので書き直した edge 組
    pub pairs_realigned: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphans_removed == 0 && self.pairs_realigned == 0
    }
}

#[derive(Clone)]
pub struct EdgeReconciler {
    store: Arc<dyn KeyValueStore>,
    journal: IntentJournal,
}

impl EdgeReconciler {
    pub fn new(store: Arc<dyn KeyValueStore>, journal: IntentJournal) -> Self {
        Self { store, journal }
    }

    /// admin のみ。現在の member から辿れない user partition の edge は対象外
    pub async fn reconcile_tenant(
        &self,
        ctx: &RequestContext,
    ) -> Result<ReconcileReport, TaskTableError> {
        let tenant_id = ctx.require_tenant()?;
        if !ctx.is_admin() {
            return Err(TaskTableError::Unauthorized(format!(
                "user {} may not reconcile tenant {tenant_id}",
                ctx.user_id
            )));
        }

        let mut report = ReconcileReport::default();
        let mut ops = Vec::new();
        let mut records = HashMap::new();
        let mut realigned = HashSet::new();

        let items = self.store.query(&KeyPrefix::tenant_tasks(tenant_id)).await?;
        for item in &items {
            let record = TaskRecord::decode(item)?;
            report.tasks_checked += 1;

            let edges = self
                .store
                .query(&KeyPrefix::task_assignees(record.task_id))
                .await?;
            for item in &edges {
                let forward = Assignment::decode(item)?;
                let mirror = self.store.try_get(&forward.mirror().key()).await?;
                let mirror_in_sync = match &mirror {
                    Some(item) => Assignment::decode(item)?.fields == record.fields,
                    None => false,
                };
                if mirror_in_sync && forward.fields == record.fields {
                    continue;
                }
                tracing::warn!(
                    tenant_id = %tenant_id,
                    task_id = %record.task_id,
                    user_id = %forward.assignee.user_id,
                    mirror_present = mirror.is_some(),
                    "realigning edge pair with task record"
                );
                ops.extend(pair_puts(&record, &forward));
                realigned.insert((record.task_id, forward.assignee.user_id.clone()));
                report.pairs_realigned += 1;
            }
            records.insert(record.task_id, record);
        }

        let members = self
            .store
            .query(&KeyPrefix::tenant_members(tenant_id))
            .await?;
        for item in &members {
            let member = Member::decode(item)?;
            let edges = self
                .store
                .query(&KeyPrefix::user_tasks(&member.user_id))
                .await?;
            for item in &edges {
                let edge = Assignment::decode(item)?;
                let Some(record) = records.get(&edge.task_id) else {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        task_id = %edge.task_id,
                        user_id = %member.user_id,
                        "removing orphaned edge pair"
                    );
                    ops.push(WriteOp::Delete(edge.key()));
                    ops.push(WriteOp::Delete(edge.mirror().key()));
                    report.orphans_removed += 1;
                    continue;
                };
                if realigned.contains(&(edge.task_id, member.user_id.clone())) {
                    continue;
                }
                // Task→Assignee 側が無い half edge
                if self.store.try_get(&edge.mirror().key()).await?.is_none() {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        task_id = %edge.task_id,
                        user_id = %member.user_id,
                        "restoring missing task-side edge"
                    );
                    ops.extend(pair_puts(record, &edge));
                    report.pairs_realigned += 1;
                }
            }
        }

        if !ops.is_empty() {
            self.journal
                .run_batch(IntentKind::Repair, &ctx.user_id, ops)
                .await?;
        }
        tracing::info!(
            tenant_id = %tenant_id,
            tasks = report.tasks_checked,
            orphans = report.orphans_removed,
            realigned = report.pairs_realigned,
            "tenant edges reconciled"
        );
        Ok(report)
    }
}

fn pair_puts(record: &TaskRecord, edge: &Assignment) -> [WriteOp; 2] {
    Assignment::pair(record, &edge.assignee).map(|edge| WriteOp::Put(edge.encode()))
}
