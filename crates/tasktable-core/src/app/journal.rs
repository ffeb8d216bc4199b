//! IntentJournal - 複数 item の書き込みを intent として先に記録する
//!
//! store は item 単位でしか atomic でないため、複数 item にまたがる変更は
//! 次の順で行う。
//!
//! 1. `INTENT#` partition に全操作を JSON で記録
//! 2. 操作を適用
//! 3. すべて適用できたら intent を削除
//!
//! 途中で落ちた場合は intent が残るので、`recover` で再適用する。
//! put / delete は item 全体の置き換えなので、再適用しても結果は同じ。

use crate::codec::{key_part, required_s, DecodeError, Entity, Item, ItemBuilder};
use crate::domain::ids::{IntentId, UserId};
use crate::domain::keys::{EntityRef, ItemKey, KeyPrefix};
use crate::domain::TaskTableError;
use crate::ports::{Clock, IdGenerator, KeyValueStore, WriteOp};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const KIND: &str = "kind";
const ACTOR: &str = "actor";
const CREATED_AT: &str = "createdAt";
const OPERATIONS: &str = "operations";

/// 記録対象の変更の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    CreateTask,
    UpdateTask,
    DeleteTask,
    UpdateStatus,
    RedeemInvite,
    RegisterTenant,
    Repair,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::CreateTask => "create_task",
            IntentKind::UpdateTask => "update_task",
            IntentKind::DeleteTask => "delete_task",
            IntentKind::UpdateStatus => "update_status",
            IntentKind::RedeemInvite => "redeem_invite",
            IntentKind::RegisterTenant => "register_tenant",
            IntentKind::Repair => "repair",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            IntentKind::CreateTask,
            IntentKind::UpdateTask,
            IntentKind::DeleteTask,
            IntentKind::UpdateStatus,
            IntentKind::RedeemInvite,
            IntentKind::RegisterTenant,
            IntentKind::Repair,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
        .ok_or(DecodeError::WrongType {
            attribute: KIND.to_string(),
            expected: "intent kind",
            actual: "S",
        })
    }
}

/// 記録された未完了の変更
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    pub intent_id: IntentId,
    pub kind: IntentKind,
    pub actor: UserId,
    pub created_at: String,
    pub operations: Vec<WriteOp>,
}

impl Entity for WriteIntent {
    fn key(&self) -> ItemKey {
        ItemKey::intent(self.intent_id)
    }

    fn encode(&self) -> Item {
        // WriteOp は Item と ItemKey だけで構成されるので直列化は失敗しない
        let operations = serde_json::to_string(&self.operations).unwrap_or_default();
        ItemBuilder::new(&self.key())
            .s(KIND, self.kind.as_str())
            .entity(ACTOR, &EntityRef::User(self.actor.clone()))
            .s(CREATED_AT, self.created_at.as_str())
            .s(OPERATIONS, operations)
            .build()
    }

    fn decode(item: &Item) -> Result<Self, DecodeError> {
        let key = crate::codec::item_key(item)?;
        let operations = serde_json::from_str(required_s(item, OPERATIONS)?).map_err(|_| {
            DecodeError::WrongType {
                attribute: OPERATIONS.to_string(),
                expected: "JSON operation list",
                actual: "S",
            }
        })?;
        Ok(WriteIntent {
            intent_id: key_part(key.sk(), EntityRef::expect_intent)?,
            kind: required_s(item, KIND)?.parse()?,
            actor: key_part(required_s(item, ACTOR)?, EntityRef::expect_user)?,
            created_at: required_s(item, CREATED_AT)?.to_string(),
            operations,
        })
    }
}

/// `recover` の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// 再適用して削除できた intent
    pub replayed: usize,
    /// 再適用しても一部が残った intent
    pub pending: usize,
    /// decode できずに残した intent
    pub unreadable: usize,
}

#[derive(Clone)]
pub struct IntentJournal {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl IntentJournal {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, ids, clock }
    }

    /// intent を記録する。失敗したら何も書かれていない
    pub async fn begin(
        &self,
        kind: IntentKind,
        actor: &UserId,
        operations: Vec<WriteOp>,
    ) -> Result<WriteIntent, TaskTableError> {
        let intent = WriteIntent {
            intent_id: self.ids.intent_id(),
            kind,
            actor: actor.clone(),
            created_at: self.clock.now_rfc3339(),
            operations,
        };
        self.store.put(intent.encode()).await?;
        Ok(intent)
    }

    /// すべての操作が適用された intent を消す。失敗しても再適用で無害なので warning のみ
    pub async fn complete(&self, intent: &WriteIntent) {
        if let Err(err) = self.store.delete(&intent.key()).await {
            tracing::warn!(
                intent_id = %intent.intent_id,
                kind = %intent.kind,
                error = %err,
                "failed to clear completed intent; recovery will replay it"
            );
        }
    }

    /// intent を記録し、操作を 1 つの batch で適用する
    ///
    /// 一部だけ適用された場合は intent を残して `PartialWrite` を返す。
    pub async fn run_batch(
        &self,
        kind: IntentKind,
        actor: &UserId,
        operations: Vec<WriteOp>,
    ) -> Result<(), TaskTableError> {
        let intent = self.begin(kind, actor, operations.clone()).await?;
        let output = self.store.batch_write(operations).await?;

        if !output.is_complete() {
            let unapplied = output.unprocessed_keys();
            tracing::warn!(
                intent_id = %intent.intent_id,
                kind = %kind,
                unapplied = unapplied.len(),
                "batch partially applied; intent kept for recovery"
            );
            return Err(TaskTableError::PartialWrite { unapplied });
        }

        self.complete(&intent).await;
        Ok(())
    }

    /// 残っている intent を再適用する
    pub async fn recover(&self) -> Result<RecoveryReport, TaskTableError> {
        let items = self.store.query(&KeyPrefix::pending_intents()).await?;
        let mut report = RecoveryReport::default();

        for item in items {
            let intent = match WriteIntent::decode(&item) {
                Ok(intent) => intent,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable intent");
                    report.unreadable += 1;
                    continue;
                }
            };

            let output = self.store.batch_write(intent.operations.clone()).await?;
            if output.is_complete() {
                tracing::info!(
                    intent_id = %intent.intent_id,
                    kind = %intent.kind,
                    operations = intent.operations.len(),
                    "replayed pending intent"
                );
                self.complete(&intent).await;
                report.replayed += 1;
            } else {
                tracing::warn!(
                    intent_id = %intent.intent_id,
                    kind = %intent.kind,
                    unapplied = output.unprocessed.len(),
                    "intent replay incomplete"
                );
                report.pending += 1;
            }
        }
        Ok(report)
    }

    pub async fn pending(&self) -> Result<Vec<WriteIntent>, TaskTableError> {
        let items = self.store.query(&KeyPrefix::pending_intents()).await?;
        let intents = items
            .iter()
            .map(WriteIntent::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{NotificationId, TenantId};
    use crate::domain::records::Notification;
    use crate::impls::InMemoryStore;
    use crate::ports::{SystemClock, UlidGenerator};
    use ulid::Ulid;

    fn journal(store: &InMemoryStore) -> IntentJournal {
        IntentJournal::new(
            Arc::new(store.clone()),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        )
    }

    fn notification_ops(user: &UserId, n: usize) -> Vec<WriteOp> {
        (0..n)
            .map(|i| {
                WriteOp::Put(
                    Notification {
                        user_id: user.clone(),
                        notification_id: NotificationId::from_ulid(Ulid::new()),
                        message: format!("n{i}"),
                        time: "2026-01-01T00:00:00Z".into(),
                    }
                    .encode(),
                )
            })
            .collect()
    }

    #[test]
    fn intent_round_trips_with_its_operations() {
        let user = UserId::new("u1").unwrap();
        let mut operations = notification_ops(&user, 1);
        operations.push(WriteOp::Delete(ItemKey::member(
            TenantId::from_ulid(Ulid::new()),
            &user,
        )));
        let intent = WriteIntent {
            intent_id: IntentId::from_ulid(Ulid::new()),
            kind: IntentKind::RedeemInvite,
            actor: user,
            created_at: "2026-01-01T00:00:00Z".into(),
            operations,
        };

        assert_eq!(WriteIntent::decode(&intent.encode()).unwrap(), intent);
    }

    #[tokio::test]
    async fn completed_batch_leaves_no_intent() {
        let store = InMemoryStore::new();
        let journal = journal(&store);
        let user = UserId::new("u1").unwrap();

        journal
            .run_batch(IntentKind::CreateTask, &user, notification_ops(&user, 3))
            .await
            .unwrap();

        assert!(journal.pending().await.unwrap().is_empty());
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn partial_batch_is_completed_by_recovery() {
        let store = InMemoryStore::new();
        let journal = journal(&store);
        let user = UserId::new("u1").unwrap();

        store.fail_writes_after(1).await;
        let err = journal
            .run_batch(IntentKind::CreateTask, &user, notification_ops(&user, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskTableError::PartialWrite { ref unapplied } if unapplied.len() == 2));
        assert_eq!(journal.pending().await.unwrap().len(), 1);

        let report = journal.recover().await.unwrap();
        assert_eq!(report.replayed, 1);
        assert!(journal.pending().await.unwrap().is_empty());
        // 3 notifications, intent removed
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn transport_failure_keeps_intent_for_recovery() {
        let store = InMemoryStore::new();
        let journal = journal(&store);
        let user = UserId::new("u1").unwrap();

        store
            .fail_next_batch(crate::ports::StoreError::Unavailable("down".into()))
            .await;
        let err = journal
            .run_batch(IntentKind::UpdateStatus, &user, notification_ops(&user, 2))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskTableError::StoreUnavailable(_)));
        // only the intent itself
        assert_eq!(store.len().await, 1);
    }
}
