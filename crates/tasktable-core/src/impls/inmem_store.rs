//! InMemoryStore - 開発・テスト用の単一テーブル
//!
//! # 学習ポイント
//! - `BTreeMap<(pk, sk), Item>` の range 走査で prefix query を再現する
//! - batch_write の部分適用・delete 失敗・query 失敗を注入できる
//! - tokio の Mutex を await をまたいで他の port に渡さない

use crate::codec::{item_key, Item};
use crate::domain::keys::{ItemKey, KeyPrefix};
use crate::ports::{BatchWriteOutput, KeyValueStore, StoreError, WriteOp};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 呼び出し回数（テストで「store に触れていない」ことを確かめる）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub gets: usize,
    pub puts: usize,
    pub deletes: usize,
    pub batch_writes: usize,
    pub queries: usize,
}

impl StoreStats {
    pub fn total(&self) -> usize {
        self.gets + self.puts + self.deletes + self.batch_writes + self.queries
    }

    pub fn writes(&self) -> usize {
        self.puts + self.deletes + self.batch_writes
    }
}

#[derive(Default)]
struct Faults {
    /// 次の batch_write はこの件数だけ適用し、残りを unprocessed で返す
    batch_budget: Option<usize>,
    next_batch_error: Option<StoreError>,
    failing_deletes: HashSet<ItemKey>,
    next_query_error: Option<StoreError>,
}

#[derive(Default)]
struct State {
    items: BTreeMap<(String, String), Item>,
    faults: Faults,
    stats: StoreStats,
}

impl State {
    fn apply(&mut self, op: WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::Put(item) => {
                let key = key_of(&item)?;
                self.items.insert(key, item);
            }
            WriteOp::Delete(key) => {
                if self.faults.failing_deletes.contains(&key) {
                    return Err(StoreError::Unavailable(format!("injected delete failure for {key}")));
                }
                self.items
                    .remove(&(key.pk().to_string(), key.sk().to_string()));
            }
        }
        Ok(())
    }
}

fn key_of(item: &Item) -> Result<(String, String), StoreError> {
    let key = item_key(item).map_err(|err| StoreError::MalformedItem(err.to_string()))?;
    Ok((key.pk().to_string(), key.sk().to_string()))
}

/// InMemoryStore はプロセス内の単一テーブル
///
/// # 使用例
/// ```ignore
/// let store = InMemoryStore::new();
/// store.put(record.encode()).await?;
/// let items = store.query(&KeyPrefix::tenant_tasks(tenant_id)).await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の batch_write で先頭 `applied` 件だけ適用する
    pub async fn fail_writes_after(&self, applied: usize) {
        self.state.lock().await.faults.batch_budget = Some(applied);
    }

    /// 次の batch_write を transport エラーで失敗させる（何も適用しない）
    pub async fn fail_next_batch(&self, err: StoreError) {
        self.state.lock().await.faults.next_batch_error = Some(err);
    }

    /// `key` の削除を（解除されるまで）失敗させる。batch 内の delete も対象
    pub async fn fail_deletes_for(&self, key: ItemKey) {
        self.state.lock().await.faults.failing_deletes.insert(key);
    }

    pub async fn clear_delete_failures(&self) {
        self.state.lock().await.faults.failing_deletes.clear();
    }

    pub async fn fail_next_query(&self, err: StoreError) {
        self.state.lock().await.faults.next_query_error = Some(err);
    }

    pub async fn stats(&self) -> StoreStats {
        self.state.lock().await.stats
    }

    pub async fn contains(&self, key: &ItemKey) -> bool {
        self.state
            .lock()
            .await
            .items
            .contains_key(&(key.pk().to_string(), key.sk().to_string()))
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &ItemKey) -> Result<Item, StoreError> {
        let mut state = self.state.lock().await;
        state.stats.gets += 1;
        state
            .items
            .get(&(key.pk().to_string(), key.sk().to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.stats.puts += 1;
        state.apply(WriteOp::Put(item))
    }

    async fn delete(&self, key: &ItemKey) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.stats.deletes += 1;
        state.apply(WriteOp::Delete(key.clone()))
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<BatchWriteOutput, StoreError> {
        let mut state = self.state.lock().await;
        state.stats.batch_writes += 1;
        if let Some(err) = state.faults.next_batch_error.take() {
            return Err(err);
        }

        let budget = state.faults.batch_budget.take().unwrap_or(usize::MAX);
        let mut output = BatchWriteOutput::default();
        for (index, op) in ops.into_iter().enumerate() {
            if index >= budget {
                output.unprocessed.push(op);
                continue;
            }
            // 1 件の失敗は batch 全体を止めない
            if let Err(err) = state.apply(op.clone()) {
                tracing::debug!(error = %err, "in-memory batch item not applied");
                output.unprocessed.push(op);
            }
        }
        Ok(output)
    }

    async fn query(&self, prefix: &KeyPrefix) -> Result<Vec<Item>, StoreError> {
        let mut state = self.state.lock().await;
        state.stats.queries += 1;
        if let Some(err) = state.faults.next_query_error.take() {
            return Err(err);
        }

        let start = (
            prefix.partition().to_string(),
            prefix.sort_prefix().to_string(),
        );
        let items = state
            .items
            .range(start..)
            .take_while(|((pk, sk), _)| {
                pk == prefix.partition() && sk.starts_with(prefix.sort_prefix())
            })
            .map(|(_, item)| item.clone())
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Entity;
    use crate::domain::ids::{NotificationId, TaskId, TenantId, UserId};
    use crate::domain::records::Notification;
    use ulid::Ulid;

    fn notification(user: &UserId, message: &str) -> Notification {
        Notification {
            user_id: user.clone(),
            notification_id: NotificationId::from_ulid(Ulid::new()),
            message: message.into(),
            time: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = InMemoryStore::new();
        let key = ItemKey::task(TenantId::from_ulid(Ulid::new()), TaskId::from_ulid(Ulid::new()));

        assert_eq!(store.get(&key).await, Err(StoreError::NotFound(key.clone())));
        assert_eq!(store.try_get(&key).await, Ok(None));
    }

    #[tokio::test]
    async fn query_returns_prefix_matches_in_sort_key_order() {
        let store = InMemoryStore::new();
        let user = UserId::new("u1").unwrap();
        let other = UserId::new("u2").unwrap();

        let first = notification(&user, "first");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = notification(&user, "second");
        store.put(second.encode()).await.unwrap();
        store.put(first.encode()).await.unwrap();
        store.put(notification(&other, "not mine").encode()).await.unwrap();

        let items = store
            .query(&KeyPrefix::user_notifications(&user))
            .await
            .unwrap();
        let messages: Vec<_> = items
            .iter()
            .map(|item| Notification::decode(item).unwrap().message)
            .collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn partial_batch_reports_unprocessed_ops() {
        let store = InMemoryStore::new();
        let user = UserId::new("u1").unwrap();
        let ops: Vec<_> = (0..3)
            .map(|i| WriteOp::Put(notification(&user, &format!("n{i}")).encode()))
            .collect();

        store.fail_writes_after(1).await;
        let output = store.batch_write(ops).await.unwrap();

        assert_eq!(output.unprocessed.len(), 2);
        assert_eq!(store.len().await, 1);

        // one-shot
        let ops = vec![WriteOp::Put(notification(&user, "later").encode())];
        assert!(store.batch_write(ops).await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn injected_delete_failure_surfaces_unavailable() {
        let store = InMemoryStore::new();
        let user = UserId::new("u1").unwrap();
        let n = notification(&user, "keep me");
        store.put(n.encode()).await.unwrap();

        store.fail_deletes_for(n.key()).await;
        assert!(matches!(
            store.delete(&n.key()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.contains(&n.key()).await);

        store.clear_delete_failures().await;
        store.delete(&n.key()).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn put_without_key_is_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.put(Item::new()).await,
            Err(StoreError::MalformedItem(_))
        ));
    }

    #[tokio::test]
    async fn stats_count_each_call() {
        let store = InMemoryStore::new();
        let user = UserId::new("u1").unwrap();
        store.query(&KeyPrefix::user_tasks(&user)).await.unwrap();
        store.fail_next_query(StoreError::Throttled("busy".into())).await;
        assert!(store.query(&KeyPrefix::user_tasks(&user)).await.is_err());

        let stats = store.stats().await;
        assert_eq!(stats.queries, 2);
        assert_eq!(stats.writes(), 0);
    }
}
