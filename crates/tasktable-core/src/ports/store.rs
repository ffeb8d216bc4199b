//! KeyValueStore port - 単一テーブルの KV ストア
//!
//! 提供するのは primary key での get/put/delete、put/delete の batch、
//! sort key の prefix による range query だけ。secondary index はない。
//!
//! # batch_write は非トランザクション
//! 一部の操作だけが適用されることがある。適用されなかった操作は
//! `BatchWriteOutput::unprocessed` で返し、ここでは隠さない（呼び出し側の責務）。

use crate::codec::Item;
use crate::domain::keys::{ItemKey, KeyPrefix};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// store の transport エラー。coordinator はそのまま上に返す
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(ItemKey),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("malformed item: {0}")]
    MalformedItem(String),
}

/// batch に載せる 1 操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "target", rename_all = "lowercase")]
pub enum WriteOp {
    Put(Item),
    Delete(ItemKey),
}

impl WriteOp {
    /// 操作対象の key。put の item に key が無ければ None
    pub fn key(&self) -> Option<ItemKey> {
        match self {
            WriteOp::Put(item) => crate::codec::item_key(item).ok(),
            WriteOp::Delete(key) => Some(key.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    /// 適用されなかった操作（送った順）
    pub unprocessed: Vec<WriteOp>,
}

impl BatchWriteOutput {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    pub fn unprocessed_keys(&self) -> Vec<ItemKey> {
        self.unprocessed.iter().filter_map(WriteOp::key).collect()
    }
}

/// KeyValueStore は単一テーブルへのアクセスを抽象化
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// key が存在しなければ `StoreError::NotFound`
    async fn get(&self, key: &ItemKey) -> Result<Item, StoreError>;

    /// 同じ key の item は丸ごと置き換える
    async fn put(&self, item: Item) -> Result<(), StoreError>;

    /// 存在しない key の削除も成功扱い
    async fn delete(&self, key: &ItemKey) -> Result<(), StoreError>;

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<BatchWriteOutput, StoreError>;

    /// partition 内で sort key が prefix に一致する item を sort key 昇順で返す
    async fn query(&self, prefix: &KeyPrefix) -> Result<Vec<Item>, StoreError>;

    /// `get` の NotFound を `None` に読み替える
    async fn try_get(&self, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        match self.get(key).await {
            Ok(item) => Ok(Some(item)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
