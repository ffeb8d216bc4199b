//! StaticKeySet - 固定の鍵セット（テスト・ローカル開発用）

use crate::ports::{KeySetError, KeySetSource};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use std::sync::{Arc, Mutex};

/// StaticKeySet は差し替え可能な JWKS を返す
///
/// `replace` で鍵をローテーションさせ、キャッシュの再取得を確かめられる。
#[derive(Clone)]
pub struct StaticKeySet {
    keys: Arc<Mutex<JwkSet>>,
    fetches: Arc<Mutex<usize>>,
}

impl StaticKeySet {
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: Arc::new(Mutex::new(keys)),
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn empty() -> Self {
        Self::new(JwkSet { keys: Vec::new() })
    }

    /// JWKS の JSON 文書から作成
    pub fn from_json(json: &str) -> Result<Self, KeySetError> {
        let keys: JwkSet =
            serde_json::from_str(json).map_err(|err| KeySetError::Malformed(err.to_string()))?;
        Ok(Self::new(keys))
    }

    pub fn replace(&self, keys: JwkSet) {
        if let Ok(mut current) = self.keys.lock() {
            *current = keys;
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().map(|count| *count).unwrap_or_default()
    }
}

#[async_trait]
impl KeySetSource for StaticKeySet {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        if let Ok(mut count) = self.fetches.lock() {
            *count += 1;
        }
        self.keys
            .lock()
            .map(|keys| keys.clone())
            .map_err(|_| KeySetError::Fetch("key set lock poisoned".to_string()))
    }
}
