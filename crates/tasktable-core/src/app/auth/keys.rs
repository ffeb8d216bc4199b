//! KeySetCache / KeyRefresher - JWKS のキャッシュと定期更新
//!
//! # 学習ポイント
//! - 読み取りが大半なので `tokio::sync::RwLock`
//! - 未知の kid は 1 回だけ取り直す（鍵ローテーション直後の token 対策）
//! - ただし強制的な取り直しは `min_refetch` に 1 回まで。偽の kid を並べても外向き通信は増えない
//! - 定期更新は watch channel で止められる background task

use crate::ports::{KeySetError, KeySetSource};
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// 未知の kid による取り直しの最小間隔
pub const DEFAULT_MIN_REFETCH: Duration = Duration::from_secs(30);

#[derive(Default)]
struct CachedKeys {
    set: Option<JwkSet>,
    /// 未知の kid で最後に取り直した時刻
    forced_at: Option<Instant>,
}

pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    keys: RwLock<CachedKeys>,
    min_refetch: Duration,
}

impl KeySetCache {
    /// 空のキャッシュ。最初の検証で取得する
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            keys: RwLock::new(CachedKeys::default()),
            min_refetch: DEFAULT_MIN_REFETCH,
        }
    }

    pub fn with_min_refetch(mut self, min_refetch: Duration) -> Self {
        self.min_refetch = min_refetch;
        self
    }

    /// source から取り直して差し替える。返り値は鍵の数
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let fresh = self.source.fetch().await?;
        let count = fresh.keys.len();
        self.keys.write().await.set = Some(fresh);
        tracing::debug!(keys = count, "key set refreshed");
        Ok(count)
    }

    /// `kid` の検証鍵。キャッシュに無ければ取り直すが、`min_refetch` 以内の再取得はしない
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, KeySetError> {
        if let Some(key) = self.cached(kid).await? {
            return Ok(key);
        }
        if self.claim_forced_refetch().await {
            self.refresh().await?;
        } else {
            tracing::debug!(kid, "unknown kid; refetch suppressed");
        }
        self.cached(kid)
            .await?
            .ok_or_else(|| KeySetError::UnknownKey(kid.to_string()))
    }

    /// 強制取り直しの枠を取る。write lock の中で判定と記録を済ませる
    async fn claim_forced_refetch(&self) -> bool {
        let mut keys = self.keys.write().await;
        let now = Instant::now();
        let due = keys.set.is_none()
            || keys
                .forced_at
                .is_none_or(|at| now.duration_since(at) >= self.min_refetch);
        if due {
            keys.forced_at = Some(now);
        }
        due
    }

    async fn cached(&self, kid: &str) -> Result<Option<DecodingKey>, KeySetError> {
        let keys = self.keys.read().await;
        let Some(jwk) = keys.set.as_ref().and_then(|set| set.find(kid)) else {
            return Ok(None);
        };
        DecodingKey::from_jwk(jwk)
            .map(Some)
            .map_err(|err| KeySetError::Malformed(format!("kid {kid}: {err}")))
    }
}

/// KeyRefresher は KeySetCache を一定間隔で取り直す background task
///
/// - `request_shutdown()` で次の tick を待たずに止まる
/// - 取得失敗は warning を出して次の tick まで古い鍵を使い続ける
pub struct KeyRefresher {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl KeyRefresher {
    pub fn spawn(cache: Arc<KeySetCache>, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let every = every.max(Duration::from_secs(1));
        let join = tokio::spawn(async move {
            refresh_loop(cache, every, &mut shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receiver はループ終了後に drop されている場合がある
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn refresh_loop(
    cache: Arc<KeySetCache>,
    every: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender が消えたら止まる
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if let Err(err) = cache.refresh().await {
            tracing::warn!(error = %err, "key set refresh failed; keeping cached keys");
        }
    }
    tracing::debug!("key refresher stopped");
}
