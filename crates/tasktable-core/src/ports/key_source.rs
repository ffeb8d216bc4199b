//! KeySetSource port - JWT 検証用の公開鍵セット (JWKS) の取得元
//!
//! 本番は identity provider の well-known endpoint を HTTP で取得し、
//! テストは固定の鍵セットを返す。

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum KeySetError {
    #[error("failed to fetch key set: {0}")]
    Fetch(String),

    #[error("key set is not valid JSON: {0}")]
    Malformed(String),

    #[error("no key with kid {0:?}")]
    UnknownKey(String),
}

/// KeySetSource は最新の鍵セットを返す
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}
