//! HttpKeySetSource - identity provider の well-known JWKS endpoint から取得

use crate::ports::{KeySetError, KeySetSource};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use std::time::Duration;

pub struct HttpKeySetSource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| KeySetError::Fetch(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(format!("JWKS request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(KeySetError::Fetch(format!(
                "JWKS endpoint returned status {status}"
            )));
        }

        let keys = resp
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::Malformed(e.to_string()))?;
        tracing::debug!(url = %self.url, keys = keys.keys.len(), "fetched key set");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_configured_url() {
        let source = HttpKeySetSource::new(
            "https://cognito-idp.eu-west-1.amazonaws.com/pool/.well-known/jwks.json",
        )
        .unwrap();
        assert!(source.url().ends_with("/.well-known/jwks.json"));
    }
}
