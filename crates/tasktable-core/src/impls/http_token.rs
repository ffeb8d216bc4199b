//! HttpTokenExchange - OAuth2 token endpoint への form POST
//!
//! - authorization code: `grant_type=authorization_code`
//! - refresh token: `grant_type=refresh_token`
//!
//! client secret があれば HTTP basic 認証で送る。

use crate::config::IdentityProviderConfig;
use crate::ports::{IdentityError, RefreshedTokens, TokenExchange, TokenSet};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct HttpTokenExchange {
    config: IdentityProviderConfig,
    client: reqwest::Client,
}

impl HttpTokenExchange {
    pub fn new(config: IdentityProviderConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| IdentityError::Unavailable(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { config, client })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        form: &[(&str, &str)],
    ) -> Result<T, IdentityError> {
        let mut request = self.client.post(self.config.token_url()).form(form);
        if !self.config.client_secret.is_empty() {
            request = request.basic_auth(&self.config.client_id, Some(&self.config.client_secret));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("token request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(IdentityError::Throttled(format!("token endpoint returned {status}")));
        }
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(format!(
                "token endpoint returned status {status}"
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| IdentityError::BadResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, IdentityError> {
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, IdentityError> {
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
