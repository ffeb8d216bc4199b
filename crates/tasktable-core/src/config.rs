//! Runtime configuration read from the environment.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Identity provider (hosted login, token endpoint, JWKS) settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityProviderConfig {
    pub domain: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub redirect_url: String,
    pub user_pool_id: String,
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

impl IdentityProviderConfig {
    pub fn jwks_url(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}/.well-known/jwks.json",
            self.region, self.user_pool_id
        )
    }

    /// Issuer the id tokens are minted with.
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    pub fn token_url(&self) -> String {
        format!("https://{}/oauth2/token", self.domain)
    }

    /// Hosted-login redirect for the authorization-code flow.
    pub fn login_url(&self) -> Result<String, ConfigError> {
        let base = format!("https://{}/oauth2/authorize", self.domain);
        let url = reqwest::Url::parse_with_params(
            &base,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("lang", "en"),
            ],
        )
        .map_err(|err| ConfigError::InvalidUrl(format!("{base}: {err}")))?;
        Ok(url.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_web_url")]
    pub web_url: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_jwks_refresh_secs")]
    pub jwks_refresh_secs: u64,
    pub identity: IdentityProviderConfig,
}

fn default_table_name() -> String {
    "tasktable".to_string()
}

fn default_web_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_jwks_refresh_secs() -> u64 {
    3_600
}

impl AppConfig {
    /// Defaults plus the given identity provider block.
    pub fn new(identity: IdentityProviderConfig) -> Self {
        Self {
            table_name: default_table_name(),
            web_url: default_web_url(),
            session_ttl_secs: default_session_ttl_secs(),
            jwks_refresh_secs: default_jwks_refresh_secs(),
            identity,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(read_non_empty_env)
    }

    /// Reads every `TASKTABLE_*` key through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let identity = IdentityProviderConfig {
            domain: required("TASKTABLE_IDP_DOMAIN")?,
            region: lookup("TASKTABLE_IDP_REGION").unwrap_or_else(default_region),
            client_id: required("TASKTABLE_IDP_CLIENT_ID")?,
            client_secret: lookup("TASKTABLE_IDP_CLIENT_SECRET").unwrap_or_default(),
            redirect_url: required("TASKTABLE_IDP_REDIRECT_URL")?,
            user_pool_id: required("TASKTABLE_IDP_USER_POOL_ID")?,
        };

        Ok(Self {
            table_name: lookup("TASKTABLE_TABLE_NAME").unwrap_or_else(default_table_name),
            web_url: lookup("TASKTABLE_WEB_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(default_web_url),
            session_ttl_secs: read_secs(
                &lookup,
                "TASKTABLE_SESSION_TTL_SECS",
                default_session_ttl_secs(),
            )?,
            jwks_refresh_secs: read_secs(
                &lookup,
                "TASKTABLE_JWKS_REFRESH_SECS",
                default_jwks_refresh_secs(),
            )?,
            identity,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn jwks_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_refresh_secs)
    }
}

fn read_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
    }
}

fn read_non_empty_env(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
