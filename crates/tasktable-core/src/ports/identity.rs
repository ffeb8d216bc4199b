//! Identity provider ports
//!
//! - **TokenExchange**: OAuth2 の token endpoint（authorization code / refresh token の交換）
//! - **UserDirectory**: 管理 API（ユーザー作成、パスワード設定、属性更新）
//!
//! token 発行の内部には立ち入らず、JSON の wire contract だけを扱う。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::ids::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Unavailable(String),

    #[error("identity provider throttled the request: {0}")]
    Throttled(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unexpected response: {0}")]
    BadResponse(String),
}

/// authorization code 交換のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// refresh token 交換のレスポンス。refresh token 自体は返らない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub id_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, IdentityError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, IdentityError>;
}

/// custom 属性 (`custom:tenantId` など)
pub type UserAttributes = BTreeMap<String, String>;

pub const ATTR_TENANT_ID: &str = "custom:tenantId";
pub const ATTR_TENANT_NAME: &str = "custom:tenantName";
pub const ATTR_ROLE: &str = "custom:role";
pub const ATTR_USERNAME: &str = "custom:username";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDirectoryUser {
    pub email: String,
    pub attributes: UserAttributes,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// ユーザーを作成し、払い出された subject を返す
    async fn create_user(&self, user: NewDirectoryUser) -> Result<UserId, IdentityError>;

    /// 恒久パスワードを設定する
    async fn set_password(&self, email: &str, password: &str) -> Result<(), IdentityError>;

    async fn update_attributes(
        &self,
        email: &str,
        attributes: UserAttributes,
    ) -> Result<(), IdentityError>;
}
