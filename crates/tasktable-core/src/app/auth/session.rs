//! Session cookies と token 交換
//!
//! cookie は `access_token` / `id_token` / `refresh_token` の 3 つ。
//! 検証に使うのは `id_token` だけ。

use crate::domain::TaskTableError;
use crate::ports::{Clock, IdentityError, RefreshedTokens, TokenExchange, TokenSet};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const ID_TOKEN_COOKIE: &str = "id_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// `Cookie` ヘッダーから取り出した session token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCookies {
    /// 知らない cookie と空の値は無視する
    pub fn from_cookie_header(header: &str) -> Self {
        let mut cookies = Self::default();
        for pair in header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match name.trim() {
                ACCESS_TOKEN_COOKIE => &mut cookies.access_token,
                ID_TOKEN_COOKIE => &mut cookies.id_token,
                REFRESH_TOKEN_COOKIE => &mut cookies.refresh_token,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        cookies
    }
}

/// 発行された token。refresh では refresh token は返らない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
}

impl From<TokenSet> for SessionGrant {
    fn from(tokens: TokenSet) -> Self {
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: Some(tokens.refresh_token),
        }
    }
}

impl From<RefreshedTokens> for SessionGrant {
    fn from(tokens: RefreshedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: None,
        }
    }
}

/// `Set-Cookie` ヘッダーの値。`access_token` だけ HttpOnly
pub fn session_set_cookies(grant: &SessionGrant, ttl: Duration, now: DateTime<Utc>) -> Vec<String> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::days(1));
    let expires = (now + ttl).format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let mut cookies = vec![
        cookie(ACCESS_TOKEN_COOKIE, &grant.access_token, &expires, true),
        cookie(ID_TOKEN_COOKIE, &grant.id_token, &expires, false),
    ];
    if let Some(refresh) = &grant.refresh_token {
        cookies.push(cookie(REFRESH_TOKEN_COOKIE, refresh, &expires, false));
    }
    cookies
}

fn cookie(name: &str, value: &str, expires: &str, http_only: bool) -> String {
    let mut cookie = format!("{name}={value}; Expires={expires}; Path=/; SameSite=Strict");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie
}

/// 発行した token とそれを運ぶ `Set-Cookie` 値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub grant: SessionGrant,
    pub set_cookies: Vec<String>,
}

#[derive(Clone)]
pub struct SessionService {
    exchange: Arc<dyn TokenExchange>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(exchange: Arc<dyn TokenExchange>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            exchange,
            clock,
            ttl,
        }
    }

    /// hosted login から戻ってきた authorization code を token に交換する
    pub async fn exchange_code(&self, code: &str) -> Result<IssuedSession, TaskTableError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(TaskTableError::Validation("authorization code is empty".into()));
        }
        let tokens = self.exchange.exchange_code(code).await.map_err(|err| match err {
            IdentityError::Rejected(reason) => TaskTableError::Unauthorized(reason),
            other => other.into(),
        })?;
        tracing::info!("authorization code exchanged");
        Ok(self.issue(tokens.into()))
    }

    /// `refresh_token` cookie で access / id token を取り直す
    ///
    /// cookie が無い、または provider が拒否したら `RefreshFailed`。
    /// provider の transport エラーはそのまま返す。
    pub async fn refresh_session(
        &self,
        cookie_header: Option<&str>,
    ) -> Result<IssuedSession, TaskTableError> {
        let Some(refresh_token) = cookie_header
            .map(SessionCookies::from_cookie_header)
            .and_then(|cookies| cookies.refresh_token)
        else {
            return Err(TaskTableError::RefreshFailed(
                "no refresh_token cookie".to_string(),
            ));
        };

        let tokens = self
            .exchange
            .refresh(&refresh_token)
            .await
            .map_err(|err| match err {
                IdentityError::Rejected(reason) => TaskTableError::RefreshFailed(reason),
                other => other.into(),
            })?;
        tracing::debug!("session refreshed");
        Ok(self.issue(tokens.into()))
    }

    fn issue(&self, grant: SessionGrant) -> IssuedSession {
        let set_cookies = session_set_cookies(&grant, self.ttl, self.clock.now());
        IssuedSession { grant, set_cookies }
    }
}
