//! Mailer port - テンプレート化されたメッセージの送信
//!
//! 送信失敗は warning 扱い。書き込み済みのデータを巻き戻さない。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mail delivery to {to} failed: {reason}")]
pub struct MailError {
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}
