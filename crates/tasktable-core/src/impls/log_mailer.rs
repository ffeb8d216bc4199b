//! LogMailer - メールを送らずに tracing へ出力する開発用 Mailer

use crate::ports::{MailError, MailMessage, Mailer};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// LogMailer は送信内容をログに出し、outbox に記録する
#[derive(Clone, Default)]
pub struct LogMailer {
    outbox: Arc<Mutex<Vec<MailMessage>>>,
    failing: bool,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// すべての送信を失敗させる（warning 経路の確認用）
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError {
                to: message.to,
                reason: "mailer configured to fail".to_string(),
            });
        }
        tracing::info!(to = %message.to, subject = %message.subject, "mail sent");
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(message);
        }
        Ok(())
    }
}
