//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **TaskWriter / TaskReader**: task と assignment edge の書き込み・読み出し
//! - **StatusUpdater**: ステータス更新と履歴
//! - **InviteService / TenantService / DirectoryService**: テナントと member
//! - **IntentJournal**: 複数 item 書き込みの intent 記録と recovery
//! - **EdgeReconciler**: 崩れた edge 組の修復
//! - **auth**: id token の検証と session cookie

pub mod auth;
pub mod builder;
pub mod directory;
pub mod invites;
pub mod journal;
pub mod reconcile;
pub mod status;
pub mod task_reader;
pub mod task_writer;
pub mod tenants;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
pub(crate) mod test_support;

// 主要な型を再エクスポート
pub use self::auth::{AuthState, Authorizer, KeyRefresher, SessionService, TokenPolicy};
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::directory::DirectoryService;
pub use self::invites::{InviteLink, InviteService};
pub use self::journal::{IntentJournal, IntentKind, RecoveryReport, WriteIntent};
pub use self::reconcile::{EdgeReconciler, ReconcileReport};
pub use self::status::StatusUpdater;
pub use self::task_reader::TaskReader;
pub use self::task_writer::{DeleteReport, TaskWriter};
pub use self::tenants::TenantService;

use crate::ports::{MailMessage, Mailer};

/// メール送信。失敗しても呼び出し元の操作は成功扱いで、warning だけ出す
pub(crate) async fn deliver(mailer: &dyn Mailer, message: MailMessage) {
    let to = message.to.clone();
    match mailer.send(message).await {
        Ok(()) => tracing::debug!(to = %to, "mail delivered"),
        Err(err) => tracing::warn!(to = %to, error = %err, "mail delivery failed"),
    }
}
