//! TenantService - サインアップ済みユーザーによるテナント登録

use crate::app::deliver;
use crate::app::journal::{IntentJournal, IntentKind};
use crate::codec::Entity;
use crate::domain::records::{Member, Notification};
use crate::domain::{RequestContext, Role, TaskTableError};
use crate::ports::identity::{ATTR_ROLE, ATTR_TENANT_ID, ATTR_TENANT_NAME, ATTR_USERNAME};
use crate::ports::{
    Clock, IdGenerator, MailMessage, Mailer, UserAttributes, UserDirectory, WriteOp,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct TenantService {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    journal: IntentJournal,
}

impl TenantService {
    pub fn new(
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        journal: IntentJournal,
    ) -> Self {
        Self {
            ids,
            clock,
            directory,
            mailer,
            journal,
        }
    }

    /// 呼び出し元を admin とする新しいテナントを作る
    ///
    /// identity provider の属性を先に更新するので、呼び出し元は次の
    /// token refresh から tenant claim を持つ。
    pub async fn register_tenant(
        &self,
        ctx: &RequestContext,
        tenant_name: &str,
        username: &str,
    ) -> Result<Member, TaskTableError> {
        if let Some(existing) = ctx.tenant_id {
            return Err(TaskTableError::Validation(format!(
                "user already belongs to tenant {existing}"
            )));
        }
        let tenant_id = self.ids.tenant_id();
        let tenant_name = tenant_name.trim();
        let username = username.trim();

        let attributes = UserAttributes::from([
            (ATTR_TENANT_ID.to_string(), tenant_id.to_string()),
            (ATTR_TENANT_NAME.to_string(), tenant_name.to_string()),
            (ATTR_ROLE.to_string(), Role::Admin.as_str().to_string()),
            (ATTR_USERNAME.to_string(), username.to_string()),
        ]);
        self.directory
            .update_attributes(&ctx.email, attributes)
            .await?;

        let member = Member {
            tenant_id,
            user_id: ctx.user_id.clone(),
            username: username.to_string(),
            email: ctx.email.clone(),
            role: Role::Admin,
        };
        let welcome = Notification {
            user_id: ctx.user_id.clone(),
            notification_id: self.ids.notification_id(),
            message: format!("Welcome to {tenant_name}! Your workspace is ready."),
            time: self.clock.now_rfc3339(),
        };
        self.journal
            .run_batch(
                IntentKind::RegisterTenant,
                &ctx.user_id,
                vec![WriteOp::Put(member.encode()), WriteOp::Put(welcome.encode())],
            )
            .await?;

        deliver(
            self.mailer.as_ref(),
            MailMessage {
                to: ctx.email.clone(),
                subject: format!("{tenant_name} is ready"),
                body: welcome.message.clone(),
            },
        )
        .await;

        tracing::info!(tenant_id = %tenant_id, user_id = %ctx.user_id, "tenant registered");
        Ok(member)
    }
}
