//! InviteService - 招待の作成と引き換え
//!
//! 引き換えの順序:
//! 1. invite を完全一致の key で取得（無い / tenant 不一致なら `InvalidInvite`、何も書かない）
//! 2. identity provider でユーザー作成 + パスワード設定
//! 3. membership put / welcome 通知 put / invite delete を 1 batch
//!
//! 2 と 3 の間で落ちると identity provider 側にだけユーザーが残るが、
//! invite が再利用できる状態でユーザーだけ居る、という状態にはならない。

use crate::app::deliver;
use crate::app::journal::{IntentJournal, IntentKind};
use crate::codec::Entity;
use crate::domain::keys::ItemKey;
use crate::domain::records::{Invite, Member, Notification};
use crate::domain::{InviteToken, RequestContext, Role, TaskTableError, TenantId};
use crate::ports::identity::{ATTR_ROLE, ATTR_TENANT_ID, ATTR_USERNAME};
use crate::ports::{
    Clock, IdGenerator, KeyValueStore, MailMessage, Mailer, NewDirectoryUser, UserAttributes,
    UserDirectory, WriteOp,
};
use std::sync::Arc;

pub const WELCOME_MESSAGE: &str = "Welcome to the team";

/// 招待 URL (`<web>/invite/<tenant>/<token>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteLink {
    pub token: InviteToken,
    pub tenant_id: TenantId,
    pub url: String,
}

#[derive(Clone)]
pub struct InviteService {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    journal: IntentJournal,
    web_url: String,
}

impl InviteService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        journal: IntentJournal,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ids,
            clock,
            directory,
            mailer,
            journal,
            web_url: web_url.into(),
        }
    }

    /// 同じ email への未使用 invite があっても新しく作る
    pub async fn create_invite(
        &self,
        ctx: &RequestContext,
        email: &str,
        role: Role,
    ) -> Result<InviteLink, TaskTableError> {
        let tenant_id = ctx.require_tenant()?;
        let invite = Invite {
            token: self.ids.invite_token(),
            tenant_id,
            email: email.to_string(),
            role,
        };
        self.store.put(invite.encode()).await?;

        let url = format!("{}/invite/{}/{}", self.web_url, tenant_id, invite.token);
        let inviter = ctx.username.as_deref().unwrap_or(ctx.email.as_str());
        deliver(
            self.mailer.as_ref(),
            MailMessage {
                to: email.to_string(),
                subject: "You have been invited".to_string(),
                body: format!("{inviter} invited you to join their team.\n\nAccept: {url}"),
            },
        )
        .await;

        tracing::info!(tenant_id = %tenant_id, role = %role, "invite created");
        Ok(InviteLink {
            token: invite.token,
            tenant_id,
            url,
        })
    }

    /// URL の token と tenant id で invite を引き換え、作成した member を返す
    pub async fn redeem_invite(
        &self,
        token: &str,
        tenant_id: &str,
        username: &str,
        password: &str,
    ) -> Result<Member, TaskTableError> {
        let token: InviteToken = token.parse().map_err(|_| TaskTableError::InvalidInvite)?;
        let tenant_id: TenantId = tenant_id
            .parse()
            .map_err(|_| TaskTableError::InvalidInvite)?;

        let Some(item) = self
            .store
            .try_get(&ItemKey::invite(token, tenant_id))
            .await?
        else {
            tracing::debug!(tenant_id = %tenant_id, "invite not found");
            return Err(TaskTableError::InvalidInvite);
        };
        let invite = Invite::decode(&item)?;
        if invite.tenant_id != tenant_id {
            return Err(TaskTableError::InvalidInvite);
        }

        let username = username.trim();
        let attributes = UserAttributes::from([
            (ATTR_TENANT_ID.to_string(), tenant_id.to_string()),
            (ATTR_ROLE.to_string(), invite.role.as_str().to_string()),
            (ATTR_USERNAME.to_string(), username.to_string()),
        ]);
        let user_id = self
            .directory
            .create_user(NewDirectoryUser {
                email: invite.email.clone(),
                attributes,
            })
            .await?;
        self.directory.set_password(&invite.email, password).await?;

        let member = Member {
            tenant_id,
            user_id: user_id.clone(),
            username: username.to_string(),
            email: invite.email.clone(),
            role: invite.role,
        };
        let welcome = Notification {
            user_id: user_id.clone(),
            notification_id: self.ids.notification_id(),
            message: WELCOME_MESSAGE.to_string(),
            time: self.clock.now_rfc3339(),
        };
        let ops = vec![
            WriteOp::Put(member.encode()),
            WriteOp::Put(welcome.encode()),
            WriteOp::Delete(invite.key()),
        ];
        self.journal
            .run_batch(IntentKind::RedeemInvite, &user_id, ops)
            .await?;

        deliver(
            self.mailer.as_ref(),
            MailMessage {
                to: member.email.clone(),
                subject: WELCOME_MESSAGE.to_string(),
                body: format!("Hi {username}, your account is ready."),
            },
        )
        .await;

        tracing::info!(tenant_id = %tenant_id, user_id = %user_id, "invite redeemed");
        Ok(member)
    }
}
