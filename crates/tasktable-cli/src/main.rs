use std::error::Error;
use std::sync::Arc;

use serde_json::json;
use tasktable_core::app::AppBuilder;
use tasktable_core::config::{AppConfig, IdentityProviderConfig};
use tasktable_core::domain::{RequestContext, TaskStatus, UserId};
use tasktable_core::impls::{
    HttpKeySetSource, HttpTokenExchange, InMemoryStore, InMemoryUserDirectory, LogMailer,
};
use tasktable_core::validation::{self, TaskInput};
use tracing_subscriber::EnvFilter;

/// IdP の環境変数が無いときに使うローカル設定
fn local_identity() -> IdentityProviderConfig {
    IdentityProviderConfig {
        domain: "auth.localhost".to_string(),
        region: "eu-west-1".to_string(),
        client_id: "local-client".to_string(),
        client_secret: String::new(),
        redirect_url: "http://localhost:3000/callback".to_string(),
        user_pool_id: "eu-west-1_local".to_string(),
    }
}

fn task_input(value: serde_json::Value) -> Result<TaskInput, serde_json::Error> {
    serde_json::from_value(value)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tasktable_core=debug")),
        )
        .init();

    // (A) 設定とワイヤリング（store と identity provider 管理 API は in-memory）
    let config = AppConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "identity provider not configured; using local defaults");
        AppConfig::new(local_identity())
    });
    let directory = InMemoryUserDirectory::new();
    let app = AppBuilder::new(config.clone())
        .store(Arc::new(InMemoryStore::new()))
        .user_directory(Arc::new(directory.clone()))
        .token_exchange(Arc::new(HttpTokenExchange::new(config.identity.clone())?))
        .key_source(Arc::new(HttpKeySetSource::new(config.identity.jwks_url())?))
        .mailer(Arc::new(LogMailer::new()))
        .build()?;
    tracing::info!(login_url = %app.login_url, "app ready");
    // 取得に失敗しても warning だけで、キャッシュ済みの鍵を使い続ける
    let refresher = app.spawn_key_refresher();

    // (B) 前回の中断で残った intent を先に片付ける
    let recovered = app.journal.recover().await?;
    tracing::info!(?recovered, "journal recovered");

    // (C) サインアップ済みユーザーがテナントを作る
    //     ローカルでは id token を発行できないので claims を直接組み立てる
    let founder = UserId::new("founder-sub")?;
    directory.seed_user(founder.clone(), "founder@example.com").await;
    let signup = RequestContext::new(founder.clone(), "founder@example.com");
    let admin = app
        .tenants
        .register_tenant(&signup, "Acme", "founder")
        .await?;
    let admin_ctx = RequestContext::new(founder, "founder@example.com")
        .with_tenant(admin.tenant_id, admin.role)
        .with_username(admin.username.clone());

    // (D) 招待と引き換え
    let link = app
        .invites
        .create_invite(&admin_ctx, "hire@example.com", tasktable_core::Role::Member)
        .await?;
    tracing::info!(url = %link.url, "invite created");
    let hire = app
        .invites
        .redeem_invite(
            &link.token.to_string(),
            &link.tenant_id.to_string(),
            "new-hire",
            "correct-horse-battery",
        )
        .await?;

    // (E) task の作成・更新・ステータス変更
    let task = validation::validate_task(task_input(json!({
        "title": "Ship release",
        "description": "cut the release branch",
        "deadline": "2026-06-30",
        "assignees": [
            { "user_id": admin.user_id.as_str(), "username": admin.username, "email": admin.email },
            { "user_id": hire.user_id.as_str(), "username": hire.username, "email": hire.email },
        ],
    }))?)?;
    let record = app.writer.create_task(&admin_ctx, task).await?;

    let update = validation::validate_task(task_input(json!({
        "title": "Ship release 1.0",
        "description": "cut the release branch",
        "status": "at_risk",
        "deadline": "30/06/2026",
        "assignees": [
            { "user_id": hire.user_id.as_str(), "username": hire.username, "email": hire.email },
        ],
    }))?)?;
    app.writer
        .update_task(&admin_ctx, record.task_id, update)
        .await?;
    app.status
        .update_status(
            &admin_ctx,
            record.task_id,
            TaskStatus::new("completed"),
            "released",
        )
        .await?;

    for view in app.reader.tasks_by_tenant(admin.tenant_id).await? {
        tracing::info!(
            task_id = %view.task_id,
            title = %view.fields.title,
            status = %view.fields.status,
            assignees = view.assignees.len(),
            "tenant task"
        );
    }
    let history = app
        .reader
        .task_history(admin.tenant_id, record.task_id)
        .await?
        .unwrap_or_default();
    for entry in history {
        tracing::info!(status = %entry.status, by = %entry.updated_by, at = %entry.updated_at, "history");
    }
    for note in app.directory.list_notifications(&hire.user_id).await? {
        tracing::info!(message = %note.message, "notification for new hire");
    }

    // (F) 削除と修復パス
    let report = app.writer.delete_task(&admin_ctx, record.task_id).await?;
    tracing::info!(
        attempted = report.edges_attempted,
        deleted = report.edges_deleted,
        "task deleted"
    );
    let repaired = app.reconciler.reconcile_tenant(&admin_ctx).await?;
    tracing::info!(?repaired, "reconciled");

    refresher.shutdown_and_join().await;
    Ok(())
}
