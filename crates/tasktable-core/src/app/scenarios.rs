//! End-to-end scenarios through `AppBuilder` wiring.

use crate::app::test_support::{Harness, assignee, fields};
use crate::domain::keys::{ItemKey, KeyPrefix};
use crate::domain::records::TaskStatus;
use crate::domain::{Role, TaskTableError, UserId};
use crate::ports::KeyValueStore;
use crate::validation::{AssigneeInput, TaskInput, ValidTask, validate_task};
use std::collections::BTreeSet;

fn user_set<'a>(ids: impl IntoIterator<Item = &'a UserId>) -> BTreeSet<String> {
    ids.into_iter().map(|id| id.as_str().to_string()).collect()
}

#[tokio::test]
async fn tenant_task_lists_exactly_its_assignees() {
    let h = Harness::new();
    let ctx = h.admin_ctx();
    let record = h
        .writer
        .create_task(
            &ctx,
            ValidTask {
                fields: fields("Ship release"),
                assignees: vec![assignee("u1"), assignee("u2")],
            },
        )
        .await
        .unwrap();

    let tasks = h.app.reader.tasks_by_tenant(h.tenant).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].fields.title, "Ship release");
    assert_eq!(
        user_set(tasks[0].assignees.iter().map(|a| &a.user_id)),
        BTreeSet::from(["u1".to_string(), "u2".to_string()])
    );

    let by_id = h
        .app
        .reader
        .task_by_id(h.tenant, record.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id, tasks[0]);
}

#[tokio::test]
async fn unauthenticated_request_never_touches_the_store() {
    let h = Harness::new();
    let reader = h.app.reader.clone();

    let result = h
        .app
        .auth
        .with_session(Some("theme=dark"), |ctx| async move {
            reader.tasks_by_tenant(ctx.require_tenant()?).await
        })
        .await;

    assert!(matches!(result, Err(TaskTableError::Unauthorized(_))));
    assert_eq!(h.store.stats().await.total(), 0);
}

#[tokio::test]
async fn authenticated_request_flows_claims_into_coordinators() {
    let h = Harness::new();
    let cookie = format!("id_token={}", h.token_for_admin().build());
    let writer = h.writer.clone();

    let input = TaskInput {
        title: "  Ship release ".to_string(),
        description: "cut the tag".to_string(),
        status: None,
        deadline: "2026-06-30".to_string(),
        assignees: vec![AssigneeInput {
            user_id: "u1".to_string(),
            username: "u1".to_string(),
            email: "U1@Example.com".to_string(),
        }],
    };
    let record = h
        .app
        .auth
        .with_session(Some(&cookie), |ctx| async move {
            let task = validate_task(input)?;
            writer.create_task(&ctx, task).await
        })
        .await
        .unwrap();

    assert_eq!(record.tenant_id, h.tenant);
    assert_eq!(record.created_by, h.admin);
    assert_eq!(record.fields.deadline, "2026-06-30T00:00:00Z");
    let mine = h
        .app
        .reader
        .tasks_by_user(&UserId::new("u1").unwrap())
        .await
        .unwrap();
    assert_eq!(mine[0].assignees[0].email, "u1@example.com");
}

#[tokio::test]
async fn status_update_reaches_record_and_every_edge() {
    let h = Harness::new();
    let ctx = h.admin_ctx();
    let users = ["u1", "u2", "u3"].map(assignee);
    let record = h
        .writer
        .create_task(
            &ctx,
            ValidTask {
                fields: fields("Ship release"),
                assignees: users.to_vec(),
            },
        )
        .await
        .unwrap();

    let done = TaskStatus::new("completed");
    h.app
        .status
        .update_status(&ctx, record.task_id, done.clone(), "released")
        .await
        .unwrap();

    let view = h
        .app
        .reader
        .task_by_id(h.tenant, record.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.fields.status, done);
    for user in &users {
        let theirs = h.app.reader.tasks_by_user(&user.user_id).await.unwrap();
        assert_eq!(theirs[0].fields.status, done);
    }
    let history = h
        .app
        .reader
        .task_history(h.tenant, record.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "released");
}

#[tokio::test]
async fn invite_is_single_use() {
    let h = Harness::new();
    let link = h
        .app
        .invites
        .create_invite(&h.admin_ctx(), "new@example.com", Role::Member)
        .await
        .unwrap();
    let (token, tenant) = (link.token.to_string(), link.tenant_id.to_string());

    h.app
        .invites
        .redeem_invite(&token, &tenant, "newbie", "password1")
        .await
        .unwrap();
    let second = h
        .app
        .invites
        .redeem_invite(&token, &tenant, "newbie", "password1")
        .await;

    assert!(matches!(second, Err(TaskTableError::InvalidInvite)));
    assert_eq!(h.directory.user_count().await, 1);
}

#[tokio::test]
async fn invite_for_another_tenant_is_rejected_without_writes() {
    let h = Harness::new();
    let link = h
        .app
        .invites
        .create_invite(&h.admin_ctx(), "new@example.com", Role::Member)
        .await
        .unwrap();
    let writes_before = h.store.stats().await.writes();

    let other_tenant = h.ids.tenant_id();
    let err = h
        .app
        .invites
        .redeem_invite(
            &link.token.to_string(),
            &other_tenant.to_string(),
            "newbie",
            "password1",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TaskTableError::InvalidInvite));
    assert_eq!(h.store.stats().await.writes(), writes_before);
    assert_eq!(h.directory.calls().await, 0);
    assert!(h.store.contains(&ItemKey::invite(link.token, link.tenant_id)).await);
}

#[tokio::test]
async fn delete_removes_record_and_all_edges() {
    let h = Harness::new();
    let ctx = h.admin_ctx();
    let users = ["u1", "u2", "u3"].map(assignee);
    let record = h
        .writer
        .create_task(
            &ctx,
            ValidTask {
                fields: fields("Ship release"),
                assignees: users.to_vec(),
            },
        )
        .await
        .unwrap();

    let report = h.writer.delete_task(&ctx, record.task_id).await.unwrap();

    assert_eq!(report.edges_attempted, 6);
    assert!(report.is_complete());
    assert_eq!(
        h.app.reader.task_by_id(h.tenant, record.task_id).await.unwrap(),
        None
    );
    assert!(h
        .store
        .query(&KeyPrefix::task_assignees(record.task_id))
        .await
        .unwrap()
        .is_empty());
    for user in &users {
        assert!(h.app.reader.tasks_by_user(&user.user_id).await.unwrap().is_empty());
    }
    assert!(h.app.journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn interrupted_create_is_completed_by_recovery() {
    let h = Harness::new();
    let ctx = h.admin_ctx();

    h.store.fail_writes_after(1).await;
    let err = h
        .writer
        .create_task(
            &ctx,
            ValidTask {
                fields: fields("Ship release"),
                assignees: vec![assignee("u1"), assignee("u2")],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskTableError::PartialWrite { .. }));

    let tasks = h.app.reader.tasks_by_tenant(h.tenant).await.unwrap();
    assert!(tasks[0].assignees.is_empty());

    let report = h.app.journal.recover().await.unwrap();
    assert_eq!(report.replayed, 1);

    let tasks = h.app.reader.tasks_by_tenant(h.tenant).await.unwrap();
    assert_eq!(
        user_set(tasks[0].assignees.iter().map(|a| &a.user_id)),
        BTreeSet::from(["u1".to_string(), "u2".to_string()])
    );
    for user in ["u1", "u2"] {
        let inbox = h
            .app
            .directory
            .list_notifications(&UserId::new(user).unwrap())
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
    }
}

#[tokio::test]
async fn new_tenant_admin_can_act_after_token_refresh() {
    let h = Harness::new();
    let founder = UserId::new("founder").unwrap();
    h.directory.seed_user(founder.clone(), "founder@example.com").await;

    let signup = format!("id_token={}", h.token("founder", "founder@example.com").build());
    let tenants = h.app.tenants.clone();
    let member = h
        .app
        .auth
        .with_session(Some(&signup), |ctx| async move {
            tenants.register_tenant(&ctx, "Initech", "founder").await
        })
        .await
        .unwrap();

    // the provider now carries the tenant attributes; the next id token has them
    let refreshed = h
        .token("founder", "founder@example.com")
        .claim("custom:tenantId", member.tenant_id.to_string())
        .claim("custom:role", "admin")
        .build();
    let ctx = h
        .app
        .auth
        .authorize(Some(&format!("id_token={refreshed}")))
        .await
        .unwrap();
    assert_eq!(ctx.require_tenant().unwrap(), member.tenant_id);
    assert!(ctx.is_admin());

    let link = h
        .app
        .invites
        .create_invite(&ctx, "hire@example.com", Role::Member)
        .await
        .unwrap();
    assert_eq!(link.tenant_id, member.tenant_id);
}
