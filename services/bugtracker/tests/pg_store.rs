#![cfg(feature = "pg-tests")]

use bugtracker::config::PostgresConfig;
use bugtracker::model::{
    BlacklistedToken, BugPatch, BugPriority, BugSeverity, BugStatus, BugType, Dept,
    NewBug, NewDepartment, NewProject, NewProjectUser, NewUser, ProjectStatus, Role, UserPatch,
};
use bugtracker::store::postgres::PostgresStore;
use bugtracker::store::{StoreError, TokenStore, TrackerStore};
use chrono::{Duration, NaiveDate, Utc};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

static PG_STORE: tokio::sync::OnceCell<Arc<PostgresStore>> = tokio::sync::OnceCell::const_new();

async fn reset_postgres(url: &str) -> Result<(), sqlx::Error> {
    let pool = match tokio::time::timeout(
        std::time::Duration::from_secs(2),
        PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(2))
            .connect(url),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => return Err(sqlx::Error::PoolTimedOut),
    };
    // The schema may not exist yet on a fresh database.
    let _ = sqlx::query(
        "TRUNCATE blacklisted_tokens, bugs, project_users, projects, departments, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await;
    Ok(())
}

async fn pg_store() -> Option<Arc<PostgresStore>> {
    let url = match std::env::var("BUGTRACKER_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping pg-tests: set BUGTRACKER_TEST_DATABASE_URL or DATABASE_URL");
            return None;
        }
    };
    if let Err(err) = reset_postgres(&url).await {
        eprintln!("skipping pg-tests: cannot connect to postgres: {err}");
        return None;
    }
    let config = PostgresConfig {
        url,
        max_connections: 5,
        connect_timeout_ms: 5_000,
        acquire_timeout_ms: 5_000,
    };
    match PG_STORE
        .get_or_try_init(|| async { PostgresStore::connect(&config).await.map(Arc::new) })
        .await
    {
        Ok(store) => Some(Arc::clone(store)),
        Err(err) => {
            eprintln!("skipping pg-tests: connect postgres store failed: {err}");
            None
        }
    }
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: "hash".to_string(),
        name: None,
        phone_number: None,
        role: Role::Developer,
        dept: Dept::Python,
        is_staff: false,
    }
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

fn new_project(owner: i64, department: Option<i64>) -> NewProject {
    NewProject {
        project_name: "Portal".to_string(),
        project_description: String::new(),
        project_duration: 30,
        client_name: "Acme".to_string(),
        department,
        submission_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
        status: ProjectStatus::Open,
        user: owner,
    }
}

fn new_bug(project: i64, department: i64, created_by: i64, assigned_to: Option<i64>) -> NewBug {
    NewBug {
        bug_type: BugType::Bug,
        bug_description: "crash on save".to_string(),
        url_bug: None,
        image: None,
        bug_priority: BugPriority::Medium,
        bug_severity: BugSeverity::Normal,
        status: BugStatus::Open,
        is_current_project: true,
        project,
        department,
        created_by,
        assigned_to,
    }
}

#[tokio::test]
#[serial]
async fn users_are_unique_and_updatable() {
    let Some(store) = pg_store().await else {
        return;
    };
    let name = unique("alice");
    let user = store.create_user(new_user(&name)).await.expect("create user");
    assert!(store.is_durable());
    assert_eq!(store.backend_name(), "postgres");

    let dup = store.create_user(new_user(&name)).await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));

    let found = store
        .find_user_by_email(&format!("{name}@example.com"))
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(found.id, user.id);

    let updated = store
        .update_user(
            user.id,
            UserPatch {
                role: Some(Role::Tester),
                name: Some("Alice".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.role, Role::Tester);
    assert_eq!(updated.name.as_deref(), Some("Alice"));

    let missing = store.get_user(i64::MAX).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[serial]
async fn bugs_resolve_usernames_and_cascade() {
    let Some(store) = pg_store().await else {
        return;
    };
    let owner = store.create_user(new_user(&unique("owner"))).await.expect("owner");
    let dev = store.create_user(new_user(&unique("dev"))).await.expect("dev");
    let department = store
        .create_department(NewDepartment {
            user: owner.id,
            dept: Dept::Python,
            role: Role::Developer,
        })
        .await
        .expect("department");
    let project = store
        .create_project(new_project(owner.id, Some(department.id)))
        .await
        .expect("project");
    store
        .create_project_user(NewProjectUser {
            project: project.id,
            user: dev.id,
            role: Role::Developer,
            department: Some(department.id),
        })
        .await
        .expect("assignment");
    let dup = store
        .create_project_user(NewProjectUser {
            project: project.id,
            user: dev.id,
            role: Role::Developer,
            department: None,
        })
        .await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));
    assert!(store.is_project_member(project.id, dev.id).await.expect("member"));

    let bug = store
        .create_bug(new_bug(project.id, department.id, owner.id, Some(dev.id)))
        .await
        .expect("bug");
    assert_eq!(bug.created_by, owner.username);
    assert_eq!(bug.assigned_to.as_deref(), Some(dev.username.as_str()));

    let visible = store.list_bugs_for_user(dev.id).await.expect("dev bugs");
    assert_eq!(visible.len(), 1);

    let closed = store
        .update_bug(bug.id, BugPatch::status(BugStatus::Closed))
        .await
        .expect("status");
    assert_eq!(closed.status, BugStatus::Closed);
    assert_eq!(closed.bug_description, "crash on save");

    store.delete_user(dev.id).await.expect("delete dev");
    let bug = store.get_bug(bug.id).await.expect("bug survives");
    assert_eq!(bug.assigned_to, None);
    assert!(store
        .list_project_users(project.id)
        .await
        .expect("members")
        .is_empty());

    store.delete_project(project.id).await.expect("delete project");
    assert!(matches!(
        store.get_bug(bug.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
#[serial]
async fn blacklist_is_unique() {
    let Some(store) = pg_store().await else {
        return;
    };
    let user = store.create_user(new_user(&unique("token"))).await.expect("user");
    let jti = uuid::Uuid::new_v4().to_string();
    let entry = BlacklistedToken {
        jti: jti.clone(),
        user_id: user.id,
        expires_at: Utc::now() + Duration::days(1),
    };
    store.blacklist_token(entry.clone()).await.expect("blacklist");
    assert!(store.is_token_blacklisted(&jti).await.expect("check"));
    assert!(matches!(
        store.blacklist_token(entry).await,
        Err(StoreError::Conflict(_))
    ));
    assert!(!store.is_token_blacklisted("unknown").await.expect("check"));
}

#[tokio::test]
#[serial]
async fn blacklisting_prunes_expired_entries() {
    let Some(store) = pg_store().await else {
        return;
    };
    let user = store.create_user(new_user(&unique("prune"))).await.expect("user");
    let stale = uuid::Uuid::new_v4().to_string();
    store
        .blacklist_token(BlacklistedToken {
            jti: stale.clone(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::minutes(5),
        })
        .await
        .expect("blacklist stale");
    let live = uuid::Uuid::new_v4().to_string();
    store
        .blacklist_token(BlacklistedToken {
            jti: live.clone(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .expect("blacklist live");

    assert!(!store.is_token_blacklisted(&stale).await.expect("check stale"));
    assert!(store.is_token_blacklisted(&live).await.expect("check live"));
}
