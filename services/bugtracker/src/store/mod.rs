//! Storage traits and shared error types for the bug tracker.
//!
//! # Purpose
//! Handlers talk to storage only through [`TrackerStore`] (resources) and
//! [`TokenStore`] (refresh-token blacklist). Two backends implement both: an
//! in-memory store for development and tests, and a Postgres store.
//!
//! # Key invariants
//! - Ids are assigned by the backend and never reused within one store.
//! - Deletes cascade the same way on every backend (see `migrations/`).
//! - Unique constraints (username, email, project assignment, token id)
//!   surface as [`StoreError::Conflict`].
use crate::model::{
    BlacklistedToken, Bug, BugPatch, Department, DepartmentPatch, NewBug, NewDepartment,
    NewProject, NewProjectUser, NewUser, Project, ProjectPatch, ProjectUser, User, UserPatch,
};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".into()),
            other => StoreError::Unexpected(other.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TrackerStore: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user(&self, id: i64) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<User>;
    /// Removes the user with their department rows, owned projects,
    /// assignments, and created bugs; clears their bug assignments.
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    async fn list_departments(&self) -> StoreResult<Vec<Department>>;
    async fn get_department(&self, id: i64) -> StoreResult<Department>;
    /// Lowest-id department row of a user, if any.
    async fn first_department_for_user(&self, user_id: i64) -> StoreResult<Option<Department>>;
    async fn create_department(&self, department: NewDepartment) -> StoreResult<Department>;
    async fn update_department(&self, id: i64, patch: DepartmentPatch)
    -> StoreResult<Department>;
    async fn delete_department(&self, id: i64) -> StoreResult<()>;

    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
    /// Projects the user owns or is assigned to.
    async fn list_projects_for_user(&self, user_id: i64) -> StoreResult<Vec<Project>>;
    async fn get_project(&self, id: i64) -> StoreResult<Project>;
    async fn create_project(&self, project: NewProject) -> StoreResult<Project>;
    async fn update_project(&self, id: i64, patch: ProjectPatch) -> StoreResult<Project>;
    async fn delete_project(&self, id: i64) -> StoreResult<()>;

    async fn create_project_user(&self, assignment: NewProjectUser) -> StoreResult<ProjectUser>;
    async fn list_project_users(&self, project_id: i64) -> StoreResult<Vec<ProjectUser>>;
    async fn is_project_member(&self, project_id: i64, user_id: i64) -> StoreResult<bool>;

    async fn list_bugs(&self) -> StoreResult<Vec<Bug>>;
    /// Bugs the user created or is assigned to.
    async fn list_bugs_for_user(&self, user_id: i64) -> StoreResult<Vec<Bug>>;
    async fn get_bug(&self, id: i64) -> StoreResult<Bug>;
    async fn create_bug(&self, bug: NewBug) -> StoreResult<Bug>;
    async fn update_bug(&self, id: i64, patch: BugPatch) -> StoreResult<Bug>;
    async fn delete_bug(&self, id: i64) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Records a revoked refresh token. Fails with `Conflict` when the token
    /// id is already blacklisted.
    async fn blacklist_token(&self, token: BlacklistedToken) -> StoreResult<()>;
    async fn is_token_blacklisted(&self, jti: &str) -> StoreResult<bool>;
}

pub trait BugTrackerStore: TrackerStore + TokenStore {}

impl<T> BugTrackerStore for T where T: TrackerStore + TokenStore {}
