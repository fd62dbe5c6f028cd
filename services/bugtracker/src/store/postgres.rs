//! Postgres-backed implementation of the bug tracker store.
//!
//! # Purpose
//! Implements [`TrackerStore`] and [`TokenStore`] on top of a `sqlx::PgPool`.
//! Schema lives in `migrations/` and is applied at startup with
//! `sqlx::migrate!`.
//!
//! # Key invariants
//! - Cascades are enforced by foreign keys (`ON DELETE CASCADE` / `SET NULL`),
//!   so deletes are single statements.
//! - Choice fields are stored as their wire strings and parsed on read; an
//!   unknown value in the database surfaces as `StoreError::Unexpected`.
//! - Unique violations map to `Conflict`, foreign-key violations to `NotFound`.
//!
//! # Operational notes
//! - Pool sizing and acquire timeouts come from [`PostgresConfig`] so a slow
//!   database fails requests instead of hanging them.
//! - Database URLs may contain credentials; never log them.
//! - Expired blacklist rows are pruned whenever a token is blacklisted.
use super::{StoreError, StoreResult, TokenStore, TrackerStore};
use crate::config::PostgresConfig;
use crate::model::{
    BlacklistedToken, Bug, BugPatch, Department, DepartmentPatch, NewBug, NewDepartment,
    NewProject, NewProjectUser, NewUser, Project, ProjectPatch, ProjectUser, User, UserPatch,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, name, phone_number, role, dept, is_staff, date_joined";
const DEPARTMENT_COLUMNS: &str = "id, user_id, dept, role";
const PROJECT_COLUMNS: &str = "id, project_name, project_description, project_duration, \
     client_name, department_id, submission_date, status, user_id, updated_date";
const PROJECT_USER_COLUMNS: &str = "id, project_id, user_id, role, department_id";
const BUG_SELECT: &str = r#"
    SELECT b.id, b.bug_type, b.bug_description, b.url_bug, b.image, b.bug_priority,
           b.bug_severity, b.status, b.is_current_project, b.project_id, b.department_id,
           b.created_by AS created_by_id, creator.username AS created_by,
           b.assigned_to AS assigned_to_id, assignee.username AS assigned_to,
           b.report_date, b.updated_date
    FROM bugs b
    JOIN users creator ON creator.id = b.created_by
    LEFT JOIN users assignee ON assignee.id = b.assigned_to
"#;

/// Durable bug tracker store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use bugtracker::config::PostgresConfig;
/// use bugtracker::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    name: Option<String>,
    phone_number: Option<String>,
    role: String,
    dept: String,
    is_staff: bool,
    date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbDepartment {
    id: i64,
    user_id: i64,
    dept: String,
    role: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbProject {
    id: i64,
    project_name: String,
    project_description: String,
    project_duration: i32,
    client_name: String,
    department_id: Option<i64>,
    submission_date: NaiveDate,
    status: String,
    user_id: i64,
    updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbProjectUser {
    id: i64,
    project_id: i64,
    user_id: i64,
    role: String,
    department_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
struct DbBug {
    id: i64,
    bug_type: String,
    bug_description: String,
    url_bug: Option<String>,
    image: Option<String>,
    bug_priority: String,
    bug_severity: String,
    status: String,
    is_current_project: bool,
    project_id: i64,
    department_id: i64,
    created_by_id: i64,
    created_by: String,
    assigned_to_id: Option<i64>,
    assigned_to: Option<String>,
    report_date: DateTime<Utc>,
    updated_date: DateTime<Utc>,
}

impl PostgresStore {
    /// Connect to Postgres and apply embedded migrations.
    ///
    /// # Errors
    /// Connection, pool setup, or migration failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    /// Connect without running migrations, for tests that manage the schema.
    #[cfg(any(test, feature = "pg-tests"))]
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;

        if run_migrations {
            // Handlers assume the schema exists; fail startup otherwise.
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(Self { pool })
    }

    async fn refresh_counts(&self) -> StoreResult<()> {
        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let bugs = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bugs")
            .fetch_one(&self.pool)
            .await?;
        metrics::gauge!("bugtracker_users_total").set(users as f64);
        metrics::gauge!("bugtracker_bugs_total").set(bugs as f64);
        Ok(())
    }

    async fn fetch_bugs(&self, filter: &str, user_id: Option<i64>) -> StoreResult<Vec<Bug>> {
        let sql = format!("{BUG_SELECT} {filter} ORDER BY b.id");
        let mut query = sqlx::query_as::<_, DbBug>(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(bug_from_db).collect()
    }
}

#[async_trait]
impl TrackerStore for PostgresStore {
    // -----------------------------
    // Users
    // -----------------------------

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query_as::<_, DbUser>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(user_from_db).collect()
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user_from_db(row)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_db).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_db).transpose()
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, name, phone_number, role, dept, is_staff)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.phone_number)
            .bind(user.role.as_str())
            .bind(user.dept.as_str())
            .bind(user.is_staff)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| write_error(err, "username or email exists"))?;
        let created = user_from_db(row)?;
        let _ = self.refresh_counts().await;
        Ok(created)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                name = COALESCE($5, name),
                phone_number = COALESCE($6, phone_number),
                role = COALESCE($7, role),
                dept = COALESCE($8, dept),
                is_staff = COALESCE($9, is_staff)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .bind(&patch.username)
            .bind(&patch.email)
            .bind(&patch.password_hash)
            .bind(&patch.name)
            .bind(&patch.phone_number)
            .bind(patch.role.map(|role| role.as_str()))
            .bind(patch.dept.map(|dept| dept.as_str()))
            .bind(patch.is_staff)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| write_error(err, "username or email exists"))?
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user_from_db(row)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".into()));
        }
        let _ = self.refresh_counts().await;
        Ok(())
    }

    // -----------------------------
    // Departments
    // -----------------------------

    async fn list_departments(&self) -> StoreResult<Vec<Department>> {
        let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY id");
        let rows = sqlx::query_as::<_, DbDepartment>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(department_from_db).collect()
    }

    async fn get_department(&self, id: i64) -> StoreResult<Department> {
        let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = $1");
        let row = sqlx::query_as::<_, DbDepartment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("department".into()))?;
        department_from_db(row)
    }

    async fn first_department_for_user(&self, user_id: i64) -> StoreResult<Option<Department>> {
        let sql = format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE user_id = $1 ORDER BY id LIMIT 1"
        );
        let row = sqlx::query_as::<_, DbDepartment>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(department_from_db).transpose()
    }

    async fn create_department(&self, department: NewDepartment) -> StoreResult<Department> {
        let sql = format!(
            "INSERT INTO departments (user_id, dept, role) VALUES ($1, $2, $3)
             RETURNING {DEPARTMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbDepartment>(&sql)
            .bind(department.user)
            .bind(department.dept.as_str())
            .bind(department.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| write_error(err, "department exists"))?;
        department_from_db(row)
    }

    async fn update_department(
        &self,
        id: i64,
        patch: DepartmentPatch,
    ) -> StoreResult<Department> {
        let sql = format!(
            "UPDATE departments SET
                user_id = COALESCE($2, user_id),
                dept = COALESCE($3, dept),
                role = COALESCE($4, role)
             WHERE id = $1
             RETURNING {DEPARTMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbDepartment>(&sql)
            .bind(id)
            .bind(patch.user)
            .bind(patch.dept.map(|dept| dept.as_str()))
            .bind(patch.role.map(|role| role.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| write_error(err, "department exists"))?
            .ok_or_else(|| StoreError::NotFound("department".into()))?;
        department_from_db(row)
    }

    async fn delete_department(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("department".into()));
        }
        Ok(())
    }

    // -----------------------------
    // Projects
    // -----------------------------

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id");
        let rows = sqlx::query_as::<_, DbProject>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(project_from_db).collect()
    }

    async fn list_projects_for_user(&self, user_id: i64) -> StoreResult<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p
             WHERE p.user_id = $1
                OR EXISTS (
                    SELECT 1 FROM project_users pu
                    WHERE pu.project_id = p.id AND pu.user_id = $1
                )
             ORDER BY p.id"
        );
        let rows = sqlx::query_as::<_, DbProject>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(project_from_db).collect()
    }

    async fn get_project(&self, id: i64) -> StoreResult<Project> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        let row = sqlx::query_as::<_, DbProject>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("project".into()))?;
        project_from_db(row)
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let sql = format!(
            "INSERT INTO projects
                (project_name, project_description, project_duration, client_name,
                 department_id, submission_date, status, user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PROJECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbProject>(&sql)
            .bind(&project.project_name)
            .bind(&project.project_description)
            .bind(project.project_duration)
            .bind(&project.client_name)
            .bind(project.department)
            .bind(project.submission_date)
            .bind(project.status.as_str())
            .bind(project.user)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| write_error(err, "project exists"))?;
        project_from_db(row)
    }

    async fn update_project(&self, id: i64, patch: ProjectPatch) -> StoreResult<Project> {
        let sql = format!(
            "UPDATE projects SET
                project_name = COALESCE($2, project_name),
                project_description = COALESCE($3, project_description),
                project_duration = COALESCE($4, project_duration),
                client_name = COALESCE($5, client_name),
                submission_date = COALESCE($6, submission_date),
                status = COALESCE($7, status),
                updated_date = NOW()
             WHERE id = $1
             RETURNING {PROJECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbProject>(&sql)
            .bind(id)
            .bind(&patch.project_name)
            .bind(&patch.project_description)
            .bind(patch.project_duration)
            .bind(&patch.client_name)
            .bind(patch.submission_date)
            .bind(patch.status.map(|status| status.as_str()))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("project".into()))?;
        project_from_db(row)
    }

    async fn delete_project(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("project".into()));
        }
        let _ = self.refresh_counts().await;
        Ok(())
    }

    // -----------------------------
    // Project assignments
    // -----------------------------

    async fn create_project_user(&self, assignment: NewProjectUser) -> StoreResult<ProjectUser> {
        let sql = format!(
            "INSERT INTO project_users (project_id, user_id, role, department_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {PROJECT_USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbProjectUser>(&sql)
            .bind(assignment.project)
            .bind(assignment.user)
            .bind(assignment.role.as_str())
            .bind(assignment.department)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| write_error(err, "user already assigned to project"))?;
        project_user_from_db(row)
    }

    async fn list_project_users(&self, project_id: i64) -> StoreResult<Vec<ProjectUser>> {
        let sql = format!(
            "SELECT {PROJECT_USER_COLUMNS} FROM project_users WHERE project_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, DbProjectUser>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(project_user_from_db).collect()
    }

    async fn is_project_member(&self, project_id: i64, user_id: i64) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM project_users WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    // -----------------------------
    // Bugs
    // -----------------------------

    async fn list_bugs(&self) -> StoreResult<Vec<Bug>> {
        self.fetch_bugs("", None).await
    }

    async fn list_bugs_for_user(&self, user_id: i64) -> StoreResult<Vec<Bug>> {
        self.fetch_bugs("WHERE b.created_by = $1 OR b.assigned_to = $1", Some(user_id))
            .await
    }

    async fn get_bug(&self, id: i64) -> StoreResult<Bug> {
        let sql = format!("{BUG_SELECT} WHERE b.id = $1");
        let row = sqlx::query_as::<_, DbBug>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("bug".into()))?;
        bug_from_db(row)
    }

    async fn create_bug(&self, bug: NewBug) -> StoreResult<Bug> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO bugs
                (bug_type, bug_description, url_bug, image, bug_priority, bug_severity, status,
                 is_current_project, project_id, department_id, created_by, assigned_to)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING id"#,
        )
        .bind(bug.bug_type.as_str())
        .bind(&bug.bug_description)
        .bind(&bug.url_bug)
        .bind(&bug.image)
        .bind(bug.bug_priority.as_str())
        .bind(bug.bug_severity.as_str())
        .bind(bug.status.as_str())
        .bind(bug.is_current_project)
        .bind(bug.project)
        .bind(bug.department)
        .bind(bug.created_by)
        .bind(bug.assigned_to)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| write_error(err, "bug exists"))?;
        let _ = self.refresh_counts().await;
        self.get_bug(id).await
    }

    async fn update_bug(&self, id: i64, patch: BugPatch) -> StoreResult<Bug> {
        // Nullable columns take a (set, value) pair so `Some(None)` can clear them.
        let result = sqlx::query(
            r#"UPDATE bugs SET
                bug_type = COALESCE($2, bug_type),
                bug_description = COALESCE($3, bug_description),
                url_bug = CASE WHEN $4 THEN $5 ELSE url_bug END,
                image = CASE WHEN $6 THEN $7 ELSE image END,
                bug_priority = COALESCE($8, bug_priority),
                bug_severity = COALESCE($9, bug_severity),
                status = COALESCE($10, status),
                is_current_project = COALESCE($11, is_current_project),
                project_id = COALESCE($12, project_id),
                department_id = COALESCE($13, department_id),
                assigned_to = CASE WHEN $14 THEN $15 ELSE assigned_to END,
                updated_date = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(patch.bug_type.map(|value| value.as_str()))
        .bind(&patch.bug_description)
        .bind(patch.url_bug.is_some())
        .bind(patch.url_bug.clone().flatten())
        .bind(patch.image.is_some())
        .bind(patch.image.clone().flatten())
        .bind(patch.bug_priority.map(|value| value.as_str()))
        .bind(patch.bug_severity.map(|value| value.as_str()))
        .bind(patch.status.map(|value| value.as_str()))
        .bind(patch.is_current_project)
        .bind(patch.project)
        .bind(patch.department)
        .bind(patch.assigned_to.is_some())
        .bind(patch.assigned_to.flatten())
        .execute(&self.pool)
        .await
        .map_err(|err| write_error(err, "bug exists"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("bug".into()));
        }
        self.get_bug(id).await
    }

    async fn delete_bug(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM bugs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("bug".into()));
        }
        let _ = self.refresh_counts().await;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl TokenStore for PostgresStore {
    async fn blacklist_token(&self, token: BlacklistedToken) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO blacklisted_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3)"#,
        )
        .bind(&token.jti)
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error(err, "token already blacklisted"))?;
        // Expired tokens fail verification before the blacklist is consulted.
        if let Err(err) = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
        {
            tracing::warn!(error = %err, "failed to prune expired blacklist entries");
        }
        Ok(())
    }

    async fn is_token_blacklisted(&self, jti: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM blacklisted_tokens WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    db_error_code(err).as_deref() == Some("23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    db_error_code(err).as_deref() == Some("23503")
}

fn db_error_code(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code.into_owned());
    }
    None
}

fn write_error(err: sqlx::Error, conflict: &str) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(conflict.to_string());
    }
    if is_foreign_key_violation(&err) {
        return StoreError::NotFound("referenced row".into());
    }
    StoreError::from(err)
}

fn parse_choice<T>(value: &str) -> StoreResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|err: String| StoreError::Unexpected(anyhow!("invalid stored value: {err}")))
}

fn user_from_db(row: DbUser) -> StoreResult<User> {
    Ok(User {
        id: row.id,
        username: row.username,
        email: row.email,
        password_hash: row.password_hash,
        name: row.name,
        phone_number: row.phone_number,
        role: parse_choice(&row.role)?,
        dept: parse_choice(&row.dept)?,
        is_staff: row.is_staff,
        date_joined: row.date_joined,
    })
}

fn department_from_db(row: DbDepartment) -> StoreResult<Department> {
    Ok(Department {
        id: row.id,
        user: row.user_id,
        dept: parse_choice(&row.dept)?,
        role: parse_choice(&row.role)?,
    })
}

fn project_from_db(row: DbProject) -> StoreResult<Project> {
    Ok(Project {
        id: row.id,
        project_name: row.project_name,
        project_description: row.project_description,
        project_duration: row.project_duration,
        client_name: row.client_name,
        department: row.department_id,
        submission_date: row.submission_date,
        status: parse_choice(&row.status)?,
        user: row.user_id,
        updated_date: row.updated_date,
    })
}

fn project_user_from_db(row: DbProjectUser) -> StoreResult<ProjectUser> {
    Ok(ProjectUser {
        id: row.id,
        project: row.project_id,
        user: row.user_id,
        role: parse_choice(&row.role)?,
        department: row.department_id,
    })
}

fn bug_from_db(row: DbBug) -> StoreResult<Bug> {
    Ok(Bug {
        id: row.id,
        bug_type: parse_choice(&row.bug_type)?,
        bug_description: row.bug_description,
        url_bug: row.url_bug,
        image: row.image,
        bug_priority: parse_choice(&row.bug_priority)?,
        bug_severity: parse_choice(&row.bug_severity)?,
        status: parse_choice(&row.status)?,
        is_current_project: row.is_current_project,
        project: row.project_id,
        department: row.department_id,
        created_by_id: row.created_by_id,
        created_by: row.created_by,
        assigned_to_id: row.assigned_to_id,
        assigned_to: row.assigned_to,
        report_date: row.report_date,
        updated_date: row.updated_date,
    })
}
