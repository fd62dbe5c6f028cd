//! In-memory implementation of the bug tracker store.
//!
//! # Purpose
//! Implements [`TrackerStore`] and [`TokenStore`] with ordered maps guarded by
//! `tokio::sync::RwLock`. Used for local development, tests, and deployments
//! that do not need durability.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - Each table has its own lock. Operations that touch several tables take
//!   the locks in a fixed order (users, departments, projects, project users,
//!   bugs, blacklist) so concurrent cascades cannot deadlock.
//!
//! # Cascading deletes
//! Cascades mirror the foreign-key rules of the Postgres schema. They scan
//! dependent tables, which is fine for development-sized data.
use super::{StoreError, StoreResult, TokenStore, TrackerStore};
use crate::model::{
    BlacklistedToken, Bug, BugPatch, BugPriority, BugSeverity, BugStatus, BugType, Department,
    DepartmentPatch, NewBug, NewDepartment, NewProject, NewProjectUser, NewUser, Project,
    ProjectPatch, ProjectUser, User, UserPatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Rows keyed by id, with a monotonically increasing id allocator.
#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }

    fn insert(&mut self, build: impl FnOnce(i64) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    fn get(&self, id: i64, entity: &str) -> StoreResult<&T> {
        self.rows
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(entity.to_string()))
    }

    fn get_mut(&mut self, id: i64, entity: &str) -> StoreResult<&mut T> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(entity.to_string()))
    }
}

/// Bug row as stored; usernames are resolved against the users table on read.
#[derive(Debug, Clone)]
struct BugRecord {
    id: i64,
    bug_type: BugType,
    bug_description: String,
    url_bug: Option<String>,
    image: Option<String>,
    bug_priority: BugPriority,
    bug_severity: BugSeverity,
    status: BugStatus,
    is_current_project: bool,
    project: i64,
    department: i64,
    created_by: i64,
    assigned_to: Option<i64>,
    report_date: DateTime<Utc>,
    updated_date: DateTime<Utc>,
}

impl BugRecord {
    fn resolve(&self, users: &Table<User>) -> Bug {
        let username = |id: i64| {
            users
                .rows
                .get(&id)
                .map(|user| user.username.clone())
                .unwrap_or_default()
        };
        Bug {
            id: self.id,
            bug_type: self.bug_type,
            bug_description: self.bug_description.clone(),
            url_bug: self.url_bug.clone(),
            image: self.image.clone(),
            bug_priority: self.bug_priority,
            bug_severity: self.bug_severity,
            status: self.status,
            is_current_project: self.is_current_project,
            project: self.project,
            department: self.department,
            created_by_id: self.created_by,
            created_by: username(self.created_by),
            assigned_to_id: self.assigned_to,
            assigned_to: self.assigned_to.map(username),
            report_date: self.report_date,
            updated_date: self.updated_date,
        }
    }
}

pub struct InMemoryStore {
    users: RwLock<Table<User>>,
    departments: RwLock<Table<Department>>,
    projects: RwLock<Table<Project>>,
    project_users: RwLock<Table<ProjectUser>>,
    bugs: RwLock<Table<BugRecord>>,
    /// Revoked refresh tokens keyed by `jti`.
    blacklist: RwLock<HashMap<String, BlacklistedToken>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Table::new()),
            departments: RwLock::new(Table::new()),
            projects: RwLock::new(Table::new()),
            project_users: RwLock::new(Table::new()),
            bugs: RwLock::new(Table::new()),
            blacklist: RwLock::new(HashMap::new()),
        }
    }
}

fn ensure_unique_identity(
    users: &Table<User>,
    skip_id: Option<i64>,
    username: Option<&str>,
    email: Option<&str>,
) -> StoreResult<()> {
    for user in users.rows.values() {
        if Some(user.id) == skip_id {
            continue;
        }
        if username == Some(user.username.as_str()) {
            return Err(StoreError::Conflict("username exists".into()));
        }
        if email == Some(user.email.as_str()) {
            return Err(StoreError::Conflict("email exists".into()));
        }
    }
    Ok(())
}

/// Removes department rows and everything that depends on them.
fn cascade_departments(
    removed: &BTreeSet<i64>,
    projects: &mut Table<Project>,
    project_users: &mut Table<ProjectUser>,
    bugs: &mut Table<BugRecord>,
) {
    if removed.is_empty() {
        return;
    }
    for project in projects.rows.values_mut() {
        if project.department.is_some_and(|id| removed.contains(&id)) {
            project.department = None;
        }
    }
    for assignment in project_users.rows.values_mut() {
        if assignment.department.is_some_and(|id| removed.contains(&id)) {
            assignment.department = None;
        }
    }
    bugs.rows.retain(|_, bug| !removed.contains(&bug.department));
}

/// Removes projects and their assignments and bugs.
fn cascade_projects(
    removed: &BTreeSet<i64>,
    project_users: &mut Table<ProjectUser>,
    bugs: &mut Table<BugRecord>,
) {
    if removed.is_empty() {
        return;
    }
    project_users
        .rows
        .retain(|_, assignment| !removed.contains(&assignment.project));
    bugs.rows.retain(|_, bug| !removed.contains(&bug.project));
}

fn record_bug_gauge(bugs: &Table<BugRecord>) {
    metrics::gauge!("bugtracker_bugs_total").set(bugs.rows.len() as f64);
}

#[async_trait]
impl TrackerStore for InMemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().await.rows.values().cloned().collect())
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        self.users.read().await.get(id, "user").cloned()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.rows.values().find(|user| user.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .rows
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        ensure_unique_identity(&users, None, Some(&user.username), Some(&user.email))?;
        let created = users.insert(|id| User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            phone_number: user.phone_number,
            role: user.role,
            dept: user.dept,
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        });
        metrics::gauge!("bugtracker_users_total").set(users.rows.len() as f64);
        Ok(created)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<User> {
        let mut users = self.users.write().await;
        users.get(id, "user")?;
        ensure_unique_identity(
            &users,
            Some(id),
            patch.username.as_deref(),
            patch.email.as_deref(),
        )?;
        let user = users.get_mut(id, "user")?;
        patch.apply(user);
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let mut departments = self.departments.write().await;
        let mut projects = self.projects.write().await;
        let mut project_users = self.project_users.write().await;
        let mut bugs = self.bugs.write().await;

        if users.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("user".into()));
        }

        let removed_departments: BTreeSet<i64> = departments
            .rows
            .values()
            .filter(|department| department.user == id)
            .map(|department| department.id)
            .collect();
        departments
            .rows
            .retain(|key, _| !removed_departments.contains(key));

        let removed_projects: BTreeSet<i64> = projects
            .rows
            .values()
            .filter(|project| project.user == id)
            .map(|project| project.id)
            .collect();
        projects.rows.retain(|key, _| !removed_projects.contains(key));

        project_users
            .rows
            .retain(|_, assignment| assignment.user != id);
        bugs.rows.retain(|_, bug| bug.created_by != id);
        for bug in bugs.rows.values_mut() {
            if bug.assigned_to == Some(id) {
                bug.assigned_to = None;
            }
        }

        cascade_projects(&removed_projects, &mut project_users, &mut bugs);
        cascade_departments(
            &removed_departments,
            &mut projects,
            &mut project_users,
            &mut bugs,
        );
        metrics::gauge!("bugtracker_users_total").set(users.rows.len() as f64);
        record_bug_gauge(&bugs);
        Ok(())
    }

    async fn list_departments(&self) -> StoreResult<Vec<Department>> {
        Ok(self.departments.read().await.rows.values().cloned().collect())
    }

    async fn get_department(&self, id: i64) -> StoreResult<Department> {
        self.departments.read().await.get(id, "department").cloned()
    }

    async fn first_department_for_user(&self, user_id: i64) -> StoreResult<Option<Department>> {
        let departments = self.departments.read().await;
        Ok(departments
            .rows
            .values()
            .find(|department| department.user == user_id)
            .cloned())
    }

    async fn create_department(&self, department: NewDepartment) -> StoreResult<Department> {
        let users = self.users.read().await;
        let mut departments = self.departments.write().await;
        users.get(department.user, "user")?;
        Ok(departments.insert(|id| Department {
            id,
            user: department.user,
            dept: department.dept,
            role: department.role,
        }))
    }

    async fn update_department(
        &self,
        id: i64,
        patch: DepartmentPatch,
    ) -> StoreResult<Department> {
        let users = self.users.read().await;
        let mut departments = self.departments.write().await;
        if let Some(user_id) = patch.user {
            users.get(user_id, "user")?;
        }
        let department = departments.get_mut(id, "department")?;
        patch.apply(department);
        Ok(department.clone())
    }

    async fn delete_department(&self, id: i64) -> StoreResult<()> {
        let mut departments = self.departments.write().await;
        let mut projects = self.projects.write().await;
        let mut project_users = self.project_users.write().await;
        let mut bugs = self.bugs.write().await;
        if departments.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("department".into()));
        }
        let removed = BTreeSet::from([id]);
        cascade_departments(&removed, &mut projects, &mut project_users, &mut bugs);
        record_bug_gauge(&bugs);
        Ok(())
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        Ok(self.projects.read().await.rows.values().cloned().collect())
    }

    async fn list_projects_for_user(&self, user_id: i64) -> StoreResult<Vec<Project>> {
        let projects = self.projects.read().await;
        let project_users = self.project_users.read().await;
        let assigned: BTreeSet<i64> = project_users
            .rows
            .values()
            .filter(|assignment| assignment.user == user_id)
            .map(|assignment| assignment.project)
            .collect();
        Ok(projects
            .rows
            .values()
            .filter(|project| project.user == user_id || assigned.contains(&project.id))
            .cloned()
            .collect())
    }

    async fn get_project(&self, id: i64) -> StoreResult<Project> {
        self.projects.read().await.get(id, "project").cloned()
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let users = self.users.read().await;
        let departments = self.departments.read().await;
        let mut projects = self.projects.write().await;
        users.get(project.user, "user")?;
        if let Some(department) = project.department {
            departments.get(department, "department")?;
        }
        Ok(projects.insert(|id| Project {
            id,
            project_name: project.project_name,
            project_description: project.project_description,
            project_duration: project.project_duration,
            client_name: project.client_name,
            department: project.department,
            submission_date: project.submission_date,
            status: project.status,
            user: project.user,
            updated_date: Utc::now(),
        }))
    }

    async fn update_project(&self, id: i64, patch: ProjectPatch) -> StoreResult<Project> {
        let mut projects = self.projects.write().await;
        let project = projects.get_mut(id, "project")?;
        patch.apply(project);
        project.updated_date = Utc::now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: i64) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        let mut project_users = self.project_users.write().await;
        let mut bugs = self.bugs.write().await;
        if projects.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("project".into()));
        }
        cascade_projects(&BTreeSet::from([id]), &mut project_users, &mut bugs);
        record_bug_gauge(&bugs);
        Ok(())
    }

    async fn create_project_user(&self, assignment: NewProjectUser) -> StoreResult<ProjectUser> {
        let users = self.users.read().await;
        let departments = self.departments.read().await;
        let projects = self.projects.read().await;
        let mut project_users = self.project_users.write().await;
        users.get(assignment.user, "user")?;
        projects.get(assignment.project, "project")?;
        if let Some(department) = assignment.department {
            departments.get(department, "department")?;
        }
        let duplicate = project_users.rows.values().any(|existing| {
            existing.project == assignment.project && existing.user == assignment.user
        });
        if duplicate {
            return Err(StoreError::Conflict("user already assigned to project".into()));
        }
        Ok(project_users.insert(|id| ProjectUser {
            id,
            project: assignment.project,
            user: assignment.user,
            role: assignment.role,
            department: assignment.department,
        }))
    }

    async fn list_project_users(&self, project_id: i64) -> StoreResult<Vec<ProjectUser>> {
        let project_users = self.project_users.read().await;
        Ok(project_users
            .rows
            .values()
            .filter(|assignment| assignment.project == project_id)
            .cloned()
            .collect())
    }

    async fn is_project_member(&self, project_id: i64, user_id: i64) -> StoreResult<bool> {
        let project_users = self.project_users.read().await;
        Ok(project_users
            .rows
            .values()
            .any(|assignment| assignment.project == project_id && assignment.user == user_id))
    }

    async fn list_bugs(&self) -> StoreResult<Vec<Bug>> {
        let users = self.users.read().await;
        let bugs = self.bugs.read().await;
        Ok(bugs.rows.values().map(|bug| bug.resolve(&users)).collect())
    }

    async fn list_bugs_for_user(&self, user_id: i64) -> StoreResult<Vec<Bug>> {
        let users = self.users.read().await;
        let bugs = self.bugs.read().await;
        Ok(bugs
            .rows
            .values()
            .filter(|bug| bug.created_by == user_id || bug.assigned_to == Some(user_id))
            .map(|bug| bug.resolve(&users))
            .collect())
    }

    async fn get_bug(&self, id: i64) -> StoreResult<Bug> {
        let users = self.users.read().await;
        let bugs = self.bugs.read().await;
        Ok(bugs.get(id, "bug")?.resolve(&users))
    }

    async fn create_bug(&self, bug: NewBug) -> StoreResult<Bug> {
        let users = self.users.read().await;
        let departments = self.departments.read().await;
        let projects = self.projects.read().await;
        let mut bugs = self.bugs.write().await;
        users.get(bug.created_by, "user")?;
        if let Some(assignee) = bug.assigned_to {
            users.get(assignee, "user")?;
        }
        departments.get(bug.department, "department")?;
        projects.get(bug.project, "project")?;
        let now = Utc::now();
        let record = bugs.insert(|id| BugRecord {
            id,
            bug_type: bug.bug_type,
            bug_description: bug.bug_description,
            url_bug: bug.url_bug,
            image: bug.image,
            bug_priority: bug.bug_priority,
            bug_severity: bug.bug_severity,
            status: bug.status,
            is_current_project: bug.is_current_project,
            project: bug.project,
            department: bug.department,
            created_by: bug.created_by,
            assigned_to: bug.assigned_to,
            report_date: now,
            updated_date: now,
        });
        record_bug_gauge(&bugs);
        Ok(record.resolve(&users))
    }

    async fn update_bug(&self, id: i64, patch: BugPatch) -> StoreResult<Bug> {
        let users = self.users.read().await;
        let departments = self.departments.read().await;
        let projects = self.projects.read().await;
        let mut bugs = self.bugs.write().await;
        if let Some(Some(assignee)) = patch.assigned_to {
            users.get(assignee, "user")?;
        }
        if let Some(department) = patch.department {
            departments.get(department, "department")?;
        }
        if let Some(project) = patch.project {
            projects.get(project, "project")?;
        }
        let bug = bugs.get_mut(id, "bug")?;
        if let Some(value) = patch.bug_type {
            bug.bug_type = value;
        }
        if let Some(value) = patch.bug_description {
            bug.bug_description = value;
        }
        if let Some(value) = patch.url_bug {
            bug.url_bug = value;
        }
        if let Some(value) = patch.image {
            bug.image = value;
        }
        if let Some(value) = patch.bug_priority {
            bug.bug_priority = value;
        }
        if let Some(value) = patch.bug_severity {
            bug.bug_severity = value;
        }
        if let Some(value) = patch.status {
            bug.status = value;
        }
        if let Some(value) = patch.is_current_project {
            bug.is_current_project = value;
        }
        if let Some(value) = patch.project {
            bug.project = value;
        }
        if let Some(value) = patch.department {
            bug.department = value;
        }
        if let Some(value) = patch.assigned_to {
            bug.assigned_to = value;
        }
        bug.updated_date = Utc::now();
        Ok(bug.resolve(&users))
    }

    async fn delete_bug(&self, id: i64) -> StoreResult<()> {
        let mut bugs = self.bugs.write().await;
        if bugs.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("bug".into()));
        }
        record_bug_gauge(&bugs);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn blacklist_token(&self, token: BlacklistedToken) -> StoreResult<()> {
        let mut blacklist = self.blacklist.write().await;
        if blacklist.contains_key(&token.jti) {
            return Err(StoreError::Conflict("token already blacklisted".into()));
        }
        // Expired entries can never be presented again; drop them while we hold the lock.
        let now = Utc::now();
        blacklist.retain(|_, entry| entry.expires_at > now);
        blacklist.insert(token.jti.clone(), token);
        Ok(())
    }

    async fn is_token_blacklisted(&self, jti: &str) -> StoreResult<bool> {
        Ok(self.blacklist.read().await.contains_key(jti))
    }
}
