//! Project API handlers.
//!
//! # Purpose
//! Project CRUD, member assignment, assignment listing, and status updates.
//!
//! # Visibility
//! Staff and managers see every project. Everyone else sees projects they own
//! or are assigned to, and gets 403 on the rest.
use crate::api::check_reference;
use crate::api::error::{ApiError, api_forbidden, api_internal, api_internal_message, api_store_error};
use crate::api::extract::{AuthUser, ValidJson};
use crate::api::types::{ProjectAssignRequest, ProjectRequest, StatusRequest};
use crate::api::validation::{Mode, Validator};
use crate::app::AppState;
use crate::auth::permissions;
use crate::model::{
    NewProject, NewProjectUser, Project, ProjectPatch, ProjectStatus, ProjectUser, User,
};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

fn ensure_manager(caller: &User) -> Result<(), ApiError> {
    if permissions::can_manage_projects(caller) {
        Ok(())
    } else {
        Err(api_forbidden("you do not have permission to manage projects"))
    }
}

async fn load_project(state: &AppState, id: i64) -> Result<Project, ApiError> {
    state
        .store
        .get_project(id)
        .await
        .map_err(|err| api_store_error("project", err))
}

/// Owner, member, staff, or manager; otherwise 403.
async fn ensure_access(state: &AppState, caller: &User, project: &Project) -> Result<(), ApiError> {
    let is_member = if permissions::sees_all_projects(caller) || project.user == caller.id {
        false
    } else {
        state
            .store
            .is_project_member(project.id, caller.id)
            .await
            .map_err(|err| api_internal("failed to check project membership", &err))?
    };
    if permissions::can_access_project(caller, project, is_member) {
        Ok(())
    } else {
        Err(api_forbidden("you do not have access to this project"))
    }
}

fn validate_project(mode: Mode, body: ProjectRequest) -> Result<ProjectPatch, ApiError> {
    let mut v = Validator::new(mode);
    let patch = ProjectPatch {
        project_name: v.text("project_name", body.project_name),
        project_description: body.project_description,
        project_duration: v.non_negative("project_duration", body.project_duration),
        client_name: v.text("client_name", body.client_name),
        submission_date: v.date("submission_date", body.submission_date),
        status: v.optional_choice("status", body.status),
    };
    v.finish()?;
    Ok(patch)
}

fn new_project(patch: ProjectPatch, department: Option<i64>, owner: i64) -> Option<NewProject> {
    Some(NewProject {
        project_name: patch.project_name?,
        project_description: patch.project_description.unwrap_or_default(),
        project_duration: patch.project_duration?,
        client_name: patch.client_name?,
        department,
        submission_date: patch.submission_date?,
        status: patch.status.unwrap_or(ProjectStatus::Open),
        user: owner,
    })
}

#[utoipa::path(
    get,
    path = "/api/projects/",
    tag = "projects",
    responses(
        (status = 200, description = "Projects visible to the caller", body = [Project])
    ),
    security(("bearer" = []))
)]
pub(crate) async fn list_projects(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = if permissions::sees_all_projects(&caller) {
        state.store.list_projects().await
    } else {
        state.store.list_projects_for_user(caller.id).await
    }
    .map_err(|err| api_internal("failed to list projects", &err))?;
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/api/projects/",
    tag = "projects",
    request_body = ProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
/// Create a project owned by the caller.
///
/// The department is taken from the caller's first department row, if any.
pub(crate) async fn create_project(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    ensure_manager(&caller)?;
    let patch = validate_project(Mode::Create, body)?;
    let department = state
        .store
        .first_department_for_user(caller.id)
        .await
        .map_err(|err| api_internal("failed to resolve department", &err))?
        .map(|department| department.id);
    let new = new_project(patch, department, caller.id)
        .ok_or_else(|| api_internal_message("validated project incomplete"))?;
    let project = state
        .store
        .create_project(new)
        .await
        .map_err(|err| api_store_error("project", err))?;
    metrics::counter!("bugtracker_projects_created_total").increment(1);
    tracing::info!(project_id = project.id, owner = caller.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 403, description = "No access", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn get_project(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    let project = load_project(&state, id).await?;
    ensure_access(&state, &caller, &project).await?;
    Ok(Json(project))
}

async fn update_project(
    caller: User,
    state: AppState,
    id: i64,
    mode: Mode,
    body: ProjectRequest,
) -> Result<Json<Project>, ApiError> {
    load_project(&state, id).await?;
    ensure_manager(&caller)?;
    let patch = validate_project(mode, body)?;
    let project = state
        .store
        .update_project(id, patch)
        .await
        .map_err(|err| api_store_error("project", err))?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}/",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    request_body = ProjectRequest,
    responses(
        (status = 200, description = "Project replaced", body = Project),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn replace_project(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<ProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    update_project(caller, state, id, Mode::Replace, body).await
}

#[utoipa::path(
    patch,
    path = "/api/projects/{id}/",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    request_body = ProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn patch_project(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<ProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    update_project(caller, state, id, Mode::Partial, body).await
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}/",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted with its assignments and bugs"),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn delete_project(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    load_project(&state, id).await?;
    ensure_manager(&caller)?;
    state
        .store
        .delete_project(id)
        .await
        .map_err(|err| api_store_error("project", err))?;
    tracing::info!(project_id = id, deleted_by = caller.id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/projects/assign/",
    tag = "projects",
    request_body = ProjectAssignRequest,
    responses(
        (status = 201, description = "User assigned to project", body = ProjectUser),
        (status = 400, description = "Invalid payload or duplicate assignment", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn assign_user(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ProjectAssignRequest>,
) -> Result<(StatusCode, Json<ProjectUser>), ApiError> {
    ensure_manager(&caller)?;
    let mut v = Validator::new(Mode::Create);
    let project = v.required("project", body.project);
    if let Some(id) = project {
        check_reference(&mut v, "project", id, state.store.get_project(id).await)?;
    }
    let user = v.required("user", body.user);
    if let Some(id) = user {
        check_reference(&mut v, "user", id, state.store.get_user(id).await)?;
    }
    let role = v.choice("role", body.role);
    let department = body.department.flatten();
    if let Some(id) = department {
        check_reference(&mut v, "department", id, state.store.get_department(id).await)?;
    }
    if let (Some(project), Some(user)) = (project, user) {
        if !v.has_error("project") && !v.has_error("user") {
            let exists = state
                .store
                .is_project_member(project, user)
                .await
                .map_err(|err| api_internal("failed to check assignment", &err))?;
            if exists {
                v.non_field_error("The fields project, user must make a unique set.");
            }
        }
    }
    v.finish()?;

    let (Some(project), Some(user), Some(role)) = (project, user, role) else {
        return Err(api_internal_message("validated assignment incomplete"));
    };
    let assignment = state
        .store
        .create_project_user(NewProjectUser {
            project,
            user,
            role,
            department,
        })
        .await
        .map_err(|err| api_store_error("assignment", err))?;
    tracing::info!(project_id = project, user_id = user, "user assigned to project");
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/users/",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Assignments of the project", body = [ProjectUser]),
        (status = 403, description = "No access", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn list_project_users(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ProjectUser>>, ApiError> {
    let project = load_project(&state, id).await?;
    ensure_access(&state, &caller, &project).await?;
    let items = state
        .store
        .list_project_users(id)
        .await
        .map_err(|err| api_internal("failed to list project users", &err))?;
    Ok(Json(items))
}

#[utoipa::path(
    patch,
    path = "/api/projects/{id}/update-status/",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Project),
        (status = 400, description = "Invalid status", body = crate::api::types::ErrorResponse),
        (status = 403, description = "No access", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn update_project_status(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<StatusRequest>,
) -> Result<Json<Project>, ApiError> {
    let project = load_project(&state, id).await?;
    ensure_access(&state, &caller, &project).await?;
    let mut v = Validator::new(Mode::Create);
    let status = v.choice::<ProjectStatus>("status", body.status);
    v.finish()?;
    let status = status.ok_or_else(|| api_internal_message("validated status missing"))?;
    let project = state
        .store
        .update_project(id, ProjectPatch::status(status))
        .await
        .map_err(|err| api_store_error("project", err))?;
    tracing::info!(project_id = id, status = %status, "project status updated");
    Ok(Json(project))
}
