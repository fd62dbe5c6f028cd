//! Department API handlers.
//!
//! Department rows tie a user to a department and role. Every endpoint here is
//! reserved to staff and managers.
use crate::api::check_reference;
use crate::api::error::{ApiError, api_forbidden, api_internal, api_internal_message, api_store_error};
use crate::api::extract::{AuthUser, ValidJson};
use crate::api::types::DepartmentRequest;
use crate::api::validation::{Mode, Validator};
use crate::app::AppState;
use crate::auth::permissions;
use crate::model::{Department, DepartmentPatch, NewDepartment, User};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

fn ensure_manager(caller: &User) -> Result<(), ApiError> {
    if permissions::can_manage_departments(caller) {
        Ok(())
    } else {
        Err(api_forbidden("you do not have permission to manage departments"))
    }
}

async fn validate_department(
    state: &AppState,
    mode: Mode,
    body: DepartmentRequest,
) -> Result<DepartmentPatch, ApiError> {
    let mut v = Validator::new(mode);
    let user = v.required("user", body.user);
    if let Some(id) = user {
        check_reference(&mut v, "user", id, state.store.get_user(id).await)?;
    }
    let dept = v.choice("dept", body.dept);
    let role = v.choice("role", body.role);
    v.finish()?;
    Ok(DepartmentPatch { user, dept, role })
}

fn new_department(patch: DepartmentPatch) -> Option<NewDepartment> {
    Some(NewDepartment {
        user: patch.user?,
        dept: patch.dept?,
        role: patch.role?,
    })
}

#[utoipa::path(
    get,
    path = "/api/departments/",
    tag = "departments",
    responses(
        (status = 200, description = "All department rows", body = [Department]),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn list_departments(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Department>>, ApiError> {
    ensure_manager(&caller)?;
    let items = state
        .store
        .list_departments()
        .await
        .map_err(|err| api_internal("failed to list departments", &err))?;
    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/departments/",
    tag = "departments",
    request_body = DepartmentRequest,
    responses(
        (status = 201, description = "Department row created", body = Department),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn create_department(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<DepartmentRequest>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    ensure_manager(&caller)?;
    let patch = validate_department(&state, Mode::Create, body).await?;
    let new = new_department(patch)
        .ok_or_else(|| api_internal_message("validated department incomplete"))?;
    let department = state
        .store
        .create_department(new)
        .await
        .map_err(|err| api_store_error("department", err))?;
    tracing::info!(department_id = department.id, user_id = department.user, "department created");
    Ok((StatusCode::CREATED, Json(department)))
}

#[utoipa::path(
    get,
    path = "/api/departments/{id}/",
    tag = "departments",
    params(("id" = i64, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department row", body = Department),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Department not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn get_department(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Department>, ApiError> {
    let department = state
        .store
        .get_department(id)
        .await
        .map_err(|err| api_store_error("department", err))?;
    ensure_manager(&caller)?;
    Ok(Json(department))
}

async fn update_department(
    caller: User,
    state: AppState,
    id: i64,
    mode: Mode,
    body: DepartmentRequest,
) -> Result<Json<Department>, ApiError> {
    state
        .store
        .get_department(id)
        .await
        .map_err(|err| api_store_error("department", err))?;
    ensure_manager(&caller)?;
    let patch = validate_department(&state, mode, body).await?;
    let department = state
        .store
        .update_department(id, patch)
        .await
        .map_err(|err| api_store_error("department", err))?;
    Ok(Json(department))
}

#[utoipa::path(
    put,
    path = "/api/departments/{id}/",
    tag = "departments",
    params(("id" = i64, Path, description = "Department id")),
    request_body = DepartmentRequest,
    responses(
        (status = 200, description = "Department row replaced", body = Department),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Department not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn replace_department(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<DepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    update_department(caller, state, id, Mode::Replace, body).await
}

#[utoipa::path(
    patch,
    path = "/api/departments/{id}/",
    tag = "departments",
    params(("id" = i64, Path, description = "Department id")),
    request_body = DepartmentRequest,
    responses(
        (status = 200, description = "Department row updated", body = Department),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Department not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn patch_department(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<DepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    update_department(caller, state, id, Mode::Partial, body).await
}

#[utoipa::path(
    delete,
    path = "/api/departments/{id}/",
    tag = "departments",
    params(("id" = i64, Path, description = "Department id")),
    responses(
        (status = 204, description = "Department row deleted"),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Department not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
/// Delete a department row.
///
/// Bugs filed against it go with it; projects and assignments keep their rows
/// with the department cleared.
pub(crate) async fn delete_department(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .get_department(id)
        .await
        .map_err(|err| api_store_error("department", err))?;
    ensure_manager(&caller)?;
    state
        .store
        .delete_department(id)
        .await
        .map_err(|err| api_store_error("department", err))?;
    tracing::info!(department_id = id, deleted_by = caller.id, "department deleted");
    Ok(StatusCode::NO_CONTENT)
}
