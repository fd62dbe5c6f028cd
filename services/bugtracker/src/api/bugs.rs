//! Bug API handlers.
//!
//! # Purpose
//! Bug reporting, listing, updates, status changes, and deletion.
//!
//! # Key invariants
//! - `created_by` is the reporting caller and never changes.
//! - Non-staff callers only see bugs they created or are assigned to.
//! - `assigned_to` travels as a username and is resolved to a user id here.
//! - Create and update accept JSON or `multipart/form-data`; an uploaded
//!   `image` is written only after the rest of the payload validates.
use crate::api::error::{ApiError, api_forbidden, api_internal, api_internal_message, api_store_error};
use crate::api::extract::{AuthUser, ValidJson};
use crate::api::types::{BugRequest, StatusRequest};
use crate::api::upload::{
    BugPayload, EMPTY_FILE, INVALID_IMAGE, ImageUpload, discard_image, store_image,
};
use crate::api::validation::{Mode, Validator};
use crate::api::{check_reference, resolve_username};
use crate::app::AppState;
use crate::auth::permissions;
use crate::model::{Bug, BugPatch, BugStatus, NewBug, User};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

async fn load_bug(state: &AppState, id: i64) -> Result<Bug, ApiError> {
    state
        .store
        .get_bug(id)
        .await
        .map_err(|err| api_store_error("bug", err))
}

/// A validated upload and the extension of its detected format.
type CheckedImage = (ImageUpload, &'static str);

async fn validate_bug(
    state: &AppState,
    mode: Mode,
    payload: BugPayload,
) -> Result<(BugPatch, Option<CheckedImage>), ApiError> {
    let BugPayload {
        request: body,
        image: upload,
    } = payload;
    let mut v = Validator::new(mode);
    let bug_type = v.choice("bug_type", body.bug_type);
    let bug_description = v.text("bug_description", body.bug_description);
    let url_bug = v.url("url_bug", body.url_bug);
    let image = v.media_path("image", body.image);
    let upload = match upload {
        Some(upload) if upload.bytes.is_empty() => {
            v.error("image", EMPTY_FILE);
            None
        }
        Some(upload) => match upload.extension() {
            Some(extension) => Some((upload, extension)),
            None => {
                v.error("image", INVALID_IMAGE);
                None
            }
        },
        None => None,
    };
    let bug_priority = v.choice("bug_priority", body.bug_priority);
    let bug_severity = v.choice("bug_severity", body.bug_severity);
    let status = v.optional_choice("status", body.status);

    let project = v.required("project", body.project);
    if let Some(id) = project {
        check_reference(&mut v, "project", id, state.store.get_project(id).await)?;
    }
    let department = v.required("department", body.department);
    if let Some(id) = department {
        check_reference(&mut v, "department", id, state.store.get_department(id).await)?;
    }
    let assigned_to = resolve_username(state, &mut v, "assigned_to", body.assigned_to).await?;
    v.finish()?;

    let patch = BugPatch {
        bug_type,
        bug_description,
        url_bug,
        image,
        bug_priority,
        bug_severity,
        status,
        is_current_project: body.is_current_project,
        project,
        department,
        assigned_to,
    };
    Ok((patch, upload))
}

/// Stores a validated upload and points `patch.image` at it.
async fn attach_image(
    state: &AppState,
    patch: &mut BugPatch,
    upload: Option<CheckedImage>,
) -> Result<Option<String>, ApiError> {
    let Some((upload, extension)) = upload else {
        return Ok(None);
    };
    let path = store_image(&state.media_root, &upload, extension).await?;
    patch.image = Some(Some(path.clone()));
    Ok(Some(path))
}

fn new_bug(patch: BugPatch, created_by: i64) -> Option<NewBug> {
    Some(NewBug {
        bug_type: patch.bug_type?,
        bug_description: patch.bug_description?,
        url_bug: patch.url_bug.flatten(),
        image: patch.image.flatten(),
        bug_priority: patch.bug_priority?,
        bug_severity: patch.bug_severity?,
        status: patch.status.unwrap_or(BugStatus::Open),
        is_current_project: patch.is_current_project.unwrap_or(true),
        project: patch.project?,
        department: patch.department?,
        created_by,
        assigned_to: patch.assigned_to.flatten(),
    })
}

#[utoipa::path(
    get,
    path = "/api/bugs/",
    tag = "bugs",
    responses(
        (status = 200, description = "Bugs visible to the caller", body = [Bug])
    ),
    security(("bearer" = []))
)]
pub(crate) async fn list_bugs(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Bug>>, ApiError> {
    let bugs = if permissions::sees_all_bugs(&caller) {
        state.store.list_bugs().await
    } else {
        state.store.list_bugs_for_user(caller.id).await
    }
    .map_err(|err| api_internal("failed to list bugs", &err))?;
    Ok(Json(bugs))
}

#[utoipa::path(
    post,
    path = "/api/bugs/",
    tag = "bugs",
    request_body(
        content = BugRequest,
        description = "JSON, or multipart/form-data with `image` as a file part"
    ),
    responses(
        (status = 201, description = "Bug reported", body = Bug),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
/// Report a bug; the caller becomes `created_by`.
pub(crate) async fn create_bug(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    payload: BugPayload,
) -> Result<(StatusCode, Json<Bug>), ApiError> {
    let (mut patch, upload) = validate_bug(&state, Mode::Create, payload).await?;
    let stored = attach_image(&state, &mut patch, upload).await?;
    let created = match new_bug(patch, caller.id) {
        Some(new) => state
            .store
            .create_bug(new)
            .await
            .map_err(|err| api_store_error("bug", err)),
        None => Err(api_internal_message("validated bug incomplete")),
    };
    let bug = match created {
        Ok(bug) => bug,
        Err(err) => {
            if let Some(path) = stored {
                discard_image(&state.media_root, &path).await;
            }
            return Err(err);
        }
    };
    metrics::counter!(
        "bugtracker_bugs_reported_total",
        "priority" => bug.bug_priority.as_str()
    )
    .increment(1);
    tracing::info!(bug_id = bug.id, project_id = bug.project, reporter = caller.id, "bug reported");
    Ok((StatusCode::CREATED, Json(bug)))
}

#[utoipa::path(
    get,
    path = "/api/bugs/{id}/",
    tag = "bugs",
    params(("id" = i64, Path, description = "Bug id")),
    responses(
        (status = 200, description = "Bug", body = Bug),
        (status = 403, description = "Not the creator or assignee", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Bug not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn get_bug(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Bug>, ApiError> {
    let bug = load_bug(&state, id).await?;
    if !permissions::can_view_bug(&caller, &bug) {
        return Err(api_forbidden("you do not have access to this bug"));
    }
    Ok(Json(bug))
}

async fn update_bug(
    caller: User,
    state: AppState,
    id: i64,
    mode: Mode,
    payload: BugPayload,
) -> Result<Json<Bug>, ApiError> {
    let bug = load_bug(&state, id).await?;
    if !permissions::can_modify_bug(&caller, &bug) {
        return Err(api_forbidden("only the reporter or staff may modify this bug"));
    }
    let (mut patch, upload) = validate_bug(&state, mode, payload).await?;
    let stored = attach_image(&state, &mut patch, upload).await?;
    match state.store.update_bug(id, patch).await {
        Ok(bug) => Ok(Json(bug)),
        Err(err) => {
            if let Some(path) = stored {
                discard_image(&state.media_root, &path).await;
            }
            Err(api_store_error("bug", err))
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/bugs/{id}/",
    tag = "bugs",
    params(("id" = i64, Path, description = "Bug id")),
    request_body = BugRequest,
    responses(
        (status = 200, description = "Bug replaced", body = Bug),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Bug not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn replace_bug(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: BugPayload,
) -> Result<Json<Bug>, ApiError> {
    update_bug(caller, state, id, Mode::Replace, payload).await
}

#[utoipa::path(
    patch,
    path = "/api/bugs/{id}/",
    tag = "bugs",
    params(("id" = i64, Path, description = "Bug id")),
    request_body = BugRequest,
    responses(
        (status = 200, description = "Bug updated", body = Bug),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Bug not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn patch_bug(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: BugPayload,
) -> Result<Json<Bug>, ApiError> {
    update_bug(caller, state, id, Mode::Partial, payload).await
}

#[utoipa::path(
    delete,
    path = "/api/bugs/{id}/",
    tag = "bugs",
    params(("id" = i64, Path, description = "Bug id")),
    responses(
        (status = 204, description = "Bug deleted"),
        (status = 403, description = "Staff only", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Bug not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn delete_bug(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    load_bug(&state, id).await?;
    if !permissions::can_delete_bug(&caller) {
        return Err(api_forbidden("only staff may delete bugs"));
    }
    state
        .store
        .delete_bug(id)
        .await
        .map_err(|err| api_store_error("bug", err))?;
    tracing::info!(bug_id = id, deleted_by = caller.id, "bug deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/bugs/{id}/status/",
    tag = "bugs",
    params(("id" = i64, Path, description = "Bug id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Bug),
        (status = 400, description = "Invalid status", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Bug not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn update_bug_status(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<StatusRequest>,
) -> Result<Json<Bug>, ApiError> {
    let bug = load_bug(&state, id).await?;
    if !permissions::can_modify_bug(&caller, &bug) {
        return Err(api_forbidden("only the reporter or staff may change this bug's status"));
    }
    let mut v = Validator::new(Mode::Create);
    let status = v.choice::<BugStatus>("status", body.status);
    v.finish()?;
    let status = status.ok_or_else(|| api_internal_message("validated status missing"))?;
    let bug = state
        .store
        .update_bug(id, BugPatch::status(status))
        .await
        .map_err(|err| api_store_error("bug", err))?;
    tracing::info!(bug_id = id, status = %status, "bug status updated");
    Ok(Json(bug))
}
