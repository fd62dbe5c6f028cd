//! Account API handlers.
//!
//! # Purpose and responsibility
//! Registration, login, logout, access-token refresh, self-service profiles,
//! and the user administration endpoints under `/api/accounts`.
//!
//! # Security considerations
//! - Passwords are hashed with Argon2 off the async executor and never
//!   serialized back.
//! - Login failures return one message for unknown users and bad passwords.
//! - Logout revokes refresh tokens by `jti`; only the token's owner may revoke it.
use crate::api::error::{
    ApiError, api_forbidden, api_internal, api_internal_message, api_store_error,
    api_token_invalid, api_validation_error,
};
use crate::api::extract::{AuthUser, ValidJson};
use crate::api::types::{
    AccessTokenResponse, LoginRequest, MessageResponse, RefreshTokenRequest, TokenPairResponse,
    UserRequest,
};
use crate::api::validation::{Mode, Validator};
use crate::app::AppState;
use crate::auth::passwords::{hash_password_blocking, verify_password_blocking};
use crate::auth::permissions;
use crate::auth::tokens::{TokenError, TokenType};
use crate::model::{BlacklistedToken, NewUser, User, UserPatch};
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Validated user fields, with the plaintext password kept apart from the patch.
struct UserInput {
    patch: UserPatch,
    password: Option<String>,
}

async fn validate_user(
    state: &AppState,
    mode: Mode,
    body: UserRequest,
    current: Option<&User>,
) -> Result<UserInput, ApiError> {
    let mut v = Validator::new(mode);
    let username = v.text("username", body.username);
    let email = v.email("email", body.email);
    let password = if mode == Mode::Create {
        v.text("password", body.password)
    } else {
        v.optional_text("password", body.password)
    };
    let role = v.choice("role", body.role);
    let dept = v.choice("dept", body.dept);

    let current_id = current.map(|user| user.id);
    if let Some(username) = username.as_deref() {
        let taken = state
            .store
            .find_user_by_username(username)
            .await
            .map_err(|err| api_internal("failed to check username", &err))?;
        if taken.is_some_and(|user| Some(user.id) != current_id) {
            v.error("username", "user with this username already exists.");
        }
    }
    if let Some(email) = email.as_deref() {
        let taken = state
            .store
            .find_user_by_email(email)
            .await
            .map_err(|err| api_internal("failed to check email", &err))?;
        if taken.is_some_and(|user| Some(user.id) != current_id) {
            v.error("email", "user with this email already exists.");
        }
    }
    v.finish()?;

    Ok(UserInput {
        patch: UserPatch {
            username,
            email,
            password_hash: None,
            name: body.name,
            phone_number: body.phone_number,
            role,
            dept,
            is_staff: body.is_staff,
        },
        password,
    })
}

fn new_user(patch: UserPatch, password_hash: String) -> Option<NewUser> {
    Some(NewUser {
        username: patch.username?,
        email: patch.email?,
        password_hash,
        name: patch.name,
        phone_number: patch.phone_number,
        role: patch.role?,
        dept: patch.dept?,
        is_staff: patch.is_staff.unwrap_or(false),
    })
}

async fn hash(password: String) -> Result<String, ApiError> {
    hash_password_blocking(password).await.map_err(|err| {
        tracing::error!(error = %err, "password hashing failed");
        api_internal_message("failed to hash password")
    })
}

fn token_rejection(err: TokenError) -> ApiError {
    tracing::debug!(error = %err, "refresh token rejected");
    match err {
        TokenError::Blacklisted => api_token_invalid("token is blacklisted"),
        _ => api_token_invalid("token is invalid or expired"),
    }
}

#[utoipa::path(
    post,
    path = "/api/accounts/register/",
    tag = "accounts",
    request_body = UserRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Caller may not register users", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
/// Register a new account.
///
/// Staff, managers, and team leads may register users. Only staff may set
/// `is_staff`.
pub(crate) async fn register(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<UserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if !permissions::can_manage_accounts(&caller) {
        return Err(api_forbidden("you do not have permission to register users"));
    }
    if body.is_staff.is_some() && !permissions::can_set_staff(&caller) {
        return Err(api_forbidden("only staff may set is_staff"));
    }
    let input = validate_user(&state, Mode::Create, body, None).await?;
    let password = input
        .password
        .ok_or_else(|| api_internal_message("validated password missing"))?;
    let password_hash = hash(password).await?;
    let new_user = new_user(input.patch, password_hash)
        .ok_or_else(|| api_internal_message("validated user incomplete"))?;
    let user = state
        .store
        .create_user(new_user)
        .await
        .map_err(|err| api_store_error("user", err))?;
    metrics::counter!("bugtracker_users_registered_total").increment(1);
    tracing::info!(user_id = user.id, registered_by = caller.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/accounts/login/",
    tag = "accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 400, description = "Missing fields or invalid credentials", body = crate::api::types::ErrorResponse)
    )
)]
/// Exchange `email` or `username` plus `password` for an access/refresh pair.
pub(crate) async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let mut v = Validator::new(Mode::Create);
    let password = v.text("password", body.password);
    let email = v.optional_text("email", body.email);
    let username = v.optional_text("username", body.username);
    if email.is_none() && username.is_none() && !v.has_error("email") && !v.has_error("username")
    {
        v.non_field_error("Must include \"email\" or \"username\".");
    }
    v.finish()?;
    let password = password.ok_or_else(|| api_internal_message("validated password missing"))?;

    let found = match (email, username) {
        (Some(email), _) => state.store.find_user_by_email(&email).await,
        (None, Some(username)) => state.store.find_user_by_username(&username).await,
        (None, None) => Ok(None),
    }
    .map_err(|err| api_internal("failed to load user", &err))?;

    let Some(user) = found else {
        metrics::counter!("bugtracker_logins_total", "outcome" => "failure").increment(1);
        return Err(api_validation_error(INVALID_CREDENTIALS));
    };
    let verified = verify_password_blocking(password, user.password_hash.clone())
        .await
        .map_err(|err| {
            tracing::error!(user_id = user.id, error = %err, "password verification failed");
            api_internal_message("failed to verify credentials")
        })?;
    if !verified {
        metrics::counter!("bugtracker_logins_total", "outcome" => "failure").increment(1);
        return Err(api_validation_error(INVALID_CREDENTIALS));
    }

    let pair = state.tokens.mint_pair(user.id).map_err(|err| {
        tracing::error!(error = %err, "token minting failed");
        api_internal_message("failed to issue tokens")
    })?;
    metrics::counter!("bugtracker_logins_total", "outcome" => "success").increment(1);
    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(TokenPairResponse {
        access: pair.access,
        refresh: pair.refresh,
    }))
}

#[utoipa::path(
    post,
    path = "/api/accounts/logout/",
    tag = "accounts",
    request_body = RefreshTokenRequest,
    responses(
        (status = 205, description = "Refresh token revoked", body = MessageResponse),
        (status = 400, description = "Missing, invalid, or revoked token", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
/// Revoke the caller's refresh token.
pub(crate) async fn logout(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RefreshTokenRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mut v = Validator::new(Mode::Create);
    let refresh = v.text("refresh", body.refresh);
    v.finish()?;
    let refresh = refresh.ok_or_else(|| api_internal_message("validated token missing"))?;

    let claims = state
        .tokens
        .verify(&refresh, TokenType::Refresh)
        .map_err(token_rejection)?;
    if claims.user_id().map_err(token_rejection)? != caller.id {
        return Err(api_token_invalid("token does not belong to the caller"));
    }
    let blacklisted = state
        .store
        .is_token_blacklisted(&claims.jti)
        .await
        .map_err(|err| api_internal("failed to check token blacklist", &err))?;
    if blacklisted {
        return Err(token_rejection(TokenError::Blacklisted));
    }
    let entry = BlacklistedToken {
        jti: claims.jti.clone(),
        user_id: caller.id,
        expires_at: claims.expires_at(),
    };
    match state.store.blacklist_token(entry).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => return Err(token_rejection(TokenError::Blacklisted)),
        Err(err) => return Err(api_internal("failed to revoke token", &err)),
    }
    tracing::info!(user_id = caller.id, "user logged out");
    Ok((
        StatusCode::RESET_CONTENT,
        Json(MessageResponse {
            message: "Logout Successful".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/accounts/token/refresh/",
    tag = "accounts",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 400, description = "Missing, invalid, or revoked token", body = crate::api::types::ErrorResponse)
    )
)]
/// Mint a fresh access token from a live refresh token.
pub(crate) async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RefreshTokenRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let mut v = Validator::new(Mode::Create);
    let refresh = v.text("refresh", body.refresh);
    v.finish()?;
    let refresh = refresh.ok_or_else(|| api_internal_message("validated token missing"))?;

    let claims = state
        .tokens
        .verify(&refresh, TokenType::Refresh)
        .map_err(token_rejection)?;
    let blacklisted = state
        .store
        .is_token_blacklisted(&claims.jti)
        .await
        .map_err(|err| api_internal("failed to check token blacklist", &err))?;
    if blacklisted {
        return Err(token_rejection(TokenError::Blacklisted));
    }
    let user_id = claims.user_id().map_err(token_rejection)?;
    match state.store.get_user(user_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Err(api_token_invalid("user not found")),
        Err(err) => return Err(api_internal("failed to load user", &err)),
    }
    let access = state.tokens.mint_access(user_id).map_err(|err| {
        tracing::error!(error = %err, "token minting failed");
        api_internal_message("failed to issue tokens")
    })?;
    Ok(Json(AccessTokenResponse { access }))
}

async fn load_user(state: &AppState, id: i64) -> Result<User, ApiError> {
    state
        .store
        .get_user(id)
        .await
        .map_err(|err| api_store_error("user", err))
}

async fn apply_user_update(
    state: &AppState,
    caller: &User,
    target: &User,
    mode: Mode,
    body: UserRequest,
) -> Result<User, ApiError> {
    if body.is_staff.is_some() && !permissions::can_set_staff(caller) {
        return Err(api_forbidden("only staff may set is_staff"));
    }
    // Only a change counts; PUT always carries both fields.
    let changes_role = body
        .role
        .as_deref()
        .is_some_and(|role| role != target.role.as_str());
    let changes_dept = body
        .dept
        .as_deref()
        .is_some_and(|dept| dept != target.dept.as_str());
    if (changes_role || changes_dept) && !permissions::can_change_role(caller, target) {
        return Err(api_forbidden(
            "only staff or a manager may change another user's role or dept",
        ));
    }
    let input = validate_user(state, mode, body, Some(target)).await?;
    let mut patch = input.patch;
    if let Some(password) = input.password {
        patch.password_hash = Some(hash(password).await?);
    }
    let updated = state
        .store
        .update_user(target.id, patch)
        .await
        .map_err(|err| api_store_error("user", err))?;
    tracing::info!(user_id = updated.id, updated_by = caller.id, "user updated");
    Ok(updated)
}

#[utoipa::path(
    get,
    path = "/api/accounts/profile/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 403, description = "Not your profile", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn get_profile(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = load_user(&state, id).await?;
    if !permissions::can_view_profile(&caller, user.id) {
        return Err(api_forbidden("you do not have permission to view this profile"));
    }
    Ok(Json(user))
}

async fn update_profile(
    caller: User,
    state: AppState,
    id: i64,
    mode: Mode,
    body: UserRequest,
) -> Result<Json<User>, ApiError> {
    let user = load_user(&state, id).await?;
    if !permissions::can_modify_profile(&caller, &user) {
        return Err(api_forbidden("you do not have permission to modify this profile"));
    }
    apply_user_update(&state, &caller, &user, mode, body)
        .await
        .map(Json)
}

#[utoipa::path(
    put,
    path = "/api/accounts/profile/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserRequest,
    responses(
        (status = 200, description = "Profile replaced", body = User),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn replace_profile(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<UserRequest>,
) -> Result<Json<User>, ApiError> {
    update_profile(caller, state, id, Mode::Replace, body).await
}

#[utoipa::path(
    patch,
    path = "/api/accounts/profile/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn patch_profile(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<UserRequest>,
) -> Result<Json<User>, ApiError> {
    update_profile(caller, state, id, Mode::Partial, body).await
}

#[utoipa::path(
    delete,
    path = "/api/accounts/profile/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn delete_profile(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = load_user(&state, id).await?;
    if !permissions::can_modify_profile(&caller, &user) {
        return Err(api_forbidden("you do not have permission to delete this profile"));
    }
    remove_user(&state, &caller, user.id).await
}

async fn remove_user(state: &AppState, caller: &User, id: i64) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete_user(id)
        .await
        .map_err(|err| api_store_error("user", err))?;
    tracing::info!(user_id = id, deleted_by = caller.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/accounts/users/",
    tag = "accounts",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn list_users(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    if !permissions::can_view_users(&caller) {
        return Err(api_forbidden("you do not have permission to list users"));
    }
    let users = state
        .store
        .list_users()
        .await
        .map_err(|err| api_internal("failed to list users", &err))?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/api/accounts/users/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Not allowed", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn get_user(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = load_user(&state, id).await?;
    if !permissions::can_view_users(&caller) {
        return Err(api_forbidden("you do not have permission to view users"));
    }
    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/api/accounts/users/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn patch_user(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<UserRequest>,
) -> Result<Json<User>, ApiError> {
    let user = load_user(&state, id).await?;
    if !permissions::can_modify_users(&caller) {
        return Err(api_forbidden("only staff may modify users"));
    }
    apply_user_update(&state, &caller, &user, Mode::Partial, body)
        .await
        .map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/accounts/users/{id}/",
    tag = "accounts",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Staff only", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub(crate) async fn delete_user(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = load_user(&state, id).await?;
    if !permissions::can_modify_users(&caller) {
        return Err(api_forbidden("only staff may delete users"));
    }
    remove_user(&state, &caller, user.id).await
}
