//! Request extractors shared by handlers.
use crate::api::error::{ApiError, api_unauthorized, api_internal, api_validation_error};
use crate::app::AppState;
use crate::auth::tokens::{TokenType, extract_bearer};
use crate::model::User;
use crate::store::StoreError;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

/// JSON body whose rejections become 400 `validation_error` instead of
/// axum's 415/422 defaults.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(api_validation_error(&rejection.body_text())),
        }
    }
}

/// The caller behind a valid `Authorization: Bearer <access>` header.
///
/// Rejects with 401 when the header is missing, the token fails verification,
/// or the user it names no longer exists.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers)
            .ok_or_else(|| api_unauthorized("authentication credentials were not provided"))?;
        let claims = state
            .tokens
            .verify(token, TokenType::Access)
            .map_err(|err| {
                tracing::debug!(error = %err, "access token rejected");
                api_unauthorized("token is invalid or expired")
            })?;
        let user_id = claims
            .user_id()
            .map_err(|_| api_unauthorized("token is invalid or expired"))?;
        match state.store.get_user(user_id).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(StoreError::NotFound(_)) => Err(api_unauthorized("user not found")),
            Err(err) => Err(api_internal("failed to load user", &err)),
        }
    }
}
