//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{code, message, fields?}` shape.
//!
//! # Key invariants and assumptions
//! - Error responses always include a stable `code` and a human-readable
//!   `message`; validation errors add a per-field `fields` map.
//! - Status codes align with the error category.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
//! - Credential failures never say whether the account exists.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::collections::BTreeMap;

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use bugtracker::api::error::ApiError;
/// use bugtracker::api::types::ErrorResponse;
///
/// let err = ApiError {
///     status: StatusCode::NOT_FOUND,
///     body: ErrorResponse {
///         code: "not_found".to_string(),
///         message: "missing".to_string(),
///         request_id: None,
///         fields: None,
///     },
/// };
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
            fields: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error with a caller-provided code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 500 from a store error.
///
/// Logs the store error and returns a generic internal error response.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "bugtracker storage error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

/// Build a 400 validation error without field detail.
pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Build a 400 validation error carrying per-field messages.
pub fn api_field_errors(fields: BTreeMap<String, Vec<String>>) -> ApiError {
    let mut err = api_validation_error("invalid request");
    err.body.fields = Some(fields);
    err
}

/// Build a 400 for a refresh token that is invalid, expired, or revoked.
pub fn api_token_invalid(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "token_not_valid", message)
}

/// Map a store error to its HTTP equivalent.
///
/// `NotFound` becomes 404 naming `entity`, `Conflict` becomes 409, anything
/// else is logged and returned as 500.
pub fn api_store_error(entity: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(_) => api_not_found(&format!("{entity} not found")),
        StoreError::Conflict(message) => api_conflict("conflict", &message),
        other => api_internal(&format!("failed to access {entity}"), &other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_helpers_build_expected_codes() {
        let not_found = api_not_found("missing");
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body.code, "not_found");

        let conflict = api_conflict("already_exists", "conflict");
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.body.code, "already_exists");

        let internal = api_internal_message("oops");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);

        let unauthorized = api_unauthorized("nope");
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

        let forbidden = api_forbidden("nope");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let token = api_token_invalid("expired");
        assert_eq!(token.status, StatusCode::BAD_REQUEST);
        assert_eq!(token.body.code, "token_not_valid");
    }

    #[test]
    fn field_errors_are_attached() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "email".to_string(),
            vec!["This field is required.".to_string()],
        );
        let err = api_field_errors(fields);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "validation_error");
        let fields = err.body.fields.expect("fields");
        assert_eq!(fields["email"], vec!["This field is required.".to_string()]);
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let err = api_store_error("bug", StoreError::NotFound("bug".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body.message, "bug not found");

        let err = api_store_error("user", StoreError::Conflict("username exists".into()));
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err = api_store_error("user", StoreError::Unexpected(anyhow::anyhow!("boom")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.message, "failed to access user");
    }
}
