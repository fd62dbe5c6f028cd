//! Bug tracker HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and shared helpers for resolving references
//! named in request payloads.
pub mod accounts;
pub mod bugs;
pub mod departments;
pub mod error;
pub mod extract;
pub mod openapi;
pub mod projects;
pub mod system;
pub mod types;
pub mod upload;
pub mod validation;

use crate::api::error::{ApiError, api_internal};
use crate::api::validation::{Validator, missing_pk, missing_username};
use crate::app::AppState;
use crate::store::{StoreError, StoreResult};

/// Records a field error when a referenced row is missing.
///
/// Only store failures other than `NotFound` abort the request.
pub(crate) fn check_reference<T>(
    validator: &mut Validator,
    field: &str,
    id: i64,
    found: StoreResult<T>,
) -> Result<(), ApiError> {
    match found {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => {
            validator.error(field, missing_pk(id));
            Ok(())
        }
        Err(err) => Err(api_internal("failed to resolve reference", &err)),
    }
}

/// Resolves an `assigned_to` style username into a user id.
///
/// `Some(None)` passes through so callers can clear the reference.
pub(crate) async fn resolve_username(
    state: &AppState,
    validator: &mut Validator,
    field: &str,
    value: Option<Option<String>>,
) -> Result<Option<Option<i64>>, ApiError> {
    let username = match value {
        Some(Some(username)) => username,
        Some(None) => return Ok(Some(None)),
        None => return Ok(None),
    };
    let found = state
        .store
        .find_user_by_username(&username)
        .await
        .map_err(|err| api_internal("failed to resolve user", &err))?;
    match found {
        Some(user) => Ok(Some(Some(user.id))),
        None => {
            validator.error(field, missing_username(&username));
            Ok(None)
        }
    }
}
