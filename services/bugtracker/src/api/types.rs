//! Request and response payloads for the HTTP API.
//!
//! Request types deny unknown fields and keep every field optional so missing
//! values surface as field-level validation errors instead of opaque
//! deserialization failures. Choice fields arrive as strings for the same
//! reason.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub backend: String,
    pub durable: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct MessageResponse {
    pub message: String,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// -----------------------------
// Accounts
// -----------------------------

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RefreshTokenRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// Registration and user update payload.
#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct UserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<String>,
    pub dept: Option<String>,
    pub is_staff: Option<bool>,
}

// -----------------------------
// Departments
// -----------------------------

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct DepartmentRequest {
    pub user: Option<i64>,
    pub dept: Option<String>,
    pub role: Option<String>,
}

// -----------------------------
// Projects
// -----------------------------

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectRequest {
    pub project_name: Option<String>,
    pub project_description: Option<String>,
    pub project_duration: Option<i64>,
    pub client_name: Option<String>,
    /// `YYYY-MM-DD`.
    pub submission_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectAssignRequest {
    pub project: Option<i64>,
    pub user: Option<i64>,
    pub role: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<i64>>,
}

// -----------------------------
// Bugs
// -----------------------------

#[derive(Debug, Deserialize, ToSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct BugRequest {
    pub bug_type: Option<String>,
    pub bug_description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub url_bug: Option<Option<String>>,
    /// Path relative to the media root, e.g. `bugs/screenshot.png`.
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<String>>,
    pub bug_priority: Option<String>,
    pub bug_severity: Option<String>,
    pub status: Option<String>,
    pub is_current_project: Option<bool>,
    pub project: Option<i64>,
    pub department: Option<i64>,
    /// Username of the assignee; `null` clears the assignment.
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        let absent: BugRequest = serde_json::from_str("{}").expect("absent");
        assert_eq!(absent.assigned_to, None);

        let null: BugRequest = serde_json::from_str(r#"{"assigned_to": null}"#).expect("null");
        assert_eq!(null.assigned_to, Some(None));

        let set: BugRequest =
            serde_json::from_str(r#"{"assigned_to": "dev"}"#).expect("set");
        assert_eq!(set.assigned_to, Some(Some("dev".to_string())));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<UserRequest>(r#"{"usrname": "x"}"#)
            .expect_err("unknown field");
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn error_response_omits_empty_sections() {
        let body = ErrorResponse {
            code: "forbidden".to_string(),
            message: "nope".to_string(),
            request_id: None,
            fields: None,
        };
        let value = serde_json::to_value(body).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"code": "forbidden", "message": "nope"})
        );
    }
}
