//! Bug records and their choice fields.
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

choice_enum! {
    BugType {
        Error => "error",
        Mistake => "mistake",
        Bug => "bug",
        Issue => "issue",
        Fault => "fault",
        Defect => "defect",
        Other => "other",
    }
}

choice_enum! {
    BugPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

choice_enum! {
    BugSeverity {
        Critical => "critical",
        Major => "major",
        Normal => "normal",
        Minor => "minor",
        Trivial => "trivial",
        Enhancements => "enhancements",
    }
}

choice_enum! {
    BugStatus {
        Open => "open",
        Closed => "closed",
        InProgress => "in_progress",
    }
}

/// A bug as returned to clients.
///
/// `created_by` and `assigned_to` carry usernames; the numeric ids are kept
/// for permission checks but not serialized.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Bug {
    pub id: i64,
    pub bug_type: BugType,
    pub bug_description: String,
    pub url_bug: Option<String>,
    pub image: Option<String>,
    pub bug_priority: BugPriority,
    pub bug_severity: BugSeverity,
    pub status: BugStatus,
    pub is_current_project: bool,
    pub project: i64,
    pub department: i64,
    #[serde(skip)]
    pub created_by_id: i64,
    pub created_by: String,
    #[serde(skip)]
    pub assigned_to_id: Option<i64>,
    pub assigned_to: Option<String>,
    pub report_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl Bug {
    pub fn is_visible_to(&self, user_id: i64) -> bool {
        self.created_by_id == user_id || self.assigned_to_id == Some(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewBug {
    pub bug_type: BugType,
    pub bug_description: String,
    pub url_bug: Option<String>,
    pub image: Option<String>,
    pub bug_priority: BugPriority,
    pub bug_severity: BugSeverity,
    pub status: BugStatus,
    pub is_current_project: bool,
    pub project: i64,
    pub department: i64,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct BugPatch {
    pub bug_type: Option<BugType>,
    pub bug_description: Option<String>,
    pub url_bug: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub bug_priority: Option<BugPriority>,
    pub bug_severity: Option<BugSeverity>,
    pub status: Option<BugStatus>,
    pub is_current_project: Option<bool>,
    pub project: Option<i64>,
    pub department: Option<i64>,
    /// `Some(None)` clears the assignee.
    pub assigned_to: Option<Option<i64>>,
}

impl BugPatch {
    pub fn status(status: BugStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
