//! Project records and per-project user assignments.
use crate::model::Role;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

choice_enum! {
    ProjectStatus {
        Open => "open",
        Closed => "closed",
        InProgress => "in_progress",
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Project {
    pub id: i64,
    pub project_name: String,
    pub project_description: String,
    /// Duration in days.
    pub project_duration: i32,
    pub client_name: String,
    pub department: Option<i64>,
    pub submission_date: NaiveDate,
    pub status: ProjectStatus,
    /// Owning user (the creator).
    pub user: i64,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub project_name: String,
    pub project_description: String,
    pub project_duration: i32,
    pub client_name: String,
    pub department: Option<i64>,
    pub submission_date: NaiveDate,
    pub status: ProjectStatus,
    pub user: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub project_name: Option<String>,
    pub project_description: Option<String>,
    pub project_duration: Option<i32>,
    pub client_name: Option<String>,
    pub submission_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
}

impl ProjectPatch {
    pub fn status(status: ProjectStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(self, project: &mut Project) {
        if let Some(value) = self.project_name {
            project.project_name = value;
        }
        if let Some(value) = self.project_description {
            project.project_description = value;
        }
        if let Some(value) = self.project_duration {
            project.project_duration = value;
        }
        if let Some(value) = self.client_name {
            project.client_name = value;
        }
        if let Some(value) = self.submission_date {
            project.submission_date = value;
        }
        if let Some(value) = self.status {
            project.status = value;
        }
    }
}

/// Assignment of a user to a project with a per-project role.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct ProjectUser {
    pub id: i64,
    pub project: i64,
    pub user: i64,
    pub role: Role,
    pub department: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewProjectUser {
    pub project: i64,
    pub user: i64,
    pub role: Role,
    pub department: Option<i64>,
}
