//! Department assignment records.
//!
//! One row per (user, role, department) assignment.
use crate::model::{Dept, Role};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Department {
    pub id: i64,
    pub user: i64,
    pub dept: Dept,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewDepartment {
    pub user: i64,
    pub dept: Dept,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentPatch {
    pub user: Option<i64>,
    pub dept: Option<Dept>,
    pub role: Option<Role>,
}

impl DepartmentPatch {
    pub fn apply(self, department: &mut Department) {
        if let Some(value) = self.user {
            department.user = value;
        }
        if let Some(value) = self.dept {
            department.dept = value;
        }
        if let Some(value) = self.role {
            department.role = value;
        }
    }
}
