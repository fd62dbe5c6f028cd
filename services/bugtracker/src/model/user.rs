//! User account records and the role/department choices.
//!
//! # Purpose
//! Defines the account record returned by the store, the insert/patch shapes,
//! and the blacklist entry recorded when a refresh token is revoked.
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

choice_enum! {
    /// Account role; governs the default permission scope.
    Role {
        TeamLead => "team_lead",
        Developer => "developer",
        Customer => "customer",
        Tester => "tester",
        Manager => "manager",
    }
}

choice_enum! {
    /// Organizational department tag.
    Dept {
        Python => "python",
        Php => "php",
        Java => "java",
        Angular => "angular",
        MobileApp => "mobile_app",
        Devops => "devops",
        Tester => "tester",
        Management => "management",
        Client => "client",
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub dept: Dept,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    pub fn is_team_lead(&self) -> bool {
        self.role == Role::TeamLead
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub dept: Dept,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
    pub dept: Option<Dept>,
    pub is_staff: Option<bool>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        if let Some(value) = self.username {
            user.username = value;
        }
        if let Some(value) = self.email {
            user.email = value;
        }
        if let Some(value) = self.password_hash {
            user.password_hash = value;
        }
        if let Some(value) = self.name {
            user.name = Some(value);
        }
        if let Some(value) = self.phone_number {
            user.phone_number = Some(value);
        }
        if let Some(value) = self.role {
            user.role = value;
        }
        if let Some(value) = self.dept {
            user.dept = value;
        }
        if let Some(value) = self.is_staff {
            user.is_staff = value;
        }
    }
}

/// A revoked refresh token, keyed by its `jti` claim.
#[derive(Debug, Clone)]
pub struct BlacklistedToken {
    pub jti: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}
