//! OpenAPI schema aggregation for the bug tracker API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/api/openapi.json`.
use crate::api::{
    accounts, bugs, departments, projects, system,
    types::{
        AccessTokenResponse, BugRequest, DepartmentRequest, ErrorResponse, HealthStatus,
        LoginRequest, MessageResponse, ProjectAssignRequest, ProjectRequest, RefreshTokenRequest,
        StatusRequest, TokenPairResponse, UserRequest,
    },
};
use crate::model::{
    Bug, BugPriority, BugSeverity, BugStatus, BugType, Department, Dept, Project, ProjectStatus,
    ProjectUser, Role, User,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the `bearer` JWT scheme referenced by authenticated paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "bugtracker",
        version = "v1",
        description = "Bug tracking HTTP API"
    ),
    paths(
        system::health,
        accounts::register,
        accounts::login,
        accounts::logout,
        accounts::refresh_token,
        accounts::get_profile,
        accounts::replace_profile,
        accounts::patch_profile,
        accounts::delete_profile,
        accounts::list_users,
        accounts::get_user,
        accounts::patch_user,
        accounts::delete_user,
        departments::list_departments,
        departments::create_department,
        departments::get_department,
        departments::replace_department,
        departments::patch_department,
        departments::delete_department,
        projects::list_projects,
        projects::create_project,
        projects::get_project,
        projects::replace_project,
        projects::patch_project,
        projects::delete_project,
        projects::assign_user,
        projects::list_project_users,
        projects::update_project_status,
        bugs::list_bugs,
        bugs::create_bug,
        bugs::get_bug,
        bugs::replace_bug,
        bugs::patch_bug,
        bugs::delete_bug,
        bugs::update_bug_status
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        MessageResponse,
        LoginRequest,
        TokenPairResponse,
        RefreshTokenRequest,
        AccessTokenResponse,
        UserRequest,
        DepartmentRequest,
        ProjectRequest,
        ProjectAssignRequest,
        StatusRequest,
        BugRequest,
        User,
        Role,
        Dept,
        Department,
        Project,
        ProjectStatus,
        ProjectUser,
        Bug,
        BugType,
        BugPriority,
        BugSeverity,
        BugStatus
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "Health and discovery endpoints"),
        (name = "accounts", description = "Registration, login, and user management"),
        (name = "departments", description = "Department assignments"),
        (name = "projects", description = "Projects and their members"),
        (name = "bugs", description = "Bug reports")
    )
)]
pub struct ApiDoc;
