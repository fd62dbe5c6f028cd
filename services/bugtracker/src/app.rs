//! Bug tracker HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Every resource route answers both with and without its trailing slash.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::tokens::TokenIssuer;
use crate::observability;
use crate::store::BugTrackerStore;
use axum::routing::{MethodRouter, get, patch, post};
use axum::{Json, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BugTrackerStore + Send + Sync>,
    pub tokens: Arc<TokenIssuer>,
    /// Directory served under `/media`.
    pub media_root: PathBuf,
}

/// Registers `path` (which ends in `/`) and its slash-less twin.
fn route_both(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    let bare = path.trim_end_matches('/');
    router
        .route(path, method_router.clone())
        .route(bare, method_router)
}

fn account_routes() -> Router<AppState> {
    use api::accounts;
    let router = Router::new();
    let router = route_both(router, "/api/accounts/register/", post(accounts::register));
    let router = route_both(router, "/api/accounts/login/", post(accounts::login));
    let router = route_both(router, "/api/accounts/logout/", post(accounts::logout));
    let router = route_both(
        router,
        "/api/accounts/token/refresh/",
        post(accounts::refresh_token),
    );
    let router = route_both(
        router,
        "/api/accounts/profile/:id/",
        get(accounts::get_profile)
            .put(accounts::replace_profile)
            .patch(accounts::patch_profile)
            .delete(accounts::delete_profile),
    );
    let router = route_both(router, "/api/accounts/users/", get(accounts::list_users));
    route_both(
        router,
        "/api/accounts/users/:id/",
        get(accounts::get_user)
            .patch(accounts::patch_user)
            .delete(accounts::delete_user),
    )
}

fn resource_routes() -> Router<AppState> {
    use api::{bugs, departments, projects};
    let router = Router::new();
    let router = route_both(
        router,
        "/api/departments/",
        get(departments::list_departments).post(departments::create_department),
    );
    let router = route_both(
        router,
        "/api/departments/:id/",
        get(departments::get_department)
            .put(departments::replace_department)
            .patch(departments::patch_department)
            .delete(departments::delete_department),
    );
    let router = route_both(
        router,
        "/api/projects/",
        get(projects::list_projects).post(projects::create_project),
    );
    let router = route_both(router, "/api/projects/assign/", post(projects::assign_user));
    let router = route_both(
        router,
        "/api/projects/:id/",
        get(projects::get_project)
            .put(projects::replace_project)
            .patch(projects::patch_project)
            .delete(projects::delete_project),
    );
    let router = route_both(
        router,
        "/api/projects/:id/users/",
        get(projects::list_project_users),
    );
    let router = route_both(
        router,
        "/api/projects/:id/update-status/",
        patch(projects::update_project_status),
    );
    let router = route_both(
        router,
        "/api/bugs/",
        get(bugs::list_bugs).post(bugs::create_bug),
    );
    let router = route_both(
        router,
        "/api/bugs/:id/",
        get(bugs::get_bug)
            .put(bugs::replace_bug)
            .patch(bugs::patch_bug)
            .delete(bugs::delete_bug),
    );
    route_both(router, "/api/bugs/:id/status/", patch(bugs::update_bug_status))
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    let router = route_both(Router::new(), "/api/health/", get(api::system::health));
    router
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(account_routes())
        .merge(resource_routes())
        .nest_service("/media", ServeDir::new(&state.media_root))
        .layer(trace_layer)
        .with_state(state)
}
