#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bugtracker::app::{AppState, build_router};
use bugtracker::auth::passwords::hash_password;
use bugtracker::auth::tokens::TokenIssuer;
use bugtracker::config::AuthConfig;
use bugtracker::model::{Dept, NewUser, Role, User};
use bugtracker::store::TrackerStore;
use bugtracker::store::memory::InMemoryStore;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret".to_string(),
        issuer: "bugtracker-test".to_string(),
        access_ttl_secs: 300,
        refresh_ttl_secs: 3_600,
    }
}

/// Router over a fresh in-memory store plus direct handles for seeding.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub tokens: Arc<TokenIssuer>,
    router: axum::Router,
}

/// A seeded user and a valid access token for them.
pub struct Actor {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_media_root(std::env::temp_dir())
    }

    pub fn with_media_root(media_root: PathBuf) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let tokens = Arc::new(TokenIssuer::new(&auth_config()));
        let state = AppState {
            store: store.clone(),
            tokens: tokens.clone(),
            media_root,
        };
        Self {
            store,
            tokens,
            router: build_router(state),
        }
    }

    pub async fn seed_user(&self, username: &str, role: Role, is_staff: bool) -> Actor {
        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: hash_password(PASSWORD).expect("hash"),
                name: None,
                phone_number: None,
                role,
                dept: Dept::Python,
                is_staff,
            })
            .await
            .expect("seed user");
        let token = self.tokens.mint_access(user.id).expect("mint");
        Actor { user, token }
    }

    pub async fn staff(&self) -> Actor {
        self.seed_user("admin", Role::Manager, true).await
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        (status, read_json(response).await)
    }

    /// Sends a `multipart/form-data` body built by [`multipart_body`].
    pub async fn send_multipart(
        &self,
        method: &str,
        uri: &str,
        actor: &Actor,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", actor.token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        (status, read_json(response).await)
    }

    /// Raw response bytes, for files served under `/media`.
    pub async fn fetch(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }

    pub async fn get(&self, uri: &str, actor: &Actor) -> (StatusCode, Value) {
        self.send("GET", uri, Some(&actor.token), None).await
    }

    pub async fn post(&self, uri: &str, actor: &Actor, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(&actor.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, actor: &Actor, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(&actor.token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, actor: &Actor, body: Value) -> (StatusCode, Value) {
        self.send("PATCH", uri, Some(&actor.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, actor: &Actor) -> (StatusCode, Value) {
        self.send("DELETE", uri, Some(&actor.token), None).await
    }

    /// Creates a department row for `user` through the API.
    pub async fn department_for(&self, staff: &Actor, user: &User) -> i64 {
        let (status, body) = self
            .post(
                "/api/departments/",
                staff,
                serde_json::json!({"user": user.id, "dept": "python", "role": "developer"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().expect("department id")
    }

    /// Creates a project owned by `owner`, who must be staff or a manager.
    pub async fn project_by(&self, owner: &Actor, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/projects/",
                owner,
                serde_json::json!({
                    "project_name": name,
                    "project_duration": 30,
                    "client_name": "Acme",
                    "submission_date": "2024-06-01"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().expect("project id")
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ))
}

/// Field names present in a validation error body.
pub fn error_fields(body: &Value) -> Vec<String> {
    body["fields"]
        .as_object()
        .map(|fields| fields.keys().cloned().collect())
        .unwrap_or_default()
}

pub const BOUNDARY: &str = "bugtracker-test-boundary";

/// Encodes text fields plus an optional `(field, file name, bytes)` file part.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
