mod common;

use axum::http::StatusCode;
use bugtracker::model::Role;
use common::{TestApp, error_fields};
use serde_json::json;

#[tokio::test]
async fn managers_run_department_crud() {
    let app = TestApp::new();
    let manager = app.seed_user("boss", Role::Manager, false).await;
    let dev = app.seed_user("dev", Role::Developer, false).await;

    let (status, created) = app
        .post(
            "/api/departments/",
            &manager,
            json!({"user": dev.user.id, "dept": "python", "role": "developer"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["user"], dev.user.id);
    assert_eq!(created["dept"], "python");
    let uri = format!("/api/departments/{}/", created["id"]);

    let (status, list) = app.get("/api/departments", &manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, updated) = app.patch(&uri, &manager, json!({"role": "team_lead"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["role"], "team_lead");
    assert_eq!(updated["dept"], "python");

    let (status, replaced) = app
        .put(
            &uri,
            &manager,
            json!({"user": manager.user.id, "dept": "devops", "role": "manager"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["user"], manager.user.id);

    let (status, _) = app.delete(&uri, &manager).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &manager).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn other_roles_are_forbidden() {
    let app = TestApp::new();
    let staff = app.staff().await;
    let lead = app.seed_user("lead", Role::TeamLead, false).await;
    let id = app.department_for(&staff, &lead.user).await;

    let (status, _) = app.get("/api/departments/", &lead).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post(
            "/api/departments/",
            &lead,
            json!({"user": lead.user.id, "dept": "java", "role": "developer"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&format!("/api/departments/{id}/"), &lead).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_validates_references_and_choices() {
    let app = TestApp::new();
    let staff = app.staff().await;

    let (status, body) = app.post("/api/departments/", &staff, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["dept", "role", "user"]);

    let (status, body) = app
        .post(
            "/api/departments/",
            &staff,
            json!({"user": 4242, "dept": "cobol", "role": "developer"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["user"][0],
        "Invalid pk \"4242\" - object does not exist."
    );
    assert_eq!(body["fields"]["dept"][0], "\"cobol\" is not a valid choice.");
}

#[tokio::test]
async fn missing_department_is_not_found() {
    let app = TestApp::new();
    let staff = app.staff().await;
    let (status, body) = app.delete("/api/departments/77/", &staff).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    let (status, _) = app
        .patch("/api/departments/77/", &staff, json!({"role": "tester"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
