mod common;

use axum::http::StatusCode;
use bugtracker::model::Role;
use common::{Actor, TestApp, error_fields, multipart_body};
use serde_json::{Value, json};

struct Fixture {
    app: TestApp,
    staff: Actor,
    reporter: Actor,
    assignee: Actor,
    outsider: Actor,
    project: i64,
    department: i64,
}

async fn fixture() -> Fixture {
    fixture_in(TestApp::new()).await
}

async fn fixture_in(app: TestApp) -> Fixture {
    let staff = app.staff().await;
    let reporter = app.seed_user("reporter", Role::Tester, false).await;
    let assignee = app.seed_user("assignee", Role::Developer, false).await;
    let outsider = app.seed_user("outsider", Role::Manager, false).await;
    let department = app.department_for(&staff, &reporter.user).await;
    let project = app.project_by(&staff, "Portal").await;
    Fixture {
        app,
        staff,
        reporter,
        assignee,
        outsider,
        project,
        department,
    }
}

fn bug_payload(fx: &Fixture) -> Value {
    json!({
        "bug_type": "defect",
        "bug_description": "Login button does nothing",
        "url_bug": "https://portal.example.com/login",
        "bug_priority": "high",
        "bug_severity": "major",
        "project": fx.project,
        "department": fx.department,
        "assigned_to": "assignee"
    })
}

async fn report(fx: &Fixture) -> Value {
    let (status, bug) = fx.app.post("/api/bugs/", &fx.reporter, bug_payload(fx)).await;
    assert_eq!(status, StatusCode::CREATED, "{bug}");
    bug
}

#[tokio::test]
async fn reporting_records_creator_and_defaults() {
    let fx = fixture().await;
    let bug = report(&fx).await;
    assert_eq!(bug["created_by"], "reporter");
    assert_eq!(bug["assigned_to"], "assignee");
    assert_eq!(bug["status"], "open");
    assert_eq!(bug["is_current_project"], true);
    assert!(bug["image"].is_null());
    assert!(bug["report_date"].is_string());
    assert!(bug.get("created_by_id").is_none());
}

#[tokio::test]
async fn reporting_validates_payload() {
    let fx = fixture().await;

    let (status, body) = fx.app.post("/api/bugs/", &fx.reporter, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_fields(&body),
        vec![
            "bug_description",
            "bug_priority",
            "bug_severity",
            "bug_type",
            "department",
            "project"
        ]
    );

    let mut payload = bug_payload(&fx);
    payload["assigned_to"] = json!("nobody");
    payload["project"] = json!(4040);
    payload["url_bug"] = json!("not a url");
    payload["image"] = json!("../../etc/passwd");
    let (status, body) = fx.app.post("/api/bugs/", &fx.reporter, payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["assigned_to"][0],
        "Object with username=nobody does not exist."
    );
    assert_eq!(
        body["fields"]["project"][0],
        "Invalid pk \"4040\" - object does not exist."
    );
    assert_eq!(body["fields"]["url_bug"][0], "Enter a valid URL.");
    assert!(body["fields"]["image"].is_array());

    // created_by is not writable.
    let mut payload = bug_payload(&fx);
    payload["created_by"] = json!("assignee");
    let (status, _) = fx.app.post("/api/bugs/", &fx.reporter, payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_shows_only_related_bugs_to_non_staff() {
    let fx = fixture().await;
    report(&fx).await;
    let mut own = bug_payload(&fx);
    own["assigned_to"] = Value::Null;
    let (status, _) = fx.app.post("/api/bugs/", &fx.outsider, own).await;
    assert_eq!(status, StatusCode::CREATED);

    let count = |body: &Value| body.as_array().map(Vec::len);
    let (_, all) = fx.app.get("/api/bugs/", &fx.staff).await;
    assert_eq!(count(&all), Some(2));
    let (_, reporter) = fx.app.get("/api/bugs/", &fx.reporter).await;
    assert_eq!(count(&reporter), Some(1));
    let (_, assignee) = fx.app.get("/api/bugs/", &fx.assignee).await;
    assert_eq!(count(&assignee), Some(1));
    assert_eq!(assignee[0]["created_by"], "reporter");
    let (_, outsider) = fx.app.get("/api/bugs/", &fx.outsider).await;
    assert_eq!(count(&outsider), Some(1));
    assert_eq!(outsider[0]["created_by"], "outsider");
}

#[tokio::test]
async fn detail_access_rules() {
    let fx = fixture().await;
    let bug = report(&fx).await;
    let uri = format!("/api/bugs/{}/", bug["id"]);

    for actor in [&fx.reporter, &fx.assignee, &fx.staff] {
        let (status, _) = fx.app.get(&uri, actor).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = fx.app.get(&uri, &fx.outsider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = fx.app.get("/api/bugs/31337/", &fx.outsider).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = fx
        .app
        .patch(&uri, &fx.assignee, json!({"bug_priority": "low"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fx
        .app
        .patch(&uri, &fx.reporter, json!({"bug_priority": "low", "assigned_to": null}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bug_priority"], "low");
    assert!(body["assigned_to"].is_null());
    assert_eq!(body["created_by"], "reporter");
    assert_eq!(body["bug_description"], "Login button does nothing");
}

#[tokio::test]
async fn replace_requires_full_payload() {
    let fx = fixture().await;
    let bug = report(&fx).await;
    let uri = format!("/api/bugs/{}/", bug["id"]);

    let (status, body) = fx
        .app
        .put(&uri, &fx.reporter, json!({"bug_type": "issue"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_fields(&body).contains(&"bug_description".to_string()));

    let mut payload = bug_payload(&fx);
    payload["bug_type"] = json!("issue");
    payload["image"] = json!("bugs/login.png");
    let (status, body) = fx.app.put(&uri, &fx.reporter, payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bug_type"], "issue");
    assert_eq!(body["image"], "bugs/login.png");
}

#[tokio::test]
async fn status_updates_by_reporter_or_staff() {
    let fx = fixture().await;
    let bug = report(&fx).await;
    let uri = format!("/api/bugs/{}/status/", bug["id"]);

    let (status, _) = fx
        .app
        .patch(&uri, &fx.assignee, json!({"status": "closed"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fx
        .app
        .patch(&uri, &fx.reporter, json!({"status": "in_progress"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");

    let (status, body) = fx
        .app
        .patch(&uri, &fx.staff, json!({"status": "resolved"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["status"][0], "\"resolved\" is not a valid choice.");
}

#[tokio::test]
async fn delete_is_staff_only() {
    let fx = fixture().await;
    let bug = report(&fx).await;
    let uri = format!("/api/bugs/{}/", bug["id"]);

    let (status, _) = fx.app.delete(&uri, &fx.reporter).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = fx.app.delete(&uri, &fx.staff).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = fx.app.delete(&uri, &fx.staff).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_assignee_clears_assignment() {
    let fx = fixture().await;
    let bug = report(&fx).await;
    let (status, _) = fx
        .app
        .delete(&format!("/api/accounts/users/{}/", fx.assignee.user.id), &fx.staff)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = fx.app.get(&format!("/api/bugs/{}/", bug["id"]), &fx.reporter).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["assigned_to"].is_null());
}

#[tokio::test]
async fn unsupported_method_is_rejected() {
    let fx = fixture().await;
    let (status, _) = fx
        .app
        .send("DELETE", "/api/bugs/", Some(&fx.staff.token), None)
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";
const GIF: &[u8] = b"GIF89a\x01\0\x01\0\x80\0\0";

fn media_root() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("bugtracker-bugs-{}", uuid::Uuid::new_v4()))
}

fn form_fields(fx: &Fixture) -> Vec<(&'static str, String)> {
    vec![
        ("bug_type", "bug".to_string()),
        ("bug_description", "Checkout page renders blank".to_string()),
        ("bug_priority", "medium".to_string()),
        ("bug_severity", "normal".to_string()),
        ("project", fx.project.to_string()),
        ("department", fx.department.to_string()),
        ("is_current_project", "false".to_string()),
    ]
}

fn as_refs<'a>(fields: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    fields.iter().map(|(name, value)| (*name, value.as_str())).collect()
}

#[tokio::test]
async fn uploaded_image_is_served_from_media() {
    let root = media_root();
    let fx = fixture_in(TestApp::with_media_root(root.clone())).await;
    let fields = form_fields(&fx);
    let body = multipart_body(&as_refs(&fields), Some(("image", "checkout.png", PNG)));

    let (status, bug) = fx
        .app
        .send_multipart("POST", "/api/bugs/", &fx.reporter, body)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{bug}");
    assert_eq!(bug["is_current_project"], false);
    assert_eq!(bug["created_by"], "reporter");
    let image = bug["image"].as_str().expect("image path").to_string();
    assert!(image.starts_with("bugs/") && image.ends_with(".png"), "{image}");

    let (status, bytes) = fx.app.fetch(&format!("/media/{image}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, PNG);

    // A new upload on PATCH replaces the stored path.
    let body = multipart_body(&[("bug_priority", "high")], Some(("image", "again.gif", GIF)));
    let uri = format!("/api/bugs/{}/", bug["id"]);
    let (status, updated) = fx.app.send_multipart("PATCH", &uri, &fx.reporter, body).await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["bug_priority"], "high");
    let replaced = updated["image"].as_str().expect("image path");
    assert!(replaced.ends_with(".gif"));
    let (status, bytes) = fx.app.fetch(&format!("/media/{replaced}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, GIF);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let root = media_root();
    let fx = fixture_in(TestApp::with_media_root(root.clone())).await;
    let fields = form_fields(&fx);

    let body = multipart_body(
        &as_refs(&fields),
        Some(("image", "notes.png", b"just some text".as_slice())),
    );
    let (status, body) = fx
        .app
        .send_multipart("POST", "/api/bugs/", &fx.reporter, body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["image"]);
    assert!(!root.join("bugs").exists());

    let body = multipart_body(&as_refs(&fields), Some(("image", "empty.png", b"".as_slice())));
    let (status, body) = fx
        .app
        .send_multipart("POST", "/api/bugs/", &fx.reporter, body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["image"][0], "The submitted file is empty.");

    let body = multipart_body(&[("project", "not-a-number")], None);
    let (status, body) = fx
        .app
        .send_multipart("POST", "/api/bugs/", &fx.reporter, body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let _ = std::fs::remove_dir_all(root);
}
