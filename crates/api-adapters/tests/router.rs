use std::sync::Arc;

use api_adapters::{build_router, AppState};
use auth_adapters::{Argon2Hasher, JwtCodec};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use services::{Ports, ServiceOptions, Services};
use storage_adapters::{InMemoryStore, LocalAttachmentStorage};
use tower::ServiceExt;

struct Harness {
    router: Router,
    _uploads: tempfile::TempDir,
}

fn harness_with(
    options: ServiceOptions,
    configure: impl FnOnce(AppState) -> AppState,
) -> Harness {
    let uploads = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(InMemoryStore::new());
    let ports = Ports {
        users: store.clone(),
        departments: store.clone(),
        posts: store.clone(),
        comments: store.clone(),
        notices: store.clone(),
        revocations: store,
        hasher: Arc::new(Argon2Hasher::with_params(8, 1, 1).expect("params")),
        tokens: Arc::new(JwtCodec::new(&SecretString::from("router-test-secret".to_string()))),
        attachments: Arc::new(LocalAttachmentStorage::new(uploads.path())),
    };
    let services = Services::new(ports, options);
    Harness {
        router: build_router(configure(AppState::new(services))),
        _uploads: uploads,
    }
}

fn harness() -> Harness {
    harness_with(ServiceOptions::default(), |state| state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("response")
}

async fn register(router: &Router, email: &str, role: &str, department_id: Option<i64>) -> Value {
    let response = send(
        router,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "email": email,
                "username": email.split('@').next().unwrap(),
                "password": "password123",
                "role": role,
                "department_id": department_id,
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

async fn login(router: &Router, identifier: &str) -> String {
    let response = send(
        router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "identifier": identifier, "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await["data"]["token"]
        .as_str()
        .expect("token")
        .to_string()
}

async fn admin_with_department(router: &Router, name: &str) -> (String, i64) {
    register(router, "root@campus.edu", "ADMIN", None).await;
    let admin = login(router, "root@campus.edu").await;
    let response = send(
        router,
        json_request("POST", "/api/departments", Some(&admin), json!({ "name": name })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json(response).await["data"]["id"].as_i64().expect("id");
    (admin, id)
}

#[tokio::test]
async fn health_is_public() {
    let h = harness();
    let response = send(&h.router, empty_request("GET", "/api/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn department_list_is_public_but_posts_are_not() {
    let h = harness();
    let response = send(&h.router, empty_request("GET", "/api/departments", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&h.router, empty_request("GET", "/api/posts", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "authentication required");
}

#[tokio::test]
async fn registration_reports_every_invalid_field() {
    let h = harness();
    let response = send(
        &h.router,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "email": "nope", "password": "short", "role": "JANITOR" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["message"], "validation failed");
    assert!(body["errors"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request_envelope() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&h.router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["success"], false);
}

#[tokio::test]
async fn login_me_and_logout() {
    let h = harness();
    let (_, dept) = admin_with_department(&h.router, "Physics").await;
    register(&h.router, "ana@campus.edu", "STUDENT", Some(dept)).await;
    let token = login(&h.router, "ana").await;

    let response = send(&h.router, empty_request("GET", "/api/auth/me", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["email"], "ana@campus.edu");
    assert_eq!(body["data"]["role"], "STUDENT");
    assert!(body["data"].get("password_hash").is_none());

    let response = send(&h.router, empty_request("POST", "/api/auth/logout", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&h.router, empty_request("GET", "/api/auth/me", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "token invalidated");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let h = harness();
    register(&h.router, "root@campus.edu", "ADMIN", None).await;
    let response = send(
        &h.router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "root@campus.edu", "password": "not-the-password" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_department_names_conflict() {
    let h = harness();
    let (admin, _) = admin_with_department(&h.router, "Math").await;
    let response = send(
        &h.router,
        json_request("POST", "/api/departments", Some(&admin), json!({ "name": "math" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn students_cannot_manage_departments_and_denials_are_counted() {
    let h = harness();
    let (_, dept) = admin_with_department(&h.router, "Biology").await;
    register(&h.router, "ben@campus.edu", "STUDENT", Some(dept)).await;
    let student = login(&h.router, "ben").await;

    let response = send(
        &h.router,
        empty_request("DELETE", &format!("/api/departments/{dept}"), Some(&student)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&h.router, empty_request("GET", "/api/metrics", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(
        r#"campus_board_access_denied_total{method="DELETE",route="/api/departments/{id}"} 1"#
    ));
}

#[tokio::test]
async fn non_numeric_ids_are_rejected() {
    let h = harness();
    let response = send(&h.router, empty_request("GET", "/api/posts/abc/comments", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["message"], "id must be an integer");
}

#[tokio::test]
async fn unknown_routes_get_an_envelope() {
    let h = harness();
    let response = send(&h.router, empty_request("GET", "/api/nowhere", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["success"], false);
}

#[tokio::test]
async fn post_defaults_to_the_authors_department() {
    let h = harness();
    let (_, dept) = admin_with_department(&h.router, "Chemistry").await;
    register(&h.router, "cy@campus.edu", "STUDENT", Some(dept)).await;
    let token = login(&h.router, "cy").await;

    let response = send(
        &h.router,
        json_request("POST", "/api/posts", Some(&token), json!({ "content": "lab at 3" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["data"]["department_id"], dept);

    let response = send(&h.router, empty_request("GET", "/api/posts/mine", Some(&token))).await;
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

fn multipart_notice(token: &str, title: &str, file: Option<(&str, &str)>) -> Request<Body> {
    let boundary = "campus-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\nBring a pencil\r\n"
    );
    if let Some((name, contents)) = file {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"attachment\"; filename=\"{name}\"\r\n\
             Content-Type: text/plain\r\n\r\n{contents}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    Request::builder()
        .method("POST")
        .uri("/api/notices")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn notices_upload_and_download_attachments() {
    let h = harness();
    let (_, dept) = admin_with_department(&h.router, "History").await;
    register(&h.router, "tia@campus.edu", "TEACHER", Some(dept)).await;
    register(&h.router, "sam@campus.edu", "STUDENT", Some(dept)).await;
    let teacher = login(&h.router, "tia").await;
    let student = login(&h.router, "sam").await;

    let response = send(
        &h.router,
        multipart_notice(&teacher, "Exam", Some(("plan.txt", "chapter 4"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    let id = body["data"]["id"].as_i64().unwrap();
    let attachment = body["data"]["attachment"].as_str().unwrap().to_string();
    assert!(attachment.ends_with(".txt"));
    assert_ne!(attachment, "plan.txt");

    let response = send(&h.router, empty_request("GET", "/api/notices", Some(&student))).await;
    assert_eq!(read_json(response).await["data"].as_array().unwrap().len(), 1);

    let response = send(
        &h.router,
        empty_request("GET", &format!("/api/notices/{id}/attachment"), Some(&student)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plan.txt\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"chapter 4");
}

#[tokio::test]
async fn downloads_keep_the_uploaded_name_and_type() {
    let h = harness();
    let (_, dept) = admin_with_department(&h.router, "Music").await;
    register(&h.router, "mo@campus.edu", "TEACHER", Some(dept)).await;
    let teacher = login(&h.router, "mo").await;

    let response = send(
        &h.router,
        multipart_notice(&teacher, "Rehearsal", Some(("README", "bring sheet music"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json(response).await["data"]["id"].as_i64().unwrap();

    let response = send(
        &h.router,
        empty_request("GET", &format!("/api/notices/{id}/attachment"), Some(&teacher)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"README\""
    );
}

#[tokio::test]
async fn students_cannot_publish_notices() {
    let h = harness();
    let (_, dept) = admin_with_department(&h.router, "Art").await;
    register(&h.router, "zed@campus.edu", "STUDENT", Some(dept)).await;
    let student = login(&h.router, "zed").await;

    let response = send(&h.router, multipart_notice(&student, "Party", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn oversized_uploads_are_refused() {
    let options = ServiceOptions {
        max_attachment_bytes: 4,
        ..ServiceOptions::default()
    };
    let h = harness_with(options, |state| state.with_max_upload_bytes(4));
    let (_, dept) = admin_with_department(&h.router, "Music").await;
    register(&h.router, "mo@campus.edu", "TEACHER", Some(dept)).await;
    let teacher = login(&h.router, "mo").await;

    let response = send(
        &h.router,
        multipart_notice(&teacher, "Recital", Some(("score.txt", "far too long for four bytes"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["errors"][0], "attachment must be at most 4 bytes");

    let response = send(&h.router, empty_request("GET", "/api/notices/mine", Some(&teacher))).await;
    assert!(read_json(response).await["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let h = harness();
    let response = send(&h.router, empty_request("GET", "/api/health", None)).await;
    assert!(response.headers().contains_key("x-request-id"));
}
