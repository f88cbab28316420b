use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::Service;
use translator_server::config::Config;
use translator_server::{build_router, AppState};
use uuid::Uuid;

const BOUNDARY: &str = "test-boundary";

fn multipart_body(field: &str, file_name: &str, content_type: &str, content: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    )
}

fn app_with_temp_dir() -> (Router, String) {
    let upload_dir = std::env::temp_dir()
        .join(format!("translator-uploads-{}", Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    let config = Config {
        upload_dir: upload_dir.clone(),
        ..Config::default()
    };
    (build_router(AppState::new(config)), upload_dir)
}

async fn upload(app: &mut Router, body: String) -> axum::response::Response {
    app.call(
        Request::builder()
            .method("POST")
            .uri("/api/v1/files/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_upload_allowed_file() {
    let (mut app, upload_dir) = app_with_temp_dir();

    let body = multipart_body("file", "notes.txt", "text/plain", "hello translated world");
    let response = upload(&mut app, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let value = read_json(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["fileName"], "notes.txt");
    assert_eq!(value["data"]["contentType"], "text/plain");
    assert!(value["data"]["size"].as_u64().unwrap() > 0);
    assert!(value["data"]["id"].as_str().is_some());

    // The stored file is served back through the download route.
    let response = app
        .call(
            Request::builder()
                .method("GET")
                .uri("/api/v1/files/download/notes.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let served = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&served[..], &b"hello translated world"[..]);

    let _ = std::fs::remove_dir_all(&upload_dir);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let (mut app, upload_dir) = app_with_temp_dir();

    let body = multipart_body("file", "payload.exe", "application/octet-stream", "MZ");
    let response = upload(&mut app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value = read_json(response).await;
    assert_eq!(value["code"], 400);
    assert!(value["error"].as_str().unwrap().contains("exe"));
    assert!(value["details"]["allowedExtensions"].is_array());

    let _ = std::fs::remove_dir_all(&upload_dir);
}

#[tokio::test]
async fn test_upload_rejects_mismatched_content_type() {
    let (mut app, upload_dir) = app_with_temp_dir();

    // Allowed extension, but the declared type is an executable.
    let body = multipart_body("file", "notes.txt", "application/x-msdownload", "MZ");
    let response = upload(&mut app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value = read_json(response).await;
    assert_eq!(value["code"], 400);
    assert!(value["error"]
        .as_str()
        .unwrap()
        .contains("application/x-msdownload"));
    assert!(value["details"]["allowedExtensions"].is_array());

    let _ = std::fs::remove_dir_all(&upload_dir);
}

#[tokio::test]
async fn test_upload_rejects_non_multipart_body() {
    let (mut app, upload_dir) = app_with_temp_dir();

    let response = app
        .call(
            Request::builder()
                .method("POST")
                .uri("/api/v1/files/upload")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value = read_json(response).await;
    assert_eq!(value["code"], 400);
    assert!(value["error"].as_str().is_some());
    assert!(value["timestamp"].as_str().is_some());

    let _ = std::fs::remove_dir_all(&upload_dir);
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let (mut app, upload_dir) = app_with_temp_dir();

    let body = multipart_body("attachment", "notes.txt", "text/plain", "hello");
    let response = upload(&mut app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value = read_json(response).await;
    assert!(value["error"]
        .as_str()
        .unwrap()
        .contains("\"file\" is required"));

    let _ = std::fs::remove_dir_all(&upload_dir);
}
