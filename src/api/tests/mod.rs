use super::*;
use crate::supervisor::test_helpers::{SUCCESS_BODY, TestEnv, test_env, wait_for_terminal};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a supervisor around a fake tool, wrapped in Arc
async fn create_test_supervisor(body: &str) -> (Arc<Supervisor>, TestEnv) {
    let env = test_env(body);
    let supervisor = crate::supervisor::test_helpers::create_test_supervisor(&env).await;
    (Arc::new(supervisor), env)
}

/// Router over a fresh supervisor using the supervisor's own configuration
async fn create_test_app(body: &str) -> (Router, Arc<Supervisor>, TestEnv) {
    let (supervisor, env) = create_test_supervisor(body).await;
    let app = create_router(supervisor.clone(), supervisor.get_config());
    (app, supervisor, env)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown() {
    let (supervisor, _env) = create_test_supervisor(SUCCESS_BODY).await;

    let mut config = (*supervisor.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { start_api_server(supervisor, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    supervisor.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _supervisor, _env) = create_test_app("").await;

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (supervisor, _env) = create_test_supervisor("").await;
    let mut config = (*supervisor.get_config()).clone();
    config.server.api.cors_origins = vec!["http://localhost:3000".to_string()];
    let app = create_router(supervisor, Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_cors_disabled() {
    let (supervisor, _env) = create_test_supervisor("").await;
    let mut config = (*supervisor.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(supervisor, Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let (app, _supervisor, _env) = create_test_app("").await;

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_swagger_ui_disabled() {
    let (supervisor, _env) = create_test_supervisor("").await;
    let mut config = (*supervisor.get_config()).clone();
    config.server.api.swagger_ui = false;
    let app = create_router(supervisor, Arc::new(config));

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_ui_is_served_when_configured() {
    let (supervisor, _env) = create_test_supervisor("").await;
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<html>ui</html>").unwrap();
    std::fs::write(static_dir.path().join("app.js"), "console.log(1)").unwrap();

    let mut config = (*supervisor.get_config()).clone();
    config.server.api.static_dir = Some(static_dir.path().to_path_buf());
    let app = create_router(supervisor, Arc::new(config));

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"<html>ui</html>");

    let response = app.oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_no_static_ui_by_default() {
    let (app, _supervisor, _env) = create_test_app("").await;

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
