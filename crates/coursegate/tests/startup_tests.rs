use coursegate::testing::test_config;
use coursegate::{App, TestApp};

#[tokio::test]
async fn test_health_and_openapi_document() {
    let app = TestApp::new().await;

    let res = app.get("/health", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["status"], "ok");

    let res = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(res.status, 200);
    let doc = res.json();
    assert!(doc["paths"]["/api/media/secure-media/video"].is_object());
    assert!(doc["paths"]["/api/chat/messages"].is_object());
}

#[tokio::test]
async fn test_development_app_runs_beside_a_test_app() {
    let dev = TestApp::configured(|c| c.environment = "development".to_string()).await;
    let app = TestApp::new().await;

    let res = dev.get("/api/courses/9999", None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.message().as_deref(), Some("Not found: Course not found"));

    let res = app.get("/api/courses/9999", None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.message().as_deref(), Some("Not found: Course not found"));
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_unusable_redis_url_fails_startup() {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = test_config(&uploads.path().to_string_lossy());
    config.redis_url = Some("nope://cache.invalid".to_string());

    assert!(App::with_config(config).await.is_err());
}

#[cfg(not(feature = "redis"))]
#[tokio::test]
async fn test_redis_url_is_ignored_without_the_feature() {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = test_config(&uploads.path().to_string_lossy());
    config.redis_url = Some("redis://127.0.0.1:6379".to_string());

    let app = App::with_config(config).await.unwrap();
    assert_eq!(app.cache.len().await, Some(0));
}
