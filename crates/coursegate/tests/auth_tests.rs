use coursegate::integrations::VerifiedIdentity;
use coursegate::testing::TEST_PASSWORD;
use coursegate::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_signup_success() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/api/auth/signup",
            None,
            json!({
                "email": "Test@Example.com",
                "username": "testuser",
                "password": "password123"
            }),
        )
        .await;

    assert_eq!(res.status, 201);
    assert_eq!(res.json()["success"], true);

    let data = res.data();
    assert!(data["access_token"].is_string());
    assert_eq!(data["user"]["email"], "test@example.com");
    assert_eq!(data["user"]["username"], "testuser");
    assert!(data["user"]["password_hash"].is_null());

    let welcome = app.emails.wait_for("test@example.com", "Welcome").await;
    assert!(welcome.is_some());
}

#[tokio::test]
async fn test_signup_duplicate_email() {
    let app = TestApp::new().await;
    app.signup("dup@example.com", "user1").await;

    let res = app
        .post_json(
            "/api/auth/signup",
            None,
            json!({
                "email": "dup@example.com",
                "username": "user2",
                "password": "password123"
            }),
        )
        .await;

    assert_eq!(res.status, 409);
    assert_eq!(res.json()["success"], false);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/api/auth/signup",
            None,
            json!({ "email": "not-an-email", "username": "ab", "password": "short" }),
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.error_code().as_deref(), Some("VALIDATION_ERROR"));

    let res = app
        .post_json("/api/auth/signup", None, json!({ "email": "x@example.com" }))
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new().await;
    app.signup("login@example.com", "loginuser").await;

    let res = app
        .post_json(
            "/api/auth/login",
            None,
            json!({ "email": "login@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(res.status, 200);
    let token = res.data()["access_token"].as_str().unwrap().to_string();

    let res = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data()["username"], "loginuser");
    assert_eq!(res.data()["role"], "user");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new().await;
    app.signup("wrong@example.com", "wrongpw").await;

    let res = app
        .post_json(
            "/api/auth/login",
            None,
            json!({ "email": "wrong@example.com", "password": "nope-nope" }),
        )
        .await;
    assert_eq!(res.status, 401);

    let res = app
        .post_json(
            "/api/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": "nope-nope" }),
        )
        .await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::new().await;

    assert_eq!(app.get("/api/auth/me", None).await.status, 401);
    assert_eq!(app.get("/api/auth/me", Some("garbage")).await.status, 401);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new().await;
    app.signup("reset@example.com", "resetme").await;

    let res = app
        .post_json(
            "/api/auth/password-reset/request",
            None,
            json!({ "email": "reset@example.com" }),
        )
        .await;
    assert_eq!(res.status, 200);

    let email = app
        .emails
        .wait_for("reset@example.com", "password reset")
        .await
        .expect("reset email");
    let marker = "letter-spacing:6px\"><b>";
    let start = email.html.find(marker).expect("code in email") + marker.len();
    let code: String = email.html[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    assert!(!code.is_empty());

    let res = app
        .post_json(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "email": "reset@example.com", "code": "000000x", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(res.status, 400);

    let res = app
        .post_json(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "email": "reset@example.com", "code": code, "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text());

    let res = app
        .post_json(
            "/api/auth/login",
            None,
            json!({ "email": "reset@example.com", "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(res.status, 200);

    // Codes are single use.
    let res = app
        .post_json(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "email": "reset@example.com", "code": code, "new_password": "another-pass" }),
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_password_reset_request_does_not_reveal_accounts() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/api/auth/password-reset/request",
            None,
            json!({ "email": "ghost@example.com" }),
        )
        .await;
    assert_eq!(res.status, 200);
    assert!(app.emails.sent().is_empty());
}

#[tokio::test]
async fn test_google_login_creates_then_reuses_account() {
    let app = TestApp::new().await;
    app.identity.register(
        "good-code",
        VerifiedIdentity {
            subject: "1234567890".to_string(),
            email: "oauth@example.com".to_string(),
            name: Some("OAuth Person".to_string()),
        },
    );

    let res = app
        .post_json("/api/auth/google", None, json!({ "code": "good-code" }))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    let first_id = res.data()["user"]["id"].clone();
    assert_eq!(res.data()["user"]["username"], "oauth");

    let res = app
        .post_json("/api/auth/google", None, json!({ "code": "good-code" }))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data()["user"]["id"], first_id);

    let res = app
        .post_json("/api/auth/google", None, json!({ "code": "bad-code" }))
        .await;
    assert_eq!(res.status, 400);
}
