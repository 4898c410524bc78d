//! Integration test harness.
//!
//! [`TestApp`] runs the real router on an ephemeral port against an in-memory
//! SQLite database, with fake payment, email and identity collaborators.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn signup_works() {
//!     let app = TestApp::new().await;
//!     let res = app
//!         .post_json("/api/auth/signup", None, json!({"email": "a@b.com", "username": "bob", "password": "secret123"}))
//!         .await;
//!     assert_eq!(res.status, 201);
//! }
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::auth::Capability;
use crate::config::{Config, IntegrationsConfig, MediaConfig};
use crate::controllers::AppState;
use crate::error::ApiError;
use crate::integrations::{
    EmailMessage, EmailSender, IdentityProvider, OrderRequest, OrderStatus, PaymentGateway,
    PaymentOrder, VerifiedIdentity,
};
use crate::models::enrollment::EnrollmentSource;
use crate::models::user::Role;
use crate::models::{content_item, course, user};
use crate::services::enrollment::grant_enrollment;

pub const TEST_PASSWORD: &str = "password123";

/// A running server plus direct handles on its database and collaborators.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub db: DatabaseConnection,
    pub config: Config,
    pub state: AppState,
    pub payments: Arc<FakePaymentGateway>,
    pub emails: Arc<RecordingEmailSender>,
    pub identity: Arc<FakeIdentityProvider>,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::configured(|_| {}).await
    }

    /// Start with the default test config after `customize` has adjusted it.
    pub async fn configured(customize: impl FnOnce(&mut Config)) -> Self {
        let uploads = tempfile::tempdir().expect("Failed to create upload dir");
        let mut config = test_config(&uploads.path().to_string_lossy());
        customize(&mut config);

        let payments = Arc::new(FakePaymentGateway::default());
        let emails = Arc::new(RecordingEmailSender::default());
        let identity = Arc::new(FakeIdentityProvider::default());

        let app = crate::App::with_config(config.clone())
            .await
            .expect("Failed to create test app")
            .with_payments(payments.clone())
            .with_email(emails.clone())
            .with_identity(identity.clone());

        let router = app.router();
        let state = app.state().clone();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Test server failed");
        });

        // Redirects are asserted on, never followed.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        TestApp {
            addr,
            client,
            db: app.db,
            config,
            state,
            payments,
            emails,
            identity,
            _uploads: uploads,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    // ── Requests ──

    fn request(&self, method: reqwest::Method, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req
    }

    pub async fn send(&self, req: reqwest::RequestBuilder) -> TestResponse {
        let res = req.send().await.expect("Request failed");
        TestResponse::from_response(res).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(self.request(reqwest::Method::GET, path, token)).await
    }

    /// GET with extra headers, e.g. `Range`.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut req = self.request(reqwest::Method::GET, path, None);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        self.send(req).await
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(self.request(reqwest::Method::POST, path, token).json(&body))
            .await
    }

    pub async fn patch_json(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(self.request(reqwest::Method::PATCH, path, token).json(&body))
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(self.request(reqwest::Method::DELETE, path, token))
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        token: Option<&str>,
        form: reqwest::multipart::Form,
    ) -> TestResponse {
        self.send(self.request(reqwest::Method::POST, path, token).multipart(form))
            .await
    }

    // ── Fixtures ──

    /// Sign up through the API. Returns the session token and the user id.
    pub async fn signup(&self, email: &str, username: &str) -> (String, i32) {
        let res = self
            .post_json(
                "/api/auth/signup",
                None,
                serde_json::json!({
                    "email": email,
                    "username": username,
                    "password": TEST_PASSWORD,
                }),
            )
            .await;
        assert_eq!(res.status, 201, "Signup failed: {}", res.text());

        let data = res.data();
        let token = data["access_token"].as_str().expect("access_token").to_string();
        let id = data["user"]["id"].as_i64().expect("user id") as i32;
        (token, id)
    }

    /// Sign up and promote to admin.
    pub async fn admin(&self, email: &str, username: &str) -> (String, i32) {
        let (token, id) = self.signup(email, username).await;
        user::Entity::update_many()
            .col_expr(user::Column::Role, Expr::value(Role::Admin.as_str()))
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .expect("Failed to promote admin");
        (token, id)
    }

    pub async fn create_course(&self, title: &str, price: i64) -> course::Model {
        let now = Utc::now().naive_utc();
        course::ActiveModel {
            title: Set(title.to_string()),
            slug: Set(course::slugify(title)),
            description: Set(String::new()),
            price: Set(price),
            is_active: Set(true),
            enrollment_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to create course")
    }

    /// Content item whose video is an uploaded file holding `bytes`.
    pub async fn uploaded_video(
        &self,
        course_id: i32,
        file_name: &str,
        bytes: &[u8],
    ) -> content_item::Model {
        let stored = self.write_upload(file_name, bytes).await;
        let mut item = blank_item(course_id, "video", "Uploaded video");
        item.video_file_path = Set(Some(stored));
        item.video_file_name = Set(Some(file_name.to_string()));
        item.video_file_size = Set(Some(bytes.len() as i64));
        item.video_mime_type = Set(Some("video/mp4".to_string()));
        item.insert(&self.db).await.expect("Failed to create content")
    }

    /// Content item whose document is an uploaded file holding `bytes`.
    pub async fn uploaded_document(
        &self,
        course_id: i32,
        file_name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> content_item::Model {
        let stored = self.write_upload(file_name, bytes).await;
        let mut item = blank_item(course_id, "document", "Uploaded document");
        item.document_file_path = Set(Some(stored));
        item.document_file_name = Set(Some(file_name.to_string()));
        item.document_file_size = Set(Some(bytes.len() as i64));
        item.document_mime_type = Set(Some(mime.to_string()));
        item.insert(&self.db).await.expect("Failed to create content")
    }

    /// Content item pointing at an externally hosted video.
    pub async fn external_video(&self, course_id: i32, url: &str, free_preview: bool) -> content_item::Model {
        let mut item = blank_item(course_id, "video", "External video");
        item.video_url = Set(Some(url.to_string()));
        item.is_free_preview = Set(free_preview);
        item.insert(&self.db).await.expect("Failed to create content")
    }

    async fn write_upload(&self, file_name: &str, bytes: &[u8]) -> String {
        let ext = file_name.rsplit('.').next().unwrap_or("bin");
        let stored = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        tokio::fs::write(self.state.storage.root().join(&stored), bytes)
            .await
            .expect("Failed to write upload");
        stored
    }

    /// Completed enrollment without going through payment.
    pub async fn enroll(&self, user_id: i32, course_id: i32) {
        grant_enrollment(&self.db, user_id, course_id, EnrollmentSource::Free)
            .await
            .expect("Failed to enroll");
    }

    pub fn media_token(&self, user_id: i32, content_id: i32, capability: Capability) -> String {
        self.state
            .media_tokens
            .issue(user_id, content_id, capability)
            .expect("Failed to issue media token")
            .token
    }
}

fn blank_item(course_id: i32, content_type: &str, title: &str) -> content_item::ActiveModel {
    let now = Utc::now().naive_utc();
    content_item::ActiveModel {
        course_id: Set(course_id),
        title: Set(title.to_string()),
        description: Set(None),
        content_type: Set(content_type.to_string()),
        sort_order: Set(0),
        is_free_preview: Set(false),
        is_active: Set(true),
        video_url: Set(None),
        video_file_path: Set(None),
        video_file_name: Set(None),
        video_file_size: Set(None),
        video_mime_type: Set(None),
        document_url: Set(None),
        document_file_path: Set(None),
        document_file_name: Set(None),
        document_file_size: Set(None),
        document_mime_type: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Config for tests: in-memory SQLite, fixed secrets, test environment.
pub fn test_config(upload_dir: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret-key-for-testing".to_string(),
        jwt_expiry_hours: 24,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        environment: "test".to_string(),
        redis_url: None,
        upload_dir: upload_dir.to_string(),
        max_upload_size: 10_485_760,
        public_base_url: String::new(),
        media: MediaConfig {
            token_secret: "test-media-secret".to_string(),
            ..MediaConfig::default()
        },
        integrations: IntegrationsConfig {
            payment_currency: "INR".to_string(),
            email_sender: "tests@coursegate.local".to_string(),
            ..IntegrationsConfig::default()
        },
    }
}

/// A response with its body fully read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = res.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn error_code(&self) -> Option<String> {
        self.json()["error"]["code"].as_str().map(str::to_string)
    }

    pub fn message(&self) -> Option<String> {
        self.json()["message"].as_str().map(str::to_string)
    }
}

// ── Fake collaborators ──

/// Payment gateway that issues sequential order ids. Orders stay pending
/// until a test settles them with [`set_status`](Self::set_status).
#[derive(Default)]
pub struct FakePaymentGateway {
    next_id: AtomicU32,
    orders: Mutex<HashMap<String, (OrderRequest, OrderStatus)>>,
}

impl FakePaymentGateway {
    pub fn set_status(&self, order_id: &str, status: OrderStatus) {
        if let Ok(mut orders) = self.orders.lock() {
            if let Some(entry) = orders.get_mut(order_id) {
                entry.1 = status;
            }
        }
    }

    /// Amount requested for `order_id`.
    pub fn amount(&self, order_id: &str) -> Option<i64> {
        self.orders
            .lock()
            .ok()
            .and_then(|o| o.get(order_id).map(|(req, _)| req.amount))
    }
}

#[async_trait::async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<PaymentOrder, ApiError> {
        let id = format!("order_test_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let order = PaymentOrder {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
        };
        self.orders
            .lock()
            .map_err(|_| ApiError::Internal("fake gateway poisoned".to_string()))?
            .insert(id, (request, OrderStatus::Pending));
        Ok(order)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, ApiError> {
        self.orders
            .lock()
            .map_err(|_| ApiError::Internal("fake gateway poisoned".to_string()))?
            .get(order_id)
            .map(|(_, status)| *status)
            .ok_or_else(|| ApiError::Upstream(format!("Unknown order {}", order_id)))
    }
}

/// Email sender that keeps every message in memory.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Wait up to a second for a message to `to` whose subject contains
    /// `subject`. Emails go out in the background.
    pub async fn wait_for(&self, to: &str, subject: &str) -> Option<EmailMessage> {
        for _ in 0..50 {
            let found = self
                .sent()
                .into_iter()
                .rev()
                .find(|m| m.to == to && m.subject.contains(subject));
            if let Some(m) = found {
                return Some(m);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ApiError> {
        self.sent
            .lock()
            .map_err(|_| ApiError::Internal("fake mailer poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

/// Identity provider that accepts codes registered by the test.
#[derive(Default)]
pub struct FakeIdentityProvider {
    codes: Mutex<HashMap<String, VerifiedIdentity>>,
}

impl FakeIdentityProvider {
    pub fn register(&self, code: &str, identity: VerifiedIdentity) {
        if let Ok(mut codes) = self.codes.lock() {
            codes.insert(code.to_string(), identity);
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<VerifiedIdentity, ApiError> {
        self.codes
            .lock()
            .map_err(|_| ApiError::Internal("fake provider poisoned".to_string()))?
            .get(code)
            .cloned()
            .ok_or_else(|| ApiError::Validation("Invalid authorization code".to_string()))
    }
}
