//! Shared fixtures: an in-memory app with fake model, mailer and clock.

use std::{
    io::Cursor,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{claims::TokenPurpose, password::hash_password, repo_types::User},
    clock::ManualClock,
    config::{AppConfig, JwtConfig, MailConfig, ModelConfig, UploadConfig},
    db,
    inference::{ImageClassifier, Model},
    notifications::{Email, Mailer, Notifier},
    state::AppState,
    storage::LocalStorage,
};

pub const PASSWORD: &str = "correct-horse-battery";
pub const TEST_MAX_FILE_BYTES: usize = 64 * 1024;

pub struct FixedModel(pub f32);

impl Model for FixedModel {
    fn predict(&self, _pixels: &[f32], _side: u32) -> anyhow::Result<f32> {
        Ok(self.0)
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let m = Self::default();
        m.set_failing(true);
        m
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("provider unavailable");
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Parks inside `send` until released, so tests can act while an email is in flight.
#[derive(Default)]
pub struct GatedMailer {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Mailer for GatedMailer {
    async fn send(&self, _email: &Email) -> anyhow::Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

pub fn test_config(storage_root: PathBuf) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            session_ttl_minutes: 60,
            verification_ttl_hours: 24,
            reset_ttl_minutes: 60,
        },
        mail: MailConfig {
            mailjet_api_key: None,
            mailjet_api_secret: None,
            sender: "noreply@example.com".into(),
            sender_name: "Test".into(),
        },
        model: ModelConfig {
            path: "unused.onnx".into(),
            input_size: 8,
            class_labels: ["Cancer".into(), "Normal".into()],
        },
        upload: UploadConfig {
            storage_root,
            max_file_bytes: TEST_MAX_FILE_BYTES,
            max_files: 5,
        },
        frontend_url: "http://frontend.test".into(),
        public_base_url: "http://api.test".into(),
        cookie_secure: false,
        cors_origins: Vec::new(),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    pub clock: Arc<ManualClock>,
    pub storage_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_model(0.9).await
    }

    pub async fn with_model(p: f32) -> Self {
        let storage_dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(storage_dir.path().to_path_buf());
        let db = db::connect_in_memory().await.expect("in-memory db");
        let storage = LocalStorage::new(storage_dir.path()).await.expect("storage");
        let clock = Arc::new(ManualClock::at(OffsetDateTime::now_utc()));
        let mailer = Arc::new(RecordingMailer::default());
        let classifier = ImageClassifier::new(
            Arc::new(FixedModel(p)),
            config.model.input_size,
            config.model.class_labels.clone(),
        );
        let notifier = Notifier::new(mailer.clone(), &config.frontend_url, config.jwt.reset_ttl_minutes);

        let state = AppState::from_parts(
            db,
            Arc::new(config),
            clock.clone(),
            Arc::new(storage),
            Arc::new(classifier),
            notifier,
        );
        let router = build_app(state.clone());
        Self {
            state,
            router,
            mailer,
            clock,
            storage_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.expect("infallible router")
    }

    pub async fn create_user(&self, email: &str, username: Option<&str>, verified: bool) -> User {
        let hash = hash_password(PASSWORD).unwrap();
        let mut tx = self.state.db.begin().await.unwrap();
        let user = User::create_tx(&mut tx, email, username, None, &hash).await.unwrap();
        tx.commit().await.unwrap();
        if verified {
            User::mark_verified(&self.state.db, user.id).await.unwrap();
        }
        User::find_by_email(&self.state.db, email).await.unwrap().unwrap()
    }

    /// `Cookie` header value carrying a fresh session for `email`.
    pub fn session_cookie(&self, email: &str) -> String {
        let token = self.state.tokens.issue(email, TokenPurpose::Session).unwrap();
        format!("auth_token={token}")
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    req
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(resp: Response) -> bytes::Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// A small, valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(4, 4, |x, y| image::Rgb([(x * 60) as u8, (y * 60) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

const BOUNDARY: &str = "X-CANCERSCAN-TEST-BOUNDARY";

/// `multipart/form-data` request with one `files` part per `(filename, body)`.
pub fn multipart_request(uri: &str, files: &[(&str, Vec<u8>)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn set_cookie_headers(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect()
}
