//! Shared fixtures for unit and router tests: an in-memory database, a fake
//! OAuth provider and a poll sender that records instead of calling Telegram.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::{Mutex, RwLock};
use tower::ServiceExt;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::poll::{PollGuard, PollSender};
use crate::services::session_store::SessionRecordStore;
use crate::services::spotify::{OAuthProvider, SpotifyProfile, TokenResponse};
use crate::{routes, AppState};

pub const EXPECTED_EMAILS: [&str; 5] = [
    "a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com",
];

/// Fresh migrated database. A single connection that never expires, so the
/// in-memory database lives as long as the pool.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

/// Accepts the code `good`, rejects everything else.
pub struct MockOAuthProvider;

#[async_trait]
impl OAuthProvider for MockOAuthProvider {
    fn authorize_url(&self, state: &str, show_dialog: bool) -> String {
        let mut url = format!(
            "https://provider.test/authorize?client_id=test-client&state={}",
            state
        );
        if show_dialog {
            url.push_str("&show_dialog=true");
        }
        url
    }

    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        if code != "good" {
            return Err(AppError::Spotify("invalid_grant".to_string()));
        }
        Ok(TokenResponse {
            access_token: format!("access-{}", code),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            scope: None,
        })
    }

    async fn get_profile(&self, _access_token: &str) -> AppResult<SpotifyProfile> {
        Ok(SpotifyProfile {
            id: "spotify-user".to_string(),
            display_name: Some("Test User".to_string()),
            email: Some("a@x.com".to_string()),
            country: None,
            product: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentPoll {
    pub chat_id: i64,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Default)]
pub struct RecordingPollSender {
    sent: Mutex<Vec<SentPoll>>,
}

impl RecordingPollSender {
    pub async fn sent(&self) -> Vec<SentPoll> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PollSender for RecordingPollSender {
    async fn send_poll(&self, chat_id: i64, question: &str, options: Vec<String>) -> AppResult<()> {
        self.sent.lock().await.push(SentPoll {
            chat_id,
            question: question.to_string(),
            options,
        });
        Ok(())
    }
}

pub fn test_config(participants: &[&str]) -> Config {
    let mut config = Config::default();
    config.poll.expected_participants = participants.iter().map(|p| p.to_string()).collect();
    config
}

pub async fn test_state(participants: &[&str]) -> (Arc<AppState>, Arc<RecordingPollSender>) {
    test_state_with(test_config(participants)).await
}

pub async fn test_state_with(config: Config) -> (Arc<AppState>, Arc<RecordingPollSender>) {
    let sender = Arc::new(RecordingPollSender::default());
    let poll_sender: Arc<dyn PollSender> = sender.clone();

    let state = Arc::new(AppState {
        db: memory_pool().await,
        config,
        spotify: Arc::new(MockOAuthProvider),
        telegram: Arc::new(RwLock::new(Some(poll_sender))),
        poll_guard: Arc::new(PollGuard::default()),
        sessions: SessionRecordStore::default(),
    });
    (state, sender)
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub sender: Arc<RecordingPollSender>,
}

/// Full router without the rate limiter, which needs a peer address.
pub async fn test_app(participants: &[&str]) -> TestApp {
    test_app_with(test_config(participants)).await
}

pub async fn test_app_with(config: Config) -> TestApp {
    let (state, sender) = test_state_with(config).await;
    let router = routes::app(state.clone(), routes::auth::router()).expect("router");
    TestApp {
        router,
        state,
        sender,
    }
}

pub async fn request(app: &TestApp, path: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let req = builder.body(Body::empty()).expect("request");
    app.router.clone().oneshot(req).await.expect("infallible")
}

/// Status and JSON body; non-JSON bodies come back as `Null`.
pub async fn get(app: &TestApp, path: &str, cookie: Option<&str>) -> (StatusCode, serde_json::Value) {
    let response = request(app, path, cookie).await;
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// `name=value` of the session cookie set by a response, if any.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.contains("Max-Age=0"))
        .find_map(|v| v.split(';').next().map(|pair| pair.trim().to_string()))
}
