use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tokio::sync::RwLock;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use config::Config;
use services::{
    init,
    poll::{PollGuard, PollSender},
    session_store::{self, SessionRecordStore},
    spotify::{OAuthProvider, SpotifyService},
};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub spotify: Arc<dyn OAuthProvider>,
    /// Set once the Telegram bot has been verified at startup.
    pub telegram: Arc<RwLock<Option<Arc<dyn PollSender>>>>,
    pub poll_guard: Arc<PollGuard>,
    pub sessions: SessionRecordStore,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "song_vote=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let (plain_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain_layer)
        .with(json_layer)
        .init();
}

fn rate_limited_response(error: GovernorError) -> http::Response<Body> {
    let mut retry_after = None;
    let (status, body, headers) = match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            retry_after = Some(wait_time);
            (
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded",
                        "details": { "retry_after_seconds": wait_time }
                    }
                }),
                headers,
            )
        }
        GovernorError::UnableToExtractKey => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": {
                    "code": "BAD_REQUEST",
                    "message": "Unable to determine client IP for rate limiting"
                }
            }),
            None,
        ),
        GovernorError::Other { code, msg, headers } => (
            code,
            serde_json::json!({
                "error": {
                    "code": "INTERNAL_ERROR",
                    "message": msg.unwrap_or_else(|| "Rate limiting error".to_string())
                }
            }),
            headers,
        ),
    };

    let mut resp = http::Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(hmap) = headers {
        for (name, value) in hmap.iter() {
            resp.headers_mut().insert(name.clone(), value.clone());
        }
    }
    // `wait_time` is in seconds
    if let Some(seconds) = retry_after {
        resp.headers_mut()
            .insert(http::header::RETRY_AFTER, HeaderValue::from(seconds));
    }
    resp
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to bind SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Song Vote Service");

    // Initialize database
    let pool = init::init_db(&config).await?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        spotify: Arc::new(SpotifyService::new(&config)),
        telegram: Arc::new(RwLock::new(None)),
        poll_guard: Arc::new(PollGuard::default()),
        sessions: SessionRecordStore::default(),
    });

    // Create shutdown notifier for background tasks and std threads
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let thread_shutdown = Arc::new(AtomicBool::new(false));

    let mut bg_handles = init::initialize_telegram(&app_state, shutdown_tx.clone()).await;
    bg_handles.push(session_store::spawn_expiry_sweeper(
        app_state.sessions.clone(),
        session_store::SWEEP_INTERVAL,
        shutdown_tx.clone(),
    ));

    // Rate limiter for the OAuth endpoints, keyed by client IP
    let mut auth_builder = GovernorConfigBuilder::default().key_extractor(SmartIpKeyExtractor);
    auth_builder.per_second(config.rate_limit.auth_per_second.into());
    auth_builder.burst_size(config.rate_limit.auth_burst);
    auth_builder.error_handler(rate_limited_response);

    let auth_gov_conf = Arc::new(
        auth_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build auth governor config"))?,
    );

    // Background cleanup for auth limiter storage
    let auth_cleaner = {
        let limiter = auth_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            // Small ticks so shutdown is noticed quickly
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Auth rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("auth rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let auth_routes = routes::auth::router().layer(GovernorLayer {
        config: auth_gov_conf.clone(),
    });
    let app = routes::app(app_state.clone(), auth_routes)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let signal_tx = shutdown_tx.clone();
    let signal_flag = thread_shutdown.clone();
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping background tasks and threads");
        let _ = signal_tx.send(());
        signal_flag.store(true, Ordering::SeqCst);
    })
    .await;

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
    }

    // The server may have stopped on its own; make sure everything else does too
    let _ = shutdown_tx.send(());
    thread_shutdown.store(true, Ordering::SeqCst);

    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background tasks to exit",
        shutdown_wait.as_secs()
    );
    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    let _ = tokio::time::timeout(shutdown_wait, bg_wait).await;

    if let Err(e) = auth_cleaner.join() {
        tracing::warn!("Auth cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
