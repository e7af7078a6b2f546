pub mod auth;
pub mod health;
pub mod telegram;
pub mod users;

use std::sync::Arc;

use axum::{routing::get, Router};
use http::HeaderValue;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};

use crate::middleware;
use crate::AppState;

/// Assemble the full application.
///
/// `auth_routes` is passed in so the caller decides which extra layers (rate
/// limiting) wrap the OAuth endpoints.
pub fn app(state: Arc<AppState>, auth_routes: Router<Arc<AppState>>) -> anyhow::Result<Router> {
    let static_dir = state.config.server.static_dir.clone();
    // Unknown paths belong to the single-page front-end
    let frontend_bundle =
        ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let idle = time::Duration::minutes(state.config.server.session_idle_minutes);
    let session_layer = SessionManagerLayer::new(state.sessions.clone())
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(state.config.cookie_secure())
        .with_expiry(Expiry::OnInactivity(idle));

    let allowed_origin = state
        .config
        .server
        .frontend_url
        .trim_end_matches('/')
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let router = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Participant and song submission endpoints
        .nest("/api", users::router())
        // Spotify OAuth
        .nest("/auth", auth_routes)
        .route("/logout", get(auth::logout))
        // Poll trigger
        .nest("/telegram", telegram::router())
        .fallback_service(frontend_bundle)
        .with_state(state)
        .layer(session_layer)
        // Security headers for the served front-end
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([http::Method::GET, http::Method::OPTIONS])
                .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT])
                .allow_credentials(true),
        );

    Ok(router)
}
