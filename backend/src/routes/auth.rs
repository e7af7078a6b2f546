use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::services::session::{self, AuthenticatedIdentity};
use crate::AppState;

/// OAuth endpoints, mounted under `/auth`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/spotify", get(login_with_dialog))
        .route("/callback", get(callback))
        .route("/token", get(token))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Initiate Spotify OAuth login
async fn login(State(state): State<Arc<AppState>>, session: Session) -> AppResult<Redirect> {
    start_authorization(&state, &session, false).await
}

/// Same as `login`, but Spotify shows the consent dialog even for returning users.
async fn login_with_dialog(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Redirect> {
    start_authorization(&state, &session, true).await
}

async fn start_authorization(
    state: &Arc<AppState>,
    session: &Session,
    show_dialog: bool,
) -> AppResult<Redirect> {
    let phase = session::phase(session).await?;
    tracing::debug!("Starting Spotify authorization from {:?} session", phase);

    let oauth_state = session::begin_authorization(session).await?;
    let auth_url = state.spotify.authorize_url(&oauth_state, show_dialog);
    Ok(Redirect::to(&auth_url))
}

/// Handle Spotify OAuth callback.
///
/// Every failure sends the user agent back to the front-end login page; only a
/// verified `state` followed by a successful code exchange signs the session in.
async fn callback(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Redirect> {
    let frontend = state.config.server.frontend_url.trim_end_matches('/');
    let failure = Redirect::to(&format!("{}/login", frontend));

    // Always consume the nonce, even when the provider reported an error
    if !session::verify_state(&session, query.state.as_deref()).await? {
        tracing::warn!("OAuth callback with missing or mismatched state; rejecting");
        return Ok(failure);
    }

    if let Some(error) = query.error {
        tracing::warn!("OAuth provider returned error: {}", error);
        return Ok(failure);
    }

    let Some(code) = query.code else {
        tracing::warn!("OAuth callback missing authorization code");
        return Ok(failure);
    };

    match authenticate(&state, &code).await {
        Ok(identity) => {
            tracing::info!("OAuth authentication successful for {}", identity.profile.id);
            session::complete_authorization(&session, identity).await?;
            Ok(Redirect::to(frontend))
        }
        Err(e) => {
            tracing::error!("OAuth code exchange failed: {}", e);
            Ok(failure)
        }
    }
}

async fn authenticate(state: &Arc<AppState>, code: &str) -> AppResult<AuthenticatedIdentity> {
    let token_response = state.spotify.exchange_code(code).await?;
    tracing::debug!(
        "Spotify token issued: type={}, expires_in={}s, scope={:?}",
        token_response.token_type,
        token_response.expires_in,
        token_response.scope
    );

    let profile = state.spotify.get_profile(&token_response.access_token).await?;

    Ok(AuthenticatedIdentity {
        profile,
        access_token: token_response.access_token,
    })
}

/// Access token of the signed-in session, for the front-end player.
async fn token(session: Session) -> AppResult<Json<TokenResponse>> {
    let access_token = session::current_token(&session).await?;
    Ok(Json(TokenResponse { access_token }))
}

/// Logout - clear the server-side session
pub async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    session::logout(&session).await?;
    Ok(Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};

    use tower_sessions::ExpiredDeletion;

    use crate::test_support::{
        get, request, session_cookie, test_app, test_app_with, test_config, TestApp,
        EXPECTED_EMAILS,
    };

    fn location(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Start a login and return the session cookie and the issued state.
    async fn start_login(app: &TestApp, path: &str) -> (String, String, String) {
        let response = request(app, path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let cookie = session_cookie(&response).expect("login should set a session cookie");
        let target = location(&response);
        let url = url::Url::parse(&target).unwrap();
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("authorize url should carry state");
        (cookie, state, target)
    }

    #[tokio::test]
    async fn login_redirects_to_provider_with_state() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (_, state, target) = start_login(&app, "/auth/login").await;

        assert_eq!(state.len(), 16);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(target.starts_with("https://provider.test/authorize"));
        assert!(!target.contains("show_dialog"));

        let (_, _, target) = start_login(&app, "/auth/spotify").await;
        assert!(target.contains("show_dialog=true"));
    }

    #[tokio::test]
    async fn token_before_login_is_401() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (status, body) = get(&app, "/auth/token", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn callback_with_forged_state_is_rejected() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (cookie, _state, _) = start_login(&app, "/auth/login").await;

        let response = request(&app, "/auth/callback?code=good&state=forged", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "http://localhost:3000/login");

        let (status, _) = get(&app, "/auth/token", Some(&cookie)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn callback_without_prior_login_is_rejected() {
        let app = test_app(&EXPECTED_EMAILS).await;

        let response = request(&app, "/auth/callback?code=good&state=anything", None).await;
        assert_eq!(location(&response), "http://localhost:3000/login");
        // Nothing was authenticated, so no cookie to carry a token
        let cookie = session_cookie(&response);
        let (status, _) = get(&app, "/auth/token", cookie.as_deref()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failed_exchange_redirects_to_login() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (cookie, state, _) = start_login(&app, "/auth/login").await;

        let path = format!("/auth/callback?code=bad&state={}", state);
        let response = request(&app, &path, Some(&cookie)).await;
        assert_eq!(location(&response), "http://localhost:3000/login");

        let (status, _) = get(&app, "/auth/token", Some(&cookie)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn full_login_flow_then_logout() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (cookie, state, _) = start_login(&app, "/auth/login").await;

        let path = format!("/auth/callback?code=good&state={}", state);
        let response = request(&app, &path, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "http://localhost:3000");

        // The session id is cycled on sign-in
        let cookie = session_cookie(&response).unwrap_or(cookie);
        let (status, body) = get(&app, "/auth/token", Some(&cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["access_token"], "access-good");

        let response = request(&app, "/logout", Some(&cookie)).await;
        assert_eq!(location(&response), "/login");

        let (status, _) = get(&app, "/auth/token", Some(&cookie)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn state_cannot_be_replayed() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (cookie, state, _) = start_login(&app, "/auth/login").await;

        // Provider error consumes the nonce
        let path = format!("/auth/callback?error=access_denied&state={}", state);
        request(&app, &path, Some(&cookie)).await;

        let path = format!("/auth/callback?code=good&state={}", state);
        let response = request(&app, &path, Some(&cookie)).await;
        assert_eq!(location(&response), "http://localhost:3000/login");
    }

    #[tokio::test]
    async fn abandoned_login_is_swept_after_idle_timeout() {
        let mut config = test_config(&EXPECTED_EMAILS);
        config.server.session_idle_minutes = 0;
        let app = test_app_with(config).await;

        // The user never returns from the consent screen
        start_login(&app, "/auth/login").await;
        assert_eq!(app.state.sessions.len().await, 1);

        app.state.sessions.delete_expired().await.unwrap();
        assert_eq!(app.state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn pending_login_survives_sweep_within_idle_window() {
        let app = test_app(&EXPECTED_EMAILS).await;
        let (cookie, state, _) = start_login(&app, "/auth/login").await;

        app.state.sessions.delete_expired().await.unwrap();
        assert_eq!(app.state.sessions.len().await, 1);

        let path = format!("/auth/callback?code=good&state={}", state);
        let response = request(&app, &path, Some(&cookie)).await;
        assert_eq!(location(&response), "http://localhost:3000");
    }
}
