//! Per-browser login state kept in the server-side session.
//!
//! `Anonymous` -> `PendingAuthorization` (state nonce stored) ->
//! `Authenticated` (profile + access token stored). Logging out flushes the
//! session, which puts it back to `Anonymous`.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::services::spotify::SpotifyProfile;

pub const OAUTH_STATE_KEY: &str = "oauth_state";
pub const IDENTITY_KEY: &str = "identity";

/// Length of the anti-forgery `state` sent through the OAuth redirect.
pub const STATE_LENGTH: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub profile: SpotifyProfile,
    pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Anonymous,
    PendingAuthorization,
    Authenticated,
}

/// Issue a fresh state nonce and remember it in the session.
pub async fn begin_authorization(session: &Session) -> AppResult<String> {
    let state = generate_random_string(STATE_LENGTH);
    session.insert(OAUTH_STATE_KEY, state.clone()).await?;
    Ok(state)
}

/// Consume the stored nonce and compare it with the one the provider echoed back.
/// The nonce is removed either way so it cannot be replayed.
pub async fn verify_state(session: &Session, returned: Option<&str>) -> AppResult<bool> {
    let expected: Option<String> = session.remove(OAUTH_STATE_KEY).await?;
    Ok(state_matches(expected.as_deref(), returned))
}

pub fn state_matches(expected: Option<&str>, returned: Option<&str>) -> bool {
    match (expected, returned) {
        (Some(expected), Some(returned)) => !expected.is_empty() && expected == returned,
        _ => false,
    }
}

/// Store the identity under a new session id.
pub async fn complete_authorization(
    session: &Session,
    identity: AuthenticatedIdentity,
) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(IDENTITY_KEY, identity).await?;
    Ok(())
}

pub async fn current_identity(session: &Session) -> AppResult<Option<AuthenticatedIdentity>> {
    Ok(session.get::<AuthenticatedIdentity>(IDENTITY_KEY).await?)
}

/// Access token of the signed-in user, `Unauthorized` otherwise.
pub async fn current_token(session: &Session) -> AppResult<String> {
    current_identity(session)
        .await?
        .map(|identity| identity.access_token)
        .ok_or(AppError::Unauthorized)
}

pub async fn phase(session: &Session) -> AppResult<AuthPhase> {
    if current_identity(session).await?.is_some() {
        return Ok(AuthPhase::Authenticated);
    }
    if session.get::<String>(OAUTH_STATE_KEY).await?.is_some() {
        return Ok(AuthPhase::PendingAuthorization);
    }
    Ok(AuthPhase::Anonymous)
}

pub async fn logout(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}

/// Generate a random string of specified length
pub fn generate_random_string(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
