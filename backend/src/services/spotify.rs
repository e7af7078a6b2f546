use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};

const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Scopes the front-end player needs: playback, the account email and the library.
pub const REQUIRED_SCOPES: [&str; 4] = [
    "streaming",
    "user-read-email",
    "user-read-private",
    "user-library-read",
];

// ============================================================================
// OAuth Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpotifyProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub product: Option<String>,
}

/// Authorization-code flow against an identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync + 'static {
    /// URL the user agent is sent to. `show_dialog` forces the consent screen
    /// even when the user already approved the app.
    fn authorize_url(&self, state: &str, show_dialog: bool) -> String;

    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse>;

    async fn get_profile(&self, access_token: &str) -> AppResult<SpotifyProfile>;
}

#[derive(Debug, Clone)]
pub struct SpotifyService {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            client_id: config.spotify.client_id.clone(),
            client_secret: config.spotify.client_secret.clone(),
            redirect_uri: config.spotify.redirect_uri.clone(),
        }
    }
}

#[async_trait]
impl OAuthProvider for SpotifyService {
    fn authorize_url(&self, state: &str, show_dialog: bool) -> String {
        let scope = REQUIRED_SCOPES.join(" ");
        let mut url = format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            SPOTIFY_ACCOUNTS_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state)
        );
        if show_dialog {
            url.push_str("&show_dialog=true");
        }
        url
    }

    /// Exchange authorization code for tokens
    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        let response = self
            .client
            .post(format!("{}/api/token", SPOTIFY_ACCOUNTS_URL))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Spotify(format!(
                "Failed to exchange code: {}",
                error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::Spotify(format!("Failed to parse token response: {}", e)))
    }

    async fn get_profile(&self, access_token: &str) -> AppResult<SpotifyProfile> {
        let response = self
            .client
            .get(format!("{}/me", SPOTIFY_API_URL))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Spotify(format!(
                "Failed to get profile: {}",
                error_text
            )));
        }

        response
            .json::<SpotifyProfile>()
            .await
            .map_err(|e| AppError::Spotify(format!("Failed to parse profile: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SpotifyService {
        let mut config = Config::default();
        config.spotify.client_id = "client-123".to_string();
        config.spotify.client_secret = "secret".to_string();
        config.spotify.redirect_uri = "https://api.example.com/auth/callback".to_string();
        SpotifyService::new(&config)
    }

    #[test]
    fn authorize_url_carries_state_and_scopes() {
        let url = url::Url::parse(&service().authorize_url("AbC123xyz", false)).unwrap();
        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");

        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "https://api.example.com/auth/callback");
        assert_eq!(query["state"], "AbC123xyz");
        assert_eq!(
            query["scope"],
            "streaming user-read-email user-read-private user-library-read"
        );
        assert!(!query.contains_key("show_dialog"));
    }

    #[test]
    fn show_dialog_is_opt_in() {
        let url = service().authorize_url("s", true);
        assert!(url.ends_with("&show_dialog=true"));
    }

    #[test]
    fn profile_tolerates_missing_optional_fields() {
        let profile: SpotifyProfile =
            serde_json::from_str(r#"{"id":"abc","email":"a@x.com","images":[]}"#).unwrap();
        assert_eq!(profile.id, "abc");
        assert_eq!(profile.email.as_deref(), Some("a@x.com"));
        assert!(profile.display_name.is_none());
    }

    #[test]
    fn token_response_ignores_refresh_token() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","token_type":"Bearer","expires_in":3600,
                "refresh_token":"rt","scope":"streaming"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "at");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.scope.as_deref(), Some("streaming"));
    }
}
