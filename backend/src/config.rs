use std::env;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub spotify: SpotifyConfig,
    pub telegram: TelegramConfig,
    pub poll: PollConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Public base URL of this backend, used to build the OAuth redirect URI.
    pub api_url: String,
    /// Directory holding the built front-end bundle (must contain `index.html`).
    pub static_dir: PathBuf,
    /// Whether to set the `Secure` flag on the session cookie.
    /// If `None`, it is inferred from `frontend_url` (`https` -> true).
    /// Read from env var `COOKIE_SECURE` (accepted values: "true"/"false", "1"/"0", "yes"/"no").
    pub cookie_secure: Option<bool>,
    /// Sessions (including half-finished logins) expire after this many idle minutes.
    pub session_idle_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Bot user names allowed to bind a chat with `/start`.
    pub allowed_users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Emails of everyone who has to submit a song before the poll goes out.
    pub expected_participants: Vec<String>,
    pub question: String,
    /// Drop rows without a title or artist from the poll options.
    pub skip_incomplete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints (e.g. /auth/login)
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

pub const DEFAULT_POLL_QUESTION: &str = "Best randomly selected song?";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_url = env::var("API_URL")
            .or_else(|_| env::var("REACT_APP_API_URL"))
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let frontend_url = env::var("FRONTEND_URL")
            .or_else(|_| env::var("REACT_APP_FRONTEND_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        validate_base_url("API_URL", &api_url)?;
        validate_base_url("FRONTEND_URL", &frontend_url)?;

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url,
                static_dir: env::var("STATIC_DIR")
                    .unwrap_or_else(|_| "build".to_string())
                    .into(),
                cookie_secure: env::var("COOKIE_SECURE")
                    .ok()
                    .and_then(|v| parse_bool(&v)),
                api_url: api_url.clone(),
                session_idle_minutes: env::var("SESSION_IDLE_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<i64>()
                    .ok()
                    .filter(|m| *m >= 0)
                    .ok_or_else(|| ConfigError::InvalidValue("SESSION_IDLE_MINUTES".to_string()))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
            },
            spotify: SpotifyConfig {
                client_id: env::var("SPOTIFY_CLIENT_ID")
                    .map_err(|_| ConfigError::MissingEnv("SPOTIFY_CLIENT_ID".to_string()))?,
                client_secret: env::var("SPOTIFY_CLIENT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("SPOTIFY_CLIENT_SECRET".to_string()))?,
                redirect_uri: env::var("SPOTIFY_REDIRECT_URI").unwrap_or_else(|_| {
                    format!("{}/auth/callback", api_url.trim_end_matches('/'))
                }),
            },
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
                allowed_users: env::var("TELEGRAM_ALLOWED_USERS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
            },
            poll: PollConfig {
                expected_participants: expected_participants_from_env(),
                question: env::var("POLL_QUESTION")
                    .unwrap_or_else(|_| DEFAULT_POLL_QUESTION.to_string()),
                skip_incomplete: env::var("POLL_SKIP_INCOMPLETE")
                    .ok()
                    .and_then(|v| parse_bool(&v))
                    .unwrap_or(false),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }

    /// Secure flag for the session cookie, falling back to the scheme of the frontend URL.
    pub fn cookie_secure(&self) -> bool {
        self.server
            .cookie_secure
            .unwrap_or_else(|| self.server.frontend_url.starts_with("https://"))
    }
}

/// `EXPECTED_PARTICIPANTS` wins; otherwise the legacy `E1`..`E5` variables are collected.
fn expected_participants_from_env() -> Vec<String> {
    if let Ok(list) = env::var("EXPECTED_PARTICIPANTS") {
        return split_list(&list);
    }

    (1..=5)
        .filter_map(|i| env::var(format!("E{}", i)).ok())
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Redirects and CORS are built from these, so they must be absolute http(s) URLs.
fn validate_base_url(name: &str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidValue(name.to_string())),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                frontend_url: "http://localhost:3000".to_string(),
                api_url: "http://localhost:5000".to_string(),
                static_dir: PathBuf::from("build"),
                cookie_secure: None,
                session_idle_minutes: 60,
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 1,
            },
            spotify: SpotifyConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: "http://localhost:5000/auth/callback".to_string(),
            },
            telegram: TelegramConfig {
                bot_token: None,
                allowed_users: Vec::new(),
            },
            poll: PollConfig {
                expected_participants: Vec::new(),
                question: DEFAULT_POLL_QUESTION.to_string(),
                skip_incomplete: false,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empty_entries() {
        assert_eq!(
            split_list(" a@x.com, b@x.com ,,c@x.com "),
            vec!["a@x.com", "b@x.com", "c@x.com"]
        );
        // Telegram handles are accepted with or without the leading '@'
        assert_eq!(split_list("@alice,bob"), vec!["alice", "bob"]);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn base_urls_must_be_absolute_http() {
        assert!(validate_base_url("FRONTEND_URL", "https://vote.example.com").is_ok());
        assert!(validate_base_url("API_URL", "http://localhost:5000/").is_ok());
        assert!(matches!(
            validate_base_url("FRONTEND_URL", "localhost:3000"),
            Err(ConfigError::InvalidValue(name)) if name == "FRONTEND_URL"
        ));
        assert!(validate_base_url("API_URL", "/relative").is_err());
    }

    #[test]
    fn cookie_secure_is_inferred_from_frontend_scheme() {
        let mut config = Config::default();
        assert!(!config.cookie_secure());

        config.server.frontend_url = "https://vote.example.com".to_string();
        assert!(config.cookie_secure());

        config.server.cookie_secure = Some(false);
        assert!(!config.cookie_secure());
    }
}
