use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Validity window granted to a freshly minted remote session (24h).
pub const DEFAULT_SESSION_VALIDITY_SECS: i64 = 86_400;

/// Minimum remaining lifetime for a cached session to be reused (3h).
pub const DEFAULT_RENEWAL_THRESHOLD_SECS: i64 = 10_800;

#[derive(Debug, Clone, Deserialize)]
pub struct CollabConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub remote: RemoteConfig,
    pub session: SessionPolicy,
    pub cookie: CookieConfig,
    pub content_service: ContentServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Connection settings for the pad service API.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL the service calls the API on (e.g. `http://etherpad:9001`).
    pub endpoint: String,
    /// Base URL browsers open pads on; `/p/<id>` is appended.
    pub external_endpoint: String,
    pub api_key: Secret<String>,
    pub api_version: String,
    pub timeout_secs: u64,
}

/// Session renewal knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPolicy {
    pub validity_window_secs: i64,
    pub renewal_threshold_secs: i64,
    pub scope: SessionScopeKind,
    /// Only reuse a cached session when the pad service reports it for the
    /// same group as the room being opened.
    pub require_group_match: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScopeKind {
    /// One cached session per user across all documents.
    User,
    /// One cached session per (user, document) pair.
    UserDocument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentServiceConfig {
    pub base_url: String,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            validity_window_secs: DEFAULT_SESSION_VALIDITY_SECS,
            renewal_threshold_secs: DEFAULT_RENEWAL_THRESHOLD_SECS,
            scope: SessionScopeKind::User,
            require_group_match: true,
        }
    }
}

impl CollabConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StoreBackend = get_env("COLLAB_STORE", Some("mongo"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let mongodb_uri = match backend {
            StoreBackend::Mongo => Some(get_env("MONGODB_URI", None, is_prod)?),
            StoreBackend::Memory => env::var("MONGODB_URI").ok(),
        };

        let endpoint = get_env("ETHERPAD_ENDPOINT", Some("http://localhost:9001"), is_prod)?;
        let external_endpoint = env::var("ETHERPAD_EXTERNAL_ENDPOINT")
            .unwrap_or_else(|_| endpoint.clone());

        Ok(CollabConfig {
            common: common_config,
            store: StoreConfig {
                backend,
                mongodb_uri,
                mongodb_database: get_env("MONGODB_DATABASE", Some("collab_db"), is_prod)?,
            },
            remote: RemoteConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                external_endpoint: external_endpoint.trim_end_matches('/').to_string(),
                api_key: Secret::new(get_env("ETHERPAD_API_KEY", None, is_prod)?),
                api_version: get_env("ETHERPAD_API_VERSION", Some("1"), is_prod)?,
                timeout_secs: parse_env("ETHERPAD_TIMEOUT_SECS", 30)?,
            },
            session: SessionPolicy {
                validity_window_secs: parse_env(
                    "COLLAB_SESSION_VALIDITY_SECS",
                    DEFAULT_SESSION_VALIDITY_SECS,
                )?,
                renewal_threshold_secs: parse_env(
                    "COLLAB_SESSION_RENEWAL_THRESHOLD_SECS",
                    DEFAULT_RENEWAL_THRESHOLD_SECS,
                )?,
                scope: get_env("COLLAB_SESSION_SCOPE", Some("user"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                require_group_match: parse_env("COLLAB_SESSION_REQUIRE_GROUP_MATCH", true)?,
            },
            cookie: CookieConfig {
                name: get_env("COLLAB_COOKIE_NAME", Some("sessionID"), false)?,
                domain: cookie_domain(env::var("COLLAB_COOKIE_DOMAIN").ok()),
            },
            content_service: ContentServiceConfig {
                base_url: get_env(
                    "CONTENT_SERVICE_URL",
                    Some("http://content-service:8080"),
                    is_prod,
                )?
                .trim_end_matches('/')
                .to_string(),
            },
        })
    }
}

impl SessionPolicy {
    /// Absolute expiry for a session minted at `now`.
    pub fn expiry_from(&self, now: i64) -> i64 {
        now + self.validity_window_secs
    }
}

/// `localhost` cookies must not carry a Domain attribute.
fn cookie_domain(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty() && d != "localhost")
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl std::str::FromStr for SessionScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(SessionScopeKind::User),
            "user-document" | "user_document" => Ok(SessionScopeKind::UserDocument),
            _ => Err(format!("Invalid session scope: {}", s)),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
