//! Configuration: constants, endpoint paths, and the TOML/env settings file.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default timeout for a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout for HTTP requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
pub const USER_AGENT: &str = concat!("campus-client/", env!("CARGO_PKG_VERSION"));

/// Secure store key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "auth_token";

/// Secure store key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";

/// Secure store key holding the logged-in user as JSON.
pub const USER_KEY: &str = "auth_user";

/// Refresh exchange endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Google identity login endpoint.
pub const GOOGLE_LOGIN_PATH: &str = "/auth/google";

/// Development login endpoint.
pub const DEV_LOGIN_PATH: &str = "/auth/dev-login";

/// Endpoints that authenticate the caller. A 401 from any of these is final
/// and never starts a refresh.
pub const AUTH_ENDPOINTS: &[&str] = &[GOOGLE_LOGIN_PATH, DEV_LOGIN_PATH, REFRESH_PATH];

/// Whether `path` addresses one of the [`AUTH_ENDPOINTS`].
pub fn is_auth_endpoint(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = path.trim_matches('/');
    AUTH_ENDPOINTS
        .iter()
        .any(|endpoint| endpoint.trim_start_matches('/') == path)
}

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which settings were overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Iterate over `(setting key, env var)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Filled by env lookups, never read from the file.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Credentials file for the `file` backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Service name for the `keyring` backend.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_store_path(),
            keyring_service: default_keyring_service(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Validate a restored session with a background refresh.
    #[serde(default = "default_true")]
    pub refresh_on_restore: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_on_restore: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Keyring => write!(f, "keyring"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown storage backend: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
const fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT.as_secs()
}
const fn default_connect_timeout_secs() -> u64 {
    CONNECT_TIMEOUT.as_secs()
}
fn default_user_agent() -> String {
    USER_AGENT.to_string()
}
fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campus-client")
        .join("credentials.json")
}
fn default_keyring_service() -> String {
    "campus-client".to_string()
}
const fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply `CAMPUS_*`
    /// environment variable overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides_from(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides using `lookup` to resolve environment variables.
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }

        // -- API --
        env_str!("api.base_url", "CAMPUS_API_URL", self.api.base_url);
        env_parse!(
            "api.request_timeout_secs",
            "CAMPUS_API_TIMEOUT",
            self.api.request_timeout_secs
        );
        env_parse!(
            "api.connect_timeout_secs",
            "CAMPUS_API_CONNECT_TIMEOUT",
            self.api.connect_timeout_secs
        );
        env_str!("api.user_agent", "CAMPUS_API_USER_AGENT", self.api.user_agent);

        // -- Storage --
        env_parse!("storage.backend", "CAMPUS_STORAGE_BACKEND", self.storage.backend);
        if let Some(val) = lookup("CAMPUS_STORAGE_PATH") {
            self.storage.path = PathBuf::from(val);
            ov.record("storage.path", "CAMPUS_STORAGE_PATH");
        }
        env_str!(
            "storage.keyring_service",
            "CAMPUS_KEYRING_SERVICE",
            self.storage.keyring_service
        );

        // -- Session --
        env_bool!(
            "session.refresh_on_restore",
            "CAMPUS_REFRESH_ON_RESTORE",
            self.session.refresh_on_restore
        );

        // -- Logging --
        env_str!("logging.level", "CAMPUS_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "CAMPUS_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}
