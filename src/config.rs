//! Backend configuration.
//!
//! [`BackendConfig`] carries the backend coordinates (endpoint and anon key)
//! plus the tunables for retry, proactive refresh and realtime. It is built
//! either with the `with_*` builder or from the environment, and must pass
//! [`BackendConfig::validate`] before a synchronizer is constructed.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::transport::RetryPolicy;

pub const ENV_URL: &str = "NEATRIX_SUPABASE_URL";
pub const ENV_ANON_KEY: &str = "NEATRIX_SUPABASE_ANON_KEY";
pub const ENV_STORAGE_KEY: &str = "NEATRIX_STORAGE_KEY";
pub const ENV_REALTIME_TOPICS: &str = "NEATRIX_REALTIME_TOPICS";

/// Names the web front-ends use for the same coordinates.
const LEGACY_ENV_URL: &str = "VITE_SUPABASE_URL";
const LEGACY_ENV_ANON_KEY: &str = "VITE_SUPABASE_ANON_KEY";

/// Storage key of the customer-facing app.
pub const DEFAULT_STORAGE_KEY: &str = "neatrix-user-auth-token";
/// Storage key of the admin dashboard.
pub const ADMIN_STORAGE_KEY: &str = "neatrix-admin-auth-token";

/// Refresh when the access token expires within this many seconds.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;
const DEFAULT_REFRESH_TICK_SECS: u64 = 30;
const DEFAULT_HEARTBEAT_SECS: u64 = 25;
const DEFAULT_REALTIME_MAX_RETRIES: u32 = 5;
const DEFAULT_REALTIME_MAX_BACKOFF_SECS: u64 = 30;
const DEFAULT_REALTIME_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Realtime channel settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    /// Topics joined on connect, without the `realtime:` prefix.
    pub topics: Vec<String>,
    pub heartbeat_interval: Duration,
    /// Reconnect attempts before giving up.
    pub max_retries: u32,
    pub max_backoff_secs: u64,
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            max_retries: DEFAULT_REALTIME_MAX_RETRIES,
            max_backoff_secs: DEFAULT_REALTIME_MAX_BACKOFF_SECS,
            connect_timeout: Duration::from_secs(DEFAULT_REALTIME_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Configuration for talking to the backend.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::config::BackendConfig;
///
/// let config = BackendConfig::new("https://abc.supabase.co", "anon-key")
///     .with_storage_key("neatrix-admin-auth-token");
/// config.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Project endpoint, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Public anon key sent as `apikey`
    pub anon_key: String,
    /// Name the persisted session is stored under
    pub storage_key: String,
    /// Value of the `x-client-info` header
    pub client_info: String,
    pub retry: RetryPolicy,
    pub refresh_threshold: Duration,
    /// How often the auto-refresh loop checks the session
    pub refresh_tick: Duration,
    pub realtime: RealtimeSettings,
    /// Directory of the file session store (default: ~/.neatrix)
    pub storage_dir: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            client_info: default_client_info(),
            retry: RetryPolicy::default(),
            refresh_threshold: Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS),
            refresh_tick: Duration::from_secs(DEFAULT_REFRESH_TICK_SECS),
            realtime: RealtimeSettings::default(),
            storage_dir: None,
        }
    }
}

fn default_client_info() -> String {
    format!("neatrix-session/{}", env!("CARGO_PKG_VERSION"))
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Self::default()
        }
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_client_info(mut self, info: impl Into<String>) -> Self {
        self.client_info = info.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    pub fn with_refresh_tick(mut self, tick: Duration) -> Self {
        self.refresh_tick = tick;
        self
    }

    pub fn with_realtime_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.realtime.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_realtime(mut self, realtime: RealtimeSettings) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Read coordinates from the environment.
    ///
    /// `NEATRIX_SUPABASE_URL` / `NEATRIX_SUPABASE_ANON_KEY` take precedence
    /// over the `VITE_` names. Missing values are left empty for
    /// [`validate`](Self::validate) to report.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            env_with_fallback(ENV_URL, LEGACY_ENV_URL).unwrap_or_default(),
            env_with_fallback(ENV_ANON_KEY, LEGACY_ENV_ANON_KEY).unwrap_or_default(),
        );

        if let Some(key) = non_blank_env(ENV_STORAGE_KEY) {
            config.storage_key = key;
        }

        if let Some(topics) = non_blank_env(ENV_REALTIME_TOPICS) {
            config.realtime.topics = topics
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }

        config
    }

    /// Whether both coordinates are present, without checking their shape.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ConfigurationError::MissingUrl);
        }
        if self.anon_key.trim().is_empty() {
            return Err(ConfigurationError::MissingAnonKey);
        }

        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| ConfigurationError::InvalidUrl {
                url: url.to_string(),
                message: "scheme must be http or https".to_string(),
            })?;
        let host = rest.split(['/', '?', '#']).next().unwrap_or("");
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(ConfigurationError::InvalidUrl {
                url: url.to_string(),
                message: "missing host".to_string(),
            });
        }

        if self.storage_key.trim().is_empty() {
            return Err(ConfigurationError::EmptyStorageKey);
        }

        self.retry
            .validate()
            .map_err(ConfigurationError::InvalidRetryPolicy)?;

        Ok(())
    }

    /// Endpoint without trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    /// Full URL of an auth API path such as `token?grant_type=password`.
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Websocket URL of the realtime service.
    pub fn realtime_url(&self) -> String {
        let base = self.base_url();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base,
            urlencoding::encode(&self.anon_key)
        )
    }

    /// Directory of the file session store.
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".neatrix")
        })
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    non_blank_env(primary).or_else(|| non_blank_env(fallback))
}
