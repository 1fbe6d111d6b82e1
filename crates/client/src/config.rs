//! Client configuration, read from the environment at start-up.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Settings for the transport and session store.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to.
    pub api_url: String,
    /// Where the durable token slot lives.
    pub token_file: PathBuf,
    /// Chain a login after a successful registration.
    pub login_after_register: bool,
    /// Per-request timeout; `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token_file: default_token_file(),
            login_after_register: true,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Build from `STOCKDESK_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("STOCKDESK_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(path) = lookup("STOCKDESK_TOKEN_FILE").filter(|v| !v.trim().is_empty()) {
            config.token_file = PathBuf::from(path);
        }
        if let Some(flag) = lookup("STOCKDESK_LOGIN_AFTER_REGISTER") {
            match parse_bool(&flag) {
                Some(value) => config.login_after_register = value,
                None => tracing::warn!(value = %flag, "ignoring invalid STOCKDESK_LOGIN_AFTER_REGISTER"),
            }
        }
        if let Some(secs) = lookup("STOCKDESK_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(0) => config.timeout = None,
                Ok(n) => config.timeout = Some(Duration::from_secs(n)),
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid STOCKDESK_TIMEOUT_SECS"),
            }
        }

        config
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = path.into();
        self
    }

    pub fn with_login_after_register(mut self, enabled: bool) -> Self {
        self.login_after_register = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn default_token_file() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockdesk")
        .join("tokens.json")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
