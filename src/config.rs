//! Configuration management

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::AuthConfig;

/// Console configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the remote authentication service
    pub api_base_url: String,

    /// Bound on the remote login call
    pub auth_timeout: Duration,

    /// Heuristic session lifetime measured from the last login
    pub session_ttl: chrono::Duration,

    /// How long a notification stays visible unless dismissed
    pub notification_ttl: Duration,

    /// Location of the persisted key-value state
    pub state_path: PathBuf,

    /// Device identifier sent with every login request
    pub device_id: String,

    /// Accept the local credential table when the backend is unavailable
    pub allow_local_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            auth_timeout: Duration::from_secs(10),
            session_ttl: chrono::Duration::hours(24),
            notification_ttl: Duration::from_secs(5),
            state_path: default_state_path(),
            device_id: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            allow_local_fallback: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = std::env::var("TELEMETRY_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let auth_timeout = std::env::var("TELEMETRY_AUTH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.auth_timeout);

        let session_ttl = std::env::var("TELEMETRY_SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(chrono::Duration::hours)
            .unwrap_or(defaults.session_ttl);

        let notification_ttl = std::env::var("TELEMETRY_NOTIFICATION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.notification_ttl);

        let state_path = std::env::var("TELEMETRY_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_path);

        let device_id = std::env::var("TELEMETRY_DEVICE_ID").unwrap_or(defaults.device_id);

        let allow_local_fallback = std::env::var("TELEMETRY_ALLOW_LOCAL_FALLBACK")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.allow_local_fallback);

        if allow_local_fallback {
            tracing::warn!("Local credential fallback enabled - backend rejections fall through to the demo table");
        }

        Ok(Self {
            api_base_url,
            auth_timeout,
            session_ttl,
            notification_ttl,
            state_path,
            device_id,
            allow_local_fallback,
        })
    }

    /// Authentication settings derived from this configuration
    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            login_url: format!("{}/auth/login", self.api_base_url),
            timeout: self.auth_timeout,
            session_ttl: self.session_ttl,
            device_id: self.device_id.clone(),
            allow_local_fallback: self.allow_local_fallback,
        }
    }
}

fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("telemetry-console")
        .join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.notification_ttl, Duration::from_secs(5));
        assert!(config.allow_local_fallback);
        assert!(config.state_path.ends_with("telemetry-console/state.json"));
    }

    #[test]
    fn test_auth_config_login_url() {
        let config = Config {
            api_base_url: "http://plant.local:8000/api".to_string(),
            ..Config::default()
        };
        let auth = config.auth();
        assert_eq!(auth.login_url, "http://plant.local:8000/api/auth/login");
        assert_eq!(auth.timeout, config.auth_timeout);
    }
}
