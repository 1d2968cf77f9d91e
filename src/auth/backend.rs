//! Remote authentication call
//!
//! `POST {api}/auth/login` with `{username, password, device}`. Any
//! non-success status, transport failure, rejection or malformed payload is
//! reported as a [`BackendError`]; the caller treats all of them as
//! "remote unavailable".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::session::{Role, User};

/// Remote failures
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend returned status {0}")]
    Status(u16),

    #[error("Backend rejected login: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Login request body; the password is wiped when dropped
#[derive(Serialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device", &self.device)
            .finish()
    }
}

/// User object as sent by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    pub id: RemoteId,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// Backends send numeric or string identifiers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Text(String),
    Number(i64),
}

impl RemoteId {
    pub fn into_string(self) -> String {
        match self {
            RemoteId::Text(s) => s,
            RemoteId::Number(n) => n.to_string(),
        }
    }
}

impl RemoteUser {
    /// Convert to a session user, defaulting the display name to the
    /// submitted username and permissions to empty
    pub fn into_user(self, submitted_username: &str) -> User {
        User {
            id: self.id.into_string(),
            username: self.username,
            role: self.role,
            display_name: self.name.unwrap_or_else(|| submitted_username.to_string()),
            permissions: self.permissions.unwrap_or_default().into_iter().collect::<BTreeSet<_>>(),
        }
    }
}

/// Successful remote login
#[derive(Debug, Clone)]
pub struct RemoteLogin {
    pub token: String,
    pub user: RemoteUser,
}

#[derive(Debug, Deserialize)]
struct LoginResponseBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<RemoteUser>,
    #[serde(default)]
    message: Option<String>,
}

impl LoginResponseBody {
    fn into_login(self) -> Result<RemoteLogin, BackendError> {
        if !self.success {
            return Err(BackendError::Rejected(
                self.message.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BackendError::Malformed("missing token".into()))?;
        let user = self
            .user
            .ok_or_else(|| BackendError::Malformed("missing user".into()))?;
        Ok(RemoteLogin { token, user })
    }
}

/// Remote authentication seam
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<RemoteLogin, BackendError>;
}

/// HTTP backend
pub struct HttpAuthBackend {
    client: reqwest::Client,
    login_url: String,
}

impl HttpAuthBackend {
    pub fn new(login_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            login_url: login_url.into(),
        })
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, request: &LoginRequest) -> Result<RemoteLogin, BackendError> {
        debug!("POST {}", self.login_url);

        let response = self
            .client
            .post(&self.login_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(Duration::ZERO)
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body: LoginResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        body.into_login()
    }
}

/// Backend that is never reachable (offline shells, tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

#[async_trait]
impl AuthBackend for OfflineBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<RemoteLogin, BackendError> {
        Err(BackendError::Transport("offline".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<RemoteLogin, BackendError> {
        serde_json::from_str::<LoginResponseBody>(raw)
            .map_err(|e| BackendError::Malformed(e.to_string()))?
            .into_login()
    }

    #[test]
    fn test_full_payload() {
        let login = parse(
            r#"{"success":true,"token":"abc","user":{"id":7,"username":"ana","role":"supervisor","name":"Ana","permissions":["edit_config"]}}"#,
        )
        .unwrap();

        assert_eq!(login.token, "abc");
        let user = login.user.into_user("ana");
        assert_eq!(user.id, "7");
        assert_eq!(user.role, Role::Supervisor);
        assert_eq!(user.display_name, "Ana");
        assert!(user.permissions.contains("edit_config"));
    }

    #[test]
    fn test_defaults_for_missing_name_and_permissions() {
        let login = parse(
            r#"{"success":true,"token":"abc","user":{"id":"u1","username":"op","role":"operator"}}"#,
        )
        .unwrap();

        let user = login.user.into_user("Op");
        assert_eq!(user.display_name, "Op");
        assert!(user.permissions.is_empty());
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            parse(r#"{"success":false,"message":"bad password"}"#),
            Err(BackendError::Rejected(m)) if m == "bad password"
        ));
        assert!(matches!(parse(r#"{"token":"abc"}"#), Err(BackendError::Rejected(_))));
        assert!(matches!(
            parse(r#"{"success":true,"token":""}"#),
            Err(BackendError::Malformed(_))
        ));
        assert!(matches!(
            parse(r#"{"success":true,"token":"abc","user":{"id":1,"username":"x","role":"admin"}}"#),
            Err(BackendError::Malformed(_))
        ));
    }

    #[test]
    fn test_request_debug_redacts_password() {
        let request = LoginRequest {
            username: "op".into(),
            password: "secret".into(),
            device: "test".into(),
        };
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn test_offline_backend_fails() {
        let request = LoginRequest {
            username: "op".into(),
            password: "x".into(),
            device: "test".into(),
        };
        assert!(OfflineBackend.login(&request).await.is_err());
    }
}
