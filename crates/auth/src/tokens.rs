//! Token endpoint payloads (transport-agnostic).
//!
//! Token strings are opaque to the client; `Debug` output never includes them.

use serde::{Deserialize, Serialize};

/// Username/password pair submitted to the token-issuance endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Access/refresh pair returned by `POST /token/`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl core::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TokenPair { access: <redacted>, refresh: <redacted> }")
    }
}

/// Body of `POST /token/refresh/` and `POST /token/blacklist/`.
#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Response of `POST /token/refresh/`.
///
/// When the server rotates refresh tokens it also returns a new `refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl core::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access", &"<redacted>")
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::new("alice", "good-pw");
        let pair = TokenPair {
            access: "A1".into(),
            refresh: "R1".into(),
        };

        let rendered = format!("{creds:?} {pair:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("good-pw"));
        assert!(!rendered.contains("A1"));
        assert!(!rendered.contains("R1"));
    }

    #[test]
    fn refresh_response_without_rotation() {
        let body: RefreshedToken = serde_json::from_str(r#"{"access":"A2"}"#).unwrap();
        assert_eq!(body.access, "A2");
        assert!(body.refresh.is_none());
    }
}
