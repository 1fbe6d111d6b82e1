//! Client error model.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use stockdesk_auth::{AuthzError, ValidationError};

use crate::token_store::TokenStoreError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The operation needs a logged-in user and there is none.
    #[error("User not found")]
    NotAuthenticated,

    /// The current user's role does not allow the operation.
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    Api { status: u16, message: Option<String> },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] TokenStoreError),
}

impl ClientError {
    pub(crate) fn from_response_body(status: StatusCode, body: &str) -> Self {
        ClientError::Api {
            status: status.as_u16(),
            message: extract_message(body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Text to show a person: the server's own message when it sent one, local
    /// validation text, or `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Validation(e) => e.to_string(),
            ClientError::NotAuthenticated => self.to_string(),
            ClientError::Forbidden(e) => e.to_string(),
            ClientError::Api {
                message: Some(message),
                ..
            } => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Best-effort human-readable message from an API error payload.
///
/// Looks at `detail`, `message`, `error`, `non_field_errors`, then the first
/// field error (`"field: text"`).
pub fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    for key in ["detail", "message", "error", "non_field_errors"] {
        if let Some(text) = object.get(key).and_then(first_text) {
            return Some(text);
        }
    }

    object
        .iter()
        .find_map(|(field, v)| first_text(v).map(|text| format!("{field}: {text}")))
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}
