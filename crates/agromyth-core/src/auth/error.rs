use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiError;
use crate::models::account::FieldErrors;

/// Coarse failure class shown to session observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ErrorKind {
    /// Input rejected field by field
    Validation,
    /// Bad credentials, or a token the server no longer accepts
    Auth,
    /// Transport failure or an unusable server response
    Network,
}

/// Failure detail attached to the session when an operation is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "FieldErrors::is_empty")]
    pub fields: FieldErrors,
}

impl ErrorPayload {
    pub fn validation(fields: FieldErrors) -> Self {
        let message = fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            kind: ErrorKind::Validation,
            message,
            fields,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Auth,
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    pub fn not_logged_in() -> Self {
        Self::auth("Not logged in")
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    /// Short message suitable for a login form or status line.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Auth => format!("Authentication failed: {}", self.message),
            ErrorKind::Network => {
                let lower = self.message.to_lowercase();
                if lower.contains("timed out") || lower.contains("timeout") {
                    "Connection timed out. Please try again.".to_string()
                } else if lower.contains("connect") || lower.contains("network") {
                    "Unable to connect to server. Check your internet connection.".to_string()
                } else {
                    format!("Request failed: {}", self.message)
                }
            }
        }
    }
}

impl From<ApiError> for ErrorPayload {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(fields) => Self::validation(fields),
            ApiError::Unauthorized(detail) | ApiError::AccessDenied(detail) => Self::auth(detail),
            other => Self::network(other.to_string()),
        }
    }
}
