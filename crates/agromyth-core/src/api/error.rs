use thiserror::Error;

use crate::models::account::FieldErrors;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(FieldErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message used when a 401 body carries no `detail`
const DEFAULT_UNAUTHORIZED: &str = "token may be expired";

fn format_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the `detail` message out of an error body, if it has one.
    fn detail(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("detail")
            .and_then(|d| d.as_str())
            .map(str::to_string)
    }

    /// Parse a `400` body of the form `{"field": ["msg", ...], ...}`.
    ///
    /// Scalar values are accepted as single messages. Anything that is not
    /// a JSON object lands under `non_field_errors`.
    pub fn parse_field_errors(body: &str) -> FieldErrors {
        let mut errors = FieldErrors::new();
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => {
                for (field, value) in map {
                    let messages = match value {
                        serde_json::Value::Array(items) => items
                            .into_iter()
                            .map(|item| match item {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            })
                            .collect(),
                        serde_json::Value::String(s) => vec![s],
                        other => vec![other.to_string()],
                    };
                    errors.insert(field, messages);
                }
            }
            _ => {
                errors.insert(
                    "non_field_errors".to_string(),
                    vec![Self::truncate_body(body)],
                );
            }
        }
        errors
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 => ApiError::Validation(Self::parse_field_errors(body)),
            401 => ApiError::Unauthorized(
                Self::detail(body).unwrap_or_else(|| DEFAULT_UNAUTHORIZED.to_string()),
            ),
            403 => ApiError::AccessDenied(
                Self::detail(body).unwrap_or_else(|| Self::truncate_body(body)),
            ),
            404 => ApiError::NotFound(Self::truncate_body(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// True when the server rejected the caller's identity rather than the request.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::AccessDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_bad_request_parses_field_errors() {
        let body = r#"{"email":["user with this email address already exists."],"password":"Password fields didn't match."}"#;
        match ApiError::from_status(StatusCode::BAD_REQUEST, body) {
            ApiError::Validation(errors) => {
                assert_eq!(
                    errors["email"],
                    vec!["user with this email address already exists.".to_string()]
                );
                assert_eq!(
                    errors["password"],
                    vec!["Password fields didn't match.".to_string()]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_request_non_json_body() {
        let errors = ApiError::parse_field_errors("<html>oops</html>");
        assert_eq!(errors["non_field_errors"], vec!["<html>oops</html>".to_string()]);
    }

    #[test]
    fn test_unauthorized_uses_detail() {
        let body = r#"{"detail":"No active account found with the given credentials"}"#;
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, body);
        assert!(err.is_auth_failure());
        assert_eq!(
            err.to_string(),
            "Unauthorized: No active account found with the given credentials"
        );
    }

    #[test]
    fn test_unauthorized_without_body() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.to_string(), "Unauthorized: token may be expired");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
        assert!(!ApiError::from_status(StatusCode::NOT_FOUND, "").is_auth_failure());
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH * 2);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 1000 total bytes"));
    }

    #[test]
    fn test_validation_display() {
        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), vec!["Enter a valid email address.".to_string()]);
        let err = ApiError::Validation(errors);
        assert_eq!(
            err.to_string(),
            "Validation failed: email: Enter a valid email address."
        );
    }
}
