//! API client for communicating with the Agro-MythBusters REST API.
//!
//! This module provides the `ApiClient` struct, the HTTP implementation of
//! [`AuthApi`]: registration, token exchange, and profile endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use crate::models::{Credentials, PasswordChange, ProfileUpdate, Registration, TokenPair, User};

use super::{ApiError, AuthApi};

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when neither config nor environment name one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

// Account routes are mounted under `auth/` and declare their own `auth/` prefix.
const REGISTER_PATH: &str = "auth/auth/register/";
const LOGIN_PATH: &str = "auth/auth/login/";
const REFRESH_PATH: &str = "auth/auth/token/refresh/";
const PROFILE_PATH: &str = "auth/profile/";
const CHANGE_PASSWORD_PATH: &str = "auth/auth/change-password/";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// API client for the account service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send the request built by `build`, retrying with exponential backoff
    /// while the server answers 429.
    async fn send<F>(&self, what: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(request = what, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            debug!(request = what, status = %response.status(), "Response received");
            return Self::check_response(response).await;
        }
    }

    async fn parse<T: DeserializeOwned>(what: &str, response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn register(&self, registration: &Registration) -> Result<User, ApiError> {
        let url = self.url(REGISTER_PATH);
        let response = self
            .send("register", || self.client.post(&url).json(registration))
            .await?;
        Self::parse("register", response).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        let url = self.url(LOGIN_PATH);
        let response = self
            .send("login", || self.client.post(&url).json(credentials))
            .await?;
        Self::parse("login", response).await
    }

    async fn fetch_current_user(&self, access_token: &str) -> Result<User, ApiError> {
        let url = self.url(PROFILE_PATH);
        let response = self
            .send("profile", || self.client.get(&url).bearer_auth(access_token))
            .await?;
        Self::parse("profile", response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let url = self.url(REFRESH_PATH);
        let body = serde_json::json!({ "refresh": refresh_token });
        let response = self
            .send("token refresh", || self.client.post(&url).json(&body))
            .await?;
        let refreshed: RefreshResponse = Self::parse("token refresh", response).await?;
        Ok(refreshed.access)
    }

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        let url = self.url(PROFILE_PATH);
        let response = self
            .send("profile update", || {
                self.client.patch(&url).bearer_auth(access_token).json(update)
            })
            .await?;
        Self::parse("profile update", response).await
    }

    async fn change_password(
        &self,
        access_token: &str,
        change: &PasswordChange,
    ) -> Result<(), ApiError> {
        let url = self.url(CHANGE_PASSWORD_PATH);
        self.send("change password", || {
            self.client.put(&url).bearer_auth(access_token).json(change)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(
            client.url("/auth/profile/"),
            "http://localhost:8000/api/auth/profile/"
        );
    }

    #[test]
    fn test_account_routes() {
        let client = ApiClient::new(DEFAULT_BASE_URL).unwrap();
        let routes = [
            (REGISTER_PATH, "http://localhost:8000/api/auth/auth/register/"),
            (LOGIN_PATH, "http://localhost:8000/api/auth/auth/login/"),
            (REFRESH_PATH, "http://localhost:8000/api/auth/auth/token/refresh/"),
            (PROFILE_PATH, "http://localhost:8000/api/auth/profile/"),
            (
                CHANGE_PASSWORD_PATH,
                "http://localhost:8000/api/auth/auth/change-password/",
            ),
        ];
        for (path, expected) in routes {
            assert_eq!(client.url(path), expected);
        }
    }

    #[test]
    fn test_refresh_response_parses() {
        let parsed: RefreshResponse =
            serde_json::from_str(r#"{"access":"new-access","refresh":"rotated"}"#).unwrap();
        assert_eq!(parsed.access, "new-access");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client =
            ApiClient::with_timeout("http://127.0.0.1:9/api", Duration::from_millis(500)).unwrap();
        let err = client
            .fetch_current_user("T1")
            .await
            .expect_err("request to a closed port should fail");
        assert!(matches!(err, ApiError::NetworkError(_)));
    }
}
