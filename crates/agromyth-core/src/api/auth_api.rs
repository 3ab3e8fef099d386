use async_trait::async_trait;

use crate::models::{Credentials, PasswordChange, ProfileUpdate, Registration, TokenPair, User};

use super::ApiError;

/// The account endpoints the session manager depends on.
///
/// [`ApiClient`](super::ApiClient) is the HTTP implementation; tests supply
/// their own.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Create an account. Returns the new user's profile.
    async fn register(&self, registration: &Registration) -> Result<User, ApiError>;

    /// Exchange credentials for an access/refresh token pair.
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError>;

    /// Fetch the profile the access token belongs to.
    async fn fetch_current_user(&self, access_token: &str) -> Result<User, ApiError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError>;

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError>;

    async fn change_password(
        &self,
        access_token: &str,
        change: &PasswordChange,
    ) -> Result<(), ApiError>;
}
