//! Client session lifecycle: login, session check, logout.
//!
//! `SessionManager` is the single owner of the session state and of the
//! persisted credentials. Observers read the state through [`SessionManager::subscribe`]
//! or [`SessionManager::snapshot`]; only the manager's operations change it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::models::{Credentials, PasswordChange, ProfileUpdate, Registration, User};

use super::error::ErrorPayload;
use super::storage::{
    CredentialStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_KEY,
};

/// Progress of the most recent session operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Rejected(ErrorPayload),
}

/// Authentication status and cached profile.
///
/// Authenticated exactly when a user is present, and an error only exists
/// on a rejected operation, so neither flag can disagree with the data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    user: Option<User>,
    lifecycle: Lifecycle,
    updated_at: Option<DateTime<Utc>>,
}

/// Flat read-only view handed to route guards and views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionView {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<ErrorPayload>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn loading(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Pending)
    }

    pub fn error(&self) -> Option<&ErrorPayload> {
        match &self.lifecycle {
            Lifecycle::Rejected(err) => Some(err),
            _ => None,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// When the last operation settled, if any has.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            is_authenticated: self.is_authenticated(),
            user: self.user.clone(),
            loading: self.loading(),
            error: self.error().cloned(),
        }
    }
}

pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn CredentialStorage>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Create a manager, restoring the session from storage.
    ///
    /// A persisted access token together with a readable user record
    /// starts out authenticated; call [`check_session`](Self::check_session)
    /// to confirm it with the server.
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn CredentialStorage>) -> Self {
        let initial = SessionState {
            user: Self::restore_user(storage.as_ref()),
            ..SessionState::default()
        };
        debug!(authenticated = initial.is_authenticated(), "Session restored");

        let (state, _) = watch::channel(initial);
        Self { api, storage, state }
    }

    fn restore_user(storage: &dyn CredentialStorage) -> Option<User> {
        match storage.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => {}
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                return None;
            }
        }

        match storage.get(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable persisted user");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted user");
                None
            }
        }
    }

    // ===== Read access =====

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Bearer token for other API callers, if one is persisted.
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    // ===== Operations =====

    /// Exchange credentials for tokens, then load and persist the profile.
    ///
    /// On any failure the session ends unauthenticated with no tokens stored.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ErrorPayload> {
        self.begin();
        debug!(email = %credentials.email, "Logging in");

        match self.exchange_credentials(credentials).await {
            Ok(user) => {
                info!(user_id = user.id, "Login successful");
                self.settle(Some(user.clone()), Lifecycle::Fulfilled);
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                self.clear_storage();
                self.settle(None, Lifecycle::Rejected(err.clone()));
                Err(err)
            }
        }
    }

    async fn exchange_credentials(&self, credentials: &Credentials) -> Result<User, ErrorPayload> {
        let tokens = self.api.login(credentials).await?;
        self.write(ACCESS_TOKEN_KEY, &tokens.access);
        self.write(REFRESH_TOKEN_KEY, &tokens.refresh);

        let user = self.api.fetch_current_user(&tokens.access).await?;
        self.persist_user(&user);
        Ok(user)
    }

    /// Confirm the persisted token with the server.
    ///
    /// Returns `Ok(None)` without any network call when no token is stored,
    /// dropping any refresh token or user record left behind without one.
    /// Any fetch failure clears every persisted key.
    pub async fn check_session(&self) -> Result<Option<User>, ErrorPayload> {
        let token = match self.read(ACCESS_TOKEN_KEY) {
            Some(token) if !token.is_empty() => token,
            _ => {
                debug!("No persisted token, session is unauthenticated");
                self.clear_storage();
                self.settle(None, Lifecycle::Idle);
                return Ok(None);
            }
        };

        self.begin();
        match self.api.fetch_current_user(&token).await {
            Ok(user) => {
                debug!(user_id = user.id, "Session confirmed");
                self.persist_user(&user);
                self.settle(Some(user.clone()), Lifecycle::Fulfilled);
                Ok(Some(user))
            }
            Err(e) => {
                let err = ErrorPayload::from(e);
                info!(error = %err, "Session check failed, clearing credentials");
                self.clear_storage();
                self.settle(None, Lifecycle::Rejected(err.clone()));
                Err(err)
            }
        }
    }

    /// Forget all credentials. Always succeeds.
    pub fn logout(&self) {
        self.clear_storage();
        self.settle(None, Lifecycle::Idle);
        info!("Logged out");
    }

    /// Create an account and log straight into it.
    ///
    /// Local validation failures and server-side rejections of the
    /// registration leave the session untouched.
    pub async fn register(&self, registration: &Registration) -> Result<User, ErrorPayload> {
        registration.validate().map_err(ErrorPayload::validation)?;

        let created = self.api.register(registration).await.map_err(|e| {
            let err = ErrorPayload::from(e);
            warn!(error = %err, "Registration failed");
            err
        })?;
        info!(user_id = created.id, "Account registered");

        self.login(&registration.credentials()).await
    }

    /// Save profile edits and replace the cached user with the server's copy.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ErrorPayload> {
        let token = self.access_token().ok_or_else(ErrorPayload::not_logged_in)?;

        self.begin();
        match self.api.update_profile(&token, update).await {
            Ok(user) => {
                self.persist_user(&user);
                self.settle(Some(user.clone()), Lifecycle::Fulfilled);
                Ok(user)
            }
            Err(e) => {
                let err = ErrorPayload::from(e);
                warn!(error = %err, "Profile update failed");
                let user = self.current_user();
                self.settle(user, Lifecycle::Rejected(err.clone()));
                Err(err)
            }
        }
    }

    /// Does not touch the session state.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ErrorPayload> {
        let token = self.access_token().ok_or_else(ErrorPayload::not_logged_in)?;
        self.api.change_password(&token, change).await?;
        info!("Password changed");
        Ok(())
    }

    /// Trade the refresh token for a new access token.
    ///
    /// A refresh token the server rejects ends the session the same way a
    /// failed session check does. Transport failures leave it alone.
    pub async fn refresh_access_token(&self) -> Result<(), ErrorPayload> {
        let refresh = self
            .read(REFRESH_TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .ok_or_else(ErrorPayload::not_logged_in)?;

        match self.api.refresh(&refresh).await {
            Ok(access) => {
                self.write(ACCESS_TOKEN_KEY, &access);
                debug!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                let err = ErrorPayload::from(e);
                if err.is_auth() {
                    info!(error = %err, "Refresh token rejected, clearing credentials");
                    self.clear_storage();
                    self.settle(None, Lifecycle::Rejected(err.clone()));
                } else {
                    warn!(error = %err, "Token refresh failed");
                }
                Err(err)
            }
        }
    }

    /// Drop a rejected operation's error, e.g. once a form has shown it.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state.lifecycle, Lifecycle::Rejected(_)) {
                state.lifecycle = Lifecycle::Idle;
                true
            } else {
                false
            }
        });
    }

    // ===== State transitions =====

    fn begin(&self) {
        self.state.send_modify(|state| state.lifecycle = Lifecycle::Pending);
    }

    fn settle(&self, user: Option<User>, lifecycle: Lifecycle) {
        self.state.send_modify(|state| {
            state.user = user;
            state.lifecycle = lifecycle;
            state.updated_at = Some(Utc::now());
        });
    }

    // ===== Storage =====

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "Failed to read credential");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!(error = %e, key, "Failed to persist credential");
        }
    }

    fn persist_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(raw) => self.write(USER_KEY, &raw),
            Err(e) => warn!(error = %e, "Failed to serialize user"),
        }
    }

    fn clear_storage(&self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "Failed to remove credential");
            }
        }
    }
}
