//! Core library for the Agro-MythBusters client.
//!
//! - [`api`]: HTTP client for the `/auth/*` REST endpoints
//! - [`auth`]: session lifecycle and credential persistence
//! - [`models`]: user and request payload types
//! - [`config`]: on-disk client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{
    CredentialStorage, ErrorKind, ErrorPayload, FileStorage, KeyringStorage, Lifecycle,
    MemoryStorage, SessionManager, SessionState,
};
pub use config::{Config, StorageBackend};
pub use models::{Credentials, PasswordChange, ProfileUpdate, Registration, TokenPair, User};
