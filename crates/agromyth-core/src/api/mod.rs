//! REST API client module for the Agro-MythBusters account service.
//!
//! This module provides the `AuthApi` trait consumed by the session manager
//! and `ApiClient`, its HTTP implementation.
//!
//! The API uses JWT bearer tokens obtained from `auth/login/` and renewed
//! through `auth/token/refresh/`.

pub mod auth_api;
pub mod client;
pub mod error;

pub use auth_api::AuthApi;
pub use client::ApiClient;
pub use error::ApiError;
