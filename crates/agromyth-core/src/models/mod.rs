//! Data models for Agro-MythBusters accounts.
//!
//! - `User`: profile record returned by the API
//! - `Credentials`, `TokenPair`: login exchange
//! - `Registration`, `ProfileUpdate`, `PasswordChange`: account mutations

pub mod account;
pub mod user;

pub use account::{Credentials, PasswordChange, ProfileUpdate, Registration, TokenPair};
pub use user::User;
