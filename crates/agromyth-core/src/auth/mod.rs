//! Authentication module for managing the client session and its credentials.
//!
//! This module provides:
//! - `SessionManager`: login, session check, logout and account operations
//! - `CredentialStorage`: where tokens and the user record are persisted,
//!   with in-memory, JSON file and OS keychain backends
//! - `ErrorPayload`: failure detail surfaced on the session state

pub mod credentials;
pub mod error;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use error::{ErrorKind, ErrorPayload};
pub use session::{Lifecycle, SessionManager, SessionState, SessionView};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError};
