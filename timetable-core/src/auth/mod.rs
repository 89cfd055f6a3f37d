//! Credential storage for the authenticated client.
//!
//! This module provides:
//! - A key-value seam for persisted client state (memory or SQLite)
//! - Typed access to the credential slot and the stored user profile
//! - A persisted cookie jar for the refresh session cookie

pub mod cookies;
pub mod session;
pub mod storage;

pub use cookies::{PersistentCookieJar, SESSION_COOKIES_KEY};
pub use session::{Role, SessionStore, UserProfile, ACCESS_TOKEN_KEY, USER_KEY};
pub use storage::{MemoryStore, SqliteStore, StateStore, StorageError};
