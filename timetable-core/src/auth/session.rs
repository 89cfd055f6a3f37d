//! Typed access to the credential slot and the stored user profile.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::cookies::SESSION_COOKIES_KEY;
use super::storage::{StateStore, StorageError};

/// Fixed key of the credential slot.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Fixed key of the serialized user profile.
pub const USER_KEY: &str = "user";

/// Role assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Student,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "Admin"),
            Self::Student => write!(f, "Student"),
            Self::Other(role) => write!(f, "{role}"),
        }
    }
}

/// The user object returned on login/registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub role: Option<Role>,
    /// Anything else the backend sends (ids, registration number, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Credential slot and stored user, layered over a [`StateStore`].
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn StateStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Current credential, if any.
    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .store
            .get(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.is_empty()))
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn clear_access_token(&self) -> Result<(), StorageError> {
        self.store.remove(ACCESS_TOKEN_KEY)
    }

    /// Stored user profile.
    ///
    /// A value that no longer parses is removed and reported as absent.
    pub fn user(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                error!(error = %e, "Failed to parse stored user, discarding it");
                self.store.remove(USER_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn set_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_string(user).map_err(|e| StorageError::InvalidValue {
            key: USER_KEY.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(USER_KEY, &json)
    }

    /// Persist the result of a successful login or registration.
    pub fn sign_in(&self, token: &str, user: &UserProfile) -> Result<(), StorageError> {
        self.set_access_token(token)?;
        self.set_user(user)?;
        debug!(username = %user.username, "Session stored");
        Ok(())
    }

    /// Remove the credential, the stored user and the session cookies.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(USER_KEY)?;
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(SESSION_COOKIES_KEY)?;
        debug!("Session cleared");
        Ok(())
    }
}
