//! Registration, login, profile and logout.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use super::{call_json, log_failure, ServiceError};
use crate::auth::{Role, UserProfile};
use crate::http::{ApiClient, ApiRequest};

const REGISTER: &str = "/users/register";
const LOGIN: &str = "/users/login";
const PROFILE: &str = "/users/profile";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub registration_number: String,
    pub role: Role,
}

/// What a successful login or registration stored.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub user: UserProfile,
    /// The full response body.
    pub response: JsonValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    access_token: String,
    user: UserProfile,
}

pub struct UserService<'a> {
    client: &'a ApiClient,
}

impl<'a> UserService<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Create an account and sign in with it.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ServiceError> {
        self.authenticate(REGISTER, request, "register", "Registration failed").await
    }

    /// Log in. The backend also sets the session cookie used for refresh.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthSession, ServiceError> {
        self.authenticate(LOGIN, credentials, "login", "Login failed").await
    }

    /// Profile of the logged-in user, fetched from the backend.
    pub async fn profile(&self) -> Result<JsonValue, ServiceError> {
        call_json(self.client, ApiRequest::get(PROFILE), "profile", "Failed to fetch profile").await
    }

    /// Locally stored user, if logged in.
    pub fn current_user(&self) -> Result<Option<UserProfile>, ServiceError> {
        self.client
            .session()
            .user()
            .map_err(|e| ServiceError::new(format!("Failed to read stored user: {e}")))
    }

    /// Local only; the backend is not told.
    pub fn logout(&self) -> Result<(), ServiceError> {
        self.client
            .sign_out()
            .map_err(|e| ServiceError::new(format!("Failed to clear session: {e}")))?;
        info!("Logged out");
        Ok(())
    }

    async fn authenticate<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        operation: &str,
        fallback: &str,
    ) -> Result<AuthSession, ServiceError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ServiceError::new(format!("{fallback}: {e}")))?;
        let response = call_json(self.client, ApiRequest::post(path).with_json(body), operation, fallback).await?;

        let payload: SessionPayload = response
            .get("data")
            .cloned()
            .and_then(|data| serde_json::from_value(data).ok())
            .ok_or_else(|| log_failure(operation, ServiceError::new(fallback)))?;

        self.client
            .session()
            .sign_in(&payload.access_token, &payload.user)
            .map_err(|e| log_failure(operation, ServiceError::new(format!("Failed to store session: {e}"))))?;
        info!(username = %payload.user.username, "Signed in");

        Ok(AuthSession {
            access_token: payload.access_token,
            user: payload.user,
            response,
        })
    }
}
