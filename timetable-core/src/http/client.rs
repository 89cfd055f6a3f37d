//! The authenticated API client.
//!
//! Every request carries the stored credential. A request rejected with 401
//! is retried once, after a refresh that is shared by every request failing
//! at the same time.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::refresh::{RefreshCoordinator, RefreshError, RefreshOutcome, RefreshTicket};
use super::request::{bearer, ApiRequest, ApiResponse};
use super::transport::{ReqwestTransport, Transport, TransportError};
use super::{AUTHORIZATION, CONTENT_TYPE};
use crate::auth::{PersistentCookieJar, SessionStore, StateStore, StorageError};
use crate::config::Settings;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response, passed through untouched.
    #[error("{}", describe_status(.0))]
    Status(ApiResponse),
    #[error("Request failed: {0}")]
    Transport(#[from] TransportError),
    /// The session could not be refreshed; the caller has to log in again.
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

fn describe_status(response: &ApiResponse) -> String {
    match response.message() {
        Some(message) => format!("Request failed with status {}: {}", response.status(), message),
        None => format!("Request failed with status {}", response.status()),
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(response) => Some(response.status()),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// The backend's `message` field from whichever response failed.
    pub fn server_message(&self) -> Option<String> {
        match self {
            Self::Status(response) => response.message(),
            Self::Refresh(err) => err.server_message().map(str::to_string),
            Self::Transport(_) => None,
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }
}

/// One call through the client: the request plus its retry marker.
struct PendingRequest {
    id: Uuid,
    request: ApiRequest,
    retried: bool,
}

/// HTTP client that attaches credentials and recovers from expired ones.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    settings: Settings,
    default_headers: RwLock<BTreeMap<String, String>>,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>, store: Arc<dyn StateStore>) -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());

        Self {
            transport,
            session: SessionStore::new(store),
            settings,
            default_headers: RwLock::new(default_headers),
            refresh: RefreshCoordinator::new(),
        }
    }

    /// Client over the network, using `reqwest`.
    ///
    /// Session cookies are kept in `store` next to the credential, so a
    /// client built later over the same store can still refresh.
    pub fn connect(settings: Settings, store: Arc<dyn StateStore>) -> Result<Self, TransportError> {
        let cookies = Arc::new(PersistentCookieJar::new(store.clone()));
        let transport = ReqwestTransport::with_cookie_provider(settings.request_timeout(), cookies)?;
        Ok(Self::new(settings, Arc::new(transport), store))
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Credential slot and stored user.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Send a request.
    ///
    /// A 401 triggers at most one refresh-and-replay for this request. Any
    /// other failure is returned unchanged.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut pending = PendingRequest {
            id: Uuid::new_v4(),
            request,
            retried: false,
        };
        let span = tracing::debug_span!(
            "api_request",
            request_id = %pending.id,
            method = %pending.request.method,
            path = %pending.request.path,
        );
        self.send_pending(&mut pending).instrument(span).await
    }

    async fn send_pending(&self, pending: &mut PendingRequest) -> Result<ApiResponse, ApiError> {
        loop {
            let response = self.dispatch(&pending.request).await?;

            if response.is_success() {
                return Ok(response);
            }

            if !response.is_unauthorized() || pending.retried {
                debug!(status = response.status(), retried = pending.retried, "Request failed");
                return Err(ApiError::Status(response));
            }

            pending.retried = true;
            let token = self.refreshed_token().await?;
            pending.request.set_bearer(&token);
            debug!("Replaying request with refreshed credential");
        }
    }

    /// Request interceptor: defaults, then the request's own headers, then
    /// the stored credential.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut outbound = request.clone();
        outbound.headers = merge_headers(&self.default_headers_snapshot(), &request.headers);

        match self.session.access_token() {
            Ok(Some(token)) => outbound.set_bearer(&token),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read stored credential"),
        }

        let url = self.settings.url_for(&outbound.path);
        self.transport.execute(&url, &outbound).await
    }

    /// Lead a refresh, or wait for the one in flight.
    async fn refreshed_token(&self) -> Result<String, RefreshError> {
        match self.refresh.join() {
            RefreshTicket::Waiter(rx) => rx.await.unwrap_or_else(|_| Err(RefreshError::Abandoned)),
            RefreshTicket::Leader(guard) => {
                let outcome = self.run_refresh().await;
                if let Err(e) = &outcome {
                    warn!(error = %e, "Session refresh failed, clearing credential");
                    self.discard_credential();
                }
                guard.settle(&outcome);
                outcome
            }
        }
    }

    /// One call to the refresh endpoint, bypassing the interceptors.
    async fn run_refresh(&self) -> RefreshOutcome {
        let request = ApiRequest::post(self.settings.refresh_path.clone())
            .with_header(CONTENT_TYPE, "application/json")
            .with_json(json!({}));
        let url = self.settings.refresh_url();
        let call = self.transport.execute(&url, &request);

        let result = match self.settings.refresh_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RefreshError::TimedOut(limit))?,
            None => call.await,
        };
        let response = result.map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status(),
                message: response.message(),
            });
        }

        let token = extract_access_token(&response).ok_or(RefreshError::MissingToken)?;

        self.session
            .set_access_token(&token)
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        self.set_default_header(AUTHORIZATION, bearer(&token));
        info!("Session refreshed");

        Ok(token)
    }

    fn discard_credential(&self) {
        if let Err(e) = self.session.clear_access_token() {
            error!(error = %e, "Failed to remove stored credential");
        }
        self.remove_default_header(AUTHORIZATION);
    }

    /// Forget the stored credential, the stored user, the session cookies
    /// and the default `Authorization` header.
    pub fn sign_out(&self) -> Result<(), StorageError> {
        self.remove_default_header(AUTHORIZATION);
        self.session.clear()
    }

    /// Set a header sent with every subsequent request.
    pub fn set_default_header(&self, name: &str, value: impl Into<String>) {
        let mut headers = self.default_headers.write().unwrap_or_else(PoisonError::into_inner);
        headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        headers.insert(name.to_string(), value.into());
    }

    /// Stop sending a default header. No-op if it is not set.
    pub fn remove_default_header(&self, name: &str) {
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|k, _| !k.eq_ignore_ascii_case(name));
    }

    /// Current value of a default header, matched case-insensitively.
    pub fn default_header(&self, name: &str) -> Option<String> {
        self.default_headers_snapshot()
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    fn default_headers_snapshot(&self) -> BTreeMap<String, String> {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Requests parked behind the in-flight refresh.
    pub fn pending_waiters(&self) -> usize {
        self.refresh.pending_waiters()
    }
}

/// Defaults overlaid by request headers, compared case-insensitively.
fn merge_headers(
    defaults: &BTreeMap<String, String>,
    request: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = defaults
        .iter()
        .filter(|(k, _)| !request.keys().any(|r| r.eq_ignore_ascii_case(k)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// `accessToken` at the top level, or nested under `data`.
fn extract_access_token(response: &ApiResponse) -> Option<String> {
    let body: serde_json::Value = response.json().ok()?;
    body.get("accessToken")
        .or_else(|| body.get("data").and_then(|d| d.get("accessToken")))
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
