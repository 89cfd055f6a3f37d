//! Authenticated HTTP client for the timetable backend.
//!
//! This module provides:
//! - Request/response values and the transport seam (`reqwest` in production)
//! - Bearer credential injection on every outbound request
//! - Single-flight token refresh with replay of queued requests

mod client;
mod refresh;
mod request;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ApiClient, ApiError};
pub use refresh::RefreshError;
pub use request::{bearer, ApiRequest, ApiResponse, HttpMethod};
pub use transport::{ReqwestTransport, Transport, TransportError};

pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";
