//! Timetable Admin Core Library
//!
//! This crate provides the client side of the university timetable admin
//! backend. It includes:
//!
//! - An authenticated HTTP client with single-flight token refresh
//! - Credential and user-profile storage
//! - Configuration management (base URL, refresh endpoint, timeouts)
//! - SQLite database for persisted client state and settings
//! - Endpoint wrappers for users, courses, instructors, rooms and timetables

pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod services;

// Re-exports for convenience
pub use config::{Settings, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_REFRESH_PATH};
pub use db::Database;

// Re-export auth
pub use auth::{MemoryStore, Role, SessionStore, SqliteStore, StateStore, StorageError, UserProfile};

// Re-export the client
pub use http::{
    ApiClient, ApiError, ApiRequest, ApiResponse, HttpMethod, RefreshError, ReqwestTransport,
    Transport, TransportError,
};

// Re-export services
pub use services::{
    AuthSession, LoginRequest, PdfDownload, RegisterRequest, Resource, ResourceService,
    ServiceError, TimetableQuery, TimetableService, UserService,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
