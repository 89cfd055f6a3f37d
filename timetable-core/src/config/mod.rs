//! Configuration module for Timetable Admin.
//!
//! Manages client settings stored in SQLite.

mod settings;

pub use settings::{Settings, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_REFRESH_PATH};
