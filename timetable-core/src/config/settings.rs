//! Client settings for Timetable Admin.
//!
//! Settings are persisted to the SQLite database as JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend address used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Refresh endpoint path, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/api/v1/users/refresh-token";

/// Environment variable that overrides the persisted base URL.
pub const BASE_URL_ENV: &str = "TIMETABLE_API_BASE_URL";

/// Key of the settings row in the database.
const SETTINGS_KEY: &str = "settings";

/// Client settings - persisted to database as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Backend base URL (e.g. "http://localhost:8000").
    pub base_url: String,

    /// Path of the token refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Timeout for ordinary requests. `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Timeout for the refresh call. `None` waits indefinitely, which also
    /// blocks every queued request for as long as the refresh hangs.
    #[serde(default)]
    pub refresh_timeout_secs: Option<u64>,
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_path: default_refresh_path(),
            request_timeout_secs: None,
            refresh_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from database, using defaults for missing values.
    ///
    /// The `TIMETABLE_API_BASE_URL` environment variable wins over the stored
    /// base URL.
    pub fn load(db: &crate::db::Database) -> Self {
        let mut settings = Self::load_stored(db);
        settings.apply_env_override(std::env::var(BASE_URL_ENV).ok());
        settings.validate();
        settings
    }

    /// Load the stored settings only, ignoring the environment.
    pub fn load_stored(db: &crate::db::Database) -> Self {
        let mut settings = Self::default();

        if let Ok(Some(json)) = db.get_setting(SETTINGS_KEY) {
            match serde_json::from_str::<Settings>(&json) {
                Ok(loaded) => settings = loaded,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse settings, using defaults");
                }
            }
        }

        settings.validate();
        settings
    }

    /// Save settings to database.
    pub fn save(&self, db: &crate::db::Database) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_setting(SETTINGS_KEY, &json)?;
        Ok(())
    }

    /// Replace the base URL with an override value, if one is set.
    pub fn apply_env_override(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!(base_url = %url, "Base URL overridden from environment");
            self.base_url = url;
        }
    }

    /// Normalize settings to valid values.
    pub fn validate(&mut self) {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if url::Url::parse(trimmed).is_err() {
            tracing::warn!(base_url = %self.base_url, "Invalid base URL, using default");
            self.base_url = DEFAULT_BASE_URL.to_string();
        } else {
            self.base_url = trimmed.to_string();
        }

        if self.refresh_path.trim().is_empty() {
            self.refresh_path = default_refresh_path();
        } else if !self.refresh_path.starts_with('/') {
            self.refresh_path = format!("/{}", self.refresh_path);
        }

        // Zero means "no timeout" rather than "fail immediately"
        self.request_timeout_secs = self.request_timeout_secs.filter(|s| *s > 0);
        self.refresh_timeout_secs = self.refresh_timeout_secs.filter(|s| *s > 0);
    }

    /// Absolute URL for a path under the base URL.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Absolute URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        self.url_for(&self.refresh_path)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        self.refresh_timeout_secs.map(Duration::from_secs)
    }
}
