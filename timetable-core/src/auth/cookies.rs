//! Session cookies persisted next to the credential.
//!
//! The backend hands out its refresh session as a cookie at login. Keeping
//! it in the [`StateStore`] lets a later process refresh the credential.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

use super::storage::{StateStore, StorageError};

/// Fixed key of the persisted cookie jar.
pub const SESSION_COOKIES_KEY: &str = "sessionCookies";

/// host -> cookie name -> cookie value
type Jar = BTreeMap<String, BTreeMap<String, String>>;

/// `reqwest` cookie provider backed by a [`StateStore`].
///
/// Cookies are scoped by host only; path, expiry dates and the secure flag
/// are not tracked. `Max-Age=0` or an empty value deletes a cookie.
pub struct PersistentCookieJar {
    store: Arc<dyn StateStore>,
}

impl PersistentCookieJar {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Cookies stored for a host, by name.
    pub fn cookies_for(&self, host: &str) -> BTreeMap<String, String> {
        self.load().remove(host).unwrap_or_default()
    }

    /// Forget every cookie.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(SESSION_COOKIES_KEY)
    }

    fn load(&self) -> Jar {
        match self.store.get(SESSION_COOKIES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable stored cookies");
                Jar::new()
            }),
            Ok(None) => Jar::new(),
            Err(e) => {
                warn!(error = %e, "Could not read stored cookies");
                Jar::new()
            }
        }
    }

    fn save(&self, jar: &Jar) -> Result<(), StorageError> {
        if jar.is_empty() {
            return self.store.remove(SESSION_COOKIES_KEY);
        }
        let json = serde_json::to_string(jar).map_err(|e| StorageError::InvalidValue {
            key: SESSION_COOKIES_KEY.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(SESSION_COOKIES_KEY, &json)
    }
}

/// What one `Set-Cookie` header asks for.
#[derive(Debug, PartialEq, Eq)]
enum CookieUpdate {
    Set { name: String, value: String },
    Remove { name: String },
}

fn parse_set_cookie(header: &str) -> Option<CookieUpdate> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let expired = parts.any(|attr| {
        attr.split_once('=').is_some_and(|(key, age)| {
            key.trim().eq_ignore_ascii_case("max-age")
                && age.trim().parse::<i64>().is_ok_and(|secs| secs <= 0)
        })
    });

    if expired || value.is_empty() {
        Some(CookieUpdate::Remove { name: name.to_string() })
    } else {
        Some(CookieUpdate::Set {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

impl reqwest::cookie::CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };

        let updates: Vec<CookieUpdate> = cookie_headers
            .filter_map(|h| h.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        if updates.is_empty() {
            return;
        }

        let mut jar = self.load();
        let cookies = jar.entry(host.to_string()).or_default();
        for update in updates {
            match update {
                CookieUpdate::Set { name, value } => {
                    debug!(host, cookie = %name, "Storing session cookie");
                    cookies.insert(name, value);
                }
                CookieUpdate::Remove { name } => {
                    cookies.remove(&name);
                }
            }
        }
        if cookies.is_empty() {
            jar.remove(host);
        }

        if let Err(e) = self.save(&jar) {
            warn!(error = %e, "Failed to persist session cookies");
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let cookies = self.cookies_for(url.host_str()?);
        if cookies.is_empty() {
            return None;
        }
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}
