//! Provider credential storage
//!
//! Holds the authentication material the provider adapters consume:
//!
//! - The **Deezer ARL token** is loaded once at construction and is
//!   immutable for the process lifetime. Rotating it requires a restart.
//! - The **YouTube cookie jar** is re-read from its external file before
//!   every fetch. The file going missing is expected operational behavior
//!   (fetches proceed unauthenticated, with degraded reliability), never
//!   an error.
//!
//! The store is an explicitly owned object injected into the adapters, so
//! tests can substitute a store pointed at a scratch file.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::config::ProviderConfig;

/// A point-in-time copy of the YouTube cookie jar.
///
/// Handed to the YouTube client for a single fetch attempt; never cached
/// beyond it.
#[derive(Clone, Debug, Default)]
pub struct CookieSnapshot {
    raw: Option<String>,
    /// When this snapshot was loaded from the external file
    pub loaded_at: Option<DateTime<Utc>>,
}

impl CookieSnapshot {
    /// Whether the jar is empty (file absent, empty, or never loaded)
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// Raw cookie file contents, in whatever format the external fetch
    /// capability expects
    pub fn contents(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// Process-wide provider credential state
pub struct CredentialStore {
    deezer_token: Option<String>,
    cookie_file: Option<PathBuf>,
    youtube_cookies: RwLock<CookieSnapshot>,
}

impl CredentialStore {
    /// Create a store with an explicit token and cookie file path
    pub fn new(deezer_token: Option<String>, cookie_file: Option<PathBuf>) -> Self {
        Self {
            deezer_token,
            cookie_file,
            youtube_cookies: RwLock::new(CookieSnapshot::default()),
        }
    }

    /// Create a store from the provider configuration
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.deezer_token.clone(), config.cookie_file.clone())
    }

    /// The Deezer ARL token, immutable for the process lifetime
    pub fn deezer_token(&self) -> Option<&str> {
        self.deezer_token.as_deref()
    }

    /// Re-read the YouTube cookie jar from its external file and return a
    /// snapshot of the fresh contents.
    ///
    /// An absent or empty file yields an empty jar. The write lock is held
    /// across the file read and the swap, so a reload either
    /// completes-before or happens-after any concurrent
    /// [`youtube_cookies`](Self::youtube_cookies) read, never interleaved
    /// with it.
    pub async fn reload_youtube_cookies(&self) -> CookieSnapshot {
        let mut jar = self.youtube_cookies.write().await;
        let raw = match &self.cookie_file {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(contents) if !contents.trim().is_empty() => Some(contents),
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "cookie file is empty");
                    None
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(
                        path = %path.display(),
                        "cookie file absent, proceeding unauthenticated"
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to read cookie file, proceeding unauthenticated"
                    );
                    None
                }
            },
            None => None,
        };
        *jar = CookieSnapshot {
            raw,
            loaded_at: Some(Utc::now()),
        };
        jar.clone()
    }

    /// The most recently loaded cookie snapshot, without reloading
    pub async fn youtube_cookies(&self) -> CookieSnapshot {
        self.youtube_cookies.read().await.clone()
    }
}
