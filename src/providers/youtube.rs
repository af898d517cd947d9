//! YouTube adapter — cookie-jar refresh before every fetch over an
//! external YouTube client.

use std::sync::Arc;

use super::{ProviderAdapter, RawAudio, ReferenceKind, Resolution};
use crate::credentials::{CookieSnapshot, CredentialStore};
use crate::error::ProviderError;
use crate::types::{Provider, QualityTier, TrackDescriptor};

/// External YouTube client capability, implemented outside the engine.
///
/// Implementations must map an authentication rejection to
/// [`ProviderError::AuthExpired`] so it stays distinct from transient
/// network failure, and should treat an empty cookie snapshot as an
/// unauthenticated fetch (degraded reliability, not an error).
#[async_trait::async_trait]
pub trait YoutubeClient: Send + Sync {
    /// Search for videos matching a query
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Look up a single video by id
    async fn video(&self, id: &str) -> Result<TrackDescriptor, ProviderError>;

    /// Expand a playlist into its videos, provider-native order
    async fn playlist(&self, id: &str) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Download the best available audio stream for a video
    async fn fetch_audio(
        &self,
        track: &TrackDescriptor,
        cookies: &CookieSnapshot,
    ) -> Result<RawAudio, ProviderError>;
}

/// YouTube adapter over an injectable [`YoutubeClient`]
///
/// The cookie jar is reloaded from its external source immediately before
/// every fetch; a successful earlier fetch is never taken as evidence the
/// cookies are still good.
pub struct YoutubeAdapter {
    client: Arc<dyn YoutubeClient>,
    credentials: Arc<CredentialStore>,
}

impl YoutubeAdapter {
    /// Create the adapter from a client and the credential store
    pub fn new(client: Arc<dyn YoutubeClient>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for YoutubeAdapter {
    fn provider(&self) -> Provider {
        Provider::Youtube
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        self.client.search(query, limit).await
    }

    async fn resolve(
        &self,
        reference: &str,
        kind: ReferenceKind,
    ) -> Result<Resolution, ProviderError> {
        match kind {
            ReferenceKind::Track => Ok(Resolution::Track(self.client.video(reference).await?)),
            ReferenceKind::Album | ReferenceKind::Playlist => Ok(Resolution::Collection {
                tracks: self.client.playlist(reference).await?,
            }),
        }
    }

    async fn fetch_raw(
        &self,
        track: &TrackDescriptor,
        _quality: QualityTier,
    ) -> Result<RawAudio, ProviderError> {
        let cookies = self.credentials.reload_youtube_cookies().await;
        if cookies.is_empty() {
            tracing::debug!(track = %track.id, "fetching without cookies");
        }
        self.client.fetch_audio(track, &cookies).await
    }
}
