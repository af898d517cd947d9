//! SoundCloud adapter — thin pass-through over an external SoundCloud
//! client; permalinks carry the track/set distinction.

use std::sync::Arc;

use super::{ProviderAdapter, RawAudio, ReferenceKind, Resolution};
use crate::error::ProviderError;
use crate::types::{Provider, QualityTier, TrackDescriptor};

/// External SoundCloud client capability, implemented outside the engine.
#[async_trait::async_trait]
pub trait SoundcloudClient: Send + Sync {
    /// Search for tracks matching a query
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Resolve a permalink path (`artist/track` or `artist/sets/name`)
    /// into a track or set expansion
    async fn resolve_permalink(&self, permalink: &str) -> Result<Resolution, ProviderError>;

    /// Download the audio stream for a track
    async fn fetch_audio(&self, track: &TrackDescriptor) -> Result<RawAudio, ProviderError>;
}

/// SoundCloud adapter over an injectable [`SoundcloudClient`]
pub struct SoundcloudAdapter {
    client: Arc<dyn SoundcloudClient>,
}

impl SoundcloudAdapter {
    /// Create the adapter from a client
    pub fn new(client: Arc<dyn SoundcloudClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for SoundcloudAdapter {
    fn provider(&self) -> Provider {
        Provider::Soundcloud
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
        _kind: ReferenceKind,
    ) -> Result<Resolution, ProviderError> {
        // The permalink itself encodes whether this is a track or a set.
        self.client.resolve_permalink(reference).await
    }

    async fn fetch_raw(
        &self,
        track: &TrackDescriptor,
        _quality: QualityTier,
    ) -> Result<RawAudio, ProviderError> {
        self.client.fetch_audio(track).await
    }
}
