//! Provider adapters — one per provider, implementing a uniform
//! search/resolve/fetch capability over an injectable external client.
//!
//! The adapters are the only place where provider identity matters; once
//! the resolver has selected an adapter, everything downstream treats
//! tracks uniformly. Each adapter wraps a client trait
//! ([`DeezerApi`](deezer::DeezerApi), [`YoutubeClient`](youtube::YoutubeClient),
//! [`SoundcloudClient`](soundcloud::SoundcloudClient)) that performs the
//! actual network and codec work, and adds the engine-side concerns:
//! quality gating, credential consultation, and error taxonomy.

pub mod deezer;
pub mod soundcloud;
pub mod youtube;

pub use deezer::{DeezerAdapter, DeezerApi, DeezerFormat};
pub use soundcloud::{SoundcloudAdapter, SoundcloudClient};
pub use youtube::{YoutubeAdapter, YoutubeClient};

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::types::{Container, Provider, QualityTier, TrackDescriptor};

/// A raw audio stream fetched by a provider client, plus the container
/// hint the format pipeline needs to decide whether a re-encode is due.
#[derive(Clone, Debug)]
pub struct RawAudio {
    /// Temporary file holding the fetched stream
    pub path: PathBuf,
    /// Container the stream arrived in
    pub container: Container,
}

/// What a provider reference expands to
#[derive(Clone, Debug)]
pub enum Resolution {
    /// A single track
    Track(TrackDescriptor),
    /// An album or playlist expansion; every descriptor shares the
    /// collection's album reference
    Collection {
        /// Expanded tracks, in provider-native order
        tracks: Vec<TrackDescriptor>,
    },
}

/// Kind of provider-native reference a URL denotes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A single track
    Track,
    /// An album
    Album,
    /// A playlist
    Playlist,
}

/// Uniform provider capability set.
///
/// One implementation per provider; selected once at resolve time and
/// never re-inspected downstream.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter serves
    fn provider(&self) -> Provider;

    /// Search for tracks matching a free-text query
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Resolve a provider-native reference into one track or an
    /// album/playlist expansion
    async fn resolve(
        &self,
        reference: &str,
        kind: ReferenceKind,
    ) -> Result<Resolution, ProviderError>;

    /// Fetch the raw audio stream for a track at the given quality tier
    async fn fetch_raw(
        &self,
        track: &TrackDescriptor,
        quality: QualityTier,
    ) -> Result<RawAudio, ProviderError>;

    /// The quality tier this adapter can actually deliver for a track.
    ///
    /// Defaults to lossy; the Deezer adapter overrides this with its
    /// entitlement and configuration gating.
    fn effective_quality(&self, _track: &TrackDescriptor, _requested: QualityTier) -> QualityTier {
        QualityTier::Lossy
    }
}

/// The full set of provider adapters, selected by provider tag
#[derive(Clone)]
pub struct AdapterSet {
    deezer: Arc<dyn ProviderAdapter>,
    youtube: Arc<dyn ProviderAdapter>,
    soundcloud: Arc<dyn ProviderAdapter>,
}

impl AdapterSet {
    /// Assemble the adapter set from one adapter per provider
    pub fn new(
        deezer: Arc<dyn ProviderAdapter>,
        youtube: Arc<dyn ProviderAdapter>,
        soundcloud: Arc<dyn ProviderAdapter>,
    ) -> Self {
        Self {
            deezer,
            youtube,
            soundcloud,
        }
    }

    /// Select the adapter for a provider
    pub fn get(&self, provider: Provider) -> Arc<dyn ProviderAdapter> {
        match provider {
            Provider::Deezer => Arc::clone(&self.deezer),
            Provider::Youtube => Arc::clone(&self.youtube),
            Provider::Soundcloud => Arc::clone(&self.soundcloud),
        }
    }
}
