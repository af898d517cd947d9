//! Deezer adapter — lossless gating and format fallback over an external
//! Deezer client.

use std::sync::Arc;

use super::{ProviderAdapter, RawAudio, ReferenceKind, Resolution};
use crate::config::ProviderConfig;
use crate::credentials::CredentialStore;
use crate::error::ProviderError;
use crate::types::{Provider, QualityTier, TrackDescriptor};

/// Deezer media formats, in descending fidelity order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeezerFormat {
    /// Lossless FLAC (requires entitlement)
    Flac,
    /// MP3 at 320 kbit/s
    Mp3_320,
    /// MP3 at 128 kbit/s
    Mp3_128,
}

/// External Deezer client capability, implemented outside the engine.
///
/// `fetch_media` returns `Ok(None)` when the requested format is not
/// available for the track, letting the adapter walk its fallback ladder
/// without conflating "format missing" with "track missing".
#[async_trait::async_trait]
pub trait DeezerApi: Send + Sync {
    /// Search the Deezer catalog
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Look up a single track by id
    async fn track(&self, id: &str) -> Result<TrackDescriptor, ProviderError>;

    /// Expand an album into its tracks, provider-native order
    async fn album_tracks(&self, id: &str) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Expand a playlist into its tracks, provider-native order
    async fn playlist_tracks(&self, id: &str) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Whether the account behind the ARL token is entitled to lossless media
    async fn lossless_entitled(&self, arl: &str) -> Result<bool, ProviderError>;

    /// Download the decrypted media stream for a track in the given format.
    ///
    /// Returns `Ok(None)` when the format is unavailable for this track.
    async fn fetch_media(
        &self,
        track: &TrackDescriptor,
        format: DeezerFormat,
        arl: Option<&str>,
    ) -> Result<Option<RawAudio>, ProviderError>;
}

/// Deezer adapter over an injectable [`DeezerApi`] client
pub struct DeezerAdapter {
    client: Arc<dyn DeezerApi>,
    credentials: Arc<CredentialStore>,
    enable_flac: bool,
    entitlement: tokio::sync::OnceCell<bool>,
}

impl DeezerAdapter {
    /// Create the adapter from a client, credential store, and provider config
    pub fn new(
        client: Arc<dyn DeezerApi>,
        credentials: Arc<CredentialStore>,
        config: &ProviderConfig,
    ) -> Self {
        Self {
            client,
            credentials,
            enable_flac: config.enable_flac,
            entitlement: tokio::sync::OnceCell::new(),
        }
    }

    /// Account entitlement, checked once per process and cached.
    ///
    /// A missing token or a failed check both read as "not entitled";
    /// quality then downgrades silently rather than failing the fetch.
    async fn entitled(&self) -> bool {
        *self
            .entitlement
            .get_or_init(|| async {
                match self.credentials.deezer_token() {
                    Some(arl) => match self.client.lossless_entitled(arl).await {
                        Ok(entitled) => entitled,
                        Err(e) => {
                            tracing::warn!(error = %e, "entitlement check failed, assuming lossy");
                            false
                        }
                    },
                    None => false,
                }
            })
            .await
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for DeezerAdapter {
    fn provider(&self) -> Provider {
        Provider::Deezer
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
            ReferenceKind::Track => Ok(Resolution::Track(self.client.track(reference).await?)),
            ReferenceKind::Album => Ok(Resolution::Collection {
                tracks: self.client.album_tracks(reference).await?,
            }),
            ReferenceKind::Playlist => Ok(Resolution::Collection {
                tracks: self.client.playlist_tracks(reference).await?,
            }),
        }
    }

    async fn fetch_raw(
        &self,
        track: &TrackDescriptor,
        quality: QualityTier,
    ) -> Result<RawAudio, ProviderError> {
        let mut ladder = Vec::with_capacity(3);
        if quality == QualityTier::Lossless
            && self.enable_flac
            && track.lossless_available
            && self.entitled().await
        {
            ladder.push(DeezerFormat::Flac);
        }
        ladder.push(DeezerFormat::Mp3_320);
        ladder.push(DeezerFormat::Mp3_128);

        let arl = self.credentials.deezer_token();
        for (step, format) in ladder.iter().enumerate() {
            match self.client.fetch_media(track, *format, arl).await? {
                Some(raw) => {
                    if step > 0 {
                        tracing::debug!(
                            track = %track.id,
                            format = ?format,
                            "preferred format unavailable, fell back"
                        );
                    }
                    return Ok(raw);
                }
                None => continue,
            }
        }

        Err(ProviderError::NotFound {
            provider: Provider::Deezer,
            reference: track.id.clone(),
        })
    }

    fn effective_quality(&self, track: &TrackDescriptor, requested: QualityTier) -> QualityTier {
        if requested == QualityTier::Lossless && self.enable_flac && track.lossless_available {
            QualityTier::Lossless
        } else {
            QualityTier::Lossy
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Container;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn track(id: &str, lossless: bool) -> TrackDescriptor {
        TrackDescriptor {
            provider: Provider::Deezer,
            id: id.to_string(),
            url: None,
            title: format!("Track {}", id),
            artist: "Artist".to_string(),
            album: Some("Album".to_string()),
            track_number: Some(1),
            duration_secs: Some(180),
            cover_url: None,
            lossless_available: lossless,
        }
    }

    /// Client that records the formats requested and serves a fixed set
    struct FakeApi {
        entitled: bool,
        available: Vec<DeezerFormat>,
        requested: Mutex<Vec<DeezerFormat>>,
        entitlement_checks: AtomicUsize,
    }

    impl FakeApi {
        fn new(entitled: bool, available: Vec<DeezerFormat>) -> Self {
            Self {
                entitled,
                available,
                requested: Mutex::new(Vec::new()),
                entitlement_checks: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl DeezerApi for FakeApi {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<TrackDescriptor>, ProviderError> {
            Ok(vec![])
        }

        async fn track(&self, id: &str) -> Result<TrackDescriptor, ProviderError> {
            Ok(track(id, false))
        }

        async fn album_tracks(&self, _id: &str) -> Result<Vec<TrackDescriptor>, ProviderError> {
            Ok(vec![track("1", false), track("2", false)])
        }

        async fn playlist_tracks(&self, _id: &str) -> Result<Vec<TrackDescriptor>, ProviderError> {
            Ok(vec![])
        }

        async fn lossless_entitled(&self, _arl: &str) -> Result<bool, ProviderError> {
            self.entitlement_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.entitled)
        }

        async fn fetch_media(
            &self,
            _track: &TrackDescriptor,
            format: DeezerFormat,
            _arl: Option<&str>,
        ) -> Result<Option<RawAudio>, ProviderError> {
            self.requested.lock().unwrap().push(format);
            if self.available.contains(&format) {
                Ok(Some(RawAudio {
                    path: PathBuf::from("/tmp/raw"),
                    container: match format {
                        DeezerFormat::Flac => Container::Flac,
                        _ => Container::Mp3,
                    },
                }))
            } else {
                Ok(None)
            }
        }
    }

    fn adapter(api: Arc<FakeApi>, enable_flac: bool, token: Option<&str>) -> DeezerAdapter {
        let creds = Arc::new(CredentialStore::new(token.map(String::from), None));
        let config = ProviderConfig {
            enable_flac,
            ..Default::default()
        };
        DeezerAdapter::new(api, creds, &config)
    }

    #[tokio::test]
    async fn flac_disabled_downgrades_silently() {
        let api = Arc::new(FakeApi::new(true, vec![DeezerFormat::Flac, DeezerFormat::Mp3_320]));
        let adapter = adapter(api.clone(), false, Some("arl"));

        let t = track("1", true);
        assert_eq!(
            adapter.effective_quality(&t, QualityTier::Lossless),
            QualityTier::Lossy
        );

        let raw = adapter.fetch_raw(&t, QualityTier::Lossless).await.unwrap();
        assert_eq!(raw.container, Container::Mp3);
        assert_eq!(
            api.requested.lock().unwrap().first(),
            Some(&DeezerFormat::Mp3_320),
            "FLAC must not even be requested when disabled"
        );
    }

    #[tokio::test]
    async fn entitled_account_gets_flac() {
        let api = Arc::new(FakeApi::new(true, vec![DeezerFormat::Flac]));
        let adapter = adapter(api.clone(), true, Some("arl"));

        let t = track("1", true);
        assert_eq!(
            adapter.effective_quality(&t, QualityTier::Lossless),
            QualityTier::Lossless
        );

        let raw = adapter.fetch_raw(&t, QualityTier::Lossless).await.unwrap();
        assert_eq!(raw.container, Container::Flac);
    }

    #[tokio::test]
    async fn unentitled_account_downgrades_despite_config() {
        let api = Arc::new(FakeApi::new(false, vec![DeezerFormat::Mp3_320]));
        let adapter = adapter(api.clone(), true, Some("arl"));

        let raw = adapter
            .fetch_raw(&track("1", true), QualityTier::Lossless)
            .await
            .unwrap();
        assert_eq!(raw.container, Container::Mp3);
        let requested = api.requested.lock().unwrap();
        assert!(!requested.contains(&DeezerFormat::Flac));
    }

    #[tokio::test]
    async fn entitlement_is_checked_once_and_cached() {
        let api = Arc::new(FakeApi::new(true, vec![DeezerFormat::Flac]));
        let adapter = adapter(api.clone(), true, Some("arl"));

        let t = track("1", true);
        adapter.fetch_raw(&t, QualityTier::Lossless).await.unwrap();
        adapter.fetch_raw(&t, QualityTier::Lossless).await.unwrap();
        assert_eq!(api.entitlement_checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn format_ladder_falls_back_to_lowest() {
        let api = Arc::new(FakeApi::new(true, vec![DeezerFormat::Mp3_128]));
        let adapter = adapter(api.clone(), true, Some("arl"));

        let raw = adapter
            .fetch_raw(&track("1", true), QualityTier::Lossless)
            .await
            .unwrap();
        assert_eq!(raw.container, Container::Mp3);
        assert_eq!(
            *api.requested.lock().unwrap(),
            vec![
                DeezerFormat::Flac,
                DeezerFormat::Mp3_320,
                DeezerFormat::Mp3_128
            ]
        );
    }

    #[tokio::test]
    async fn no_format_available_is_not_found() {
        let api = Arc::new(FakeApi::new(true, vec![]));
        let adapter = adapter(api, false, None);

        let err = adapter
            .fetch_raw(&track("9", false), QualityTier::Lossy)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_token_means_no_flac() {
        let api = Arc::new(FakeApi::new(true, vec![DeezerFormat::Flac, DeezerFormat::Mp3_320]));
        let adapter = adapter(api.clone(), true, None);

        adapter
            .fetch_raw(&track("1", true), QualityTier::Lossless)
            .await
            .unwrap();
        assert!(!api.requested.lock().unwrap().contains(&DeezerFormat::Flac));
        assert_eq!(
            api.entitlement_checks.load(Ordering::SeqCst),
            0,
            "no token, no entitlement check"
        );
    }
}
