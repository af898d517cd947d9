//! Shared fixtures for integration tests: stub provider clients and a
//! copying encoder, wired through the public API only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use music_dl::{
    AdapterSet, Container, CookieSnapshot, CredentialStore, DeezerAdapter, DeezerApi,
    DeezerFormat, EncodeError, EncodeSpec, Encoder, ProviderConfig, ProviderError, Provider,
    QualityTier, RawAudio, Resolution, SoundcloudAdapter, SoundcloudClient, TrackDescriptor,
    YoutubeAdapter, YoutubeClient,
};

/// A descriptor for stub catalogs
pub fn deezer_track(id: &str, title: &str, lossless: bool) -> TrackDescriptor {
    TrackDescriptor {
        provider: Provider::Deezer,
        id: id.to_string(),
        url: None,
        title: title.to_string(),
        artist: "Artist".to_string(),
        album: Some("Album".to_string()),
        track_number: None,
        duration_secs: Some(180),
        cover_url: None,
        lossless_available: lossless,
    }
}

/// Stub Deezer client backed by an in-memory catalog.
pub struct StubDeezer {
    pub dir: PathBuf,
    pub tracks: Mutex<HashMap<String, TrackDescriptor>>,
    pub album: Mutex<Vec<TrackDescriptor>>,
    pub entitled: bool,
    pub flac_ids: Mutex<Vec<String>>,
    pub fetch_calls: AtomicUsize,
    nonce: AtomicUsize,
}

impl StubDeezer {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            tracks: Mutex::new(HashMap::new()),
            album: Mutex::new(Vec::new()),
            entitled: false,
            flac_ids: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            nonce: AtomicUsize::new(0),
        }
    }

    pub fn add_track(&self, track: TrackDescriptor) {
        self.tracks.lock().unwrap().insert(track.id.clone(), track);
    }

    pub fn set_album(&self, tracks: Vec<TrackDescriptor>) {
        for track in &tracks {
            self.add_track(track.clone());
        }
        *self.album.lock().unwrap() = tracks;
    }

    fn write_stream(&self, id: &str, flac: bool) -> std::io::Result<RawAudio> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let ext = if flac { "flac" } else { "mp3" };
        let path = self.dir.join(format!("dz-{}-{}.{}", id, nonce, ext));
        std::fs::write(&path, vec![0u8; 256])?;
        Ok(RawAudio {
            path,
            container: if flac { Container::Flac } else { Container::Mp3 },
        })
    }
}

#[async_trait::async_trait]
impl DeezerApi for StubDeezer {
    async fn search(
        &self,
        query: &str,
        _limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        let query = query.to_lowercase();
        Ok(self
            .tracks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.title.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn track(&self, id: &str) -> Result<TrackDescriptor, ProviderError> {
        self.tracks.lock().unwrap().get(id).cloned().ok_or_else(|| {
            ProviderError::NotFound {
                provider: Provider::Deezer,
                reference: id.to_string(),
            }
        })
    }

    async fn album_tracks(&self, _id: &str) -> Result<Vec<TrackDescriptor>, ProviderError> {
        Ok(self.album.lock().unwrap().clone())
    }

    async fn playlist_tracks(&self, _id: &str) -> Result<Vec<TrackDescriptor>, ProviderError> {
        Ok(vec![])
    }

    async fn lossless_entitled(&self, _arl: &str) -> Result<bool, ProviderError> {
        Ok(self.entitled)
    }

    async fn fetch_media(
        &self,
        track: &TrackDescriptor,
        format: DeezerFormat,
        _arl: Option<&str>,
    ) -> Result<Option<RawAudio>, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.tracks.lock().unwrap().contains_key(&track.id) {
            return Err(ProviderError::NotFound {
                provider: Provider::Deezer,
                reference: track.id.clone(),
            });
        }
        let flac_available = self.flac_ids.lock().unwrap().contains(&track.id);
        match format {
            DeezerFormat::Flac if flac_available => self
                .write_stream(&track.id, true)
                .map(Some)
                .map_err(|e| ProviderError::Unavailable {
                    provider: Provider::Deezer,
                    reason: e.to_string(),
                }),
            DeezerFormat::Flac => Ok(None),
            _ => self
                .write_stream(&track.id, false)
                .map(Some)
                .map_err(|e| ProviderError::Unavailable {
                    provider: Provider::Deezer,
                    reason: e.to_string(),
                }),
        }
    }
}

/// Stub YouTube client recording the cookie snapshots it fetches with.
pub struct StubYoutube {
    pub dir: PathBuf,
    pub snapshots: Mutex<Vec<bool>>,
    nonce: AtomicUsize,
}

impl StubYoutube {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            snapshots: Mutex::new(Vec::new()),
            nonce: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl YoutubeClient for StubYoutube {
    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        Ok(vec![])
    }

    async fn video(&self, id: &str) -> Result<TrackDescriptor, ProviderError> {
        Ok(TrackDescriptor {
            provider: Provider::Youtube,
            id: id.to_string(),
            url: Some(format!("https://youtube.com/watch?v={}", id)),
            title: format!("Video {}", id),
            artist: "Channel".to_string(),
            album: None,
            track_number: None,
            duration_secs: Some(240),
            cover_url: None,
            lossless_available: false,
        })
    }

    async fn playlist(&self, _id: &str) -> Result<Vec<TrackDescriptor>, ProviderError> {
        Ok(vec![])
    }

    async fn fetch_audio(
        &self,
        track: &TrackDescriptor,
        cookies: &CookieSnapshot,
    ) -> Result<RawAudio, ProviderError> {
        self.snapshots.lock().unwrap().push(cookies.is_empty());
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("yt-{}-{}.webm", track.id, nonce));
        std::fs::write(&path, vec![0u8; 256]).map_err(|e| ProviderError::Unavailable {
            provider: Provider::Youtube,
            reason: e.to_string(),
        })?;
        Ok(RawAudio {
            path,
            container: Container::Webm,
        })
    }
}

/// Stub SoundCloud client that knows nothing.
pub struct StubSoundcloud;

#[async_trait::async_trait]
impl SoundcloudClient for StubSoundcloud {
    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        Ok(vec![])
    }

    async fn resolve_permalink(&self, permalink: &str) -> Result<Resolution, ProviderError> {
        Err(ProviderError::NotFound {
            provider: Provider::Soundcloud,
            reference: permalink.to_string(),
        })
    }

    async fn fetch_audio(&self, track: &TrackDescriptor) -> Result<RawAudio, ProviderError> {
        Err(ProviderError::NotFound {
            provider: Provider::Soundcloud,
            reference: track.id.clone(),
        })
    }
}

/// Encoder that copies the stream and records every spec it saw.
#[derive(Default)]
pub struct CopyEncoder {
    pub specs: Mutex<Vec<EncodeSpec>>,
}

#[async_trait::async_trait]
impl Encoder for CopyEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        spec: &EncodeSpec,
    ) -> Result<(), EncodeError> {
        self.specs.lock().unwrap().push(spec.clone());
        if input != output {
            tokio::fs::copy(input, output)
                .await
                .map_err(|e| EncodeError::Failed {
                    track: spec.tags.title.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// Wire stub clients into a full adapter set through the public
/// constructors.
pub fn adapter_set(
    deezer: Arc<StubDeezer>,
    youtube: Arc<StubYoutube>,
    credentials: Arc<CredentialStore>,
    providers: &ProviderConfig,
) -> AdapterSet {
    AdapterSet::new(
        Arc::new(DeezerAdapter::new(deezer, Arc::clone(&credentials), providers)),
        Arc::new(YoutubeAdapter::new(youtube, credentials)),
        Arc::new(SoundcloudAdapter::new(Arc::new(StubSoundcloud))),
    )
}
