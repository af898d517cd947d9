//! Shared test helpers: scripted provider adapters and a recording encoder.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{EncodeError, ProviderError};
use crate::pipeline::{EncodeSpec, Encoder};
use crate::providers::{AdapterSet, ProviderAdapter, RawAudio, ReferenceKind, Resolution};
use crate::types::{Container, Provider, QualityTier, TrackDescriptor};

/// A minimal descriptor for tests
pub(crate) fn track(provider: Provider, id: &str) -> TrackDescriptor {
    TrackDescriptor {
        provider,
        id: id.to_string(),
        url: None,
        title: format!("Track {}", id),
        artist: "Artist".to_string(),
        album: Some("Album".to_string()),
        track_number: None,
        duration_secs: Some(180),
        cover_url: None,
        lossless_available: false,
    }
}

/// Scripted outcome for one fetch call
#[derive(Clone, Copy, Debug)]
pub(crate) enum FetchOutcome {
    Ok,
    NotFound,
    AuthExpired,
    Unavailable,
}

/// Scriptable provider adapter with call counters and an in-flight gauge.
pub(crate) struct MockAdapter {
    provider: Provider,
    dir: PathBuf,
    search_results: Mutex<Vec<TrackDescriptor>>,
    resolution: Mutex<Option<Vec<TrackDescriptor>>>,
    outcomes: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    delays: Mutex<HashMap<String, Duration>>,
    nonce: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    inflight: AtomicUsize,
    pub max_inflight: AtomicUsize,
}

impl MockAdapter {
    pub fn new(provider: Provider, dir: &Path) -> Self {
        Self {
            provider,
            dir: dir.to_path_buf(),
            search_results: Mutex::new(Vec::new()),
            resolution: Mutex::new(None),
            outcomes: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            nonce: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            inflight: AtomicUsize::new(0),
            max_inflight: AtomicUsize::new(0),
        }
    }

    /// Serve these results for any search call
    pub fn set_search_results(&self, results: Vec<TrackDescriptor>) {
        *self.search_results.lock().unwrap() = results;
    }

    /// Serve this expansion for any resolve call (one track = `Track`,
    /// several = `Collection`)
    pub fn set_resolution(&self, tracks: Vec<TrackDescriptor>) {
        *self.resolution.lock().unwrap() = Some(tracks);
    }

    /// Script the outcome sequence for fetches of one track id; the final
    /// entry repeats once the sequence is drained
    pub fn script_fetch(&self, id: &str, outcomes: Vec<FetchOutcome>) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(id.to_string(), outcomes.into());
    }

    /// Delay each fetch of one track id
    pub fn set_delay(&self, id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(id.to_string(), delay);
    }

    fn next_outcome(&self, id: &str) -> FetchOutcome {
        let mut outcomes = self.outcomes.lock().unwrap();
        match outcomes.get_mut(id) {
            Some(queue) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or(FetchOutcome::Ok)
                } else {
                    queue.front().copied().unwrap_or(FetchOutcome::Ok)
                }
            }
            None => FetchOutcome::Ok,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_results.lock().unwrap().clone())
    }

    async fn resolve(
        &self,
        reference: &str,
        _kind: ReferenceKind,
    ) -> Result<Resolution, ProviderError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let tracks = self.resolution.lock().unwrap().clone();
        match tracks {
            Some(tracks) if tracks.len() == 1 => Ok(Resolution::Track(
                tracks
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| track(self.provider, reference)),
            )),
            Some(tracks) => Ok(Resolution::Collection { tracks }),
            None => Err(ProviderError::NotFound {
                provider: self.provider,
                reference: reference.to_string(),
            }),
        }
    }

    async fn fetch_raw(
        &self,
        track: &TrackDescriptor,
        _quality: QualityTier,
    ) -> Result<RawAudio, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(current, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(&track.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.next_outcome(&track.id);
        self.inflight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            FetchOutcome::Ok => {
                let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
                let path = self.dir.join(format!("raw-{}-{}.mp3", track.id, nonce));
                std::fs::write(&path, vec![0u8; 64]).map_err(|e| {
                    ProviderError::Unavailable {
                        provider: self.provider,
                        reason: format!("write failed: {}", e),
                    }
                })?;
                Ok(RawAudio {
                    path,
                    container: Container::Mp3,
                })
            }
            FetchOutcome::NotFound => Err(ProviderError::NotFound {
                provider: self.provider,
                reference: track.id.clone(),
            }),
            FetchOutcome::AuthExpired => Err(ProviderError::AuthExpired {
                provider: self.provider,
            }),
            FetchOutcome::Unavailable => Err(ProviderError::Unavailable {
                provider: self.provider,
                reason: "scripted transient failure".to_string(),
            }),
        }
    }
}

/// An adapter set where the given mock serves its own provider slot and
/// fresh mocks fill the other two. Returns the extra mocks for assertions.
pub(crate) fn mock_adapter_set(
    primary: Arc<MockAdapter>,
) -> (AdapterSet, Arc<MockAdapter>, Arc<MockAdapter>) {
    let dir = primary.dir.clone();
    match primary.provider() {
        Provider::Deezer => {
            let yt = Arc::new(MockAdapter::new(Provider::Youtube, &dir));
            let sc = Arc::new(MockAdapter::new(Provider::Soundcloud, &dir));
            (AdapterSet::new(primary, yt.clone(), sc.clone()), yt, sc)
        }
        Provider::Youtube => {
            let dz = Arc::new(MockAdapter::new(Provider::Deezer, &dir));
            let sc = Arc::new(MockAdapter::new(Provider::Soundcloud, &dir));
            (AdapterSet::new(dz.clone(), primary, sc.clone()), dz, sc)
        }
        Provider::Soundcloud => {
            let dz = Arc::new(MockAdapter::new(Provider::Deezer, &dir));
            let yt = Arc::new(MockAdapter::new(Provider::Youtube, &dir));
            (AdapterSet::new(dz.clone(), yt.clone(), primary), dz, yt)
        }
    }
}

/// Encoder that records every spec it sees and copies input to output.
#[derive(Default)]
pub(crate) struct RecordingEncoder {
    pub specs: Mutex<Vec<EncodeSpec>>,
    pub fail_titles: Mutex<HashSet<String>>,
}

#[async_trait::async_trait]
impl Encoder for RecordingEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        spec: &EncodeSpec,
    ) -> Result<(), EncodeError> {
        if self.fail_titles.lock().unwrap().contains(&spec.tags.title) {
            return Err(EncodeError::Failed {
                track: spec.tags.title.clone(),
                reason: "scripted encoder failure".to_string(),
            });
        }
        self.specs.lock().unwrap().push(spec.clone());
        if input != output {
            tokio::fs::copy(input, output)
                .await
                .map_err(|e| EncodeError::Failed {
                    track: spec.tags.title.clone(),
                    reason: format!("copy failed: {}", e),
                })?;
        }
        Ok(())
    }
}
