use super::*;
use crate::test_support::{FetchOutcome, MockAdapter, RecordingEncoder, mock_adapter_set, track};
use crate::types::QualityTier;
use std::time::Duration;
use tempfile::tempdir;

mod cancel;

/// A manager over one scripted Deezer mock (fresh mocks fill the other
/// provider slots). The tempdir must be kept alive for the test's duration.
pub(crate) struct Harness {
    pub manager: JobManager,
    pub deezer: Arc<MockAdapter>,
    pub encoder: Arc<RecordingEncoder>,
    #[allow(dead_code)]
    pub temp: tempfile::TempDir,
}

pub(crate) async fn harness(configure: impl FnOnce(&mut Config)) -> Harness {
    let temp = tempdir().unwrap();
    let mut config = Config::default();
    config.download.work_dir = temp.path().join("work");
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.jitter = false;
    configure(&mut config);

    let deezer = Arc::new(MockAdapter::new(crate::types::Provider::Deezer, temp.path()));
    let (set, _youtube, _soundcloud) = mock_adapter_set(deezer.clone());
    let encoder = Arc::new(RecordingEncoder::default());
    let manager = JobManager::new(config, set, encoder.clone()).await.unwrap();

    Harness {
        manager,
        deezer,
        encoder,
        temp,
    }
}

pub(crate) fn request(input: &str) -> Request {
    Request {
        user_id: 7,
        input: input.to_string(),
        mode: OutputMode::Single,
        quality: QualityTier::Lossy,
    }
}

pub(crate) const TRACK_URL: &str = "https://www.deezer.com/track/1";
pub(crate) const ALBUM_URL: &str = "https://www.deezer.com/album/77";
