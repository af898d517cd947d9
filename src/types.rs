//! Core types for music-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<JobId> for u64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Music provider backing a track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Deezer
    Deezer,
    /// YouTube
    Youtube,
    /// SoundCloud
    Soundcloud,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Deezer => write!(f, "deezer"),
            Provider::Youtube => write!(f, "youtube"),
            Provider::Soundcloud => write!(f, "soundcloud"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deezer" => Ok(Provider::Deezer),
            "youtube" => Ok(Provider::Youtube),
            "soundcloud" => Ok(Provider::Soundcloud),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Requested fidelity level
///
/// `Lossless` is subject to provider capability and account entitlement;
/// it silently downgrades to `Lossy` when unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Lossy output (MP3)
    #[default]
    Lossy,
    /// Lossless output (FLAC), when entitled and available
    Lossless,
}

impl QualityTier {
    /// Stable byte tag used when deriving deduplication keys
    pub(crate) fn tag(&self) -> u8 {
        match self {
            QualityTier::Lossy => 0,
            QualityTier::Lossless => 1,
        }
    }
}

/// Requested shape of the delivered output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// A single ready-to-play audio file
    #[default]
    Single,
    /// A zip archive (split into parts when it exceeds the size ceiling)
    Zip,
    /// Download link(s) instead of uploaded bytes (requires relocation config)
    Link,
}

/// An accepted download request. Immutable once submitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    /// Originating user id
    pub user_id: u64,
    /// Raw user input: a provider URL or a free-text search query
    pub input: String,
    /// Requested output mode
    pub mode: OutputMode,
    /// Requested quality tier
    pub quality: QualityTier,
}

/// A normalized track reference produced by the resolver.
///
/// Consumed read-only downstream; `provider` always matches the adapter
/// that produced the descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Provider this track belongs to
    pub provider: Provider,
    /// Provider-native track id
    pub id: String,
    /// Source URL, if the track was resolved from one
    pub url: Option<String>,
    /// Track title
    pub title: String,
    /// Main artist
    pub artist: String,
    /// Album title, shared by all tracks of an album expansion
    pub album: Option<String>,
    /// Track number within its album
    pub track_number: Option<u32>,
    /// Duration in seconds, when the provider reports one
    pub duration_secs: Option<u32>,
    /// Cover-art URL
    pub cover_url: Option<String>,
    /// Whether the provider offers this track in a lossless format
    /// (only ever set by the Deezer adapter)
    pub lossless_available: bool,
}

/// Job lifecycle status
///
/// Transitions are strictly monotonic: a job never moves backwards, and in
/// particular never re-enters `Fetching` once it has reached `Packaging`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, not yet started
    Pending,
    /// Resolving input and fetching tracks
    Fetching,
    /// Assembling the final package
    Packaging,
    /// Handing the package off (upload or relocation)
    Delivering,
    /// Finished successfully (possibly with skipped tracks)
    Done,
    /// Failed as a whole
    Failed,
}

impl JobStatus {
    /// Ordering rank used to enforce forward-only transitions
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Fetching => 1,
            JobStatus::Packaging => 2,
            JobStatus::Delivering => 3,
            JobStatus::Done => 4,
            JobStatus::Failed => 5,
        }
    }

    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Fetching => write!(f, "fetching"),
            JobStatus::Packaging => write!(f, "packaging"),
            JobStatus::Delivering => write!(f, "delivering"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Target audio codec for an encoded artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// MPEG layer 3
    Mp3,
    /// Free Lossless Audio Codec
    Flac,
}

impl Codec {
    /// File extension for this codec
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Mp3 => "mp3",
            Codec::Flac => "flac",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Container hint attached to a raw audio stream by the provider client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MP3 stream
    Mp3,
    /// MP4/M4A audio
    M4a,
    /// WebM/Opus audio
    Webm,
    /// Ogg Vorbis audio
    Ogg,
    /// FLAC stream
    Flac,
}

impl Container {
    /// Whether a stream in this container already matches the target codec,
    /// making a re-encode unnecessary (tag-only pass)
    pub fn matches(&self, codec: Codec) -> bool {
        matches!(
            (self, codec),
            (Container::Mp3, Codec::Mp3) | (Container::Flac, Codec::Flac)
        )
    }
}

/// Metadata tags embedded into an encoded artifact
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TagSet {
    /// Track title
    pub title: String,
    /// Main artist
    pub artist: String,
    /// Album title
    pub album: Option<String>,
    /// Track number within its album
    pub track_number: Option<u32>,
}

impl From<&TrackDescriptor> for TagSet {
    fn from(track: &TrackDescriptor) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            track_number: track.track_number,
        }
    }
}

/// One finished, encoded, tagged audio file ready for packaging
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifact {
    /// Location on disk
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Codec of the encoded stream
    pub codec: Codec,
    /// Tags embedded in the file
    pub tags: TagSet,
}

/// One self-contained, independently openable segment of a split archive
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZipPart {
    /// Location on disk
    pub path: PathBuf,
    /// Size in bytes (never exceeds the size ceiling)
    pub size_bytes: u64,
    /// 1-based part index
    pub index: usize,
    /// Total number of parts in the archive
    pub total: usize,
}

impl ZipPart {
    /// User-facing part label, e.g. `"2/3"`
    pub fn label(&self) -> String {
        format!("{}/{}", self.index, self.total)
    }
}

/// Assembled output of a completed job, prior to delivery
#[derive(Clone, Debug)]
pub enum Package {
    /// A lone artifact
    Single(Artifact),
    /// An ordered sequence of archive parts
    Archive(Vec<ZipPart>),
}

/// How the finished output reaches the caller
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// A single file to upload
    Upload(Artifact),
    /// A sequence of archive parts to upload, labeled `i/n`
    UploadParts(Vec<ZipPart>),
    /// Download URLs produced by relocation
    Links(Vec<String>),
}

/// Why a track was skipped within an otherwise-successful job
///
/// Categories only; internal error detail stays in the logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The track id or query resolved to nothing
    NotFound,
    /// Provider authentication has expired
    AuthExpired,
    /// Transient provider failure that outlived all retries
    ProviderUnavailable,
    /// The external encoder reported an error
    EncodeFailed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::AuthExpired => write!(f, "authentication expired"),
            SkipReason::ProviderUnavailable => write!(f, "provider unavailable"),
            SkipReason::EncodeFailed => write!(f, "encoding failed"),
        }
    }
}

/// A requested track that could not be delivered
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkippedTrack {
    /// Track title as resolved
    pub title: String,
    /// Provider the track came from
    pub provider: Provider,
    /// Failure category
    pub reason: SkipReason,
}

/// Final result of a job, shared with every observer
#[derive(Clone, Debug)]
pub struct JobOutcome {
    /// The delivered output
    pub delivery: Delivery,
    /// Tracks that were skipped, with their failure category
    pub skipped: Vec<SkippedTrack>,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and queued
    Queued {
        /// Job ID
        id: JobId,
    },

    /// An identical in-flight request attached as an additional observer
    ObserverAttached {
        /// Job ID
        id: JobId,
        /// Observer count after attaching
        observers: usize,
    },

    /// Input resolved into one or more tracks
    Resolved {
        /// Job ID
        id: JobId,
        /// Number of resolved tracks
        tracks: usize,
    },

    /// One track fetched and encoded
    TrackFetched {
        /// Job ID
        id: JobId,
        /// Track position in resolution order (0-based)
        index: usize,
        /// Track title
        title: String,
    },

    /// One track skipped
    TrackSkipped {
        /// Job ID
        id: JobId,
        /// Track position in resolution order (0-based)
        index: usize,
        /// Track title
        title: String,
        /// Failure category
        reason: SkipReason,
    },

    /// Packaging started
    Packaging {
        /// Job ID
        id: JobId,
    },

    /// Delivery started
    Delivering {
        /// Job ID
        id: JobId,
    },

    /// Job finished successfully
    Complete {
        /// Job ID
        id: JobId,
        /// Number of skipped tracks
        skipped: usize,
    },

    /// Job failed as a whole
    Failed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Job cancelled by its observer
    Cancelled {
        /// Job ID
        id: JobId,
    },
}
