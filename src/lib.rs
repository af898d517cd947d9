//! # music-dl
//!
//! Backend library for music download and delivery applications: it turns
//! a user request — a Deezer/YouTube/SoundCloud link or a free-text
//! search — into fetched, tagged, optionally archived, and delivered
//! audio files.
//!
//! ## Design Philosophy
//!
//! music-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!   in a bot or service
//! - **Capability-driven** - Provider clients, the encoder, and the
//!   upload transport are injected traits; the crate owns orchestration,
//!   not wire protocols or codecs
//! - **Event-driven** - Consumers subscribe to job events, no polling
//!   required
//! - **Predictable under failure** - A strict error taxonomy separates
//!   per-track skips from whole-job failures, and only transient provider
//!   errors are ever retried
//!
//! ## Quick Start
//!
//! ```no_run
//! use music_dl::{JobManager, OutputMode, QualityTier, Request};
//!
//! # async fn example(manager: JobManager) -> Result<(), Box<dyn std::error::Error>> {
//! let ticket = manager
//!     .submit(Request {
//!         user_id: 42,
//!         input: "https://www.deezer.com/track/3135556".to_string(),
//!         mode: OutputMode::Zip,
//!         quality: QualityTier::Lossless,
//!     })
//!     .await?;
//!
//! let outcome = ticket.wait().await.map_err(|e| e.to_string())?;
//! println!(
//!     "delivered with {} skipped track(s)",
//!     outcome.skipped.len()
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Provider credential storage
pub mod credentials;
/// Package delivery (upload handles, relocation links)
pub mod delivery;
/// Error types
pub mod error;
/// Job lifecycle management
pub mod jobs;
/// Archive packaging and splitting
pub mod packaging;
/// Format pipeline (codec decisions, tagging, cover art)
pub mod pipeline;
/// Provider adapters
pub mod providers;
/// Input resolution (URLs and search)
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{
    AlbumOrder, ArchiveFormat, Config, DeliveryConfig, DownloadConfig, ProviderConfig,
    RetryConfig, ToolsConfig,
};
pub use credentials::{CookieSnapshot, CredentialStore};
pub use delivery::UploadTransport;
pub use error::{DeliveryError, EncodeError, Error, ProviderError, Result};
pub use jobs::{JobManager, JobResult, JobTicket};
pub use packaging::SIZE_CEILING;
pub use pipeline::{EncodeSpec, Encoder, FfmpegEncoder, FormatPipeline};
pub use providers::{
    AdapterSet, DeezerAdapter, DeezerApi, DeezerFormat, ProviderAdapter, RawAudio, ReferenceKind,
    Resolution, SoundcloudAdapter, SoundcloudClient, YoutubeAdapter, YoutubeClient,
};
pub use resolver::{CandidateStream, TrackResolver, classify};
pub use types::{
    Artifact, Codec, Container, Delivery, Event, JobId, JobOutcome, JobStatus, OutputMode,
    Package, Provider, QualityTier, Request, SkipReason, SkippedTrack, TagSet, TrackDescriptor,
    ZipPart,
};
