//! Error types for music-dl
//!
//! This module provides the error taxonomy for the library:
//! - `UnresolvedInput` — user-input problem, reported to the caller, never retried
//! - `Provider` — per-track failures from a provider backend; only the
//!   transient `Unavailable` kind is ever retried
//! - `Encode` — per-track terminal encoder failures
//! - `Delivery` — whole-job fatal packaging/handoff failures
//!
//! Per-track failures are absorbed into a job's skip list and never abort
//! sibling tracks; whole-job failures abort and are reported once to every
//! observer of the job.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{JobId, Provider, SkipReason, SkippedTrack};

/// Result type alias for music-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for music-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The input matched no provider URL shape and produced no search results
    #[error("unresolved input: {0}")]
    UnresolvedInput(String),

    /// Provider-side failure while searching, resolving, or fetching
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Encoding or tag-writing failure
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Packaging or delivery failure
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Every track of a multi-track job failed
    #[error("all {} requested track(s) failed", .skipped.len())]
    AllTracksFailed {
        /// The per-track failure list
        skipped: Vec<SkippedTrack>,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "file_link_template")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Archive read/write error
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Job was cancelled by its observer
    #[error("job cancelled")]
    Cancelled,

    /// Job not found (already finished or never existed)
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Cannot perform operation in current state
    #[error("cannot {operation} job {id} in state {state}")]
    InvalidState {
        /// The job the operation was attempted on
        id: JobId,
        /// The operation that was attempted (e.g., "cancel")
        operation: String,
        /// The state that prevents the operation
        state: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Provider-side errors, distinguished so the retry policy can key on them
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The id or query resolved to nothing. Per-track terminal, never retried.
    #[error("{provider}: nothing found for {reference}")]
    NotFound {
        /// Provider that was queried
        provider: Provider,
        /// The id, URL, or query that resolved to nothing
        reference: String,
    },

    /// Provider authentication was rejected. Per-track terminal, never
    /// retried — distinct from transient failure so callers can react
    /// (e.g. refresh the cookie source out of band).
    #[error("{provider}: authentication expired")]
    AuthExpired {
        /// Provider that rejected the credentials
        provider: Provider,
    },

    /// Transient network or backend failure, including per-call timeouts.
    /// The only retryable error kind.
    #[error("{provider} unavailable: {reason}")]
    Unavailable {
        /// Provider that failed
        provider: Provider,
        /// Short failure description
        reason: String,
    },
}

impl ProviderError {
    /// The skip-list category for this failure
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            ProviderError::NotFound { .. } => SkipReason::NotFound,
            ProviderError::AuthExpired { .. } => SkipReason::AuthExpired,
            ProviderError::Unavailable { .. } => SkipReason::ProviderUnavailable,
        }
    }
}

/// Encoder and tag-writer errors
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The external encoder reported an error. Per-track terminal.
    #[error("encoding failed for {track}: {reason}")]
    Failed {
        /// Title of the track being encoded
        track: String,
        /// The reason encoding failed
        reason: String,
    },

    /// No usable encoder binary was found
    #[error("no usable encoder binary found (configure an explicit path or install ffmpeg)")]
    EncoderMissing,
}

/// Packaging and delivery errors. All of these are whole-job fatal because
/// they occur after every track has already been fetched and encoded.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The relocation target directory cannot be created or written
    #[error("delivery target {path} is not writable: {reason}")]
    TargetUnwritable {
        /// The configured relocation directory
        path: PathBuf,
        /// The reason it is unwritable
        reason: String,
    },

    /// The upload transport rejected the payload
    #[error("upload transport rejected {path}: {reason}")]
    UploadRejected {
        /// The file that was rejected
        path: PathBuf,
        /// The transport's rejection reason
        reason: String,
    },

    /// The link template is malformed
    #[error("link template must contain exactly one {{0}} placeholder: {template}")]
    BadLinkTemplate {
        /// The offending template
        template: String,
    },

    /// A single file is too large to fit into any archive part
    #[error("{path} is {size} bytes, too large for a single archive part (ceiling {ceiling} bytes)")]
    PartExceedsCeiling {
        /// The oversized file
        path: PathBuf,
        /// Its size in bytes
        size: u64,
        /// The archive part ceiling in bytes
        ceiling: u64,
    },
}

impl Error {
    /// The skip-list category of this error, if it is a per-track failure.
    ///
    /// Returns `None` for whole-job failures, which are surfaced to the
    /// caller directly instead of entering the skip list.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Error::Provider(e) => Some(e.skip_reason()),
            Error::Encode(_) => Some(SkipReason::EncodeFailed),
            _ => None,
        }
    }
}
