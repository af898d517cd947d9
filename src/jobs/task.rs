//! Job task execution — per-track fetch/encode, ordered buffering,
//! packaging, and delivery for one job.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::{DedupKey, JobEntry, JobResult};
use crate::config::{ArchiveFormat, Config};
use crate::delivery::{self, UploadTransport};
use crate::error::{Error, ProviderError, Result};
use crate::packaging;
use crate::pipeline::FormatPipeline;
use crate::providers::AdapterSet;
use crate::resolver::TrackResolver;
use crate::retry::fetch_with_retry;
use crate::types::{
    Artifact, Delivery, Event, JobId, JobOutcome, JobStatus, OutputMode, Package, Request,
    SkipReason, SkippedTrack, TrackDescriptor,
};

/// Shared context for a single job task, reducing parameter passing
/// between helpers.
pub(crate) struct JobContext {
    pub(crate) id: JobId,
    pub(crate) request: Request,
    pub(crate) key: DedupKey,
    pub(crate) job_dir: PathBuf,
    pub(crate) config: Arc<Config>,
    pub(crate) adapters: Arc<AdapterSet>,
    pub(crate) resolver: Arc<TrackResolver>,
    pub(crate) pipeline: Arc<FormatPipeline>,
    pub(crate) transport: Option<Arc<dyn UploadTransport>>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) status: Arc<std::sync::Mutex<JobStatus>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) global_limit: Arc<Semaphore>,
    pub(crate) user_limit: Arc<Semaphore>,
    pub(crate) dedup: Arc<Mutex<std::collections::HashMap<DedupKey, JobEntry>>>,
    pub(crate) active: Arc<Mutex<std::collections::HashMap<JobId, JobEntry>>>,
}

impl JobContext {
    /// Move the job status forward. Transitions are monotonic; an attempt
    /// to move backwards is a logic error and is ignored outside debug
    /// builds.
    pub(crate) fn advance(&self, next: JobStatus) {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        debug_assert!(
            next.rank() >= status.rank(),
            "job status may only move forward ({} -> {})",
            *status,
            next
        );
        if next.rank() > status.rank() {
            *status = next;
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Run one job to its terminal state and report the result to every
/// observer.
pub(crate) async fn run_job(ctx: Arc<JobContext>, result_tx: watch::Sender<Option<JobResult>>) {
    let result = execute(&ctx).await;

    // Terminal bookkeeping: the job leaves the dedup table and the active
    // map before observers are woken, so a fresh identical request starts
    // new work instead of attaching to a corpse.
    ctx.dedup.lock().await.remove(&ctx.key);
    ctx.active.lock().await.remove(&ctx.id);

    match &result {
        Ok(outcome) => {
            ctx.advance(JobStatus::Done);
            tracing::info!(
                job_id = %ctx.id,
                skipped = outcome.skipped.len(),
                "job complete"
            );
            ctx.emit(Event::Complete {
                id: ctx.id,
                skipped: outcome.skipped.len(),
            });
        }
        Err(Error::Cancelled) => {
            ctx.advance(JobStatus::Failed);
            tracing::info!(job_id = %ctx.id, "job cancelled");
            ctx.emit(Event::Cancelled { id: ctx.id });
        }
        Err(e) => {
            ctx.advance(JobStatus::Failed);
            tracing::error!(job_id = %ctx.id, error = %e, "job failed");
            ctx.emit(Event::Failed {
                id: ctx.id,
                error: e.to_string(),
            });
        }
    }

    // Relocation moved everything worth keeping out of the job directory,
    // and a failed job leaves only debris.
    let discard_job_dir = match &result {
        Ok(outcome) => matches!(outcome.delivery, Delivery::Links(_)),
        Err(_) => true,
    };
    if discard_job_dir {
        let _ = tokio::fs::remove_dir_all(&ctx.job_dir).await;
    }

    result_tx.send(Some(result.map_err(Arc::new))).ok();
}

async fn execute(ctx: &Arc<JobContext>) -> Result<JobOutcome> {
    ctx.advance(JobStatus::Fetching);
    tokio::fs::create_dir_all(&ctx.job_dir).await?;

    let tracks = ctx.resolver.resolve_input(&ctx.request.input).await?;
    tracing::info!(job_id = %ctx.id, tracks = tracks.len(), "input resolved");
    ctx.emit(Event::Resolved {
        id: ctx.id,
        tracks: tracks.len(),
    });

    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Fetch every track concurrently. Joining handles in spawn order
    // buffers and reorders results back to resolution order, no matter
    // which fetch completes first.
    let mut handles = Vec::with_capacity(tracks.len());
    for (index, track) in tracks.iter().enumerate() {
        let ctx = Arc::clone(ctx);
        let track = track.clone();
        handles.push(tokio::spawn(async move {
            fetch_and_encode(&ctx, index, track).await
        }));
    }

    let results = futures::future::join_all(handles).await;

    let mut artifacts = Vec::new();
    let mut skipped = Vec::new();
    for (result, track) in results.into_iter().zip(tracks.iter()) {
        match result {
            Ok(Ok(artifact)) => artifacts.push(artifact),
            Ok(Err(skip)) => skipped.push(skip),
            Err(e) => {
                tracing::error!(job_id = %ctx.id, error = %e, "track task aborted");
                skipped.push(SkippedTrack {
                    title: track.title.clone(),
                    provider: track.provider,
                    reason: SkipReason::EncodeFailed,
                });
            }
        }
    }

    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if artifacts.is_empty() {
        return Err(Error::AllTracksFailed { skipped });
    }

    ctx.advance(JobStatus::Packaging);
    ctx.emit(Event::Packaging { id: ctx.id });

    let package = build_package(ctx, &tracks, artifacts).await?;

    ctx.advance(JobStatus::Delivering);
    ctx.emit(Event::Delivering { id: ctx.id });

    let delivery =
        delivery::deliver(package, &ctx.config.delivery, ctx.transport.as_ref()).await?;

    Ok(JobOutcome { delivery, skipped })
}

/// Fetch and encode one track. Failures become skip-list entries, never
/// whole-job errors.
async fn fetch_and_encode(
    ctx: &Arc<JobContext>,
    index: usize,
    track: TrackDescriptor,
) -> std::result::Result<Artifact, SkippedTrack> {
    let adapter = ctx.adapters.get(track.provider);
    let quality = adapter.effective_quality(&track, ctx.request.quality);

    let raw = {
        // Fairness bound first, then the global bandwidth bound. Both
        // permits are released as soon as the fetch finishes so encoding
        // never occupies a fetch slot.
        let _user_permit = match Arc::clone(&ctx.user_limit).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return Err(skipped_track(&track, SkipReason::ProviderUnavailable)),
        };
        let _global_permit = match Arc::clone(&ctx.global_limit).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return Err(skipped_track(&track, SkipReason::ProviderUnavailable)),
        };

        let fetch_timeout = ctx.config.download.fetch_timeout;
        let attempt = || {
            let adapter = Arc::clone(&adapter);
            let track = track.clone();
            async move {
                match tokio::time::timeout(fetch_timeout, adapter.fetch_raw(&track, quality)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Unavailable {
                        provider: track.provider,
                        reason: format!("fetch timed out after {:?}", fetch_timeout),
                    }),
                }
            }
        };

        let retried = fetch_with_retry(&ctx.config.retry, attempt);
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(skipped_track(&track, SkipReason::ProviderUnavailable));
            }
            result = retried => match result {
                Ok(raw) => raw,
                Err(e) => {
                    let reason = e.skip_reason();
                    tracing::warn!(
                        job_id = %ctx.id,
                        track = %track.id,
                        error = %e,
                        "track fetch failed"
                    );
                    ctx.emit(Event::TrackSkipped {
                        id: ctx.id,
                        index,
                        title: track.title.clone(),
                        reason,
                    });
                    return Err(skipped_track(&track, reason));
                }
            },
        }
    };

    match ctx
        .pipeline
        .process(raw, &track, quality, &ctx.job_dir)
        .await
    {
        Ok(artifact) => {
            ctx.emit(Event::TrackFetched {
                id: ctx.id,
                index,
                title: track.title.clone(),
            });
            Ok(artifact)
        }
        Err(e) => {
            let reason = e.skip_reason().unwrap_or(SkipReason::EncodeFailed);
            tracing::warn!(
                job_id = %ctx.id,
                track = %track.id,
                error = %e,
                "track encode failed"
            );
            ctx.emit(Event::TrackSkipped {
                id: ctx.id,
                index,
                title: track.title.clone(),
                reason,
            });
            Err(skipped_track(&track, reason))
        }
    }
}

fn skipped_track(track: &TrackDescriptor, reason: SkipReason) -> SkippedTrack {
    SkippedTrack {
        title: track.title.clone(),
        provider: track.provider,
        reason,
    }
}

/// Assemble the package: a lone artifact stays bare in single mode,
/// everything else becomes a (possibly split) archive.
async fn build_package(
    ctx: &Arc<JobContext>,
    tracks: &[TrackDescriptor],
    artifacts: Vec<Artifact>,
) -> Result<Package> {
    let use_archive = ctx.request.mode == OutputMode::Zip
        || (ctx.request.mode == OutputMode::Link
            && ctx.config.delivery.format == ArchiveFormat::Zip)
        || artifacts.len() > 1;

    if !use_archive {
        let mut artifacts = artifacts;
        return Ok(Package::Single(artifacts.remove(0)));
    }

    let cover = if ctx.config.delivery.covers_enabled() {
        match tracks.first() {
            Some(first) => ctx.pipeline.fetch_cover(first).await,
            None => None,
        }
    } else {
        None
    };

    let base_name = archive_base_name(tracks);
    let job_dir = ctx.job_dir.clone();
    let parts = tokio::task::spawn_blocking(move || {
        packaging::build_archive(
            &artifacts,
            cover,
            &job_dir,
            &base_name,
            packaging::SIZE_CEILING,
        )
    })
    .await
    .map_err(|e| Error::Other(format!("packaging task panicked: {}", e)))??;

    Ok(Package::Archive(parts))
}

fn archive_base_name(tracks: &[TrackDescriptor]) -> String {
    match tracks.first() {
        Some(track) => {
            let label = track.album.as_deref().unwrap_or(&track.title);
            crate::utils::sanitize_filename(&format!("{} - {}", track.artist, label))
        }
        None => "archive".to_string(),
    }
}
