//! Job manager — owns the lifecycle of a job from acceptance to terminal
//! delivery.
//!
//! Responsibilities:
//! - **Deduplication**: identical concurrent requests (same user,
//!   normalized input, and quality tier) collapse into one job; later
//!   submitters attach as additional observers and receive the same
//!   eventual result without a single extra provider call.
//! - **Concurrency bounds**: a global semaphore caps simultaneous
//!   in-flight fetches, and a per-user semaphore keeps one user from
//!   starving the rest.
//! - **Retry policy**: transient provider failures retry with bounded
//!   exponential backoff; everything else is terminal for its track.
//! - **Partial failure**: failed tracks enter the skip list; the job only
//!   fails outright when every track fails or delivery itself does.
//! - **Cancellation**: a sole observer may cancel a job until packaging
//!   begins; afterwards delivery always completes or fails.

mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::delivery::UploadTransport;
use crate::error::{Error, Result};
use crate::pipeline::{Encoder, FormatPipeline};
use crate::providers::AdapterSet;
use crate::resolver::{CandidateStream, TrackResolver};
use crate::types::{Event, JobId, JobOutcome, JobStatus, OutputMode, Provider, Request};

/// Result a job reports to each of its observers
pub type JobResult = std::result::Result<JobOutcome, Arc<Error>>;

/// Identity used to collapse concurrent identical requests into one job
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct DedupKey(String);

fn dedup_key(request: &Request) -> DedupKey {
    let mut hasher = Sha256::new();
    hasher.update(request.user_id.to_le_bytes());
    hasher.update(request.input.trim().to_lowercase().as_bytes());
    hasher.update([request.quality.tag()]);
    DedupKey(format!("{:x}", hasher.finalize()))
}

/// Handle held by one observer of a job
pub struct JobTicket {
    id: JobId,
    rx: watch::Receiver<Option<JobResult>>,
}

impl JobTicket {
    /// The job this ticket observes
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Wait for the job's terminal result.
    ///
    /// Every observer of a deduplicated job receives the same outcome.
    pub async fn wait(mut self) -> JobResult {
        loop {
            if let Some(result) = self.rx.borrow().clone() {
                return result;
            }
            if self.rx.changed().await.is_err() {
                return Err(Arc::new(Error::Other(
                    "job ended without reporting a result".to_string(),
                )));
            }
        }
    }
}

/// Bookkeeping for one live job
#[derive(Clone)]
pub(crate) struct JobEntry {
    pub(crate) id: JobId,
    pub(crate) status: Arc<std::sync::Mutex<JobStatus>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) observers: Arc<AtomicUsize>,
    pub(crate) result_rx: watch::Receiver<Option<JobResult>>,
}

/// Job manager instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct JobManager {
    config: Arc<Config>,
    adapters: Arc<AdapterSet>,
    resolver: Arc<TrackResolver>,
    pipeline: Arc<FormatPipeline>,
    transport: Option<Arc<dyn UploadTransport>>,
    event_tx: broadcast::Sender<Event>,
    global_fetches: Arc<Semaphore>,
    user_fetches: Arc<Mutex<HashMap<u64, Arc<Semaphore>>>>,
    dedup: Arc<Mutex<HashMap<DedupKey, JobEntry>>>,
    active: Arc<Mutex<HashMap<JobId, JobEntry>>>,
    next_id: Arc<AtomicU64>,
    accepting_new: Arc<AtomicBool>,
}

impl JobManager {
    /// Create a manager from a validated configuration, the provider
    /// adapter set, and the encoder capability.
    ///
    /// Creates the working directory and the event channel. Fails when the
    /// configuration is invalid or the working directory cannot be created.
    pub async fn new(
        config: Config,
        adapters: AdapterSet,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.work_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create work directory '{}': {}",
                        config.download.work_dir.display(),
                        e
                    ),
                ))
            })?;

        let (event_tx, _rx) = broadcast::channel(1024);
        let adapters = Arc::new(adapters);
        let resolver = Arc::new(TrackResolver::new(Arc::clone(&adapters), &config.providers));
        let pipeline = Arc::new(FormatPipeline::new(encoder, &config));
        let global_fetches = Arc::new(Semaphore::new(config.download.max_concurrent_fetches));

        Ok(Self {
            config: Arc::new(config),
            adapters,
            resolver,
            pipeline,
            transport: None,
            event_tx,
            global_fetches,
            user_fetches: Arc::new(Mutex::new(HashMap::new())),
            dedup: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Attach an upload transport; delivery then pushes files through it
    /// instead of only returning handles.
    pub fn with_transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Subscribe to job lifecycle events.
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Search one provider for candidates, for callers that let the user
    /// pick before submitting (inline mode searches a single provider).
    pub fn search(&self, query: &str, provider: Provider) -> CandidateStream {
        self.resolver.search(query, provider)
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Submit a request, returning a ticket for its eventual result.
    ///
    /// If an identical request (same dedup key) is already in flight, the
    /// caller attaches as a second observer of that job instead of
    /// starting duplicate work.
    pub async fn submit(&self, request: Request) -> Result<JobTicket> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if request.mode == OutputMode::Link && !self.config.delivery.relocation_enabled() {
            return Err(Error::Config {
                message: "link output requires copy_files_path and file_link_template".to_string(),
                key: Some("copy_files_path".to_string()),
            });
        }

        let key = dedup_key(&request);

        let mut dedup = self.dedup.lock().await;
        if let Some(entry) = dedup.get(&key) {
            let observers = entry.observers.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                job_id = %entry.id,
                observers,
                "identical request in flight, attaching observer"
            );
            self.emit(Event::ObserverAttached {
                id: entry.id,
                observers,
            });
            return Ok(JobTicket {
                id: entry.id,
                rx: entry.result_rx.clone(),
            });
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (result_tx, result_rx) = watch::channel(None);
        let entry = JobEntry {
            id,
            status: Arc::new(std::sync::Mutex::new(JobStatus::Pending)),
            cancel: CancellationToken::new(),
            observers: Arc::new(AtomicUsize::new(1)),
            result_rx: result_rx.clone(),
        };
        dedup.insert(key.clone(), entry.clone());
        drop(dedup);

        self.active.lock().await.insert(id, entry.clone());

        let user_limit = {
            let mut users = self.user_fetches.lock().await;
            Arc::clone(users.entry(request.user_id).or_insert_with(|| {
                Arc::new(Semaphore::new(self.config.download.max_fetches_per_user))
            }))
        };

        tracing::info!(job_id = %id, user_id = request.user_id, "job accepted");
        self.emit(Event::Queued { id });

        let ctx = Arc::new(task::JobContext {
            id,
            request,
            key,
            job_dir: self.config.download.work_dir.join(format!("job-{}", id)),
            config: Arc::clone(&self.config),
            adapters: Arc::clone(&self.adapters),
            resolver: Arc::clone(&self.resolver),
            pipeline: Arc::clone(&self.pipeline),
            transport: self.transport.clone(),
            event_tx: self.event_tx.clone(),
            status: Arc::clone(&entry.status),
            cancel: entry.cancel.clone(),
            global_limit: Arc::clone(&self.global_fetches),
            user_limit,
            dedup: Arc::clone(&self.dedup),
            active: Arc::clone(&self.active),
        });
        tokio::spawn(task::run_job(ctx, result_tx));

        Ok(JobTicket { id, rx: result_rx })
    }

    /// The current status of a live job.
    ///
    /// Jobs are destroyed once their terminal status has been reported, so
    /// finished jobs answer [`Error::JobNotFound`].
    pub async fn status(&self, id: JobId) -> Result<JobStatus> {
        let active = self.active.lock().await;
        let entry = active.get(&id).ok_or(Error::JobNotFound(id))?;
        let status = entry
            .status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(*status)
    }

    /// Cancel a job.
    ///
    /// Only the sole observer of a job may cancel it, and only before
    /// packaging begins; cancellation after that point has no effect
    /// (delivery always completes or fails).
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        let active = self.active.lock().await;
        let entry = active.get(&id).ok_or(Error::JobNotFound(id))?;

        let observers = entry.observers.load(Ordering::SeqCst);
        if observers > 1 {
            return Err(Error::InvalidState {
                id,
                operation: "cancel".to_string(),
                state: format!("observed by {} requests", observers),
            });
        }

        let status = *entry
            .status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if status.rank() >= JobStatus::Packaging.rank() {
            tracing::debug!(job_id = %id, %status, "cancellation past packaging is a no-op");
            return Ok(());
        }

        tracing::info!(job_id = %id, "job cancelled by observer");
        entry.cancel.cancel();
        Ok(())
    }

    /// Stop accepting new jobs and wait for in-flight jobs to finish.
    pub async fn shutdown(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);

        let waiters: Vec<_> = {
            let active = self.active.lock().await;
            active.values().map(|e| e.result_rx.clone()).collect()
        };
        tracing::info!(in_flight = waiters.len(), "draining in-flight jobs");
        for mut rx in waiters {
            loop {
                if rx.borrow().is_some() {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        tracing::info!("job manager shut down");
    }

    pub(crate) fn emit(&self, event: Event) {
        // send() fails only when no one subscribes, which is fine.
        self.event_tx.send(event).ok();
    }
}
