//! Admission control for album jobs.
//!
//! At most `bandwidth` jobs run at once. Everything submitted past that waits
//! in a FIFO queue and is started when a running job reaches a terminal state.
//! Submission, start and finish bookkeeping all happen under one lock, so two
//! jobs finishing together can never promote the same waiting job twice or
//! overshoot the bound.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

use crate::config::DownloaderConfig;
use crate::error::Result;
use crate::job::{AlbumDownloadJob, JobHandle};
use crate::services::Services;
use crate::types::JobId;

/// Job ids grouped the way a front end presents them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// Waiting for a slot, in the order they will start
    pub queued: Vec<JobId>,
    /// Running, in the order they were started
    pub running: Vec<JobId>,
    /// Terminal, in the order they finished
    pub finished: Vec<JobId>,
}

struct SchedulerState {
    in_flight: usize,
    waiting: VecDeque<AlbumDownloadJob>,
    running: Vec<JobId>,
    finished: Vec<JobId>,
}

pub struct AdmissionScheduler {
    config: DownloaderConfig,
    services: Services,
    state: Mutex<SchedulerState>,
    /// Number of jobs not yet terminal, running or queued
    active: watch::Sender<usize>,
    next_id: AtomicU64,
}

impl AdmissionScheduler {
    pub fn new(config: DownloaderConfig, services: Services) -> Arc<Self> {
        let config = DownloaderConfig {
            bandwidth: config.bandwidth.max(1),
            ..config
        };
        let (active, _) = watch::channel(0);
        Arc::new(Self {
            config,
            services,
            state: Mutex::new(SchedulerState {
                in_flight: 0,
                waiting: VecDeque::new(),
                running: Vec::new(),
                finished: Vec::new(),
            }),
            active,
            next_id: AtomicU64::new(1),
        })
    }

    /// Scheduler backed by yt-dlp, lofty and HTTP. Fails if yt-dlp is missing.
    pub async fn start(config: DownloaderConfig) -> Result<Arc<Self>> {
        let services = Services::production(&config);
        services.extractor.check_available().await?;
        Ok(Self::new(config, services))
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Accept a job for `url`, starting it now if a slot is free.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(self: &Arc<Self>, url: impl Into<String>, destination: impl Into<PathBuf>) -> JobHandle {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (job, handle) =
            AlbumDownloadJob::new(id, url, destination, self.services.clone(), &self.config);

        let mut state = self.state.lock();
        if state.in_flight < self.config.bandwidth {
            self.launch(&mut state, job);
        } else {
            info!(
                "Job {} queued for {} ({} running, {} waiting)",
                id,
                handle.url(),
                state.in_flight,
                state.waiting.len()
            );
            job.reporter().status("Queued");
            state.waiting.push_back(job);
        }
        self.publish(&state);
        handle
    }

    fn launch(self: &Arc<Self>, state: &mut SchedulerState, job: AlbumDownloadJob) {
        state.in_flight += 1;
        state.running.push(job.id());

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let id = job.id();
            let outcome = match AssertUnwindSafe(job.execute()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => job.fail(format!("job panicked: {}", panic_message(&*panic))),
            };
            // Free the slot first so a caller reacting to the finish event
            // already sees the next job running
            scheduler.on_job_finished(id);
            job.finish(outcome);
        });
    }

    fn on_job_finished(self: &Arc<Self>, id: JobId) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.running.retain(|running| *running != id);
        state.finished.push(id);

        while state.in_flight < self.config.bandwidth {
            let Some(next) = state.waiting.pop_front() else {
                break;
            };
            info!("Job {} finished, starting queued job {}", id, next.id());
            self.launch(&mut state, next);
        }
        self.publish(&state);
    }

    fn publish(&self, state: &SchedulerState) {
        self.active.send_replace(state.in_flight + state.waiting.len());
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock();
        SchedulerSnapshot {
            queued: state.waiting.iter().map(|job| job.id()).collect(),
            running: state.running.clone(),
            finished: state.finished.clone(),
        }
    }

    /// Take the ids of every finished job, emptying the finished list.
    ///
    /// The list otherwise grows for the lifetime of the scheduler; long-lived
    /// hosts drain it once they have moved those jobs out of view.
    pub fn clear_finished(&self) -> Vec<JobId> {
        std::mem::take(&mut self.state.lock().finished)
    }

    /// Resolves once no job is running or waiting
    pub async fn wait_idle(&self) {
        let mut active = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = active.wait_for(|count| *count == 0).await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}
