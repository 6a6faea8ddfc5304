use crate::config::ScanConfig;
use crate::creds::CredentialSet;
use crate::probe::probe;
use crate::queue::TargetQueue;
use crate::report::{now_iso_like, ReportSink};
use crate::trial::{try_credentials, FalsePositiveFilter, TrialOutcome};
use crate::transport::Transport;
use crate::types::{Endpoint, RunStatus, ScanReport, StatsSnapshot};
use anyhow::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress counters shared by all workers.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub dequeued: AtomicU64,
    pub candidates: AtomicU64,
    pub trial_requests: AtomicU64,
    pub false_positives: AtomicU64,
    pub successes: AtomicU64,
}

impl ScanStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dequeued: self.dequeued.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
            trial_requests: self.trial_requests.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Seeding,
    Running,
    Draining,
    ShuttingDown,
    Done,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Seeding => "seeding",
            ControllerState::Running => "running",
            ControllerState::Draining => "draining",
            ControllerState::ShuttingDown => "shutting_down",
            ControllerState::Done => "done",
        };
        f.write_str(s)
    }
}

/// One pool member. Pulls endpoints until the shutdown token fires.
struct Worker<T: Transport + ?Sized> {
    id: usize,
    queue: Arc<TargetQueue>,
    transport: Arc<T>,
    creds: Arc<CredentialSet>,
    filter: Arc<FalsePositiveFilter>,
    sink: Arc<ReportSink>,
    stats: Arc<ScanStats>,
    config: Arc<ScanConfig>,
    shutdown: CancellationToken,
    interrupt: CancellationToken,
}

impl<T: Transport + ?Sized> Worker<T> {
    async fn run(self) {
        info!(worker = self.id, "starting worker");
        while !self.shutdown.is_cancelled() {
            match self.queue.try_dequeue() {
                Some(endpoint) => {
                    self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                    self.process(&endpoint).await;
                }
                None => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {}
                        _ = time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }
        info!(worker = self.id, "exiting worker");
    }

    async fn process(&self, endpoint: &Endpoint) {
        info!(worker = self.id, host = %endpoint, "checking");
        if !probe(self.transport.as_ref(), endpoint, self.config.probe_timeout).await {
            return;
        }
        self.stats.candidates.fetch_add(1, Ordering::Relaxed);

        let outcome = try_credentials(
            self.transport.as_ref(),
            endpoint,
            &self.creds,
            &self.filter,
            self.config.trial_timeout,
            &self.stats,
            &self.interrupt,
        )
        .await;

        match outcome {
            TrialOutcome::Success(pair) => {
                info!(host = %endpoint, "access granted with {pair}");
                self.stats.successes.fetch_add(1, Ordering::Relaxed);
                self.sink.record(endpoint, &pair.username, &pair.password).await;
            }
            TrialOutcome::FalsePositive => {
                self.stats.false_positives.fetch_add(1, Ordering::Relaxed);
            }
            TrialOutcome::Failure => {
                debug!(host = %endpoint, "no working credentials");
            }
        }
    }
}

/// Owns the worker pool for a single run.
pub struct Controller<T: Transport + ?Sized> {
    config: Arc<ScanConfig>,
    transport: Arc<T>,
    state: ControllerState,
}

impl<T: Transport + ?Sized> Controller<T> {
    pub fn new(config: ScanConfig, transport: Arc<T>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            state: ControllerState::Idle,
        })
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn transition(&mut self, next: ControllerState) {
        debug!(from = %self.state, to = %next, "controller state");
        self.state = next;
    }

    /// Run the whole scan and return the report.
    ///
    /// Cancelling `interrupt` stops the pool early: queued endpoints are
    /// skipped, in-flight endpoints stop after their current request, and the
    /// report comes back with `RunStatus::Cancelled`.
    pub async fn run(
        &mut self,
        endpoints: Vec<Endpoint>,
        creds: CredentialSet,
        sink: Arc<ReportSink>,
        interrupt: CancellationToken,
    ) -> Result<ScanReport> {
        let started_at = now_iso_like();
        let total = endpoints.len();

        self.transition(ControllerState::Seeding);
        let queue = Arc::new(TargetQueue::with_capacity(total));
        for ep in endpoints {
            queue.enqueue(ep)?;
        }

        let stats = Arc::new(ScanStats::default());
        let creds = Arc::new(creds);
        let filter = Arc::new(FalsePositiveFilter::new(
            self.config.false_positive_markers.clone(),
        ));
        let shutdown = interrupt.child_token();
        let pool_size = self.config.pool_size(total);

        self.transition(ControllerState::Running);
        info!(targets = total, workers = pool_size, credentials = creds.len(), "starting scan");
        let mut set = JoinSet::new();
        for id in 1..=pool_size {
            let worker = Worker {
                id,
                queue: queue.clone(),
                transport: self.transport.clone(),
                creds: creds.clone(),
                filter: filter.clone(),
                sink: sink.clone(),
                stats: stats.clone(),
                config: self.config.clone(),
                shutdown: shutdown.clone(),
                interrupt: interrupt.clone(),
            };
            set.spawn(worker.run());
        }

        self.transition(ControllerState::Draining);
        while !queue.is_empty() && !interrupt.is_cancelled() {
            tokio::select! {
                _ = interrupt.cancelled() => {}
                _ = time::sleep(self.config.poll_interval) => {}
            }
        }

        self.transition(ControllerState::ShuttingDown);
        if interrupt.is_cancelled() {
            warn!(remaining = queue.len(), "terminating all workers due to interrupt");
        }
        shutdown.cancel();

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "worker task failed");
            }
        }

        // An interrupt that lands while workers finish still cuts their trials short.
        let status = if interrupt.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        let entries = sink.finalize().await?;
        self.transition(ControllerState::Done);
        info!(found = entries.len(), ?status, "scan finished");

        Ok(ScanReport {
            status,
            endpoints_total: total as u64,
            workers_started: pool_size,
            stats: stats.snapshot(),
            entries,
            started_at,
            finished_at: now_iso_like(),
        })
    }
}
