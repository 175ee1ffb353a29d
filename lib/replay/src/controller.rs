use crate::comparator::{Comparator, ComparatorParams};
use crate::config::Config;
use crate::executor::{Executor, ExecutorParams};
use crate::reader::{Reader, ReaderParams};
use crate::stats::{ProgressTracker, ReplayStats, ReplaySummary};
use rpc_replay_pipeline::{
    FailureSignal, Lifecycle, PipelineComponent, SharedReceiver, Sink, Source, wait_for_stop,
};
use rpc_replay_state_api::ArchiveProvider;
use std::future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Stop requests and completion latches of the three stages.
#[derive(Debug, Clone)]
struct Stages {
    reader: Lifecycle,
    executors: Lifecycle,
    comparators: Lifecycle,
}

impl Stages {
    /// Comparators first, so nothing new is produced for a stage that stopped consuming.
    fn request_stop(&self) {
        self.comparators.request_stop();
        self.reader.request_stop();
        self.executors.request_stop();
    }

    async fn await_done(&self) {
        self.reader.await_done().await;
        self.executors.await_done().await;
        self.comparators.await_done().await;
    }
}

/// Runs the reader, executor and comparator stages of one replay.
#[derive(Debug)]
pub struct ReplayController {
    stages: Stages,
    failure: FailureSignal,
    stats: Arc<ReplayStats>,
    cancel: watch::Receiver<bool>,
    started: Instant,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayController {
    /// Starts all stages. `cancel` is the external cancellation signal.
    pub fn start<P: ArchiveProvider>(
        config: Config,
        tapes: Vec<PathBuf>,
        provider: Arc<P>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let Config {
            replay,
            chain,
            tape,
        } = config;
        let started = Instant::now();
        let stats = Arc::new(ReplayStats::default());
        let failure = FailureSignal::new();
        let stages = Stages {
            reader: Lifecycle::new(Reader::<P>::NAME),
            executors: Lifecycle::new(Executor::<P::State>::NAME),
            comparators: Lifecycle::new(Comparator::NAME),
        };

        let (work_sender, work_receiver) = mpsc::channel(replay.work_queue_capacity.max(1));
        let (outcome_sender, outcome_receiver) =
            mpsc::channel(replay.outcome_queue_capacity.max(1));

        stages.comparators.spawn_sinks::<Comparator>(
            replay.comparator_workers.max(1),
            ComparatorParams {
                severity: replay.internal_error_severity,
                continue_on_failure: replay.continue_on_failure,
                max_failures: replay.max_failures,
                failure: failure.clone(),
                stats: stats.clone(),
            },
            SharedReceiver::new(outcome_receiver),
        );
        stages.executors.spawn_components::<Executor<P::State>>(
            replay.executor_workers.max(1),
            ExecutorParams {
                chain,
                stats: stats.clone(),
            },
            SharedReceiver::new(work_receiver),
            outcome_sender,
        );
        stages.reader.spawn_source::<Reader<P>>(
            ReaderParams {
                provider,
                tapes,
                first_block: replay.first_block,
                last_block: replay.last_block,
                queue_length: tape.queue_length,
                cancel: cancel.clone(),
                stats: stats.clone(),
            },
            work_sender,
        );

        let monitor = tokio::spawn(monitor(
            stages.clone(),
            failure.clone(),
            cancel.clone(),
            stats.clone(),
            started,
            replay.progress_interval,
        ));

        Self {
            stages,
            failure,
            stats,
            cancel,
            started,
            monitor: Mutex::new(Some(monitor)),
        }
    }

    /// Stops all stages in order and waits for them to finish. Idempotent.
    pub async fn stop(&self) {
        self.stages.request_stop();
        self.stages.await_done().await;
        self.stop_monitor().await;
    }

    /// Waits for the stages to finish, whether the recordings were exhausted or a stop
    /// was requested. Idempotent.
    pub async fn wait(&self) {
        self.stages.await_done().await;
        self.stop_monitor().await;
    }

    /// Whether the completion latches of all three stages fired.
    pub fn is_finished(&self) -> bool {
        self.stages.reader.is_done()
            && self.stages.executors.is_done()
            && self.stages.comparators.is_done()
    }

    pub fn failure(&self) -> &FailureSignal {
        &self.failure
    }

    /// First error a stage failed with, e.g. a corrupt recording.
    pub fn take_error(&self) -> Option<(&'static str, anyhow::Error)> {
        [
            &self.stages.reader,
            &self.stages.executors,
            &self.stages.comparators,
        ]
        .into_iter()
        .find_map(|stage| stage.take_error().map(|err| (stage.name(), err)))
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            elapsed: self.started.elapsed(),
            stats: self.stats.snapshot(),
            failed: self.failure.is_raised(),
            cancelled: *self.cancel.borrow(),
        }
    }

    async fn stop_monitor(&self) {
        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(monitor) = monitor {
            monitor.abort();
            // Cancellation is the expected outcome here.
            let _ = monitor.await;
        }
    }
}

/// Logs progress and turns external cancellation or a raised failure into an ordered stop.
async fn monitor(
    stages: Stages,
    failure: FailureSignal,
    mut cancel: watch::Receiver<bool>,
    stats: Arc<ReplayStats>,
    started: Instant,
    interval: Duration,
) {
    let mut progress = ProgressTracker::new(started);
    let mut ticker = (!interval.is_zero()).then(|| {
        tokio::time::interval_at(tokio::time::Instant::from_std(started) + interval, interval)
    });

    loop {
        tokio::select! {
            _ = wait_for_stop(&mut cancel) => {
                tracing::info!("replay cancelled, stopping");
                break;
            }
            _ = failure.raised() => {
                tracing::warn!("replay failed, stopping");
                break;
            }
            _ = async {
                match ticker.as_mut() {
                    Some(ticker) => {
                        ticker.tick().await;
                    }
                    None => future::pending::<()>().await,
                }
            } => progress.report(&stats.snapshot()),
        }
    }
    stages.request_stop();
}
