//! Replay of recorded RPC requests against archived chain state.
//!
//! A single [`reader::Reader`] decodes recordings and binds every record to the archive
//! state of the block it targets, a pool of [`executor::Executor`]s re-executes the
//! requests and a pool of [`comparator::Comparator`]s checks the live outcomes against
//! the recorded ones. [`ReplayController`] wires the stages and shuts them down in order.

pub mod block_tag;
pub mod comparator;
pub mod config;
mod controller;
pub mod executor;
pub mod method;
mod metrics;
pub mod model;
pub mod reader;
mod stats;

pub use config::{ChainConfig, Config, InternalErrorSeverity, ReplayConfig, TapeConfig};
pub use controller::ReplayController;
pub use metrics::{ReplayMetrics, SkipCause};
pub use method::RpcMethod;
pub use stats::{ReplayStats, ReplaySummary, StatsSnapshot};

use rpc_replay_state_api::ArchiveProvider;
use rpc_replay_tape::{TapeError, list_tapes};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("cannot list recordings")]
    Tapes(#[from] TapeError),
    #[error("no recordings found at {0}")]
    NoRecordings(PathBuf),
    #[error("{stage} stage failed")]
    Stage {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Replays every recording under `config.tape.path` and waits for the replay to end.
///
/// Mismatches do not make this fail: check [`ReplaySummary::failed`]. Errors are
/// reserved for recordings that cannot be read and for an unusable archive. The
/// summary is logged either way.
pub async fn run_replay<P: ArchiveProvider>(
    config: Config,
    provider: Arc<P>,
    cancel: watch::Receiver<bool>,
) -> Result<ReplaySummary, ReplayError> {
    let tapes = list_tapes(&config.tape.path).await?;
    if tapes.is_empty() {
        return Err(ReplayError::NoRecordings(config.tape.path));
    }

    let controller = ReplayController::start(config, tapes, provider, cancel);
    controller.wait().await;
    let summary = controller.summary();
    summary.log();

    match controller.take_error() {
        Some((stage, source)) => Err(ReplayError::Stage { stage, source }),
        None => Ok(summary),
    }
}
