use serde::{Deserialize, Serialize};
use smart_config::metadata::TimeUnit;
use smart_config::{DescribeConfig, DeserializeConfig, Serde};
use std::path::PathBuf;
use std::time::Duration;

/// Everything a replay run needs besides the archive.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub replay: ReplayConfig,
    pub chain: ChainConfig,
    pub tape: TapeConfig,
}

/// How a recorded internal server error without a matching live error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalErrorSeverity {
    /// Logged at warn and counted as a failure.
    #[default]
    Mismatch,
    /// Logged at debug, never counted.
    Informational,
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct ReplayConfig {
    /// Records recorded before this block are skipped.
    #[config(default_t = 0)]
    pub first_block: u64,

    /// Reading stops at the first record recorded after this block.
    #[config(default_t = u64::MAX)]
    pub last_block: u64,

    /// Number of workers re-executing requests.
    #[config(default_t = 4)]
    pub executor_workers: usize,

    /// Number of workers comparing live and recorded outcomes.
    #[config(default_t = 2)]
    pub comparator_workers: usize,

    /// Keep replaying after a mismatch instead of stopping at the first one.
    #[config(default_t = false)]
    pub continue_on_failure: bool,

    /// With `continue_on_failure`, stop once this many mismatches were seen. 0 means no limit.
    #[config(default_t = 0)]
    pub max_failures: u64,

    /// Capacity of the queue between the reader and the executors.
    #[config(default_t = 1_000)]
    pub work_queue_capacity: usize,

    /// Capacity of the queue between the executors and the comparators.
    #[config(default_t = 1_000)]
    pub outcome_queue_capacity: usize,

    /// How often progress is logged.
    #[config(default_t = 15 * TimeUnit::Seconds)]
    pub progress_interval: Duration,

    #[config(default_t = InternalErrorSeverity::Mismatch)]
    #[config(with = Serde![str])]
    pub internal_error_severity: InternalErrorSeverity,
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct ChainConfig {
    /// Chain id used in the execution context.
    #[config(default_t = 250)]
    pub chain_id: u64,

    /// Gas limit of `eth_call` requests that do not specify one.
    #[config(default_t = 9_995_800)]
    pub call_gas_limit: u64,

    /// Upper bound of gas for any call and for gas estimation.
    #[config(default_t = 50_000_000)]
    pub global_gas_cap: u64,

    /// Base fee of the execution context, in wei.
    #[config(default_t = 1_000_000_000)]
    pub min_gas_price: u64,
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct TapeConfig {
    /// Recording file or directory of recording files.
    #[config(default_t = "./rpc-recordings".into())]
    pub path: PathBuf,

    /// Number of decoded records buffered ahead of the reader.
    #[config(default_t = 100)]
    pub queue_length: usize,
}
