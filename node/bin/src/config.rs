use rpc_replay::{ChainConfig, ReplayConfig, TapeConfig};
use rpc_replay_tracing::LogFormat;
use smart_config::{DescribeConfig, DeserializeConfig, Serde};
use std::path::PathBuf;

/// Configuration of the replay binary.
/// Includes configurations of all subsystems.
/// Default values are provided for a local run.
#[derive(Debug)]
pub struct Config {
    pub replay_config: ReplayConfig,
    pub chain_config: ChainConfig,
    pub tape_config: TapeConfig,
    pub archive_config: ArchiveConfig,
    pub log_config: LogConfig,
}

impl Config {
    /// Part of the configuration the replay itself consumes.
    pub fn replay(&self) -> rpc_replay::Config {
        rpc_replay::Config {
            replay: self.replay_config.clone(),
            chain: self.chain_config.clone(),
            tape: self.tape_config.clone(),
        }
    }
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct ArchiveConfig {
    /// JSON snapshot of the archived blocks, see `InMemoryArchive::from_json_reader`.
    #[config(default_t = "./archive.json".into())]
    pub snapshot_path: PathBuf,
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct LogConfig {
    /// `terminal`, `json` or `logfmt`.
    #[config(default_t = LogFormat::Terminal)]
    #[config(with = Serde![str])]
    pub format: LogFormat,

    #[config(default_t = true)]
    pub use_color: bool,
}
