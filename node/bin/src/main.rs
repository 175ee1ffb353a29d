use rpc_replay::{ChainConfig, ReplayConfig, TapeConfig};
use rpc_replay_bin::config::{ArchiveConfig, Config, LogConfig};
use rpc_replay_bin::run;
use smart_config::{ConfigRepository, ConfigSchema, DescribeConfig, Environment};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    // =========== load configs ===========
    let config = build_configs();

    // =========== init tracing ===========
    rpc_replay_tracing::Tracer::new(config.log_config.format, config.log_config.use_color).init();
    tracing::info!(?config, "Loaded config");

    // =========== init interruption channel ===========
    let (stop_sender, stop_receiver) = watch::channel(false);
    tokio::spawn(handle_termination(stop_sender));

    let result = run(stop_receiver, config).await;
    if let Err(err) = &result {
        tracing::error!("Replay failed: {err:#}");
    }
    result
}

/// Turns SIGINT and SIGTERM into a stop request; the replay then shuts down in order.
async fn handle_termination(stop_sender: watch::Sender<bool>) {
    // sigint is sent on Ctrl+C
    let mut sigint =
        signal(SignalKind::interrupt()).expect("failed to register interrupt signal handler");
    // sigterm is sent on `kill <pid>`
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to register terminate signal handler");

    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, stopping replay"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping replay"),
    }
    stop_sender.send_replace(true);
}

fn build_configs() -> Config {
    let mut schema = ConfigSchema::default();
    schema
        .insert(&ReplayConfig::DESCRIPTION, "replay")
        .expect("Failed to insert replay config");
    schema
        .insert(&ChainConfig::DESCRIPTION, "chain")
        .expect("Failed to insert chain config");
    schema
        .insert(&TapeConfig::DESCRIPTION, "tape")
        .expect("Failed to insert tape config");
    schema
        .insert(&ArchiveConfig::DESCRIPTION, "archive")
        .expect("Failed to insert archive config");
    schema
        .insert(&LogConfig::DESCRIPTION, "log")
        .expect("Failed to insert log config");

    let repo = ConfigRepository::new(&schema).with(Environment::prefixed(""));

    let replay_config = repo
        .single::<ReplayConfig>()
        .expect("Failed to load replay config")
        .parse()
        .expect("Failed to parse replay config");

    let chain_config = repo
        .single::<ChainConfig>()
        .expect("Failed to load chain config")
        .parse()
        .expect("Failed to parse chain config");

    let tape_config = repo
        .single::<TapeConfig>()
        .expect("Failed to load tape config")
        .parse()
        .expect("Failed to parse tape config");

    let archive_config = repo
        .single::<ArchiveConfig>()
        .expect("Failed to load archive config")
        .parse()
        .expect("Failed to parse archive config");

    let log_config = repo
        .single::<LogConfig>()
        .expect("Failed to load log config")
        .parse()
        .expect("Failed to parse log config");

    Config {
        replay_config,
        chain_config,
        tape_config,
        archive_config,
        log_config,
    }
}
