pub mod config;

use anyhow::Context;
use config::Config;
use rpc_replay::run_replay;
use rpc_replay_state_api::InMemoryArchive;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

pub fn load_archive(path: &Path) -> anyhow::Result<InMemoryArchive> {
    let file = File::open(path)
        .with_context(|| format!("cannot open archive snapshot {}", path.display()))?;
    InMemoryArchive::from_json_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse archive snapshot {}", path.display()))
}

/// Replays the configured recordings. Fails if the replay found mismatches.
pub async fn run(stop_receiver: watch::Receiver<bool>, config: Config) -> anyhow::Result<()> {
    let archive = load_archive(&config.archive_config.snapshot_path)?;
    let summary = run_replay(config.replay(), Arc::new(archive), stop_receiver).await?;
    if summary.failed {
        anyhow::bail!(
            "replay stopped after {} mismatch(es)",
            summary.stats.mismatches
        );
    }
    if summary.stats.mismatches > 0 {
        tracing::warn!(
            mismatches = summary.stats.mismatches,
            "replay finished with mismatches"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_replay_state_api::ArchiveProvider;
    use std::io::Write;

    #[test]
    fn archive_snapshot_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"blocks":{"5":{"accounts":{}},"9":{}}}"#)
            .unwrap();
        let archive = load_archive(file.path()).unwrap();
        assert_eq!(archive.block_range().unwrap(), 5..=9);

        assert!(load_archive(Path::new("/nonexistent/archive.json")).is_err());
    }
}
