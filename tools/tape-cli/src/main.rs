use anyhow::Context;
use clap::{Parser, Subcommand};
use rpc_replay_tape::{
    Body, ErrorMessage, Record, RecordedOutcome, TapeReader, list_tapes, open_tape, read_record,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(version, about = "Inspects recorded RPC traffic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints every record as one JSON object per line.
    Inspect {
        /// Recording file or directory of recordings.
        path: PathBuf,
        /// Stop after this many records.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Counts records per method and outcome.
    Stats {
        /// Recording file or directory of recordings.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rpc_replay_tracing::Tracer::default().init();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { path, limit } => inspect(&path, limit.unwrap_or(usize::MAX)).await?,
        Command::Stats { path } => stats(&path).await?,
    }
    Ok(())
}

/// JSON view of one record.
#[derive(Serialize)]
struct RecordLine<'a> {
    block: u64,
    timestamp: u64,
    #[serde(flatten)]
    query: &'a Body,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorMessage>,
}

impl<'a> From<&'a Record> for RecordLine<'a> {
    fn from(record: &'a Record) -> Self {
        let (result, error) = match &record.outcome {
            RecordedOutcome::Result(raw) => (
                // Results that are not valid JSON are shown as a plain string.
                Some(serde_json::from_slice(raw).unwrap_or_else(|_| {
                    serde_json::Value::String(String::from_utf8_lossy(raw).into_owned())
                })),
                None,
            ),
            RecordedOutcome::Error(err) => (None, Some(err)),
        };
        Self {
            block: record.block_number(),
            timestamp: record.block_timestamp,
            query: &record.query,
            result,
            error,
        }
    }
}

async fn inspect(path: &Path, limit: usize) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    let mut printed = 0;
    for tape in list_tapes(path).await? {
        let mut input = open(&tape).await?;
        while printed < limit {
            let Some(record) = next_record(&mut input, &tape).await? else {
                break;
            };
            serde_json::to_writer(&mut stdout, &RecordLine::from(&record))?;
            writeln!(stdout)?;
            printed += 1;
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct MethodCounts {
    results: u64,
    errors: BTreeMap<i32, u64>,
}

async fn stats(path: &Path) -> anyhow::Result<()> {
    let mut per_method: BTreeMap<String, MethodCounts> = BTreeMap::new();
    let mut blocks: Option<(u64, u64)> = None;
    let mut total = 0u64;

    for tape in list_tapes(path).await? {
        let mut input = open(&tape).await?;
        while let Some(record) = next_record(&mut input, &tape).await? {
            total += 1;
            let block = record.block_number();
            blocks = Some(blocks.map_or((block, block), |(lo, hi)| (lo.min(block), hi.max(block))));

            let counts = per_method.entry(record.query.method.clone()).or_default();
            match &record.outcome {
                RecordedOutcome::Result(_) => counts.results += 1,
                RecordedOutcome::Error(err) => *counts.errors.entry(err.code).or_default() += 1,
            }
        }
    }

    println!("Records: {total}");
    if let Some((first, last)) = blocks {
        println!("Blocks: {first}..={last}");
    }
    for (method, counts) in &per_method {
        println!("{method}: {} result(s)", counts.results);
        for (code, count) in &counts.errors {
            println!("  error {code}: {count}");
        }
    }
    Ok(())
}

async fn open(tape: &Path) -> anyhow::Result<TapeReader> {
    open_tape(tape)
        .await
        .with_context(|| format!("cannot open {}", tape.display()))
}

async fn next_record(input: &mut TapeReader, tape: &Path) -> anyhow::Result<Option<Record>> {
    read_record(input)
        .await
        .with_context(|| format!("corrupt recording {}", tape.display()))
}
