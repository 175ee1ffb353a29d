use crate::block_tag::resolve_requested_block;
use crate::method::RpcMethod;
use crate::metrics::{REPLAY_METRICS, SkipCause};
use crate::model::WorkItem;
use crate::stats::ReplayStats;
use alloy::primitives::BlockNumber;
use anyhow::Context;
use async_trait::async_trait;
use rpc_replay_pipeline::{Source, wait_for_stop};
use rpc_replay_state_api::ArchiveProvider;
use rpc_replay_tape::{Record, RecordIterator, open_tape};
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Single task reading recordings and binding each record to archive state.
pub struct Reader<P>(PhantomData<P>);

#[derive(Debug)]
pub struct ReaderParams<P> {
    pub provider: Arc<P>,
    /// Recordings, replayed one after another.
    pub tapes: Vec<PathBuf>,
    pub first_block: u64,
    pub last_block: u64,
    pub queue_length: usize,
    /// External cancellation, handed to every record iterator.
    pub cancel: watch::Receiver<bool>,
    pub stats: Arc<ReplayStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    NextTape,
    Stop,
}

#[async_trait]
impl<P: ArchiveProvider> Source for Reader<P> {
    type Output = WorkItem<P::State>;
    type Params = ReaderParams<P>;

    const NAME: &'static str = "reader";

    async fn run(
        params: ReaderParams<P>,
        output: mpsc::Sender<WorkItem<P::State>>,
        mut stop: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let available = params
            .provider
            .block_range()
            .context("cannot determine the blocks available in the archive")?;
        tracing::info!(
            first = available.start(),
            last = available.end(),
            tapes = params.tapes.len(),
            "reading recordings"
        );

        for path in &params.tapes {
            let input = open_tape(path)
                .await
                .with_context(|| format!("cannot open recording {}", path.display()))?;
            tracing::info!(path = %path.display(), "replaying recording");

            let mut iter = RecordIterator::new(input, params.queue_length, params.cancel.clone());
            let flow = read_tape(&params, &available, &mut iter, &output, &mut stop).await;
            let error = iter.take_error();
            iter.close().await;

            if let Some(err) = error {
                tracing::error!(path = %path.display(), %err, "recording is corrupt");
                return Err(err).with_context(|| format!("cannot read recording {}", path.display()));
            }
            if flow == Flow::Stop {
                break;
            }
        }
        Ok(())
    }
}

async fn read_tape<P: ArchiveProvider>(
    params: &ReaderParams<P>,
    available: &RangeInclusive<BlockNumber>,
    iter: &mut RecordIterator,
    output: &mpsc::Sender<WorkItem<P::State>>,
    stop: &mut watch::Receiver<bool>,
) -> Flow {
    loop {
        let has_next = tokio::select! {
            biased;
            _ = wait_for_stop(stop) => return Flow::Stop,
            has_next = iter.next() => has_next,
        };
        if !has_next {
            return if *params.cancel.borrow() {
                Flow::Stop
            } else {
                Flow::NextTape
            };
        }
        let Some(record) = iter.take_value() else {
            continue;
        };
        params.stats.record_read();
        REPLAY_METRICS.records_read.inc();

        let item = match bind(params, available, record) {
            Binding::Item(item) => item,
            Binding::Skip(cause) => {
                params.stats.record_skipped();
                REPLAY_METRICS.records_skipped[&cause].inc();
                continue;
            }
            Binding::EndOfRange => return Flow::Stop,
        };

        tokio::select! {
            biased;
            _ = wait_for_stop(stop) => return Flow::Stop,
            sent = output.send(item) => {
                if sent.is_err() {
                    tracing::debug!("work queue closed, stopping reader");
                    return Flow::Stop;
                }
            }
        }
    }
}

enum Binding<S> {
    Item(WorkItem<S>),
    Skip(SkipCause),
    EndOfRange,
}

fn bind<P: ArchiveProvider>(
    params: &ReaderParams<P>,
    available: &RangeInclusive<BlockNumber>,
    record: Record,
) -> Binding<P::State> {
    let recorded = record.block_number();
    let method = record.query.method_base;
    if recorded < params.first_block {
        tracing::debug!(block = recorded, method, "record precedes the first block");
        return Binding::Skip(SkipCause::BeforeFirstBlock);
    }
    if recorded > params.last_block {
        tracing::info!(block = recorded, last_block = params.last_block, "reached the last block");
        return Binding::EndOfRange;
    }

    let requested = match resolve_requested_block(&record.query.params, recorded) {
        Ok(requested) => requested,
        Err(err) => {
            tracing::warn!(block = recorded, method, %err, "skipping record");
            return Binding::Skip(SkipCause::InvalidBlockTag);
        }
    };
    if !available.contains(&requested.number) {
        tracing::debug!(
            block = requested.number,
            method,
            first = available.start(),
            last = available.end(),
            "requested block is not archived"
        );
        return Binding::Skip(SkipCause::OutOfRange);
    }

    match params.provider.archive_state_at(requested.number) {
        Ok(archive) => Binding::Item(WorkItem {
            archive,
            method: RpcMethod::from_base(method),
            block: requested.number,
            validatable: requested.validatable,
            record,
        }),
        Err(err) => {
            tracing::warn!(block = requested.number, method, %err, "cannot open archive state");
            Binding::Skip(SkipCause::ArchiveUnavailable)
        }
    }
}
