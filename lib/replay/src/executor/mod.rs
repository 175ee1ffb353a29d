//! Re-execution of recorded requests against archive state.

mod call_args;
mod error;
mod estimate;

pub use call_args::CallArgs;
pub use error::{ExecutionError, RevertError};
pub use estimate::estimate_gas;

use crate::config::ChainConfig;
use crate::metrics::REPLAY_METRICS;
use crate::method::RpcMethod;
use crate::model::{LiveOutcome, LiveValue, Outcome, SkipReason, WorkItem};
use crate::stats::ReplayStats;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use rpc_replay_pipeline::{PipelineComponent, SharedReceiver, wait_for_stop};
use rpc_replay_state_api::{ArchiveState, CallContext, ExecutionStatus};
use serde_json::Value;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Executor worker pool turning [`WorkItem`]s into [`Outcome`]s.
pub struct Executor<S>(PhantomData<S>);

#[derive(Debug, Clone)]
pub struct ExecutorParams {
    pub chain: ChainConfig,
    pub stats: Arc<ReplayStats>,
}

#[async_trait]
impl<S: ArchiveState> PipelineComponent for Executor<S> {
    type Input = WorkItem<S>;
    type Output = Outcome;
    type Params = ExecutorParams;

    const NAME: &'static str = "executor";

    async fn run(
        params: ExecutorParams,
        input: SharedReceiver<WorkItem<S>>,
        output: mpsc::Sender<Outcome>,
        mut stop: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        loop {
            let item = tokio::select! {
                biased;
                _ = wait_for_stop(&mut stop) => break,
                item = input.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            // The archive handle moves into the blocking task and is dropped there.
            let chain = params.chain.clone();
            let stats = params.stats.clone();
            let outcome =
                tokio::task::spawn_blocking(move || execute(item, &chain, &stats)).await?;

            tokio::select! {
                biased;
                _ = wait_for_stop(&mut stop) => break,
                sent = output.send(outcome) => {
                    if sent.is_err() {
                        tracing::debug!("outcome channel closed, stopping executor");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Re-executes one request. Always yields exactly one outcome.
pub fn execute<S: ArchiveState>(
    item: WorkItem<S>,
    chain: &ChainConfig,
    stats: &ReplayStats,
) -> Outcome {
    let WorkItem {
        mut archive,
        record,
        method,
        block,
        validatable,
    } = item;

    let skip = if !validatable {
        Some(SkipReason::PendingBlock)
    } else if !method.is_replayed() {
        Some(SkipReason::NotReplayed)
    } else if method.needs_timestamp() && record.block_timestamp == 0 {
        Some(SkipReason::MissingTimestamp)
    } else {
        None
    };

    let live = match skip {
        Some(reason) => LiveOutcome::Skipped(reason),
        None => {
            let latency = REPLAY_METRICS.call_latency[&method.as_str()].start();
            let context = CallContext {
                block_number: block,
                timestamp: record.block_timestamp_secs(),
                chain_id: chain.chain_id,
                base_fee: U256::from(chain.min_gas_price),
                coinbase: Address::ZERO,
                block_gas_limit: u64::MAX,
            };
            let result = dispatch(&mut archive, method, &record.query.params, &context, chain, stats);
            latency.observe();
            REPLAY_METRICS.executed[&method.as_str()].inc();
            stats.record_executed(method);
            match result {
                Ok(value) => LiveOutcome::Value(value),
                Err(err) => LiveOutcome::Error(err),
            }
        }
    };
    drop(archive);

    Outcome {
        method,
        block,
        record,
        live,
    }
}

fn dispatch<S: ArchiveState>(
    archive: &mut S,
    method: RpcMethod,
    params: &[Value],
    context: &CallContext,
    chain: &ChainConfig,
    stats: &ReplayStats,
) -> Result<LiveValue, ExecutionError> {
    match method {
        RpcMethod::GetBalance => Ok(LiveValue::Balance(archive.get_balance(address_param(params, 0)?)?)),
        RpcMethod::GetTransactionCount => Ok(LiveValue::Nonce(archive.get_nonce(address_param(params, 0)?)?)),
        RpcMethod::GetCode => Ok(LiveValue::Code(archive.get_code(address_param(params, 0)?)?)),
        RpcMethod::GetStorageAt => {
            let address = address_param(params, 0)?;
            let slot = slot_param(params, 1)?;
            Ok(LiveValue::Storage(archive.get_state(address, slot)?))
        }
        RpcMethod::Call => {
            let message = CallArgs::from_params(params)?
                .to_message(chain.call_gas_limit, chain.global_gas_cap);
            let result = archive.call(context, &message)?;
            stats.record_gas(result.gas_used);
            match result.status {
                ExecutionStatus::Success => Ok(LiveValue::ReturnData(result.output)),
                ExecutionStatus::Revert => Err(RevertError::new(result.output).into()),
                ExecutionStatus::Halt(reason) => Err(ExecutionError::Halt(reason)),
            }
        }
        RpcMethod::EstimateGas => {
            let args = CallArgs::from_params(params)?;
            let message = args.to_message(chain.global_gas_cap, chain.global_gas_cap);
            let gas = estimate_gas(archive, context, message, args.gas(), chain.global_gas_cap)?;
            stats.record_gas(gas);
            Ok(LiveValue::Gas(gas))
        }
        RpcMethod::GetLogs | RpcMethod::GetProof | RpcMethod::Unsupported => {
            unreachable!("{method} is filtered out before dispatch")
        }
    }
}

fn string_param(params: &[Value], index: usize) -> Result<&str, ExecutionError> {
    match params.get(index) {
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(ExecutionError::invalid_argument(
            index,
            format!("expected a hex string, got {other}"),
        )),
        None => Err(ExecutionError::invalid_argument(index, "missing parameter")),
    }
}

fn address_param(params: &[Value], index: usize) -> Result<Address, ExecutionError> {
    let value = string_param(params, index)?;
    Address::from_str(value).map_err(|err| ExecutionError::invalid_argument(index, err))
}

/// Storage slots are quantities: leading zeros may be omitted.
fn slot_param(params: &[Value], index: usize) -> Result<B256, ExecutionError> {
    let value = string_param(params, index)?;
    U256::from_str(value)
        .map(B256::from)
        .map_err(|err| ExecutionError::invalid_argument(index, err))
}
