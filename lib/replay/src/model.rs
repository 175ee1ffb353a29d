use crate::executor::ExecutionError;
use crate::method::RpcMethod;
use alloy::primitives::{B256, Bytes, U256};
use rpc_replay_tape::Record;
use std::fmt;

/// A record bound to the archive state it is re-executed against.
#[derive(Debug)]
pub struct WorkItem<S> {
    pub archive: S,
    pub record: Record,
    pub method: RpcMethod,
    /// Block the request targets; differs from the recorded block for explicit block tags.
    pub block: u64,
    pub validatable: bool,
}

/// Value produced by re-executing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveValue {
    Balance(U256),
    Nonce(u64),
    Code(Bytes),
    Storage(B256),
    ReturnData(Bytes),
    Gas(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PendingBlock,
    MissingTimestamp,
    NotReplayed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PendingBlock => "request targets the pending block",
            Self::MissingTimestamp => "recording carries no block timestamp",
            Self::NotReplayed => "method is not replayed",
        })
    }
}

#[derive(Debug, Clone)]
pub enum LiveOutcome {
    Value(LiveValue),
    Error(ExecutionError),
    Skipped(SkipReason),
}

/// Recorded and live outcome of one request, ready for comparison.
#[derive(Debug)]
pub struct Outcome {
    pub method: RpcMethod,
    pub block: u64,
    pub record: Record,
    pub live: LiveOutcome,
}

impl Outcome {
    pub fn method_base(&self) -> &'static str {
        self.record.query.method_base
    }
}
