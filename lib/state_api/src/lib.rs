//! Read-only access to historical chain state used when re-executing recorded requests.

mod call;
mod in_memory;
mod state;

pub use call::{CallContext, CallError, CallMessage, ExecutionResult, ExecutionStatus, HaltReason};
pub use in_memory::{AccountSnapshot, InMemoryArchive, InMemoryState, ScriptedCall, ScriptedOutcome};
pub use state::{ArchiveProvider, ArchiveState, StateError, StateResult};

/// Gas charged for any transaction before execution starts.
pub const INTRINSIC_TX_GAS: u64 = 21_000;
