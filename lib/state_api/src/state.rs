use crate::call::{CallContext, CallError, CallMessage, ExecutionResult};
use alloy::primitives::{Address, B256, BlockNumber, Bytes, U256};
use std::ops::RangeInclusive;

/// Access to the state of the chain as of any archived block.
pub trait ArchiveProvider: Send + Sync + 'static {
    type State: ArchiveState;

    /// Blocks for which an archive state can be obtained.
    fn block_range(&self) -> StateResult<RangeInclusive<BlockNumber>>;

    /// Get a handle on the state as of the end of `block_number`.
    fn archive_state_at(&self, block_number: BlockNumber) -> StateResult<Self::State>;
}

/// Read-only view on the state as of one block.
///
/// [`ArchiveState::call`] executes a message against the view. Its state changes
/// are never visible to later reads or calls on the same handle.
pub trait ArchiveState: Send + 'static {
    fn get_balance(&self, address: Address) -> StateResult<U256>;

    fn get_nonce(&self, address: Address) -> StateResult<u64>;

    fn get_code(&self, address: Address) -> StateResult<Bytes>;

    fn get_state(&self, address: Address, slot: B256) -> StateResult<B256>;

    fn call(
        &mut self,
        context: &CallContext,
        message: &CallMessage,
    ) -> Result<ExecutionResult, CallError>;
}

/// State reader result type.
pub type StateResult<Ok> = Result<Ok, StateError>;

/// Error variants thrown by state readers.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StateError {
    #[error("block {0} not found")]
    NotFound(BlockNumber),
    #[error("archive is empty")]
    Empty,
    #[error("archive backend failure: {0}")]
    Backend(String),
}
