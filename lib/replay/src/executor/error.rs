use alloy::primitives::Bytes;
use alloy::sol_types::{ContractError, RevertReason};
use rpc_replay_state_api::{CallError, HaltReason, StateError};
use std::fmt;

/// Error the live side produced for a re-executed request.
///
/// The messages mirror what a node answers over RPC, since they are matched against
/// recorded error codes by substring.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("invalid argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },
    #[error(transparent)]
    Revert(#[from] RevertError),
    #[error("{0}")]
    Halt(HaltReason),
    #[error("gas required exceeds allowance ({0})")]
    GasAllowanceExceeded(u64),
    #[error("insufficient funds for transfer")]
    InsufficientFundsForTransfer,
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl ExecutionError {
    pub(crate) fn invalid_argument(index: usize, reason: impl fmt::Display) -> Self {
        Self::InvalidArgument {
            index,
            reason: reason.to_string(),
        }
    }
}

/// Represents a reverted call and its output data.
///
/// Displays "execution reverted(: reason)?" if the reason is a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct RevertError {
    /// `None` if the output was empty.
    output: Option<Bytes>,
}

impl RevertError {
    pub fn new(output: Bytes) -> Self {
        Self {
            output: (!output.is_empty()).then_some(output),
        }
    }

    pub fn output(&self) -> Option<&Bytes> {
        self.output.as_ref()
    }
}

impl fmt::Display for RevertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("execution reverted")?;
        let Some(reason) = self.output.as_ref().and_then(|out| RevertReason::decode(out)) else {
            return Ok(());
        };
        let reason_str = reason.to_string();
        let reason_str = match reason {
            // `revert: ` is redundant after "execution reverted"
            RevertReason::ContractError(ContractError::Revert(_)) => {
                reason_str.trim_start_matches("revert: ")
            }
            _ => reason_str.as_str(),
        };
        write!(f, ": {reason_str}")
    }
}
