use crate::state::StateError;
use alloy::primitives::{Address, Bytes, U256};
use std::fmt;

/// Block environment a call is executed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub block_number: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub chain_id: u64,
    pub base_fee: U256,
    pub coinbase: Address,
    pub block_gas_limit: u64,
}

/// Message executed without committing any state change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallMessage {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    OutOfGas,
    InvalidOpcode,
    Other(String),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfGas => f.write_str("out of gas"),
            Self::InvalidOpcode => f.write_str("invalid opcode"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Revert,
    Halt(HaltReason),
}

/// Outcome of a message that was accepted for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Return data, or revert data for a reverted call.
    pub output: Bytes,
    pub gas_used: u64,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_out_of_gas(&self) -> bool {
        self.status == ExecutionStatus::Halt(HaltReason::OutOfGas)
    }
}

/// Message rejected before execution, or execution failed for a reason outside the EVM.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGasTooLow { have: u64, want: u64 },
    #[error("insufficient funds for gas * price + value: address {address} have {have} want {want}")]
    InsufficientFunds {
        address: Address,
        have: U256,
        want: U256,
    },
    #[error(transparent)]
    State(#[from] StateError),
    #[error("{0}")]
    Other(String),
}
