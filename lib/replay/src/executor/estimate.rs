use crate::executor::{ExecutionError, RevertError};
use alloy::primitives::U256;
use rpc_replay_state_api::{
    ArchiveState, CallContext, CallError, CallMessage, ExecutionResult, ExecutionStatus,
    INTRINSIC_TX_GAS,
};

enum Probe {
    Succeeded,
    /// Out of gas, or rejected for an intrinsic gas below the transaction minimum.
    OutOfGas,
    /// Failed for a reason more gas cannot fix.
    Failed(ExecutionError),
}

/// Finds the smallest gas limit with which `message` executes successfully.
///
/// The search runs between the intrinsic transaction gas and `requested_gas` (or
/// `gas_cap` when absent), further limited by what the sender can pay for at the
/// message's gas price. Only a lack of gas narrows the search; a revert or any other
/// halt ends it with that error. A message that runs out of gas even at the upper
/// bound exceeds the allowance; it never yields an estimate.
pub fn estimate_gas<S: ArchiveState>(
    state: &mut S,
    context: &CallContext,
    mut message: CallMessage,
    requested_gas: Option<u64>,
    gas_cap: u64,
) -> Result<u64, ExecutionError> {
    let mut lo = INTRINSIC_TX_GAS - 1;
    let mut hi = requested_gas
        .filter(|gas| *gas >= INTRINSIC_TX_GAS)
        .unwrap_or(gas_cap);

    if !message.gas_price.is_zero() {
        let balance = state.get_balance(message.from)?;
        if message.value >= balance {
            return Err(ExecutionError::InsufficientFundsForTransfer);
        }
        let allowance = (balance - message.value) / message.gas_price;
        if allowance < U256::from(hi) {
            tracing::trace!(
                original = hi,
                %balance,
                sent = %message.value,
                %allowance,
                "gas estimation capped by limited funds"
            );
            hi = allowance.to::<u64>();
        }
    }
    if gas_cap != 0 && hi > gas_cap {
        hi = gas_cap;
    }
    let cap = hi;

    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        match probe(state, context, &mut message, mid)? {
            Probe::Succeeded => hi = mid,
            Probe::OutOfGas => lo = mid,
            Probe::Failed(err) => {
                tracing::trace!(gas = mid, %err, "gas estimation aborted");
                return Err(err);
            }
        }
    }

    if hi == cap {
        match probe(state, context, &mut message, hi)? {
            Probe::Succeeded => {}
            Probe::OutOfGas => return Err(ExecutionError::GasAllowanceExceeded(cap)),
            Probe::Failed(err) => return Err(err),
        }
    }
    Ok(hi)
}

fn probe<S: ArchiveState>(
    state: &mut S,
    context: &CallContext,
    message: &mut CallMessage,
    gas: u64,
) -> Result<Probe, ExecutionError> {
    message.gas_limit = gas;
    match state.call(context, message) {
        Ok(result) => Ok(classify(result)),
        Err(CallError::IntrinsicGasTooLow { .. }) => Ok(Probe::OutOfGas),
        Err(err) => Err(err.into()),
    }
}

fn classify(result: ExecutionResult) -> Probe {
    if result.is_out_of_gas() {
        return Probe::OutOfGas;
    }
    match result.status {
        ExecutionStatus::Success => Probe::Succeeded,
        ExecutionStatus::Revert => Probe::Failed(RevertError::new(result.output).into()),
        ExecutionStatus::Halt(reason) => Probe::Failed(ExecutionError::Halt(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, Bytes, address};
    use assert_matches::assert_matches;
    use rpc_replay_state_api::{
        AccountSnapshot, ArchiveProvider, HaltReason, InMemoryArchive, InMemoryState,
        ScriptedCall, ScriptedOutcome, StateResult,
    };

    const CONTRACT: Address = address!("0x0000000000000000000000000000000000c0ffee");
    const SENDER: Address = address!("0x00000000000000000000000000000000000a11ce");
    const CAP: u64 = 50_000_000;

    fn context() -> CallContext {
        CallContext {
            block_number: 1,
            timestamp: 1,
            chain_id: 250,
            base_fee: U256::ZERO,
            coinbase: Address::ZERO,
            block_gas_limit: u64::MAX,
        }
    }

    fn state_with(gas_required: u64, outcome: ScriptedOutcome) -> InMemoryState {
        let archive = InMemoryArchive::new();
        archive.add_call(
            1,
            ScriptedCall {
                to: CONTRACT,
                gas_required,
                output: Bytes::new(),
                outcome,
            },
        );
        archive.set_account(
            1,
            SENDER,
            AccountSnapshot {
                balance: U256::from(1_000_000u64),
                ..Default::default()
            },
        );
        archive.archive_state_at(1).unwrap()
    }

    fn message() -> CallMessage {
        CallMessage {
            to: Some(CONTRACT),
            ..Default::default()
        }
    }

    #[test]
    fn finds_minimal_gas() {
        let mut state = state_with(43_210, ScriptedOutcome::Return);
        let gas = estimate_gas(&mut state, &context(), message(), None, CAP).unwrap();
        assert_eq!(gas, 43_210);
    }

    #[test]
    fn plain_transfer_needs_intrinsic_gas() {
        let mut state = state_with(43_210, ScriptedOutcome::Return);
        let transfer = CallMessage {
            to: Some(SENDER),
            ..Default::default()
        };
        assert_eq!(
            estimate_gas(&mut state, &context(), transfer, None, CAP).unwrap(),
            INTRINSIC_TX_GAS
        );
    }

    #[test]
    fn exhausting_the_cap_is_never_an_estimate() {
        let mut state = state_with(CAP + 1, ScriptedOutcome::Return);
        let err = estimate_gas(&mut state, &context(), message(), None, CAP).unwrap_err();
        assert_matches!(err, ExecutionError::GasAllowanceExceeded(CAP));
        assert_eq!(err.to_string(), "gas required exceeds allowance (50000000)");
    }

    #[test]
    fn revert_at_cap_is_reported_as_revert() {
        let mut state = state_with(30_000, ScriptedOutcome::Revert);
        let err = estimate_gas(&mut state, &context(), message(), None, CAP).unwrap_err();
        assert_matches!(err, ExecutionError::Revert(_));
        assert!(err.to_string().contains("execution reverted"));
    }

    #[test]
    fn requested_gas_bounds_the_search() {
        let mut state = state_with(43_210, ScriptedOutcome::Return);
        assert_matches!(
            estimate_gas(&mut state, &context(), message(), Some(40_000), CAP),
            Err(ExecutionError::GasAllowanceExceeded(40_000))
        );
        assert_eq!(
            estimate_gas(&mut state, &context(), message(), Some(60_000), CAP).unwrap(),
            43_210
        );
    }

    #[test]
    fn allowance_caps_the_search() {
        let mut state = state_with(43_210, ScriptedOutcome::Return);
        let mut priced = message();
        priced.from = SENDER;
        priced.gas_price = U256::from(25);
        // 1_000_000 / 25 = 40_000 gas affordable
        assert_matches!(
            estimate_gas(&mut state, &context(), priced.clone(), None, CAP),
            Err(ExecutionError::GasAllowanceExceeded(40_000))
        );

        priced.value = U256::from(1_000_000u64);
        assert_matches!(
            estimate_gas(&mut state, &context(), priced, None, CAP),
            Err(ExecutionError::InsufficientFundsForTransfer)
        );
    }

    /// Fails with `below` under `threshold` gas and succeeds from there on.
    struct Threshold {
        threshold: u64,
        below: ExecutionStatus,
        calls: Vec<u64>,
    }

    impl Threshold {
        fn new(threshold: u64, below: ExecutionStatus) -> Self {
            Self {
                threshold,
                below,
                calls: Vec::new(),
            }
        }
    }

    impl ArchiveState for Threshold {
        fn get_balance(&self, _address: Address) -> StateResult<U256> {
            Ok(U256::ZERO)
        }

        fn get_nonce(&self, _address: Address) -> StateResult<u64> {
            Ok(0)
        }

        fn get_code(&self, _address: Address) -> StateResult<Bytes> {
            Ok(Bytes::new())
        }

        fn get_state(&self, _address: Address, _slot: B256) -> StateResult<B256> {
            Ok(B256::ZERO)
        }

        fn call(
            &mut self,
            _context: &CallContext,
            message: &CallMessage,
        ) -> Result<ExecutionResult, CallError> {
            self.calls.push(message.gas_limit);
            let status = if message.gas_limit < self.threshold {
                self.below.clone()
            } else {
                ExecutionStatus::Success
            };
            Ok(ExecutionResult {
                status,
                output: Bytes::new(),
                gas_used: message.gas_limit.min(self.threshold),
            })
        }
    }

    #[test]
    fn revert_below_the_cap_ends_the_search() {
        let mut state = Threshold::new(30_000_000, ExecutionStatus::Revert);
        let err = estimate_gas(&mut state, &context(), message(), None, CAP).unwrap_err();
        assert_matches!(err, ExecutionError::Revert(_));
        // The first probe below the threshold aborts; nothing is probed afterwards.
        let last = *state.calls.last().unwrap();
        assert!(last < 30_000_000);
        assert_eq!(state.calls.iter().filter(|gas| **gas < 30_000_000).count(), 1);
    }

    #[test]
    fn halt_below_the_cap_ends_the_search() {
        let mut state = Threshold::new(
            30_000,
            ExecutionStatus::Halt(HaltReason::InvalidOpcode),
        );
        let err = estimate_gas(&mut state, &context(), message(), None, CAP).unwrap_err();
        assert_matches!(err, ExecutionError::Halt(HaltReason::InvalidOpcode));
    }

    #[test]
    fn out_of_gas_below_the_threshold_narrows_the_search() {
        let mut state = Threshold::new(30_000, ExecutionStatus::Halt(HaltReason::OutOfGas));
        assert_eq!(
            estimate_gas(&mut state, &context(), message(), None, CAP).unwrap(),
            30_000
        );
    }
}
