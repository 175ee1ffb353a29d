use crate::call::{
    CallContext, CallError, CallMessage, ExecutionResult, ExecutionStatus, HaltReason,
};
use crate::state::{ArchiveProvider, ArchiveState, StateError, StateResult};
use crate::INTRINSIC_TX_GAS;
use alloy::primitives::{Address, B256, BlockNumber, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: BTreeMap<B256, B256>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptedOutcome {
    #[default]
    Return,
    Revert,
    InvalidOpcode,
}

/// Canned behaviour of a contract: any call to `to` needs `gas_required` gas and then
/// ends with `outcome`, returning `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedCall {
    pub to: Address,
    pub gas_required: u64,
    #[serde(default)]
    pub output: Bytes,
    #[serde(default)]
    pub outcome: ScriptedOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct BlockDiff {
    accounts: BTreeMap<Address, AccountSnapshot>,
    calls: Vec<ScriptedCall>,
}

#[derive(Debug, Default, Deserialize)]
struct ArchiveFile {
    blocks: BTreeMap<BlockNumber, BlockDiff>,
}

#[derive(Debug, Clone, Default)]
struct BlockSnapshot {
    accounts: BTreeMap<Address, AccountSnapshot>,
    calls: BTreeMap<Address, ScriptedCall>,
}

/// Archive kept entirely in memory.
///
/// The state of a block is the state of the closest earlier archived block with the
/// changes of that block applied. Blocks are expected to be populated in ascending order;
/// changing a block does not affect blocks archived after it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchive {
    blocks: Arc<RwLock<BTreeMap<BlockNumber, Arc<BlockSnapshot>>>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an archive from JSON of the form
    /// `{"blocks": {"<number>": {"accounts": {...}, "calls": [...]}}}`
    /// where each block lists the accounts it changes and the scripted calls it adds.
    pub fn from_json_reader(reader: impl std::io::Read) -> Result<Self, serde_json::Error> {
        let file: ArchiveFile = serde_json::from_reader(reader)?;
        let archive = Self::new();
        for (block, diff) in file.blocks {
            archive.modify(block, |snapshot| {
                snapshot.accounts.extend(diff.accounts);
                snapshot
                    .calls
                    .extend(diff.calls.into_iter().map(|call| (call.to, call)));
            });
        }
        Ok(archive)
    }

    /// Makes `block` available without changing any state.
    pub fn add_block(&self, block: BlockNumber) {
        self.modify(block, |_| {});
    }

    pub fn set_account(&self, block: BlockNumber, address: Address, account: AccountSnapshot) {
        self.modify(block, |snapshot| {
            snapshot.accounts.insert(address, account);
        });
    }

    pub fn add_call(&self, block: BlockNumber, call: ScriptedCall) {
        self.modify(block, |snapshot| {
            snapshot.calls.insert(call.to, call);
        });
    }

    fn modify(&self, block: BlockNumber, f: impl FnOnce(&mut BlockSnapshot)) {
        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot = blocks
            .range(..=block)
            .next_back()
            .map(|(_, snapshot)| BlockSnapshot::clone(snapshot))
            .unwrap_or_default();
        f(&mut snapshot);
        blocks.insert(block, Arc::new(snapshot));
    }
}

impl ArchiveProvider for InMemoryArchive {
    type State = InMemoryState;

    fn block_range(&self) -> StateResult<RangeInclusive<BlockNumber>> {
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        match (blocks.keys().next(), blocks.keys().next_back()) {
            (Some(first), Some(last)) => Ok(*first..=*last),
            _ => Err(StateError::Empty),
        }
    }

    fn archive_state_at(&self, block_number: BlockNumber) -> StateResult<InMemoryState> {
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        let last = blocks.keys().next_back().copied();
        if last.is_none_or(|last| block_number > last) {
            return Err(StateError::NotFound(block_number));
        }
        let (_, snapshot) = blocks
            .range(..=block_number)
            .next_back()
            .ok_or(StateError::NotFound(block_number))?;
        Ok(InMemoryState {
            snapshot: snapshot.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryState {
    snapshot: Arc<BlockSnapshot>,
}

impl InMemoryState {
    fn account(&self, address: &Address) -> Option<&AccountSnapshot> {
        self.snapshot.accounts.get(address)
    }
}

impl ArchiveState for InMemoryState {
    fn get_balance(&self, address: Address) -> StateResult<U256> {
        Ok(self.account(&address).map(|a| a.balance).unwrap_or_default())
    }

    fn get_nonce(&self, address: Address) -> StateResult<u64> {
        Ok(self.account(&address).map(|a| a.nonce).unwrap_or_default())
    }

    fn get_code(&self, address: Address) -> StateResult<Bytes> {
        Ok(self
            .account(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    fn get_state(&self, address: Address, slot: B256) -> StateResult<B256> {
        Ok(self
            .account(&address)
            .and_then(|a| a.storage.get(&slot).copied())
            .unwrap_or_default())
    }

    fn call(
        &mut self,
        _context: &CallContext,
        message: &CallMessage,
    ) -> Result<ExecutionResult, CallError> {
        if message.gas_limit < INTRINSIC_TX_GAS {
            return Err(CallError::IntrinsicGasTooLow {
                have: message.gas_limit,
                want: INTRINSIC_TX_GAS,
            });
        }
        let have = self.get_balance(message.from)?;
        let want = message
            .gas_price
            .saturating_mul(U256::from(message.gas_limit))
            .saturating_add(message.value);
        if want > have {
            return Err(CallError::InsufficientFunds {
                address: message.from,
                have,
                want,
            });
        }

        let Some(script) = message.to.and_then(|to| self.snapshot.calls.get(&to)) else {
            return Ok(ExecutionResult {
                status: ExecutionStatus::Success,
                output: Bytes::new(),
                gas_used: INTRINSIC_TX_GAS,
            });
        };
        if message.gas_limit < script.gas_required {
            return Ok(ExecutionResult {
                status: ExecutionStatus::Halt(HaltReason::OutOfGas),
                output: Bytes::new(),
                gas_used: message.gas_limit,
            });
        }
        let status = match script.outcome {
            ScriptedOutcome::Return => ExecutionStatus::Success,
            ScriptedOutcome::Revert => ExecutionStatus::Revert,
            ScriptedOutcome::InvalidOpcode => ExecutionStatus::Halt(HaltReason::InvalidOpcode),
        };
        Ok(ExecutionResult {
            status,
            output: script.output.clone(),
            gas_used: script.gas_required,
        })
    }
}
