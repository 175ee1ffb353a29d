use crate::executor::ExecutionError;
use alloy::primitives::{Address, Bytes, U64, U256};
use rpc_replay_state_api::CallMessage;
use serde::Deserialize;
use serde_json::Value;

/// Call object of `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgs {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub gas: Option<U64>,
    pub gas_price: Option<U256>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub input: Option<Bytes>,
}

impl CallArgs {
    /// Decodes the call object, the first request parameter.
    pub fn from_params(params: &[Value]) -> Result<Self, ExecutionError> {
        let object = params
            .first()
            .ok_or_else(|| ExecutionError::invalid_argument(0, "missing call object"))?;
        Self::deserialize(object).map_err(|err| ExecutionError::invalid_argument(0, err))
    }

    pub fn gas(&self) -> Option<u64> {
        self.gas.map(|gas| gas.to::<u64>())
    }

    /// Builds the message to execute. Absent gas defaults to `default_gas`; gas is capped
    /// at `gas_cap`; absent numeric fields are zero.
    pub fn to_message(&self, default_gas: u64, gas_cap: u64) -> CallMessage {
        let gas = self.gas().unwrap_or(default_gas);
        CallMessage {
            from: self.from.unwrap_or_default(),
            to: self.to,
            value: self.value.unwrap_or_default(),
            gas_limit: if gas_cap != 0 { gas.min(gas_cap) } else { gas },
            gas_price: self.gas_price.unwrap_or_default(),
            data: self
                .input
                .clone()
                .or_else(|| self.data.clone())
                .unwrap_or_default(),
        }
    }
}
