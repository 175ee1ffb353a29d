use std::fmt;

/// Recorded request methods, keyed by their method base (the name without namespace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    GetBalance,
    GetTransactionCount,
    GetCode,
    GetStorageAt,
    Call,
    EstimateGas,
    /// Recorded but never re-executed.
    GetLogs,
    GetProof,
    Unsupported,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 9] = [
        Self::GetBalance,
        Self::GetTransactionCount,
        Self::GetCode,
        Self::GetStorageAt,
        Self::Call,
        Self::EstimateGas,
        Self::GetLogs,
        Self::GetProof,
        Self::Unsupported,
    ];

    pub fn from_base(method_base: &str) -> Self {
        match method_base {
            "getBalance" => Self::GetBalance,
            "getTransactionCount" => Self::GetTransactionCount,
            "getCode" => Self::GetCode,
            "getStorageAt" => Self::GetStorageAt,
            "call" => Self::Call,
            "estimateGas" => Self::EstimateGas,
            "getLogs" => Self::GetLogs,
            "getProof" => Self::GetProof,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetBalance => "getBalance",
            Self::GetTransactionCount => "getTransactionCount",
            Self::GetCode => "getCode",
            Self::GetStorageAt => "getStorageAt",
            Self::Call => "call",
            Self::EstimateGas => "estimateGas",
            Self::GetLogs => "getLogs",
            Self::GetProof => "getProof",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether the method is re-executed and compared.
    pub fn is_replayed(&self) -> bool {
        !matches!(self, Self::GetLogs | Self::GetProof | Self::Unsupported)
    }

    /// Whether execution needs the recorded block timestamp.
    pub fn needs_timestamp(&self) -> bool {
        matches!(self, Self::Call | Self::EstimateGas)
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_back_and_forth() {
        for method in RpcMethod::ALL {
            if method != RpcMethod::Unsupported {
                assert_eq!(RpcMethod::from_base(method.as_str()), method);
            }
        }
        assert_eq!(RpcMethod::from_base("sendRawTransaction"), RpcMethod::Unsupported);
        assert!(!RpcMethod::GetLogs.is_replayed());
        assert!(RpcMethod::GetStorageAt.is_replayed());
    }

    #[test]
    fn indices_are_dense() {
        for (i, method) in RpcMethod::ALL.iter().enumerate() {
            assert_eq!(method.index(), i);
        }
    }
}
