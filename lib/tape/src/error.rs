/// Result type used throughout the tape crate.
pub type TapeResult<T> = Result<T, TapeError>;

/// Errors produced while encoding, decoding or streaming recorded RPC traffic.
#[derive(Debug, thiserror::Error)]
pub enum TapeError {
    /// The header checksum does not match its content.
    #[error("invalid record header checksum: stored {stored:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { stored: u8, computed: u8 },
    /// The input ended before a complete section could be read.
    #[error("truncated {section}: expected {expected} bytes, got {got}")]
    Truncated {
        section: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed record header: {0}")]
    MalformedHeader(&'static str),
    #[error("namespace '{0}' can not be recorded")]
    UnknownNamespace(String),
    #[error("method '{method}' of namespace '{namespace}' can not be recorded")]
    UnknownMethod { namespace: String, method: String },
    #[error("namespace flag {0:#05b} not recognized")]
    UnknownNamespaceId(u8),
    #[error("method id {method} not recognized for namespace flag {namespace:#05b}")]
    UnknownMethodId { namespace: u8, method: u8 },
    #[error("query too big; expected max {max} bytes, received {got}")]
    QueryTooLarge { max: usize, got: usize },
    #[error("response too big; expected max {max} bytes, received {got}")]
    ResponseTooLarge { max: usize, got: usize },
    #[error("cannot decode query parameters: {0}")]
    Params(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
