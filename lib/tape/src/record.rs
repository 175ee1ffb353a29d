use crate::error::{TapeError, TapeResult};
use crate::header::{RecordHeader, read_full};
use serde::Serialize;
use tokio::io::AsyncRead;

/// Recorded request as it was sent to the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub namespace: &'static str,
    pub method_base: &'static str,
    /// Fully qualified name, e.g. `eth_getBalance`.
    pub method: String,
    pub params: Vec<serde_json::Value>,
}

/// Error object the recorded node answered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub code: i32,
    pub message: String,
}

/// What the recorded node answered.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOutcome {
    /// Raw JSON of the successful result.
    Result(Vec<u8>),
    Error(ErrorMessage),
}

/// A single decoded request/response pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub query: Body,
    pub outcome: RecordedOutcome,
    /// Raw JSON of the request parameters.
    pub params_raw: Vec<u8>,
    pub block_number: u64,
    /// Block timestamp in nanoseconds, zero if the recording did not carry one.
    pub block_timestamp: u64,
}

impl Record {
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Block timestamp in seconds, as used for the execution context.
    pub fn block_timestamp_secs(&self) -> u64 {
        self.block_timestamp / 1_000_000_000
    }

    pub fn result(&self) -> Option<&[u8]> {
        match &self.outcome {
            RecordedOutcome::Result(raw) => Some(raw),
            RecordedOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorMessage> {
        match &self.outcome {
            RecordedOutcome::Error(err) => Some(err),
            RecordedOutcome::Result(_) => None,
        }
    }

    /// Parameters as they appeared on the wire.
    pub fn params_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.params_raw)
    }
}

/// Reads a complete record from `input`.
///
/// `Ok(None)` means the input ended cleanly at a record boundary.
pub async fn read_record<R>(input: &mut R) -> TapeResult<Option<Record>>
where
    R: AsyncRead + Unpin,
{
    let Some(header) = RecordHeader::read_from(input).await? else {
        return Ok(None);
    };
    let namespace = header.namespace()?;
    let method_base = header.method()?;

    let params_raw = read_payload(input, header.query_len(), "query payload").await?;
    let params: Vec<serde_json::Value> = serde_json::from_slice(&params_raw)?;

    let outcome = match header.error_code() {
        Some(code) => RecordedOutcome::Error(ErrorMessage {
            code: code.into(),
            message: String::new(),
        }),
        None => RecordedOutcome::Result(
            read_payload(input, header.response_len(), "response payload").await?,
        ),
    };

    Ok(Some(Record {
        query: Body {
            namespace,
            method_base,
            method: format!("{namespace}_{method_base}"),
            params,
        },
        outcome,
        params_raw,
        block_number: header.block_number(),
        block_timestamp: header.block_timestamp(),
    }))
}

async fn read_payload<R>(input: &mut R, len: usize, section: &'static str) -> TapeResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    // read_full stops once the buffer is full, so a reader error after the last byte is not seen.
    let got = read_full(input, &mut buf).await?;
    if got < len {
        return Err(TapeError::Truncated {
            section,
            expected: len,
            got,
        });
    }
    Ok(buf)
}
