//! Reading and writing of recorded RPC traffic.
//!
//! A tape is a flat sequence of records. Each record is a checksummed binary
//! [`RecordHeader`] followed by the raw JSON parameters of the request and, for
//! successful requests, the raw JSON result.

pub mod dictionary;
mod error;
mod file;
mod header;
mod iterator;
mod record;
mod writer;

pub use error::{TapeError, TapeResult};
pub use file::{TapeReader, list_tapes, open_tape};
pub use header::{
    CURRENT_VERSION, LEGACY_VERSION, MAX_HEADER_LEN, MAX_QUERY_SIZE, MIN_HEADER_LEN,
    RecordHeader, ResponseInfo,
};
pub use iterator::RecordIterator;
pub use record::{Body, ErrorMessage, Record, RecordedOutcome, read_record};
pub use writer::TapeWriter;
