//! Binary record header.
//!
//! ```text
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! | ERR | HiQ | HiR |  Version  |    Namespace    |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |      Call Method      |     Query Size Hi     |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |        Query Size Mid (only if HiQ = 1)       |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |                 Query Size Lo                 |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |   Response Size Hi (16 bits, only if HiR = 1) |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |   Response Size Lo, or Error Code if ERR = 1  |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |          Response Block Number (32 bits)      |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |  Block Timestamp (64 bits, version >= 1 only) |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |             CRC-8/CDMA2000 checksum           |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! ```
//!
//! All multi-byte fields are big-endian.

use crate::dictionary;
use crate::error::{TapeError, TapeResult};
use crc::{CRC_8_CDMA2000, Crc};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Version written by this crate.
pub const CURRENT_VERSION: u8 = 1;
/// Legacy layout without block timestamp.
pub const LEGACY_VERSION: u8 = 0;

/// Largest recordable query payload (20 bits).
pub const MAX_QUERY_SIZE: usize = 0xF_FFFF;
const MAX_SHORT_QUERY: usize = 0xFFF;
const MAX_SHORT_RESPONSE: u32 = 0xFFFF;

/// Size bounds of a current-version header.
pub const MIN_HEADER_LEN: usize = 18;
pub const MAX_HEADER_LEN: usize = 21;

const ERR_FLAG: u8 = 1 << 7;
const LONG_QUERY_FLAG: u8 = 1 << 6;
const LONG_RESPONSE_FLAG: u8 = 1 << 5;
const VERSION_SHIFT: u8 = 3;
const VERSION_MASK: u8 = 0b11;
const NAMESPACE_MASK: u8 = 0b111;

static CHECKSUM: Crc<u8> = Crc::<u8>::new(&CRC_8_CDMA2000);

/// Payload description carried by the header: either the length of a successful
/// response or the error code of a failed one. An error record has no response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseInfo {
    Result { len: u32 },
    Error { code: i16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    version: u8,
    namespace: u8,
    method: u8,
    query_len: u32,
    response: ResponseInfo,
    block_number: u32,
    block_timestamp: u64,
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            namespace: 0,
            method: 0,
            query_len: 0,
            response: ResponseInfo::Result { len: 0 },
            block_number: 0,
            block_timestamp: 0,
        }
    }
}

impl RecordHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets namespace and method; fails for pairs that have no on-tape id.
    pub fn set_method(&mut self, namespace: &str, method: &str) -> TapeResult<()> {
        let ns = dictionary::namespace_id(namespace)
            .ok_or_else(|| TapeError::UnknownNamespace(namespace.to_owned()))?;
        let m = dictionary::method_id(ns, method).ok_or_else(|| TapeError::UnknownMethod {
            namespace: namespace.to_owned(),
            method: method.to_owned(),
        })?;
        self.namespace = ns;
        self.method = m;
        Ok(())
    }

    pub fn namespace(&self) -> TapeResult<&'static str> {
        dictionary::namespace_name(self.namespace)
            .ok_or(TapeError::UnknownNamespaceId(self.namespace))
    }

    pub fn method(&self) -> TapeResult<&'static str> {
        dictionary::method_name(self.namespace, self.method).ok_or(TapeError::UnknownMethodId {
            namespace: self.namespace,
            method: self.method,
        })
    }

    pub fn set_query_len(&mut self, len: usize) -> TapeResult<()> {
        if len > MAX_QUERY_SIZE {
            return Err(TapeError::QueryTooLarge {
                max: MAX_QUERY_SIZE,
                got: len,
            });
        }
        self.query_len = len as u32;
        Ok(())
    }

    pub fn query_len(&self) -> usize {
        self.query_len as usize
    }

    /// Marks the record as successful with a response payload of `len` bytes.
    pub fn set_response_len(&mut self, len: u32) {
        self.response = ResponseInfo::Result { len };
    }

    /// Marks the record as failed with the given error code.
    pub fn set_error(&mut self, code: i16) {
        self.response = ResponseInfo::Error { code };
    }

    pub fn response(&self) -> ResponseInfo {
        self.response
    }

    /// Length of the response payload following the query; zero for error records.
    pub fn response_len(&self) -> usize {
        match self.response {
            ResponseInfo::Result { len } => len as usize,
            ResponseInfo::Error { .. } => 0,
        }
    }

    pub fn error_code(&self) -> Option<i16> {
        match self.response {
            ResponseInfo::Error { code } => Some(code),
            ResponseInfo::Result { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.response, ResponseInfo::Error { .. })
    }

    pub fn set_block_number(&mut self, block: u32) {
        self.block_number = block;
    }

    pub fn block_number(&self) -> u64 {
        self.block_number as u64
    }

    /// Block timestamp in nanoseconds; always zero for legacy records.
    pub fn set_block_timestamp(&mut self, timestamp: u64) {
        self.block_timestamp = timestamp;
    }

    pub fn block_timestamp(&self) -> u64 {
        self.block_timestamp
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    fn is_long_query(&self) -> bool {
        self.query_len as usize > MAX_SHORT_QUERY
    }

    fn is_long_response(&self) -> bool {
        matches!(self.response, ResponseInfo::Result { len } if len > MAX_SHORT_RESPONSE)
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.is_error() {
            flags |= ERR_FLAG;
        }
        if self.is_long_query() {
            flags |= LONG_QUERY_FLAG;
        }
        if self.is_long_response() {
            flags |= LONG_RESPONSE_FLAG;
        }
        flags
    }

    /// Number of bytes this header occupies on tape.
    pub fn encoded_len(&self) -> usize {
        // Version is always 0 or 1 for headers built through this API.
        header_len(self.flags() | (self.version << VERSION_SHIFT)).unwrap_or(MAX_HEADER_LEN)
    }

    pub fn encode(&self) -> TapeResult<Vec<u8>> {
        // Refuse to write something that can not be read back.
        self.namespace()?;
        self.method()?;
        if self.version > CURRENT_VERSION {
            return Err(TapeError::UnsupportedVersion(self.version));
        }

        let mut out = Vec::with_capacity(MAX_HEADER_LEN);
        out.push(self.flags() | (self.version << VERSION_SHIFT) | (self.namespace & NAMESPACE_MASK));

        let q = self.query_len;
        if self.is_long_query() {
            out.push((self.method << 4) | ((q >> 16) as u8 & 0x0F));
            out.push((q >> 8) as u8);
            out.push(q as u8);
        } else {
            out.push((self.method << 4) | ((q >> 8) as u8 & 0x0F));
            out.push(q as u8);
        }

        match self.response {
            ResponseInfo::Error { code } => out.extend_from_slice(&code.to_be_bytes()),
            ResponseInfo::Result { len } if len > MAX_SHORT_RESPONSE => {
                out.extend_from_slice(&len.to_be_bytes())
            }
            ResponseInfo::Result { len } => out.extend_from_slice(&(len as u16).to_be_bytes()),
        }

        out.extend_from_slice(&self.block_number.to_be_bytes());
        if self.version >= CURRENT_VERSION {
            out.extend_from_slice(&self.block_timestamp.to_be_bytes());
        }

        out.push(CHECKSUM.checksum(&out));
        Ok(out)
    }

    /// Decodes a header from the start of `bytes`. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> TapeResult<Self> {
        let Some(&first) = bytes.first() else {
            return Err(TapeError::Truncated {
                section: "record header",
                expected: 1,
                got: 0,
            });
        };
        let len = header_len(first)?;
        if bytes.len() < len {
            return Err(TapeError::Truncated {
                section: "record header",
                expected: len,
                got: bytes.len(),
            });
        }
        let buf = &bytes[..len];

        let computed = CHECKSUM.checksum(&buf[..len - 1]);
        if computed != buf[len - 1] {
            return Err(TapeError::ChecksumMismatch {
                stored: buf[len - 1],
                computed,
            });
        }

        let is_error = first & ERR_FLAG != 0;
        let long_query = first & LONG_QUERY_FLAG != 0;
        let long_response = first & LONG_RESPONSE_FLAG != 0;
        if is_error && long_response {
            return Err(TapeError::MalformedHeader(
                "error record carries a long response flag",
            ));
        }

        let version = (first >> VERSION_SHIFT) & VERSION_MASK;
        let namespace = first & NAMESPACE_MASK;
        let method = buf[1] >> 4;

        let mut offset;
        let query_len = if long_query {
            offset = 4;
            (u32::from(buf[1] & 0x0F) << 16) | (u32::from(buf[2]) << 8) | u32::from(buf[3])
        } else {
            offset = 3;
            (u32::from(buf[1] & 0x0F) << 8) | u32::from(buf[2])
        };

        let response = if is_error {
            let code = i16::from_be_bytes([buf[offset], buf[offset + 1]]);
            offset += 2;
            ResponseInfo::Error { code }
        } else if long_response {
            let len = u32::from_be_bytes(read_array(buf, offset));
            offset += 4;
            ResponseInfo::Result { len }
        } else {
            let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            offset += 2;
            ResponseInfo::Result { len: len.into() }
        };

        let block_number = u32::from_be_bytes(read_array(buf, offset));
        offset += 4;

        let block_timestamp = if version >= CURRENT_VERSION {
            u64::from_be_bytes(read_array(buf, offset))
        } else {
            0
        };

        let header = Self {
            version,
            namespace,
            method,
            query_len,
            response,
            block_number,
            block_timestamp,
        };
        header.namespace()?;
        header.method()?;
        Ok(header)
    }

    /// Reads the next header from `input`.
    ///
    /// Returns `Ok(None)` when the input ends cleanly before the first byte.
    pub async fn read_from<R>(input: &mut R) -> TapeResult<Option<Self>>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; MAX_HEADER_LEN];
        if read_full(input, &mut buf[..1]).await? == 0 {
            return Ok(None);
        }
        let len = header_len(buf[0])?;
        let got = 1 + read_full(input, &mut buf[1..len]).await?;
        if got < len {
            return Err(TapeError::Truncated {
                section: "record header",
                expected: len,
                got,
            });
        }
        Self::decode(&buf[..len]).map(Some)
    }
}

/// Total header length announced by the first header byte.
fn header_len(first: u8) -> TapeResult<usize> {
    let version = (first >> VERSION_SHIFT) & VERSION_MASK;
    let mut len = match version {
        LEGACY_VERSION => 10,
        CURRENT_VERSION => MIN_HEADER_LEN,
        other => return Err(TapeError::UnsupportedVersion(other)),
    };
    if first & LONG_QUERY_FLAG != 0 {
        len += 1;
    }
    if first & LONG_RESPONSE_FLAG != 0 {
        len += 2;
    }
    Ok(len)
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

/// Reads until `buf` is full or the input ends, returning the number of bytes read.
pub(crate) async fn read_full<R>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
