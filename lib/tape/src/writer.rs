use crate::dictionary;
use crate::error::{TapeError, TapeResult};
use crate::header::RecordHeader;
use std::io::Write;

/// Appends records to a tape.
#[derive(Debug)]
pub struct TapeWriter<W> {
    out: W,
    records: u64,
}

impl<W: Write> TapeWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, records: 0 }
    }

    /// Whether requests of the given namespace and method can be written at all.
    pub fn can_record(namespace: &str, method: &str) -> bool {
        dictionary::can_record(namespace, method)
    }

    /// Writes a successful request/response pair; returns the number of bytes written.
    pub fn write_result(
        &mut self,
        namespace: &str,
        method: &str,
        params: &[u8],
        result: &[u8],
        block_number: u32,
        block_timestamp: u64,
    ) -> TapeResult<usize> {
        let len = u32::try_from(result.len()).map_err(|_| TapeError::ResponseTooLarge {
            max: u32::MAX as usize,
            got: result.len(),
        })?;
        let mut header = self.header(namespace, method, params, block_number, block_timestamp)?;
        header.set_response_len(len);
        self.write(&header, params, result)
    }

    /// Writes a request that the node answered with an error code.
    pub fn write_error(
        &mut self,
        namespace: &str,
        method: &str,
        params: &[u8],
        code: i16,
        block_number: u32,
        block_timestamp: u64,
    ) -> TapeResult<usize> {
        let mut header = self.header(namespace, method, params, block_number, block_timestamp)?;
        header.set_error(code);
        self.write(&header, params, &[])
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> TapeResult<()> {
        Ok(self.out.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(
        &self,
        namespace: &str,
        method: &str,
        params: &[u8],
        block_number: u32,
        block_timestamp: u64,
    ) -> TapeResult<RecordHeader> {
        let mut header = RecordHeader::new();
        header.set_method(namespace, method)?;
        header.set_query_len(params.len())?;
        header.set_block_number(block_number);
        header.set_block_timestamp(block_timestamp);
        Ok(header)
    }

    fn write(&mut self, header: &RecordHeader, params: &[u8], response: &[u8]) -> TapeResult<usize> {
        let encoded = header.encode()?;
        self.out.write_all(&encoded)?;
        self.out.write_all(params)?;
        self.out.write_all(response)?;
        self.records += 1;
        Ok(encoded.len() + params.len() + response.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordedOutcome, read_record};
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn written_records_read_back() {
        let mut writer = TapeWriter::new(Vec::new());
        let params = br#"[{"to":"0x0000000000000000000000000000000000000001"},"0x10"]"#;
        let written = writer
            .write_result("ftm", "call", params, b"\"0x\"", 16, 1_600_000_000_000_000_000)
            .unwrap();
        writer
            .write_error("eth", "estimateGas", params, -32000, 16, 0)
            .unwrap();
        assert_eq!(writer.records(), 2);

        let bytes = writer.into_inner();
        let mut input = bytes.as_slice();
        let first = read_record(&mut input).await.unwrap().unwrap();
        assert_eq!(written, 18 + params.len() + 4);
        assert_eq!(first.query.namespace, "eth");
        assert_eq!(first.query.method, "eth_call");
        assert_eq!(first.query.params.len(), 2);
        assert_eq!(first.result(), Some(&b"\"0x\""[..]));
        assert_eq!(first.block_timestamp_secs(), 1_600_000_000);

        let second = read_record(&mut input).await.unwrap().unwrap();
        assert_matches!(&second.outcome, RecordedOutcome::Error(err) if err.code == -32000);
        assert!(read_record(&mut input).await.unwrap().is_none());
    }

    #[test]
    fn unrecordable_methods_are_refused() {
        assert!(!TapeWriter::<Vec<u8>>::can_record("eth", "sendRawTransaction"));
        let mut writer = TapeWriter::new(Vec::new());
        assert_matches!(
            writer.write_result("eth", "chainId", b"[]", b"\"0xfa\"", 1, 0),
            Err(TapeError::UnknownMethod { .. })
        );
        assert!(writer.into_inner().is_empty());
    }
}
