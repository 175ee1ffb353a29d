use crate::error::TapeError;
use crate::record::{Record, read_record};
use rpc_replay_pipeline::wait_for_stop;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Pull-style iterator over records of a tape.
///
/// A background task decodes records ahead of the consumer into a bounded queue of
/// `queue_length` entries. The task ends on end of input, on the first decoding error,
/// on [`RecordIterator::release`] or when the external stop signal fires; a record
/// it is trying to hand over at that moment is dropped.
#[derive(Debug)]
pub struct RecordIterator {
    receiver: mpsc::Receiver<Result<Record, TapeError>>,
    stop: watch::Receiver<bool>,
    closed: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    current: Option<Record>,
    error: Option<TapeError>,
}

impl RecordIterator {
    pub fn new<R>(input: R, queue_length: usize, stop: watch::Receiver<bool>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(queue_length.max(1));
        let (closed, closed_receiver) = watch::channel(false);
        let task = tokio::spawn(load(input, sender, closed_receiver, stop.clone()));
        Self {
            receiver,
            stop,
            closed,
            task: Some(task),
            current: None,
            error: None,
        }
    }

    /// Advances to the next record.
    ///
    /// Returns `false` once the tape is exhausted, a decoding error was hit (see
    /// [`RecordIterator::error`]), the iterator was released or the stop signal fired.
    pub async fn next(&mut self) -> bool {
        self.current = None;
        if *self.closed.borrow() || self.error.is_some() {
            return false;
        }
        let received = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop) => return false,
            received = self.receiver.recv() => received,
        };
        match received {
            Some(Ok(record)) => {
                self.current = Some(record);
                true
            }
            Some(Err(err)) => {
                self.error = Some(err);
                false
            }
            None => false,
        }
    }

    pub fn value(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    pub fn take_value(&mut self) -> Option<Record> {
        self.current.take()
    }

    /// The decoding error that ended the iteration, if any.
    pub fn error(&self) -> Option<&TapeError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<TapeError> {
        self.error.take()
    }

    /// Signals the background loader to stop. Safe to call more than once.
    pub fn release(&self) {
        self.closed.send_if_modified(|closed| !std::mem::replace(closed, true));
    }

    /// Releases the iterator and waits for the background loader to finish.
    pub async fn close(&mut self) {
        self.release();
        self.receiver.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(%err, "tape loader task failed");
            }
        }
    }
}

impl Drop for RecordIterator {
    fn drop(&mut self) {
        self.release();
    }
}

async fn load<R>(
    mut input: R,
    output: mpsc::Sender<Result<Record, TapeError>>,
    mut closed: watch::Receiver<bool>,
    mut stop: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => return,
            _ = wait_for_stop(&mut stop) => return,
            next = read_record(&mut input) => next,
        };
        let item = match next {
            Ok(Some(record)) => Ok(record),
            Ok(None) => return,
            Err(err) => Err(err),
        };
        let failed = item.is_err();

        tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => return,
            _ = wait_for_stop(&mut stop) => return,
            sent = output.send(item) => {
                if sent.is_err() {
                    return;
                }
            }
        }
        if failed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TapeWriter;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn tape(records: usize) -> Vec<u8> {
        let mut writer = TapeWriter::new(Vec::new());
        for i in 0..records {
            let params = format!(r#"["0x{:040x}","latest"]"#, i + 1);
            writer
                .write_result("eth", "getBalance", params.as_bytes(), b"\"0x1\"", i as u32, 0)
                .unwrap();
        }
        writer.into_inner()
    }

    #[tokio::test]
    async fn yields_records_in_order_and_ends_cleanly() {
        let (_stop_sender, stop) = watch::channel(false);
        let mut iter = RecordIterator::new(std::io::Cursor::new(tape(5)), 2, stop);

        let mut blocks = Vec::new();
        while iter.next().await {
            blocks.push(iter.value().unwrap().block_number());
        }
        assert_eq!(blocks, vec![0, 1, 2, 3, 4]);
        assert!(iter.error().is_none());
        assert!(!iter.next().await);
        iter.close().await;
    }

    #[tokio::test]
    async fn truncated_record_surfaces_error_once() {
        let mut bytes = tape(2);
        bytes.truncate(bytes.len() - 3);
        let (_stop_sender, stop) = watch::channel(false);
        let mut iter = RecordIterator::new(std::io::Cursor::new(bytes), 4, stop);

        assert!(iter.next().await);
        assert!(!iter.next().await);
        assert_matches!(iter.error(), Some(TapeError::Truncated { .. }));
        assert!(!iter.next().await);
        iter.close().await;
    }

    #[tokio::test]
    async fn release_unblocks_a_full_queue() {
        let (_stop_sender, stop) = watch::channel(false);
        let mut iter = RecordIterator::new(std::io::Cursor::new(tape(50)), 1, stop);
        assert!(iter.next().await);

        iter.release();
        iter.release();
        assert!(!iter.next().await);
        tokio::time::timeout(Duration::from_secs(5), iter.close())
            .await
            .expect("loader did not stop after release");
    }

    #[tokio::test]
    async fn external_stop_ends_iteration_without_error() {
        let (stop_sender, stop) = watch::channel(false);
        let mut iter = RecordIterator::new(std::io::Cursor::new(tape(50)), 1, stop);
        assert!(iter.next().await);

        stop_sender.send_replace(true);
        assert!(!iter.next().await);
        assert!(iter.error().is_none());
        tokio::time::timeout(Duration::from_secs(5), iter.close())
            .await
            .expect("loader did not stop after cancellation");
    }
}
