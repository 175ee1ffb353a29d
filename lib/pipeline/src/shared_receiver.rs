use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Receiving end of a bounded queue shared by a pool of workers.
///
/// Every message is delivered to exactly one worker.
#[derive(Debug)]
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SharedReceiver<T> {
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Receives the next message; `None` once all senders are gone and the queue is drained.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn each_message_is_delivered_once() {
        let (sender, receiver) = mpsc::channel(4);
        let shared = SharedReceiver::new(receiver);

        let workers: Vec<_> = (0..3)
            .map(|_| {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(n) = shared.recv().await {
                        seen.push(n);
                    }
                    seen
                })
            })
            .collect();

        for n in 0..100u32 {
            sender.send(n).await.unwrap();
        }
        drop(sender);

        let mut all = Vec::new();
        for worker in workers {
            all.extend(worker.await.unwrap());
        }
        assert_eq!(all.len(), 100);
        assert_eq!(all.into_iter().collect::<BTreeSet<_>>().len(), 100);
    }
}
