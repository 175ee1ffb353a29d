use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// One-shot failure notification shared between workers and the controller.
///
/// Only the first [`FailureSignal::raise`] has an effect.
#[derive(Debug, Clone)]
pub struct FailureSignal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    raised: AtomicBool,
    notify: watch::Sender<bool>,
}

impl Default for FailureSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                raised: AtomicBool::new(false),
                notify: watch::Sender::new(false),
            }),
        }
    }

    /// Raises the signal. Returns `true` only for the call that actually raised it.
    pub fn raise(&self) -> bool {
        let first = self
            .inner
            .raised
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.notify.send_replace(true);
        }
        first
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::Acquire)
    }

    /// Resolves once the signal has been raised.
    pub async fn raised(&self) {
        let mut receiver = self.inner.notify.subscribe();
        // The sender lives as long as `self`, so waiting can not fail.
        let _ = receiver.wait_for(|raised| *raised).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn only_first_raise_counts() {
        let signal = FailureSignal::new();
        assert!(!signal.is_raised());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.raised().await })
        };

        let raisers: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.raise() })
            })
            .collect();
        let mut firsts = 0;
        for raiser in raisers {
            if raiser.await.unwrap() {
                firsts += 1;
            }
        }
        assert_eq!(firsts, 1);
        assert!(signal.is_raised());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        // Already raised: resolves immediately.
        signal.raised().await;
    }
}
