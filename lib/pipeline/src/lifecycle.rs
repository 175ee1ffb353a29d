use crate::shared_receiver::SharedReceiver;
use crate::traits::{PipelineComponent, Sink, Source};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_util::task::TaskTracker;

/// Stop request and completion latch of one pipeline stage.
///
/// All workers of the stage observe the same stop flag. The completion latch fires once
/// the stage has been sealed (no more workers will be added) and every worker returned.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: &'static str,
    stop: watch::Sender<bool>,
    tasks: TaskTracker,
    error: Mutex<Option<anyhow::Error>>,
}

impl Lifecycle {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                stop: watch::Sender::new(false),
                tasks: TaskTracker::new(),
                error: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn stop_receiver(&self) -> watch::Receiver<bool> {
        self.inner.stop.subscribe()
    }

    /// Spawns a worker of this stage. A worker error is logged and kept for
    /// [`Lifecycle::take_error`]; it does not stop the other workers.
    pub fn spawn<F>(&self, worker: usize, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            if let Err(err) = task.await {
                tracing::error!(stage = inner.name, worker, "stage worker failed: {err:#}");
                let mut first = inner.error.lock().unwrap_or_else(PoisonError::into_inner);
                if first.is_none() {
                    *first = Some(err);
                }
            }
        });
    }

    /// Starts a source and seals the stage.
    pub fn spawn_source<S: Source + 'static>(&self, params: S::Params, output: mpsc::Sender<S::Output>) {
        tracing::debug!(stage = S::NAME, "starting source");
        self.spawn(0, S::run(params, output, self.stop_receiver()));
        self.seal();
    }

    /// Starts `workers` copies of a component sharing one input queue and seals the stage.
    pub fn spawn_components<C: PipelineComponent + 'static>(
        &self,
        workers: usize,
        params: C::Params,
        input: SharedReceiver<C::Input>,
        output: mpsc::Sender<C::Output>,
    ) {
        tracing::debug!(stage = C::NAME, workers, "starting workers");
        for worker in 0..workers {
            self.spawn(
                worker,
                C::run(
                    params.clone(),
                    input.clone(),
                    output.clone(),
                    self.stop_receiver(),
                ),
            );
        }
        self.seal();
    }

    /// Starts `workers` copies of a sink sharing one input queue and seals the stage.
    pub fn spawn_sinks<S: Sink + 'static>(
        &self,
        workers: usize,
        params: S::Params,
        input: SharedReceiver<S::Input>,
    ) {
        tracing::debug!(stage = S::NAME, workers, "starting workers");
        for worker in 0..workers {
            self.spawn(
                worker,
                S::run(params.clone(), input.clone(), self.stop_receiver()),
            );
        }
        self.seal();
    }

    /// No further workers will be added; the latch fires once the running ones end.
    pub fn seal(&self) {
        self.inner.tasks.close();
    }

    /// Asks every worker of the stage to stop. Returns `true` for the first request only.
    pub fn request_stop(&self) -> bool {
        self.inner
            .stop
            .send_if_modified(|stopped| !std::mem::replace(stopped, true))
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.inner.stop.borrow()
    }

    /// Waits for the completion latch. Can be awaited any number of times.
    pub async fn await_done(&self) {
        self.inner.tasks.wait().await;
    }

    pub fn is_done(&self) -> bool {
        self.inner.tasks.is_closed() && self.inner.tasks.is_empty()
    }

    /// First error returned by a worker of this stage, if any.
    pub fn take_error(&self) -> Option<anyhow::Error> {
        self.inner
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::wait_for_stop;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Doubler;

    #[async_trait]
    impl PipelineComponent for Doubler {
        type Input = u64;
        type Output = u64;
        type Params = ();
        const NAME: &'static str = "doubler";

        async fn run(
            _params: (),
            input: SharedReceiver<u64>,
            output: mpsc::Sender<u64>,
            mut stop: watch::Receiver<bool>,
        ) -> anyhow::Result<()> {
            loop {
                let value = tokio::select! {
                    biased;
                    _ = wait_for_stop(&mut stop) => return Ok(()),
                    value = input.recv() => match value {
                        Some(value) => value,
                        None => return Ok(()),
                    },
                };
                if output.send(value * 2).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    #[tokio::test]
    async fn latch_fires_after_input_is_drained() {
        let lifecycle = Lifecycle::new("doubler");
        let (in_sender, in_receiver) = mpsc::channel(8);
        let (out_sender, mut out_receiver) = mpsc::channel(8);
        lifecycle.spawn_components::<Doubler>(3, (), SharedReceiver::new(in_receiver), out_sender);

        for n in 1..=4 {
            in_sender.send(n).await.unwrap();
        }
        drop(in_sender);
        lifecycle.await_done().await;
        assert!(lifecycle.is_done());

        let mut results = Vec::new();
        while let Some(n) = out_receiver.recv().await {
            results.push(n);
        }
        results.sort();
        assert_eq!(results, vec![2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn stop_request_is_idempotent_and_unblocks_workers() {
        let lifecycle = Lifecycle::new("doubler");
        let (_in_sender, in_receiver) = mpsc::channel::<u64>(1);
        let (out_sender, _out_receiver) = mpsc::channel(1);
        lifecycle.spawn_components::<Doubler>(2, (), SharedReceiver::new(in_receiver), out_sender);

        assert!(lifecycle.request_stop());
        assert!(!lifecycle.request_stop());
        tokio::time::timeout(Duration::from_secs(1), lifecycle.await_done())
            .await
            .unwrap();
        lifecycle.await_done().await;
        assert!(lifecycle.take_error().is_none());
    }

    #[tokio::test]
    async fn first_worker_error_is_kept() {
        let lifecycle = Lifecycle::new("failing");
        lifecycle.spawn(0, async { anyhow::bail!("boom") });
        lifecycle.seal();
        lifecycle.await_done().await;
        assert_eq!(lifecycle.take_error().unwrap().to_string(), "boom");
        assert!(lifecycle.take_error().is_none());
    }
}
