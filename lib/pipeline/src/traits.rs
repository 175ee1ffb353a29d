use crate::shared_receiver::SharedReceiver;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// A single task that generates messages and starts the pipeline.
/// Examples: tape reader
/// ONLY IMPLEMENT THIS TRAIT FOR MARKER STRUCTS (no fields in struct).
#[async_trait]
pub trait Source {
    /// The type of messages this source produces
    type Output: Send + 'static;

    /// Parameters needed to initialize this source
    type Params: Send + 'static;

    /// Human-readable name for logging and metrics
    const NAME: &'static str;

    /// Run the source, sending messages to the output until the input is exhausted
    /// or `stop` is set.
    async fn run(
        params: Self::Params,
        output: mpsc::Sender<Self::Output>,
        stop: watch::Receiver<bool>,
    ) -> Result<()>;
}

/// A worker that transforms messages in the pipeline.
/// Several workers of the same component share one input queue.
/// Examples: executors
///
/// ONLY IMPLEMENT THIS TRAIT FOR MARKER STRUCTS (no fields in struct).
/// Any state is confined to the `run()` method.
#[async_trait]
pub trait PipelineComponent {
    /// The type of messages this component receives
    type Input: Send + 'static;

    /// The type of messages this component produces
    type Output: Send + 'static;

    /// Parameters needed to initialize one worker
    type Params: Clone + Send + 'static;

    /// Human-readable name for logging and metrics
    const NAME: &'static str;

    /// Run one worker, receiving from input and sending to output
    async fn run(
        params: Self::Params,
        input: SharedReceiver<Self::Input>,
        output: mpsc::Sender<Self::Output>,
        stop: watch::Receiver<bool>,
    ) -> Result<()>;
}

/// A worker that consumes messages and ends the pipeline.
/// Examples: comparators
/// ONLY IMPLEMENT THIS TRAIT FOR MARKER STRUCTS (no fields in struct).
#[async_trait]
pub trait Sink {
    /// The type of messages this sink receives
    type Input: Send + 'static;

    /// Parameters needed to initialize one worker
    type Params: Clone + Send + 'static;

    /// Human-readable name for logging and metrics
    const NAME: &'static str;

    /// Run one worker, receiving messages from the input
    async fn run(
        params: Self::Params,
        input: SharedReceiver<Self::Input>,
        stop: watch::Receiver<bool>,
    ) -> Result<()>;
}
