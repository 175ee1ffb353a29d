//! Pipeline framework for the replay stages.
//!
//! This crate provides traits and utilities for wiring async stages with bounded
//! channels and for shutting them down in a controlled order.
//!
//! # Core Concepts
//!
//! - **Source**: a single task that produces messages (e.g. the tape reader)
//! - **PipelineComponent**: a pool of workers transforming messages (e.g. executors)
//! - **Sink**: a pool of workers consuming messages at the end of the pipeline (e.g. comparators)
//! - **Lifecycle**: idempotent stop request plus a completion latch for one stage
//! - **FailureSignal**: one-shot notification raised by any worker

pub mod failure;
pub mod lifecycle;
pub mod shared_receiver;
pub mod stop;
pub mod traits;

pub use failure::FailureSignal;
pub use lifecycle::Lifecycle;
pub use shared_receiver::SharedReceiver;
pub use stop::wait_for_stop;
pub use traits::{PipelineComponent, Sink, Source};
