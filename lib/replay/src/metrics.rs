use crate::comparator::VerdictKind;
use std::time::Duration;
use vise::{Buckets, Counter, EncodeLabelValue, Histogram, LabeledFamily, Metrics, Unit};

const CALL_LATENCIES: Buckets = Buckets::exponential(0.000_001..=10.0, 2.0);

/// Why the reader dropped a record before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(rename_all = "snake_case")]
pub enum SkipCause {
    BeforeFirstBlock,
    InvalidBlockTag,
    OutOfRange,
    ArchiveUnavailable,
}

#[derive(Debug, Metrics)]
#[metrics(prefix = "rpc_replay")]
pub struct ReplayMetrics {
    /// Records decoded from recordings.
    pub records_read: Counter,
    #[metrics(labels = ["reason"])]
    pub records_skipped: LabeledFamily<SkipCause, Counter>,
    #[metrics(labels = ["method"])]
    pub executed: LabeledFamily<&'static str, Counter>,
    #[metrics(unit = Unit::Seconds, labels = ["method"], buckets = CALL_LATENCIES)]
    pub call_latency: LabeledFamily<&'static str, Histogram<Duration>>,
    #[metrics(labels = ["kind"])]
    pub verdicts: LabeledFamily<VerdictKind, Counter>,
}

#[vise::register]
pub(crate) static REPLAY_METRICS: vise::Global<ReplayMetrics> = vise::Global::new();
