//! Comparison of live outcomes with their recordings.

pub mod error_codes;
mod rules;
mod verdict;

pub use rules::compare;
pub use verdict::{Verdict, VerdictKind};

use crate::config::InternalErrorSeverity;
use crate::metrics::REPLAY_METRICS;
use crate::model::{LiveOutcome, Outcome};
use crate::stats::ReplayStats;
use async_trait::async_trait;
use rpc_replay_pipeline::{FailureSignal, SharedReceiver, Sink, wait_for_stop};
use std::sync::Arc;
use tokio::sync::watch;

/// Comparator worker pool, the last stage of the replay.
pub struct Comparator;

#[derive(Debug, Clone)]
pub struct ComparatorParams {
    pub severity: InternalErrorSeverity,
    pub continue_on_failure: bool,
    /// Mismatch budget with `continue_on_failure`; 0 means no limit.
    pub max_failures: u64,
    pub failure: FailureSignal,
    pub stats: Arc<ReplayStats>,
}

#[async_trait]
impl Sink for Comparator {
    type Input = Outcome;
    type Params = ComparatorParams;

    const NAME: &'static str = "comparator";

    async fn run(
        params: ComparatorParams,
        input: SharedReceiver<Outcome>,
        mut stop: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        loop {
            let outcome = tokio::select! {
                biased;
                _ = wait_for_stop(&mut stop) => break,
                outcome = input.recv() => match outcome {
                    Some(outcome) => outcome,
                    None => break,
                },
            };
            judge(&params, &outcome);
        }
        Ok(())
    }
}

/// Compares one outcome, logs and counts the verdict and raises the failure signal
/// when the mismatch budget is spent.
pub fn judge(params: &ComparatorParams, outcome: &Outcome) -> Option<Verdict> {
    if let LiveOutcome::Skipped(reason) = &outcome.live {
        tracing::debug!(
            method = outcome.method_base(),
            block = outcome.block,
            %reason,
            "skipping validation"
        );
        params.stats.record_not_compared();
        return None;
    }
    let Some(verdict) = compare(outcome) else {
        params.stats.record_not_compared();
        return None;
    };
    REPLAY_METRICS.verdicts[&verdict.kind].inc();

    if verdict.kind.is_match() {
        params.stats.record_match();
        return Some(verdict);
    }
    if verdict.kind == VerdictKind::InternalError
        && params.severity == InternalErrorSeverity::Informational
    {
        tracing::debug!(
            method = outcome.method_base(),
            block = outcome.block,
            "{}",
            verdict.description
        );
        params.stats.record_informational();
        return Some(verdict);
    }

    tracing::warn!(
        method = outcome.method_base(),
        block = outcome.block,
        kind = ?verdict.kind,
        "{}",
        verdict.description
    );
    let failures = params.stats.record_mismatch();
    let budget_spent = !params.continue_on_failure
        || (params.max_failures > 0 && failures >= params.max_failures);
    if budget_spent && params.failure.raise() {
        tracing::warn!(failures, "stopping replay after mismatch");
    }
    Some(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::RpcMethod;
    use crate::model::{LiveValue, SkipReason};
    use alloy::primitives::U256;
    use rpc_replay_tape::{Body, Record, RecordedOutcome};

    fn params(continue_on_failure: bool, max_failures: u64) -> ComparatorParams {
        ComparatorParams {
            severity: InternalErrorSeverity::Mismatch,
            continue_on_failure,
            max_failures,
            failure: FailureSignal::new(),
            stats: Arc::new(ReplayStats::default()),
        }
    }

    fn balance_outcome(recorded: RecordedOutcome, live: LiveOutcome) -> Outcome {
        Outcome {
            method: RpcMethod::GetBalance,
            block: 10,
            record: Record {
                query: Body {
                    namespace: "eth",
                    method_base: "getBalance",
                    method: "eth_getBalance".to_owned(),
                    params: Vec::new(),
                },
                outcome: recorded,
                params_raw: b"[]".to_vec(),
                block_number: 10,
                block_timestamp: 0,
            },
            live,
        }
    }

    fn mismatching() -> Outcome {
        balance_outcome(
            RecordedOutcome::Result(b"\"0x3e8\"".to_vec()),
            LiveOutcome::Value(LiveValue::Balance(U256::from(1001))),
        )
    }

    #[test]
    fn first_mismatch_raises_failure() {
        let params = params(false, 0);
        let verdict = judge(&params, &mismatching()).unwrap();
        assert_eq!(verdict.kind, VerdictKind::NoMatchingResult);
        assert!(params.failure.is_raised());
        assert_eq!(params.stats.snapshot().mismatches, 1);
    }

    #[test]
    fn failure_budget() {
        let limited = params(true, 2);
        judge(&limited, &mismatching());
        assert!(!limited.failure.is_raised());
        judge(&limited, &mismatching());
        assert!(limited.failure.is_raised());

        let unlimited = params(true, 0);
        for _ in 0..10 {
            judge(&unlimited, &mismatching());
        }
        assert!(!unlimited.failure.is_raised());
    }

    #[test]
    fn informational_internal_errors_are_not_failures() {
        let params = ComparatorParams {
            severity: InternalErrorSeverity::Informational,
            ..params(false, 0)
        };
        let outcome = balance_outcome(
            RecordedOutcome::Error(rpc_replay_tape::ErrorMessage {
                code: error_codes::INTERNAL_ERROR,
                message: String::new(),
            }),
            LiveOutcome::Value(LiveValue::Balance(U256::from(1))),
        );
        assert_eq!(judge(&params, &outcome).unwrap().kind, VerdictKind::InternalError);
        assert!(!params.failure.is_raised());
        assert_eq!(params.stats.snapshot().mismatches, 0);
    }

    #[test]
    fn skipped_outcomes_are_counted() {
        let params = params(false, 0);
        let outcome = balance_outcome(
            RecordedOutcome::Result(b"\"0x1\"".to_vec()),
            LiveOutcome::Skipped(SkipReason::PendingBlock),
        );
        assert!(judge(&params, &outcome).is_none());
        assert_eq!(params.stats.snapshot().not_compared, 1);
        assert!(!params.failure.is_raised());
    }
}
