use crate::comparator::error_codes::{
    INTERNAL_ERROR, INVALID_ARGUMENT, describe_expected, is_accepted,
};
use crate::comparator::verdict::{Verdict, VerdictKind};
use crate::executor::ExecutionError;
use crate::method::RpcMethod;
use crate::model::{LiveOutcome, LiveValue, Outcome};
use alloy::primitives::{U256, hex};
use rpc_replay_tape::{ErrorMessage, RecordedOutcome};

/// Compares the live side of `outcome` with its recording.
///
/// `None` means the pair is not comparable: the request was skipped, or the node
/// rejected its arguments and the live side disagrees about them.
pub fn compare(outcome: &Outcome) -> Option<Verdict> {
    match &outcome.live {
        LiveOutcome::Skipped(_) => None,
        LiveOutcome::Error(err) => live_error(outcome, err),
        LiveOutcome::Value(value) => match &outcome.record.outcome {
            RecordedOutcome::Error(recorded) => recorded_error_live_value(outcome, recorded, value),
            RecordedOutcome::Result(raw) => Some(results(outcome, raw, value)),
        },
    }
}

fn live_error(outcome: &Outcome, err: &ExecutionError) -> Option<Verdict> {
    let message = err.to_string();
    let verdict = match &outcome.record.outcome {
        RecordedOutcome::Result(raw) => Verdict::mismatch(
            VerdictKind::ExpectedResultGotError,
            outcome,
            message,
            String::from_utf8_lossy(raw),
        ),
        RecordedOutcome::Error(recorded) if is_accepted(recorded.code, &message) => {
            Verdict::matched()
        }
        RecordedOutcome::Error(recorded) if recorded.code == INVALID_ARGUMENT => {
            tracing::debug!(
                method = outcome.method_base(),
                block = outcome.block,
                live = %message,
                "node rejected the arguments, live execution failed otherwise"
            );
            return None;
        }
        RecordedOutcome::Error(recorded) => {
            let kind = if recorded.code == INTERNAL_ERROR {
                VerdictKind::InternalError
            } else {
                VerdictKind::NoMatchingErrors
            };
            Verdict::mismatch(kind, outcome, message, describe_recorded(recorded))
        }
    };
    Some(verdict)
}

fn recorded_error_live_value(
    outcome: &Outcome,
    recorded: &ErrorMessage,
    value: &LiveValue,
) -> Option<Verdict> {
    let kind = match recorded.code {
        INVALID_ARGUMENT => {
            tracing::debug!(
                method = outcome.method_base(),
                block = outcome.block,
                "node rejected the arguments, live execution accepted them"
            );
            return None;
        }
        INTERNAL_ERROR => VerdictKind::InternalError,
        _ => VerdictKind::ExpectedErrorGotResult,
    };
    Some(Verdict::mismatch(
        kind,
        outcome,
        render(value),
        describe_recorded(recorded),
    ))
}

fn describe_recorded(recorded: &ErrorMessage) -> String {
    let expected = describe_expected(recorded.code);
    if recorded.message.is_empty() {
        expected
    } else {
        format!("{} ({expected})", recorded.message)
    }
}

fn results(outcome: &Outcome, raw: &[u8], value: &LiveValue) -> Verdict {
    if !value_fits(outcome.method, value) {
        return Verdict::mismatch(
            VerdictKind::UnexpectedDataType,
            outcome,
            format!("{value:?}"),
            String::from_utf8_lossy(raw),
        );
    }
    let Ok(recorded) = serde_json::from_slice::<String>(raw) else {
        return unmarshal_failure(outcome, raw, value);
    };

    match value {
        LiveValue::Balance(_) | LiveValue::Nonce(_) | LiveValue::Gas(_) => {
            let Some(recorded) = parse_quantity(&recorded) else {
                return unmarshal_failure(outcome, raw, value);
            };
            let live = quantity(value);
            if live == recorded {
                Verdict::matched()
            } else {
                Verdict::mismatch(
                    VerdictKind::NoMatchingResult,
                    outcome,
                    format!("0x{live:x}"),
                    format!("0x{recorded:x}"),
                )
            }
        }
        LiveValue::Code(_) | LiveValue::Storage(_) | LiveValue::ReturnData(_) => {
            let live = render(value);
            if live.eq_ignore_ascii_case(&recorded) {
                Verdict::matched()
            } else {
                Verdict::mismatch(VerdictKind::NoMatchingResult, outcome, live, recorded)
            }
        }
    }
}

fn unmarshal_failure(outcome: &Outcome, raw: &[u8], value: &LiveValue) -> Verdict {
    Verdict::mismatch(
        VerdictKind::CannotUnmarshalResult,
        outcome,
        render(value),
        String::from_utf8_lossy(raw),
    )
}

fn value_fits(method: RpcMethod, value: &LiveValue) -> bool {
    matches!(
        (method, value),
        (RpcMethod::GetBalance, LiveValue::Balance(_))
            | (RpcMethod::GetTransactionCount, LiveValue::Nonce(_))
            | (RpcMethod::GetCode, LiveValue::Code(_))
            | (RpcMethod::GetStorageAt, LiveValue::Storage(_))
            | (RpcMethod::Call, LiveValue::ReturnData(_))
            | (RpcMethod::EstimateGas, LiveValue::Gas(_))
    )
}

fn quantity(value: &LiveValue) -> U256 {
    match value {
        LiveValue::Balance(balance) => *balance,
        LiveValue::Nonce(n) | LiveValue::Gas(n) => U256::from(*n),
        LiveValue::Code(_) | LiveValue::Storage(_) | LiveValue::ReturnData(_) => U256::ZERO,
    }
}

/// Live value in the textual form a node would have answered with.
fn render(value: &LiveValue) -> String {
    match value {
        LiveValue::Balance(balance) => format!("0x{balance:x}"),
        LiveValue::Nonce(n) | LiveValue::Gas(n) => format!("0x{n:x}"),
        LiveValue::Code(bytes) | LiveValue::ReturnData(bytes) => hex::encode_prefixed(bytes),
        LiveValue::Storage(slot) => hex::encode_prefixed(slot),
    }
}

fn parse_quantity(text: &str) -> Option<U256> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    U256::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RevertError;
    use crate::model::SkipReason;
    use alloy::primitives::{B256, Bytes};
    use assert_matches::assert_matches;
    use rpc_replay_state_api::HaltReason;
    use rpc_replay_tape::{Body, Record};
    use serde_json::json;

    const PARAMS: &str = r#"["0x00000000000000000000000000000000000a11ce","latest"]"#;

    fn outcome(method_base: &'static str, recorded: RecordedOutcome, live: LiveOutcome) -> Outcome {
        Outcome {
            method: RpcMethod::from_base(method_base),
            block: 10,
            record: Record {
                query: Body {
                    namespace: "eth",
                    method_base,
                    method: format!("eth_{method_base}"),
                    params: serde_json::from_str(PARAMS).unwrap(),
                },
                outcome: recorded,
                params_raw: PARAMS.as_bytes().to_vec(),
                block_number: 10,
                block_timestamp: 0,
            },
            live,
        }
    }

    fn result(json: serde_json::Value) -> RecordedOutcome {
        RecordedOutcome::Result(serde_json::to_vec(&json).unwrap())
    }

    fn error(code: i32) -> RecordedOutcome {
        RecordedOutcome::Error(ErrorMessage {
            code,
            message: String::new(),
        })
    }

    fn balance(value: u64) -> LiveOutcome {
        LiveOutcome::Value(LiveValue::Balance(U256::from(value)))
    }

    #[test]
    fn balance_match_and_mismatch() {
        let matched = compare(&outcome("getBalance", result(json!("0x3e8")), balance(1000))).unwrap();
        assert_eq!(matched.kind, VerdictKind::Match);

        let verdict = compare(&outcome("getBalance", result(json!("0x3e8")), balance(1001))).unwrap();
        assert_eq!(verdict.kind, VerdictKind::NoMatchingResult);
        assert_eq!(
            verdict.description,
            format!(
                "result do not match\nMethod: eth_getBalance\nBlockID: 0xa\n\tLive: 0x3e9\n\tRecorded: 0x3e8\n\n\tParams: {PARAMS}"
            )
        );
    }

    #[test]
    fn quantities_compare_numerically() {
        let verdict = compare(&outcome("getBalance", result(json!("0x03E8")), balance(1000))).unwrap();
        assert_eq!(verdict.kind, VerdictKind::Match);
        let nonce = LiveOutcome::Value(LiveValue::Nonce(0));
        assert_eq!(
            compare(&outcome("getTransactionCount", result(json!("0x0")), nonce)).unwrap().kind,
            VerdictKind::Match
        );
    }

    #[test]
    fn byte_strings_compare_case_insensitively() {
        let code = LiveOutcome::Value(LiveValue::Code(Bytes::from_static(&[0xab, 0xcd])));
        assert_eq!(
            compare(&outcome("getCode", result(json!("0xABCD")), code)).unwrap().kind,
            VerdictKind::Match
        );
        let slot = LiveOutcome::Value(LiveValue::Storage(B256::with_last_byte(7)));
        let verdict = compare(&outcome("getStorageAt", result(json!("0x0")), slot)).unwrap();
        assert_eq!(verdict.kind, VerdictKind::NoMatchingResult);
    }

    #[test]
    fn undecodable_recording() {
        let recorded = RecordedOutcome::Result(b"{not json".to_vec());
        assert_matches!(
            compare(&outcome("getBalance", recorded, balance(1))),
            Some(Verdict { kind: VerdictKind::CannotUnmarshalResult, .. })
        );
        assert_matches!(
            compare(&outcome("getBalance", result(json!("1000")), balance(1))),
            Some(Verdict { kind: VerdictKind::CannotUnmarshalResult, .. })
        );
    }

    #[test]
    fn value_of_the_wrong_method() {
        let gas = LiveOutcome::Value(LiveValue::Gas(21_000));
        assert_matches!(
            compare(&outcome("getBalance", result(json!("0x5208")), gas)),
            Some(Verdict { kind: VerdictKind::UnexpectedDataType, .. })
        );
    }

    #[test]
    fn recorded_errors_against_live_errors() {
        let revert = LiveOutcome::Error(RevertError::new(Bytes::new()).into());
        assert_eq!(
            compare(&outcome("call", error(-32000), revert.clone())).unwrap().kind,
            VerdictKind::Match
        );
        assert_eq!(
            compare(&outcome("call", error(INTERNAL_ERROR), revert.clone())).unwrap().kind,
            VerdictKind::Match
        );

        let out_of_gas = LiveOutcome::Error(ExecutionError::Halt(HaltReason::OutOfGas));
        let verdict = compare(&outcome("call", error(3), out_of_gas.clone())).unwrap();
        assert_eq!(verdict.kind, VerdictKind::NoMatchingErrors);
        assert!(verdict.description.contains("one of these error messages: execution reverted"));

        let verdict = compare(&outcome("call", error(-1), out_of_gas.clone())).unwrap();
        assert_eq!(verdict.kind, VerdictKind::NoMatchingErrors);
        assert!(verdict.description.contains("unknown error code: -1"));

        assert_eq!(
            compare(&outcome("call", error(INTERNAL_ERROR), out_of_gas.clone())).unwrap().kind,
            VerdictKind::InternalError
        );
    }

    #[test]
    fn recorded_invalid_argument_is_never_flagged() {
        let rejected = LiveOutcome::Error(ExecutionError::invalid_argument(0, "missing parameter"));
        assert_eq!(
            compare(&outcome("getBalance", error(INVALID_ARGUMENT), rejected)).unwrap().kind,
            VerdictKind::Match
        );
        let out_of_gas = LiveOutcome::Error(ExecutionError::Halt(HaltReason::OutOfGas));
        assert!(compare(&outcome("call", error(INVALID_ARGUMENT), out_of_gas)).is_none());
        assert!(compare(&outcome("getBalance", error(INVALID_ARGUMENT), balance(1))).is_none());
    }

    #[test]
    fn live_error_against_recorded_result() {
        let revert = LiveOutcome::Error(RevertError::new(Bytes::new()).into());
        assert_eq!(
            compare(&outcome("call", result(json!("0x")), revert)).unwrap().kind,
            VerdictKind::ExpectedResultGotError
        );
    }

    #[test]
    fn recorded_errors_against_live_values() {
        assert_eq!(
            compare(&outcome("getBalance", error(-32000), balance(1))).unwrap().kind,
            VerdictKind::ExpectedErrorGotResult
        );
        assert_eq!(
            compare(&outcome("getBalance", error(INTERNAL_ERROR), balance(1))).unwrap().kind,
            VerdictKind::InternalError
        );
        let verdict = compare(&outcome("getBalance", error(-42), balance(1))).unwrap();
        assert_eq!(verdict.kind, VerdictKind::ExpectedErrorGotResult);
        assert!(verdict.description.contains("unknown error code: -42"));
        assert!(compare(&outcome("getBalance", error(INVALID_ARGUMENT), balance(1))).is_none());
    }

    #[test]
    fn skipped_outcomes_are_not_compared() {
        let skipped = LiveOutcome::Skipped(SkipReason::PendingBlock);
        assert!(compare(&outcome("getBalance", result(json!("0x1")), skipped)).is_none());
    }
}
