use crate::model::Outcome;
use std::fmt;
use vise::EncodeLabelValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(rename_all = "snake_case")]
pub enum VerdictKind {
    Match,
    NoMatchingResult,
    NoMatchingErrors,
    ExpectedErrorGotResult,
    ExpectedResultGotError,
    UnexpectedDataType,
    CannotUnmarshalResult,
    /// The recorded node answered with an internal error the live side did not reproduce.
    InternalError,
}

impl VerdictKind {
    pub fn is_match(self) -> bool {
        self == Self::Match
    }

    fn headline(self) -> &'static str {
        match self {
            Self::Match => "results match",
            Self::NoMatchingResult => "result do not match",
            Self::NoMatchingErrors => "errors do not match",
            Self::ExpectedErrorGotResult => "expected error but live execution returned valid result",
            Self::ExpectedResultGotError => "expected valid result but live execution returned err",
            Self::UnexpectedDataType => "unexpected data type",
            Self::CannotUnmarshalResult => "cannot unmarshal result",
            Self::InternalError => "recorded internal error",
        }
    }
}

/// Classification of one compared outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub description: String,
}

impl Verdict {
    pub fn matched() -> Self {
        Self {
            kind: VerdictKind::Match,
            description: String::new(),
        }
    }

    /// Verdict describing both sides of a disagreement along with the request.
    pub fn mismatch(
        kind: VerdictKind,
        outcome: &Outcome,
        live: impl fmt::Display,
        recorded: impl fmt::Display,
    ) -> Self {
        let description = format!(
            "{}\nMethod: {}\nBlockID: {:#x}\n\tLive: {live}\n\tRecorded: {recorded}\n\n\tParams: {}",
            kind.headline(),
            outcome.record.query.method,
            outcome.block,
            outcome.record.params_str(),
        );
        Self { kind, description }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_match() {
            f.write_str(self.kind.headline())
        } else {
            f.write_str(&self.description)
        }
    }
}
