use crate::method::RpcMethod;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by all stages of one replay run.
#[derive(Debug, Default)]
pub struct ReplayStats {
    read: AtomicU64,
    skipped: AtomicU64,
    executed: [AtomicU64; RpcMethod::ALL.len()],
    gas: AtomicU64,
    matched: AtomicU64,
    mismatches: AtomicU64,
    informational: AtomicU64,
    not_compared: AtomicU64,
}

impl ReplayStats {
    pub fn record_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    /// A record dropped by the reader.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_executed(&self, method: RpcMethod) {
        self.executed[method.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gas(&self, gas: u64) {
        self.gas.fetch_add(gas, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of mismatches seen so far, including this one.
    pub fn record_mismatch(&self) -> u64 {
        self.mismatches.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_informational(&self) {
        self.informational.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_compared(&self) {
        self.not_compared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let executed = RpcMethod::ALL
            .iter()
            .map(|method| (*method, self.executed[method.index()].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        StatsSnapshot {
            read: self.read.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            executed,
            gas: self.gas.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Acquire),
            informational: self.informational.load(Ordering::Relaxed),
            not_compared: self.not_compared.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub read: u64,
    pub skipped: u64,
    /// Executed requests per method; methods never executed are omitted.
    pub executed: Vec<(RpcMethod, u64)>,
    pub gas: u64,
    pub matched: u64,
    pub mismatches: u64,
    pub informational: u64,
    pub not_compared: u64,
}

impl StatsSnapshot {
    pub fn total_executed(&self) -> u64 {
        self.executed.iter().map(|(_, count)| count).sum()
    }

    pub fn executed(&self, method: RpcMethod) -> u64 {
        self.executed
            .iter()
            .find(|(m, _)| *m == method)
            .map_or(0, |(_, count)| *count)
    }
}

/// Per-method counts, e.g. `getBalance=3 call=1`.
struct PerMethod<'a>(&'a [(RpcMethod, u64)]);

impl fmt::Display for PerMethod<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (method, count)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{method}={count}")?;
        }
        Ok(())
    }
}

/// Outcome of a finished replay run.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
    /// The replay was stopped by the failure signal.
    pub failed: bool,
    /// The replay was stopped by external cancellation.
    pub cancelled: bool,
}

impl ReplaySummary {
    pub fn log(&self) {
        let stats = &self.stats;
        tracing::info!(
            elapsed = ?self.elapsed,
            read = stats.read,
            skipped = stats.skipped,
            executed = stats.total_executed(),
            per_method = %PerMethod(&stats.executed),
            matched = stats.matched,
            mismatches = stats.mismatches,
            not_compared = stats.not_compared,
            failed = self.failed,
            cancelled = self.cancelled,
            "replay finished"
        );
    }
}

/// Periodic progress line: interval and overall rates.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    started: Instant,
    last_report: Instant,
    last_executed: u64,
    last_gas: u64,
}

impl ProgressTracker {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            last_report: started,
            last_executed: 0,
            last_gas: 0,
        }
    }

    pub fn report(&mut self, stats: &StatsSnapshot) {
        let now = Instant::now();
        let interval = now.duration_since(self.last_report).as_secs_f64();
        let overall = now.duration_since(self.started).as_secs_f64();
        let executed = stats.total_executed();

        tracing::info!(
            elapsed = ?now.duration_since(self.started),
            read = stats.read,
            executed,
            per_method = %PerMethod(&stats.executed),
            interval_rate = rate(executed - self.last_executed, interval),
            overall_rate = rate(executed, overall),
            interval_gas_rate = rate(stats.gas - self.last_gas, interval),
            overall_gas_rate = rate(stats.gas, overall),
            "replay progress"
        );

        self.last_report = now;
        self.last_executed = executed;
        self.last_gas = stats.gas;
    }
}

fn rate(count: u64, secs: f64) -> f64 {
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_counts_per_method() {
        let stats = ReplayStats::default();
        stats.record_executed(RpcMethod::GetBalance);
        stats.record_executed(RpcMethod::GetBalance);
        stats.record_executed(RpcMethod::Call);
        stats.record_gas(21_000);
        assert_eq!(stats.record_mismatch(), 1);
        assert_eq!(stats.record_mismatch(), 2);

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot.executed,
            vec![(RpcMethod::GetBalance, 2), (RpcMethod::Call, 1)]
        );
        assert_eq!(snapshot.total_executed(), 3);
        assert_eq!(snapshot.executed(RpcMethod::GetCode), 0);
        assert_eq!(snapshot.gas, 21_000);
        assert_eq!(snapshot.mismatches, 2);
        assert_eq!(
            PerMethod(&snapshot.executed).to_string(),
            "getBalance=2 call=1"
        );
    }
}
