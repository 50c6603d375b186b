//! Progress reporter for a running load.
//!
//! Observes [`RunStats`] after each recorded batch and emits a rate /
//! percent-complete line plus Prometheus gauges. Purely observational: it
//! never mutates the stats and it cannot fail, so it can never abort the
//! pipeline.

use crate::stats::RunStats;
use metrics::gauge;
use std::time::Duration;
use tracing::info;

/// Point-in-time view of run progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Documents inserted per second; 0 when no time has elapsed.
    pub rate: f64,

    /// Percent of the expected total attempted so far; `None` when the total
    /// is unknown.
    pub percent: Option<f64>,
}

/// Computes and emits progress after each batch.
pub struct ProgressReporter {
    total_expected: Option<usize>,
}

impl ProgressReporter {
    /// `total_expected` is the number of documents the run is expected to
    /// attempt, when the driver knows it up front.
    pub fn new(total_expected: Option<usize>) -> Self {
        Self { total_expected }
    }

    /// Update the expected total as more sources are discovered mid-run.
    pub fn set_total_expected(&mut self, total_expected: Option<usize>) {
        self.total_expected = total_expected;
    }

    /// Compute the current rate and percent from a read-only stats view.
    pub fn snapshot(&self, stats: &RunStats, elapsed: Duration) -> ProgressSnapshot {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            stats.inserted as f64 / secs
        } else {
            0.0
        };

        let percent = self
            .total_expected
            .filter(|&total| total > 0)
            .map(|total| stats.attempted as f64 / total as f64 * 100.0);

        ProgressSnapshot { rate, percent }
    }

    /// Log progress and update gauges. Best-effort by construction.
    pub fn report(&self, stats: &RunStats, elapsed: Duration) {
        let snapshot = self.snapshot(stats, elapsed);

        match snapshot.percent {
            Some(percent) => info!(
                "Progress: {:.1}% | attempted {} | inserted {} | errored {} | {:.0} docs/sec",
                percent, stats.attempted, stats.inserted, stats.errored, snapshot.rate
            ),
            None => info!(
                "Progress: attempted {} | inserted {} | errored {} | {:.0} docs/sec",
                stats.attempted, stats.inserted, stats.errored, snapshot.rate
            ),
        }

        gauge!("load_documents_per_second").set(snapshot.rate);
        if let Some(percent) = snapshot.percent {
            gauge!("load_percent_complete").set(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::RunAggregator;
    use crate::store::WriteOutcome;

    fn stats_with(inserted: usize, attempted: usize) -> RunStats {
        let mut agg = RunAggregator::new();
        agg.record_outcome(
            "a.zip",
            attempted,
            &WriteOutcome::AllInserted { count: inserted },
        );
        agg.finalize()
    }

    #[test]
    fn test_rate_zero_when_no_time_elapsed() {
        let reporter = ProgressReporter::new(None);
        let snapshot = reporter.snapshot(&stats_with(500, 500), Duration::ZERO);
        assert_eq!(snapshot.rate, 0.0);
    }

    #[test]
    fn test_rate_is_inserted_over_elapsed() {
        let reporter = ProgressReporter::new(None);
        let snapshot = reporter.snapshot(&stats_with(500, 500), Duration::from_secs(5));
        assert_eq!(snapshot.rate, 100.0);
    }

    #[test]
    fn test_percent_omitted_when_total_unknown() {
        let reporter = ProgressReporter::new(None);
        let snapshot = reporter.snapshot(&stats_with(10, 10), Duration::from_secs(1));
        assert!(snapshot.percent.is_none());
    }

    #[test]
    fn test_percent_of_expected_total() {
        let reporter = ProgressReporter::new(Some(1000));
        let snapshot = reporter.snapshot(&stats_with(250, 250), Duration::from_secs(1));
        assert_eq!(snapshot.percent, Some(25.0));
    }

    #[test]
    fn test_percent_omitted_for_zero_total() {
        let reporter = ProgressReporter::new(Some(0));
        let snapshot = reporter.snapshot(&stats_with(0, 0), Duration::from_secs(1));
        assert!(snapshot.percent.is_none());
    }

    #[test]
    fn test_report_does_not_mutate_stats() {
        let reporter = ProgressReporter::new(Some(100));
        let stats = stats_with(50, 50);
        let before = (stats.attempted, stats.inserted, stats.errored);
        reporter.report(&stats, Duration::from_secs(1));
        assert_eq!(before, (stats.attempted, stats.inserted, stats.errored));
    }
}
