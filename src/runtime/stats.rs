//! Timing and execution statistics.

use serde::{Deserialize, Serialize};

use std::time::Instant;

/// Current wall time as an RFC3339 UTC string.
pub fn wall_time_iso_utc() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Start/end timestamps plus accumulated elapsed seconds.
///
/// A timer can be stopped and restarted; elapsed time accumulates across
/// segments. Sub-scenario time stays on the caller's step timer, so each
/// report's step times still sum up to its own scenario time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,

    #[serde(skip)]
    started_at: Option<Instant>,
}

impl TimeStats {
    pub fn start(&mut self) {
        if self.start.is_none() {
            self.start = Some(wall_time_iso_utc());
        }
        self.started_at = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        if let Some(t0) = self.started_at.take() {
            let segment = t0.elapsed().as_secs_f64();
            self.elapsed = Some(self.elapsed.unwrap_or(0.0) + segment);
            self.end = Some(wall_time_iso_utc());
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.unwrap_or(0.0)
    }
}

/// Executed-out-of-total counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecTotalStats {
    pub executed: u32,
    pub total: u32,
}

impl ExecTotalStats {
    pub fn add(&mut self, executed: bool) {
        self.total += 1;
        if executed {
            self.executed += 1;
        }
    }

    pub fn fold(&mut self, other: ExecTotalStats) {
        self.executed += other.executed;
        self.total += other.total;
    }
}

impl std::fmt::Display for ExecTotalStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.executed, self.total)
    }
}

/// Per-scenario execution counters.
///
/// Child scenario statistics fold in on return so the top-level record
/// covers the whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStats {
    pub steps: ExecTotalStats,
    pub actions: ExecTotalStats,
    pub results: ExecTotalStats,
    pub steps_skipped: u32,
    pub steps_failed: u32,
}

impl ScenarioStats {
    pub fn fold(&mut self, child: ScenarioStats) {
        self.steps.fold(child.steps);
        self.actions.fold(child.actions);
        self.results.fold(child.results);
        self.steps_skipped += child.steps_skipped;
        self.steps_failed += child.steps_failed;
    }
}

/// Tracks the scenario timer and counters for one run.
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    pub time: TimeStats,
    pub stats: ScenarioStats,
}

impl StatisticsTracker {
    pub fn begin(&mut self) {
        self.time.start();
    }

    pub fn end(&mut self) {
        self.time.stop();
    }

    pub fn count_step(&mut self, executed: bool) {
        self.stats.steps.add(executed);
    }

    pub fn count_skipped_step(&mut self) {
        self.stats.steps.add(false);
        self.stats.steps_skipped += 1;
    }

    pub fn count_failed_step(&mut self) {
        self.stats.steps_failed += 1;
    }

    pub fn count_action(&mut self, executed: bool) {
        self.stats.actions.add(executed);
    }

    pub fn count_result(&mut self, executed: bool) {
        self.stats.results.add(executed);
    }

    pub fn fold_child(&mut self, child: ScenarioStats) {
        self.stats.fold(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timer_accumulates_across_segments() {
        let mut t = TimeStats::default();
        t.start();
        std::thread::sleep(Duration::from_millis(5));
        t.stop();
        let first = t.elapsed_seconds();
        assert!(first > 0.0);
        t.start();
        std::thread::sleep(Duration::from_millis(5));
        t.stop();
        assert!(t.elapsed_seconds() > first);
        assert!(t.start.is_some() && t.end.is_some());
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut t = TimeStats::default();
        t.stop();
        assert_eq!(t.elapsed, None);
        assert_eq!(t.end, None);
    }

    #[test]
    fn exec_totals_fold() {
        let mut a = ExecTotalStats::default();
        a.add(true);
        a.add(false);
        let mut b = ExecTotalStats::default();
        b.add(true);
        a.fold(b);
        assert_eq!(a, ExecTotalStats { executed: 2, total: 3 });
        assert_eq!(a.to_string(), "2/3");
    }

    #[test]
    fn child_stats_fold_into_parent() {
        let mut tracker = StatisticsTracker::default();
        tracker.count_step(true);
        tracker.count_action(true);
        let child = ScenarioStats {
            steps: ExecTotalStats { executed: 2, total: 3 },
            actions: ExecTotalStats { executed: 2, total: 2 },
            results: ExecTotalStats { executed: 1, total: 1 },
            steps_skipped: 1,
            steps_failed: 0,
        };
        tracker.fold_child(child);
        assert_eq!(tracker.stats.steps.total, 4);
        assert_eq!(tracker.stats.actions.executed, 3);
        assert_eq!(tracker.stats.steps_skipped, 1);
    }
}
