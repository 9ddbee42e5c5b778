use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::model::{Outcome, ScrapeResult};

/// Terminal results of one run, one per submitted target, ordered by target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether cancellation (external or run budget) was requested
    pub cancelled: bool,
    pub results: Vec<ScrapeResult>,
}

impl RunReport {
    pub fn successes(&self) -> impl Iterator<Item = &ScrapeResult> {
        self.results.iter().filter(|r| r.record().is_some())
    }

    pub fn partial(&self) -> impl Iterator<Item = &ScrapeResult> {
        self.results.iter().filter(|r| r.is_partial())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScrapeResult> {
        self.results.iter().filter(|r| r.error_kind().is_some())
    }

    pub fn failures_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.results.iter().filter_map(ScrapeResult::error_kind) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }

    /// Human-readable summary: counts, then one line per failed target
    pub fn summary(&self) -> String {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Run {} finished in {:.1}s{}",
            self.run_id,
            elapsed,
            if self.cancelled { " (cancelled)" } else { "" }
        );
        let _ = writeln!(out, "  targets:   {}", self.results.len());
        let _ = writeln!(out, "  succeeded: {}", self.successes().count());
        let _ = writeln!(out, "  partial:   {}", self.partial().count());
        let _ = writeln!(out, "  failed:    {}", self.failures().count());
        for (kind, count) in self.failures_by_kind() {
            let _ = writeln!(out, "    {kind}: {count}");
        }

        for result in &self.results {
            match &result.outcome {
                Outcome::Failure { kind, message } => {
                    let _ = writeln!(out, "  FAILED  {} [{kind}] {message}", result.target.url);
                }
                Outcome::Success { missing, .. } if !missing.is_empty() => {
                    let fields: Vec<String> = missing
                        .iter()
                        .filter_map(|f| serde_json::to_value(f).ok())
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                    let _ = writeln!(
                        out,
                        "  PARTIAL {} missing: {}",
                        result.target.url,
                        fields.join(", ")
                    );
                }
                Outcome::Success { .. } => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScrapeTarget;

    fn target(id: usize) -> ScrapeTarget {
        ScrapeTarget {
            id,
            url: format!("https://www.grubhub.com/restaurant/r{id}/{id}"),
            slug: format!("r{id}"),
            timeout_secs: None,
        }
    }

    #[test]
    fn counts_failures_by_kind() {
        let now = Utc::now();
        let report = RunReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            cancelled: true,
            results: vec![
                ScrapeResult::failure(target(0), ErrorKind::Cancelled, "run cancelled"),
                ScrapeResult::failure(target(1), ErrorKind::Cancelled, "run cancelled"),
                ScrapeResult::failure(target(2), ErrorKind::NavigationTimeout, "slow"),
            ],
        };

        let by_kind = report.failures_by_kind();
        assert_eq!(by_kind[&ErrorKind::Cancelled], 2);
        assert_eq!(by_kind[&ErrorKind::NavigationTimeout], 1);
        assert_eq!(report.successes().count(), 0);

        let summary = report.summary();
        assert!(summary.contains("(cancelled)"));
        assert!(summary.contains("navigation_timeout: 1"));
        assert!(summary.contains("FAILED  https://www.grubhub.com/restaurant/r2/2 [navigation_timeout] slow"));
    }
}
