use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Weekday};
use pulse_common::Commit;
use serde::{Deserialize, Serialize};

use crate::stats::{days_between, ratio};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitMetrics {
    pub total_commits: usize,
    pub commits_per_day: f64,
    pub commits_by_author: BTreeMap<String, usize>,
    pub commits_by_weekday: BTreeMap<String, usize>,
    pub total_lines_added: u64,
    pub total_lines_deleted: u64,
    /// Distinct UTC calendar dates with at least one commit.
    pub active_days: usize,
    /// `YYYY-MM-DD to YYYY-MM-DD`, empty when there are no commits.
    pub date_range: String,
}

/// Fold commits into summary statistics. Empty input yields zeros.
///
/// `commits_per_day` divides by the fractional day span between the oldest and
/// newest commit; a zero span yields zero.
pub fn aggregate_commits(commits: &[Commit]) -> CommitMetrics {
    let mut metrics = CommitMetrics::default();

    let (Some(first), Some(last)) = (
        commits.iter().map(|c| c.date).min(),
        commits.iter().map(|c| c.date).max(),
    ) else {
        return metrics;
    };

    let mut active_days = BTreeSet::new();
    for c in commits {
        *metrics.commits_by_author.entry(c.author.clone()).or_default() += 1;
        *metrics
            .commits_by_weekday
            .entry(weekday_name(c.date.weekday()).to_string())
            .or_default() += 1;
        metrics.total_lines_added += c.lines_added;
        metrics.total_lines_deleted += c.lines_deleted;
        active_days.insert(c.date.date_naive());
    }

    metrics.total_commits = commits.len();
    metrics.active_days = active_days.len();
    metrics.commits_per_day = ratio(metrics.total_commits as f64, days_between(first, last));
    metrics.date_range = format!(
        "{} to {}",
        first.format("%Y-%m-%d"),
        last.format("%Y-%m-%d")
    );

    metrics
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
