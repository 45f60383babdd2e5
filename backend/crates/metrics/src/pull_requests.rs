use std::collections::BTreeMap;

use pulse_common::{PrStatus, PullRequest};
use serde::{Deserialize, Serialize};

use crate::stats::{hours_between, ratio, Mean};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrMetrics {
    pub total_prs: usize,
    pub merged_prs: usize,
    pub closed_prs: usize,
    pub open_prs: usize,
    pub avg_cycle_time_hours: f64,
    pub avg_review_time_hours: f64,
    pub avg_pr_size: f64,
    pub prs_by_author: BTreeMap<String, usize>,
    pub merge_success_rate: f64,
}

/// Fold pull requests into summary statistics.
///
/// Cycle and review time average only over requests that have the relevant
/// timestamp; size averages over every request. Statuses outside
/// open / merged / closed contribute to `total_prs` only.
pub fn aggregate_pull_requests(prs: &[PullRequest]) -> PrMetrics {
    let mut metrics = PrMetrics::default();
    if prs.is_empty() {
        return metrics;
    }

    let mut cycle = Mean::default();
    let mut review = Mean::default();
    let mut size = Mean::default();

    for pr in prs {
        *metrics.prs_by_author.entry(pr.author.clone()).or_default() += 1;

        match pr.status {
            PrStatus::Merged => metrics.merged_prs += 1,
            PrStatus::Closed => metrics.closed_prs += 1,
            PrStatus::Open => metrics.open_prs += 1,
            PrStatus::Unknown(_) => {}
        }

        if let Some(merged_at) = pr.merged_at {
            cycle.push(hours_between(pr.created_at, merged_at));
        }
        if let Some(reviewed_at) = pr.first_review_at {
            review.push(hours_between(pr.created_at, reviewed_at));
        }
        size.push(pr.lines_changed as f64);
    }

    metrics.total_prs = prs.len();
    metrics.avg_cycle_time_hours = cycle.value();
    metrics.avg_review_time_hours = review.value();
    metrics.avg_pr_size = size.value();
    metrics.merge_success_rate = ratio(metrics.merged_prs as f64, metrics.total_prs as f64) * 100.0;

    metrics
}
