use std::collections::BTreeMap;

use pulse_common::Story;
use serde::{Deserialize, Serialize};

use crate::classify::is_completed_status;
use crate::stats::{days_between, ratio, Mean};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryMetrics {
    pub total_stories: usize,
    pub completed_stories: usize,
    pub avg_lead_time_days: f64,
    pub avg_cycle_time_days: f64,
    /// Completed stories per week.
    pub throughput_per_week: f64,
    pub avg_estimate: f64,
    pub avg_actual_effort: f64,
    pub estimate_accuracy_percent: f64,
    /// Average cycle time as a share of average lead time.
    pub flow_efficiency_percent: f64,
    pub stories_by_assignee: BTreeMap<String, usize>,
}

/// Fold stories into summary statistics.
///
/// - lead time averages over stories with a completion time
/// - cycle time averages over stories with both start and completion
/// - throughput spans earliest creation to latest completion, in weeks
/// - estimate accuracy compares the sums, and is zero when nothing was estimated
/// - average estimate / effort divide by every story, zeros included
pub fn aggregate_stories(stories: &[Story]) -> StoryMetrics {
    let mut metrics = StoryMetrics::default();
    if stories.is_empty() {
        return metrics;
    }

    let mut lead = Mean::default();
    let mut cycle = Mean::default();
    let mut total_estimate = 0.0;
    let mut total_actual = 0.0;

    for s in stories {
        *metrics
            .stories_by_assignee
            .entry(s.assignee.clone())
            .or_default() += 1;

        if is_completed_status(&s.status) {
            metrics.completed_stories += 1;
        }

        if let Some(completed_at) = s.completed_at {
            lead.push(days_between(s.created_at, completed_at));
            if let Some(started_at) = s.started_at {
                cycle.push(days_between(started_at, completed_at));
            }
        }

        total_estimate += s.estimate;
        total_actual += s.actual_effort;
    }

    let total = stories.len() as f64;
    metrics.total_stories = stories.len();
    metrics.avg_lead_time_days = lead.value();
    metrics.avg_cycle_time_days = cycle.value();
    metrics.avg_estimate = total_estimate / total;
    metrics.avg_actual_effort = total_actual / total;
    metrics.flow_efficiency_percent =
        ratio(metrics.avg_cycle_time_days, metrics.avg_lead_time_days) * 100.0;

    if total_estimate > 0.0 {
        metrics.estimate_accuracy_percent =
            (1.0 - (total_actual - total_estimate).abs() / total_estimate) * 100.0;
    }

    let earliest_created = stories.iter().map(|s| s.created_at).min();
    let latest_completed = stories.iter().filter_map(|s| s.completed_at).max();
    if let (Some(from), Some(to)) = (earliest_created, latest_completed) {
        let weeks = days_between(from, to) / 7.0;
        metrics.throughput_per_week = ratio(metrics.completed_stories as f64, weeks);
    }

    metrics
}
