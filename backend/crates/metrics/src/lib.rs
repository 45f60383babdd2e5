//! Metrics aggregation over canonical records. Pure: no I/O, no retained state.

pub mod classify;
pub mod commits;
pub mod pull_requests;
pub mod report;
mod stats;
pub mod stories;

pub use commits::{aggregate_commits, CommitMetrics};
pub use pull_requests::{aggregate_pull_requests, PrMetrics};
pub use report::{compose_report, compose_report_at, Report};
pub use stories::{aggregate_stories, StoryMetrics};
