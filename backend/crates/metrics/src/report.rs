use chrono::{DateTime, Utc};
use pulse_common::{Commit, PullRequest, Story};
use serde::{Deserialize, Serialize};

use crate::commits::{aggregate_commits, CommitMetrics};
use crate::pull_requests::{aggregate_pull_requests, PrMetrics};
use crate::stories::{aggregate_stories, StoryMetrics};

/// Aggregate output of one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub commit_metrics: CommitMetrics,
    pub pr_metrics: PrMetrics,
    pub story_metrics: StoryMetrics,
    pub generated_at: DateTime<Utc>,
}

/// Run the three reducers and stamp the result with the current time.
pub fn compose_report(commits: &[Commit], prs: &[PullRequest], stories: &[Story]) -> Report {
    compose_report_at(commits, prs, stories, Utc::now())
}

/// Same as [`compose_report`] with an explicit generation time.
pub fn compose_report_at(
    commits: &[Commit],
    prs: &[PullRequest],
    stories: &[Story],
    generated_at: DateTime<Utc>,
) -> Report {
    let report = Report {
        commit_metrics: aggregate_commits(commits),
        pr_metrics: aggregate_pull_requests(prs),
        story_metrics: aggregate_stories(stories),
        generated_at,
    };

    tracing::debug!(
        commits = commits.len(),
        prs = prs.len(),
        stories = stories.len(),
        "composed report"
    );

    report
}
