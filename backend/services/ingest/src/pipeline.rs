use futures::future::join_all;
use pulse_common::{Commit, PullRequest, Story};
use tokio_util::sync::CancellationToken;

use crate::connector::SourceAdapter;
use crate::window::TimeWindow;

/// Canonical records gathered from every adapter in one run.
#[derive(Debug, Default)]
pub struct Collected {
    pub commits: Vec<Commit>,
    pub pull_requests: Vec<PullRequest>,
    pub stories: Vec<Story>,
    /// Fetches that failed and were replaced by an empty collection.
    pub failures: usize,
}

impl Collected {
    fn merge(mut self, other: Collected) -> Self {
        self.commits.extend(other.commits);
        self.pull_requests.extend(other.pull_requests);
        self.stories.extend(other.stories);
        self.failures += other.failures;
        self
    }
}

/// Run every adapter concurrently; a failed fetch contributes nothing.
pub async fn collect(
    adapters: &[Box<dyn SourceAdapter>],
    window: &TimeWindow,
    cancel: &CancellationToken,
) -> Collected {
    join_all(
        adapters
            .iter()
            .map(|adapter| collect_source(adapter.as_ref(), window, cancel)),
    )
    .await
    .into_iter()
    .fold(Collected::default(), Collected::merge)
}

async fn collect_source(
    adapter: &dyn SourceAdapter,
    window: &TimeWindow,
    cancel: &CancellationToken,
) -> Collected {
    let source = adapter.source_name();
    let mut out = Collected::default();

    match adapter.fetch_commits(window, cancel).await {
        Ok(commits) => out.commits = commits,
        Err(e) => {
            tracing::error!(source, error = %e, "commit collection failed");
            out.failures += 1;
        }
    }

    match adapter.fetch_pull_requests(window, cancel).await {
        Ok(prs) => out.pull_requests = prs,
        Err(e) => {
            tracing::error!(source, error = %e, "pull request collection failed");
            out.failures += 1;
        }
    }

    match adapter.fetch_issues(window, cancel).await {
        Ok(stories) => out.stories = stories,
        Err(e) => {
            tracing::error!(source, error = %e, "issue collection failed");
            out.failures += 1;
        }
    }

    tracing::info!(
        source,
        commits = out.commits.len(),
        pull_requests = out.pull_requests.len(),
        stories = out.stories.len(),
        failures = out.failures,
        "source collected"
    );
    out
}
