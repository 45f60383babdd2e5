use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use pulse_common::types::not_before;
use pulse_common::{Commit, PrStatus, PullRequest};
use tokio_util::sync::CancellationToken;

use super::client::BitbucketClient;
use super::models::{BitbucketBranch, BitbucketCommit, BitbucketPullRequest};
use crate::connector::SourceAdapter;
use crate::http::SourceError;
use crate::window::{Order, Scan, TimeWindow};

pub struct BitbucketAdapter {
    client: BitbucketClient,
    max_concurrency: usize,
}

impl BitbucketAdapter {
    pub fn new(client: BitbucketClient, max_concurrency: usize) -> Self {
        Self {
            client,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// In-window commits of one branch, stopping at the first older commit.
    async fn branch_commits(
        &self,
        branch: &BitbucketBranch,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Commit>, SourceError> {
        let mut start = 0;
        let mut commits = Vec::new();

        loop {
            let page = self
                .client
                .fetch_commits_page(&branch.id, start, cancel)
                .await?;
            let next = page.next_start();

            for raw in &page.values {
                let Some(date) = raw.authored_at() else {
                    tracing::warn!(commit = %raw.id, "commit timestamp out of range, skipping");
                    continue;
                };
                match window.scan(date, Order::Descending) {
                    Scan::Keep => commits.push(map_commit(raw, date)),
                    Scan::Skip => {}
                    Scan::Stop => return Ok(commits),
                }
            }

            match next {
                Some(n) => start = n,
                None => return Ok(commits),
            }
        }
    }

    /// Attach the diff size to a listed PR. A failed diff degrades the
    /// record to zero lines; cancellation aborts it.
    async fn enrich(
        &self,
        pr: BitbucketPullRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<PullRequest>, SourceError> {
        let lines_changed = match self.client.fetch_diff(pr.id, cancel).await {
            Ok(diff) => diff.lines_changed(),
            Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
            Err(e) => {
                tracing::warn!(pr = pr.id, error = %e, "diff fetch failed, recording zero lines");
                0
            }
        };
        Ok(map_pull_request(&pr, lines_changed))
    }
}

#[async_trait]
impl SourceAdapter for BitbucketAdapter {
    fn source_name(&self) -> &str {
        "bitbucket"
    }

    async fn fetch_commits(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Commit>, SourceError> {
        let branches = self.client.fetch_branches(cancel).await?;
        tracing::debug!(branches = branches.len(), "listed bitbucket branches");

        let mut seen = HashSet::new();
        let mut commits = Vec::new();

        for branch in &branches {
            match self.branch_commits(branch, window, cancel).await {
                Ok(found) => {
                    let in_window = found.len();
                    for commit in found {
                        if seen.insert(commit.hash.clone()) {
                            commits.push(commit);
                        }
                    }
                    // Branches are assumed to be listed most-recently-active first.
                    if in_window == 0 && !commits.is_empty() {
                        tracing::debug!(branch = %branch.display_id, "no recent commits, skipping remaining branches");
                        break;
                    }
                }
                Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
                Err(e) => {
                    tracing::warn!(branch = %branch.display_id, error = %e, "branch commit fetch failed, skipping branch");
                }
            }
        }

        tracing::info!(source = "bitbucket", count = commits.len(), "fetched commits");
        Ok(commits)
    }

    async fn fetch_pull_requests(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullRequest>, SourceError> {
        let mut start = 0;
        let mut listed = Vec::new();

        loop {
            let page = self.client.fetch_pull_requests_page(start, cancel).await?;
            let next = page.next_start();

            for pr in page.values {
                let Some(created_at) = pr.created_at() else {
                    continue;
                };
                if window.scan(created_at, Order::Unordered) == Scan::Keep {
                    listed.push(pr);
                }
            }

            match next {
                Some(n) => start = n,
                None => break,
            }
        }

        let prs: Vec<PullRequest> = stream::iter(listed.into_iter().map(|pr| self.enrich(pr, cancel)))
            .buffered(self.max_concurrency)
            .try_filter_map(|pr| async move { Ok(pr) })
            .try_collect()
            .await?;

        tracing::info!(source = "bitbucket", count = prs.len(), "fetched pull requests");
        Ok(prs)
    }
}

fn map_commit(raw: &BitbucketCommit, date: DateTime<Utc>) -> Commit {
    Commit {
        hash: raw.id.clone(),
        author: raw.author.name.clone(),
        date,
        message: raw.message.clone(),
        lines_added: 0,
        lines_deleted: 0,
    }
}

fn map_pull_request(pr: &BitbucketPullRequest, lines_changed: u64) -> Option<PullRequest> {
    let created_at = pr.created_at()?;
    let status = PrStatus::from_provider(&pr.state);
    let (merged_at, closed_at) = match status {
        PrStatus::Merged => (pr.closed_at(), None),
        PrStatus::Closed => (None, pr.closed_at()),
        _ => (None, None),
    };

    // No review timeline in the listing; the last update stands in for it.
    let first_review_at = if pr.reviewers.iter().any(|r| r.has_reviewed()) {
        not_before(pr.updated_at(), created_at)
    } else {
        None
    };

    Some(PullRequest {
        id: format!("PR-{}", pr.id),
        author: pr.author.user.name.clone(),
        created_at,
        merged_at,
        closed_at,
        first_review_at,
        lines_changed,
        status,
        reviewers: pr.reviewers.iter().map(|r| r.user.name.clone()).collect(),
    })
}
