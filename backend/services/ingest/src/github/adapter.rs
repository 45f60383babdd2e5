use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use pulse_common::types::not_before;
use pulse_common::{Commit, PrStatus, PullRequest};
use tokio_util::sync::CancellationToken;

use super::client::{GitHubClient, PER_PAGE};
use super::models::{GitHubCommit, GitHubPullRequest, GitHubReview};
use crate::connector::SourceAdapter;
use crate::http::SourceError;
use crate::window::{Order, Scan, TimeWindow};

pub struct GitHubAdapter {
    client: GitHubClient,
    max_concurrency: usize,
}

impl GitHubAdapter {
    pub fn new(client: GitHubClient, max_concurrency: usize) -> Self {
        Self {
            client,
            max_concurrency: max_concurrency.max(1),
        }
    }

    async fn branch_commits(
        &self,
        branch: &str,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Commit>, SourceError> {
        let mut page = 1;
        let mut commits = Vec::new();

        loop {
            let batch = self
                .client
                .fetch_commits_page(branch, window.since(), page, cancel)
                .await?;
            let batch_len = batch.len();

            for raw in &batch {
                let Some(date) = raw.authored_at() else {
                    continue;
                };
                match window.scan(date, Order::Descending) {
                    Scan::Keep => commits.push(map_commit(raw, date)),
                    Scan::Skip => {}
                    Scan::Stop => return Ok(commits),
                }
            }

            if batch_len < PER_PAGE {
                return Ok(commits);
            }
            page += 1;
        }
    }

    /// Attach size and reviews to a listed PR. A failed secondary fetch
    /// degrades the record; cancellation aborts it.
    async fn enrich(
        &self,
        pr: GitHubPullRequest,
        cancel: &CancellationToken,
    ) -> Result<PullRequest, SourceError> {
        let (detail, reviews) = tokio::join!(
            self.client.fetch_pull_request(pr.number, cancel),
            self.client.fetch_reviews(pr.number, cancel),
        );

        let lines_changed = match detail {
            Ok(d) => d.additions + d.deletions,
            Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
            Err(e) => {
                tracing::warn!(pr = pr.number, error = %e, "pull request detail fetch failed, recording zero lines");
                0
            }
        };
        let reviews = match reviews {
            Ok(reviews) => reviews,
            Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
            Err(e) => {
                tracing::warn!(pr = pr.number, error = %e, "review fetch failed, recording no reviews");
                Vec::new()
            }
        };

        Ok(map_pull_request(&pr, lines_changed, &reviews))
    }
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    fn source_name(&self) -> &str {
        "github"
    }

    async fn fetch_commits(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Commit>, SourceError> {
        let branches = self.client.fetch_branches(cancel).await?;
        tracing::debug!(branches = branches.len(), "listed github branches");

        let mut seen = HashSet::new();
        let mut commits = Vec::new();

        for branch in &branches {
            match self.branch_commits(&branch.name, window, cancel).await {
                Ok(found) => commits.extend(
                    found
                        .into_iter()
                        .filter(|c| seen.insert(c.hash.clone())),
                ),
                Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
                Err(e) => {
                    tracing::warn!(branch = %branch.name, error = %e, "branch commit fetch failed, skipping branch");
                }
            }
        }

        tracing::info!(source = "github", count = commits.len(), "fetched commits");
        Ok(commits)
    }

    async fn fetch_pull_requests(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullRequest>, SourceError> {
        let mut page = 1;
        let mut listed = Vec::new();

        'pages: loop {
            let batch = self.client.fetch_pull_requests_page(page, cancel).await?;
            let batch_len = batch.len();

            for pr in batch {
                match window.scan(pr.created_at, Order::Descending) {
                    Scan::Keep => listed.push(pr),
                    Scan::Skip => {}
                    Scan::Stop => break 'pages,
                }
            }

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        let prs: Vec<PullRequest> = stream::iter(listed.into_iter().map(|pr| self.enrich(pr, cancel)))
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        tracing::info!(source = "github", count = prs.len(), "fetched pull requests");
        Ok(prs)
    }
}

fn map_commit(raw: &GitHubCommit, date: DateTime<Utc>) -> Commit {
    Commit {
        hash: raw.sha.clone(),
        author: raw.author_name(),
        date,
        message: raw.commit.message.clone(),
        lines_added: 0,
        lines_deleted: 0,
    }
}

fn map_pull_request(
    pr: &GitHubPullRequest,
    lines_changed: u64,
    reviews: &[GitHubReview],
) -> PullRequest {
    let status = if pr.merged_at.is_some() {
        PrStatus::Merged
    } else {
        PrStatus::from_provider(&pr.state)
    };
    let closed_at = match status {
        PrStatus::Closed => pr.closed_at,
        _ => None,
    };

    let first_verdict = reviews
        .iter()
        .find(|r| r.is_verdict() && r.submitted_at.is_some())
        .and_then(|r| r.submitted_at);

    let reviewers: BTreeSet<String> = reviews
        .iter()
        .filter_map(|r| r.user.as_ref().map(|u| u.login.clone()))
        .collect();

    PullRequest {
        id: format!("PR-{}", pr.number),
        author: pr
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        created_at: pr.created_at,
        merged_at: pr.merged_at,
        closed_at,
        first_review_at: not_before(first_verdict, pr.created_at),
        lines_changed,
        status,
        reviewers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SecondsFormat, TimeZone};

    use crate::github::client::tests::{test_config, REPO_PATH};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::ending_at(now(), 30)
    }

    fn iso(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn commit_json(sha: &str, login: Option<&str>, ts: DateTime<Utc>) -> serde_json::Value {
        let account = match login {
            Some(l) => serde_json::json!({"login": l}),
            None => serde_json::Value::Null,
        };
        serde_json::json!({
            "sha": sha,
            "author": account,
            "commit": {
                "author": {"name": "Git Name", "date": iso(ts)},
                "message": format!("commit {sha}")
            }
        })
    }

    fn pr_json(number: u64, state: &str, created: DateTime<Utc>, merged: bool) -> serde_json::Value {
        let merged_at = merged.then(|| iso(created + Duration::hours(10)));
        let closed_at = (state == "closed").then(|| iso(created + Duration::hours(10)));
        serde_json::json!({
            "number": number,
            "state": state,
            "user": {"login": "ana"},
            "created_at": iso(created),
            "merged_at": merged_at,
            "closed_at": closed_at
        })
    }

    async fn adapter(server: &MockServer) -> GitHubAdapter {
        let client = GitHubClient::new(test_config())
            .unwrap()
            .with_base_url(&server.uri());
        GitHubAdapter::new(client, 3)
    }

    #[tokio::test]
    async fn commits_use_login_then_git_name_and_dedupe() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/branches")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "main"},
                {"name": "dev"}
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/commits")))
            .and(query_param("sha", "main"))
            .and(query_param("since", iso(window().since())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                commit_json("s2", Some("octo"), now() - Duration::days(1)),
                commit_json("s1", None, now() - Duration::days(2)),
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/commits")))
            .and(query_param("sha", "dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                commit_json("s3", Some("cat"), now() - Duration::hours(1)),
                commit_json("s2", Some("octo"), now() - Duration::days(1)),
            ])))
            .mount(&server)
            .await;

        let commits = adapter(&server)
            .await
            .fetch_commits(&window(), &CancellationToken::new())
            .await
            .unwrap();

        let summary: Vec<(&str, &str)> = commits
            .iter()
            .map(|c| (c.hash.as_str(), c.author.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("s2", "octo"), ("s1", "Git Name"), ("s3", "cat")]
        );
    }

    #[tokio::test]
    async fn pull_requests_stop_at_creation_boundary() {
        let server = MockServer::start().await;
        let full_page: Vec<serde_json::Value> = (0..PER_PAGE as u64)
            .map(|n| {
                let created = if n < 2 {
                    now() - Duration::days(n as i64 + 1)
                } else {
                    now() - Duration::days(45)
                };
                pr_json(n + 1, "open", created, false)
            })
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls")))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&full_page))
            .expect(1)
            .mount(&server)
            .await;

        // Page one ends in-window data; page two must never be requested.
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls")))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        for n in 1..=2 {
            Mock::given(method("GET"))
                .and(path(format!("{REPO_PATH}/pulls/{n}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"additions": 10, "deletions": n})),
                )
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("{REPO_PATH}/pulls/{n}/reviews")))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
                .expect(1)
                .mount(&server)
                .await;
        }

        let prs = adapter(&server)
            .await
            .fetch_pull_requests(&window(), &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = prs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["PR-1", "PR-2"]);
        assert_eq!(prs[0].lines_changed, 11);
        assert_eq!(prs[1].lines_changed, 12);
    }

    #[tokio::test]
    async fn review_and_detail_failures_degrade_single_pr() {
        let server = MockServer::start().await;
        let created = now() - Duration::days(1);

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([pr_json(5, "closed", created, true)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls/5")))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls/5/reviews")))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let prs = adapter(&server)
            .await
            .fetch_pull_requests(&window(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].status, PrStatus::Merged);
        assert_eq!(prs[0].lines_changed, 0);
        assert!(prs[0].reviewers.is_empty());
        assert_eq!(prs[0].first_review_at, None);
    }

    #[tokio::test]
    async fn cancellation_during_enrichment_aborts_collection() {
        let server = MockServer::start().await;
        let created = now() - Duration::days(1);

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([pr_json(1, "open", created, false)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls/1")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"additions": 1, "deletions": 1}))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls/1/reviews")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                cancel.cancel();
            }
        });

        let result = adapter(&server)
            .await
            .fetch_pull_requests(&window(), &cancel)
            .await;
        assert!(matches!(result, Err(SourceError::Cancelled)), "got: {result:?}");
    }

    #[tokio::test]
    async fn listing_failure_fails_collection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pulls")))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .await
            .fetch_pull_requests(&window(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::HttpError { .. }));
    }

    #[test]
    fn first_verdict_in_provider_order() {
        let created = now() - Duration::days(2);
        let pr: GitHubPullRequest =
            serde_json::from_value(pr_json(1, "open", created, false)).unwrap();
        let reviews: Vec<GitHubReview> = serde_json::from_value(serde_json::json!([
            {"user": {"login": "bob"}, "state": "COMMENTED", "submitted_at": iso(created + Duration::hours(1))},
            {"user": {"login": "cy"}, "state": "CHANGES_REQUESTED", "submitted_at": iso(created + Duration::hours(3))},
            {"user": {"login": "bob"}, "state": "APPROVED", "submitted_at": iso(created + Duration::hours(2))}
        ]))
        .unwrap();

        let mapped = map_pull_request(&pr, 0, &reviews);
        assert_eq!(mapped.first_review_at, Some(created + Duration::hours(3)));
        assert_eq!(
            mapped.reviewers.iter().cloned().collect::<Vec<_>>(),
            vec!["bob".to_string(), "cy".to_string()]
        );
        assert_eq!(mapped.status, PrStatus::Open);
    }

    #[test]
    fn closed_unmerged_pr_keeps_close_time() {
        let created = now() - Duration::days(2);
        let pr: GitHubPullRequest =
            serde_json::from_value(pr_json(4, "closed", created, false)).unwrap();

        let mapped = map_pull_request(&pr, 0, &[]);
        assert_eq!(mapped.status, PrStatus::Closed);
        assert_eq!(mapped.merged_at, None);
        assert_eq!(mapped.closed_at, Some(created + Duration::hours(10)));
    }
}
