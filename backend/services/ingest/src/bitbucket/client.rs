use pulse_common::{PulseError, PulseResult};
use pulse_config::env::{get_var, require_var};
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use super::models::{
    BitbucketBranch, BitbucketCommit, BitbucketDiff, BitbucketPage, BitbucketPullRequest,
};
use crate::http::{Credentials, HttpSettings, SourceError, SourceHttp};

const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
pub struct BitbucketClientConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub token: String,
    pub project: String,
    pub repo: String,
    pub http: HttpSettings,
}

impl BitbucketClientConfig {
    /// Load Bitbucket config from environment.
    ///
    /// Returns `Ok(None)` when `BITBUCKET_URL` / `BITBUCKET_TOKEN` are absent, and
    /// `Err` when they are set but the project or repository is missing.
    pub fn from_env() -> PulseResult<Option<Self>> {
        let (Some(base_url), Some(token)) = (get_var("BITBUCKET_URL"), get_var("BITBUCKET_TOKEN"))
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: get_var("BITBUCKET_USERNAME"),
            token,
            project: require_var("BITBUCKET_PROJECT")?,
            repo: require_var("BITBUCKET_REPO")?,
            http: HttpSettings::from_env("BITBUCKET")?,
        }))
    }
}

#[derive(Clone)]
pub struct BitbucketClient {
    http: SourceHttp,
    config: BitbucketClientConfig,
}

impl BitbucketClient {
    pub fn new(config: BitbucketClientConfig) -> PulseResult<Self> {
        let credentials = Credentials::new(config.username.clone(), config.token.clone());
        let http = SourceHttp::new(credentials, &config.http, HeaderMap::new())
            .map_err(|e| PulseError::Config(format!("bitbucket http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// For testing: point the client at a mock server.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/rest/api/1.0/projects/{}/repos/{}",
            self.config.base_url, self.config.project, self.config.repo
        )
    }

    /// Every branch of the repository, across all pages.
    pub async fn fetch_branches(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<BitbucketBranch>, SourceError> {
        let url = format!("{}/branches", self.repo_url());
        let mut start = 0;
        let mut branches = Vec::new();

        loop {
            let page: BitbucketPage<BitbucketBranch> = self
                .http
                .get_json(&url, &paging(start), cancel)
                .await?;
            let next = page.next_start();
            branches.extend(page.values);

            match next {
                Some(n) => start = n,
                None => break,
            }
        }

        Ok(branches)
    }

    /// One page of commits reachable from `branch_id`, newest first.
    pub async fn fetch_commits_page(
        &self,
        branch_id: &str,
        start: u64,
        cancel: &CancellationToken,
    ) -> Result<BitbucketPage<BitbucketCommit>, SourceError> {
        let url = format!("{}/commits", self.repo_url());
        let mut query = paging(start);
        query.push(("until", branch_id.to_string()));
        self.http.get_json(&url, &query, cancel).await
    }

    /// One page of pull requests in any state.
    pub async fn fetch_pull_requests_page(
        &self,
        start: u64,
        cancel: &CancellationToken,
    ) -> Result<BitbucketPage<BitbucketPullRequest>, SourceError> {
        let url = format!("{}/pull-requests", self.repo_url());
        let mut query = paging(start);
        query.push(("state", "ALL".to_string()));
        self.http.get_json(&url, &query, cancel).await
    }

    pub async fn fetch_diff(
        &self,
        pr_id: u64,
        cancel: &CancellationToken,
    ) -> Result<BitbucketDiff, SourceError> {
        let url = format!("{}/pull-requests/{pr_id}/diff", self.repo_url());
        self.http.get_json(&url, &[], cancel).await
    }
}

fn paging(start: u64) -> Vec<(&'static str, String)> {
    vec![
        ("start", start.to_string()),
        ("limit", PAGE_LIMIT.to_string()),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use crate::retry::RetryPolicy;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const REPO_PATH: &str = "/rest/api/1.0/projects/PROJ/repos/app";

    pub(crate) fn test_config() -> BitbucketClientConfig {
        BitbucketClientConfig {
            base_url: "http://localhost".to_string(),
            username: None,
            token: "fake-token".to_string(),
            project: "PROJ".to_string(),
            repo: "app".to_string(),
            http: HttpSettings {
                timeout_secs: 5,
                retry: RetryPolicy {
                    max_retries: 2,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(5),
                },
            },
        }
    }

    fn branch(id: usize) -> serde_json::Value {
        serde_json::json!({
            "id": format!("refs/heads/b{id}"),
            "displayId": format!("b{id}")
        })
    }

    #[tokio::test]
    async fn fetch_branches_follows_next_page_start() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/branches")))
            .and(query_param("start", "0"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [branch(0), branch(1)],
                "isLastPage": false,
                "nextPageStart": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/branches")))
            .and(query_param("start", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [branch(2)],
                "isLastPage": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BitbucketClient::new(test_config())
            .unwrap()
            .with_base_url(&server.uri());

        let branches = client
            .fetch_branches(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[2].display_id, "b2");
    }

    #[tokio::test]
    async fn pull_request_listing_requests_all_states() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/pull-requests")))
            .and(query_param("state", "ALL"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [],
                "isLastPage": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BitbucketClient::new(test_config())
            .unwrap()
            .with_base_url(&server.uri());

        let page = client
            .fetch_pull_requests_page(0, &CancellationToken::new())
            .await
            .unwrap();
        assert!(page.values.is_empty());
        assert_eq!(page.next_start(), None);
    }

    #[tokio::test]
    async fn fails_fast_on_401() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/branches")))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .expect(1)
            .mount(&server)
            .await;

        let client = BitbucketClient::new(test_config())
            .unwrap()
            .with_base_url(&server.uri());

        let err = client
            .fetch_branches(&CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            SourceError::HttpError { status, body } => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("expected HttpError, got: {other:?}"),
        }
    }
}
