use chrono::{DateTime, SecondsFormat, Utc};
use pulse_common::{PulseError, PulseResult};
use pulse_config::env::{get_var, require_var};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tokio_util::sync::CancellationToken;

use super::models::{
    GitHubBranch, GitHubCommit, GitHubPullRequest, GitHubPullRequestDetail, GitHubReview,
};
use crate::http::{Credentials, HttpSettings, SourceError, SourceHttp};

pub const PER_PAGE: usize = 100;

const PUBLIC_API: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// API root: the public API, or `<host>/api/v3` for Enterprise.
    pub api_url: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub http: HttpSettings,
}

impl GitHubClientConfig {
    /// Load GitHub config from environment.
    ///
    /// Returns `Ok(None)` when `GITHUB_TOKEN` is absent. `GITHUB_URL` is only
    /// needed for Enterprise installs.
    pub fn from_env() -> PulseResult<Option<Self>> {
        let Some(token) = get_var("GITHUB_TOKEN") else {
            return Ok(None);
        };

        Ok(Some(Self {
            api_url: api_url(get_var("GITHUB_URL").as_deref()),
            token,
            owner: require_var("GITHUB_OWNER")?,
            repo: require_var("GITHUB_REPO")?,
            http: HttpSettings::from_env("GITHUB")?,
        }))
    }
}

/// Resolve the API root from an optional host URL.
pub fn api_url(host: Option<&str>) -> String {
    match host.map(|h| h.trim_end_matches('/')) {
        None | Some("") => PUBLIC_API.to_string(),
        Some(h) if h == PUBLIC_API || h == "https://github.com" => PUBLIC_API.to_string(),
        Some(h) if h.ends_with("/api/v3") => h.to_string(),
        Some(h) => format!("{h}/api/v3"),
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    http: SourceHttp,
    config: GitHubClientConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> PulseResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let credentials = Credentials::new(None, config.token.clone());
        let http = SourceHttp::new(credentials, &config.http, headers)
            .map_err(|e| PulseError::Config(format!("github http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// For testing: point the client at a mock server.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.api_url = base_url.to_string();
        self
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.config.api_url, self.config.owner, self.config.repo
        )
    }

    pub async fn fetch_branches(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<GitHubBranch>, SourceError> {
        let url = format!("{}/branches", self.repo_url());
        let mut page: u32 = 1;
        let mut branches = Vec::new();

        loop {
            let batch: Vec<GitHubBranch> =
                self.http.get_json(&url, &paging(page), cancel).await?;
            let batch_len = batch.len();
            branches.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(branches)
    }

    /// One page of commits on `branch` authored since `since`, newest first.
    pub async fn fetch_commits_page(
        &self,
        branch: &str,
        since: DateTime<Utc>,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<GitHubCommit>, SourceError> {
        let url = format!("{}/commits", self.repo_url());
        let mut query = paging(page);
        query.push(("sha", branch.to_string()));
        query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        self.http.get_json(&url, &query, cancel).await
    }

    /// One page of pull requests in any state, newest first.
    pub async fn fetch_pull_requests_page(
        &self,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<GitHubPullRequest>, SourceError> {
        let url = format!("{}/pulls", self.repo_url());
        let mut query = paging(page);
        query.push(("state", "all".to_string()));
        query.push(("sort", "created".to_string()));
        query.push(("direction", "desc".to_string()));
        self.http.get_json(&url, &query, cancel).await
    }

    pub async fn fetch_pull_request(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<GitHubPullRequestDetail, SourceError> {
        let url = format!("{}/pulls/{number}", self.repo_url());
        self.http.get_json(&url, &[], cancel).await
    }

    /// Every review on a pull request, in submission order.
    pub async fn fetch_reviews(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<GitHubReview>, SourceError> {
        let url = format!("{}/pulls/{number}/reviews", self.repo_url());
        let mut page = 1;
        let mut reviews = Vec::new();

        loop {
            let batch: Vec<GitHubReview> =
                self.http.get_json(&url, &paging(page), cancel).await?;
            let batch_len = batch.len();
            reviews.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(reviews)
    }
}

fn paging(page: u32) -> Vec<(&'static str, String)> {
    vec![
        ("per_page", PER_PAGE.to_string()),
        ("page", page.to_string()),
    ]
}
