use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// An item of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    /// The linked GitHub account; absent for unrecognised emails.
    pub author: Option<GitHubUser>,
    pub commit: GitHubCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitDetail {
    pub author: Option<GitHubSignature>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSignature {
    pub name: Option<String>,
    pub date: DateTime<Utc>,
}

impl GitHubCommit {
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit.author.as_ref().map(|a| a.date)
    }

    /// Account login, then the git author name.
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(|u| u.login.clone())
            .or_else(|| self.commit.author.as_ref().and_then(|a| a.name.clone()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub number: u64,
    pub state: String,
    pub user: Option<GitHubUser>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// The fields of `GET /pulls/{n}` the listing omits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubPullRequestDetail {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubReview {
    pub user: Option<GitHubUser>,
    pub state: String,
    /// Pending reviews have not been submitted yet.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl GitHubReview {
    pub fn is_verdict(&self) -> bool {
        self.state == "APPROVED" || self.state == "CHANGES_REQUESTED"
    }
}
