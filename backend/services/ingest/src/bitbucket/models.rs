use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of a Bitbucket Server paged listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketPage<T> {
    pub values: Vec<T>,
    #[serde(default)]
    pub is_last_page: bool,
    pub next_page_start: Option<u64>,
}

impl<T> BitbucketPage<T> {
    /// Offset of the following page, or `None` when this is the last one.
    pub fn next_start(&self) -> Option<u64> {
        if self.is_last_page {
            None
        } else {
            self.next_page_start
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketBranch {
    pub id: String,
    pub display_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketCommit {
    pub id: String,
    pub author: BitbucketPerson,
    /// Epoch milliseconds.
    pub author_timestamp: i64,
    #[serde(default)]
    pub message: String,
}

impl BitbucketCommit {
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.author_timestamp)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketPerson {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketUser {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketParticipant {
    pub user: BitbucketUser,
    #[serde(default)]
    pub approved: bool,
    pub status: Option<String>,
}

impl BitbucketParticipant {
    /// Whether the reviewer has left a verdict on the PR.
    pub fn has_reviewed(&self) -> bool {
        self.approved
            || matches!(
                self.status.as_deref(),
                Some("APPROVED") | Some("NEEDS_WORK")
            )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketPullRequest {
    pub id: u64,
    pub state: String,
    pub created_date: i64,
    pub updated_date: i64,
    pub closed_date: Option<i64>,
    pub author: BitbucketParticipant,
    #[serde(default)]
    pub reviewers: Vec<BitbucketParticipant>,
}

impl BitbucketPullRequest {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_date)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_date)
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_date.and_then(DateTime::from_timestamp_millis)
    }
}

/// Response of `/pull-requests/{id}/diff`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitbucketDiff {
    #[serde(default)]
    pub diffs: Vec<BitbucketFileDiff>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitbucketFileDiff {
    #[serde(default)]
    pub hunks: Vec<BitbucketHunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitbucketHunk {
    #[serde(default)]
    pub segments: Vec<BitbucketSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitbucketSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub lines: Vec<serde_json::Value>,
}

impl BitbucketDiff {
    /// Lines inside `ADDED` and `REMOVED` segments.
    pub fn lines_changed(&self) -> u64 {
        self.diffs
            .iter()
            .flat_map(|d| &d.hunks)
            .flat_map(|h| &h.segments)
            .filter(|s| s.kind == "ADDED" || s.kind == "REMOVED")
            .map(|s| s.lines.len() as u64)
            .sum()
    }
}
