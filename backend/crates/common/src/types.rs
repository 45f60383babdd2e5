use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assignee recorded for stories the tracker reports without one.
pub const UNASSIGNED: &str = "Unassigned";

/// One source-control commit, regardless of which provider produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    /// Display name or login. Not a stable user id.
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    /// Zero when the provider does not expose diff stats cheaply.
    pub lines_added: u64,
    pub lines_deleted: u64,
}

/// Normalized pull/merge request state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrStatus {
    Open,
    Merged,
    /// Closed without merging. Covers Bitbucket's `DECLINED`.
    Closed,
    /// Any provider state outside the three above; kept for diagnostics only.
    Unknown(String),
}

impl PrStatus {
    /// Map a provider state string, ignoring case.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OPEN" | "OPENED" => Self::Open,
            "MERGED" => Self::Merged,
            "CLOSED" | "DECLINED" => Self::Closed,
            _ => Self::Unknown(raw.to_string()),
        }
    }
}

/// One merge/pull request. `id` is source-prefixed (e.g. `PR-42`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Earliest approve / request-changes decision. Never before `created_at`.
    pub first_review_at: Option<DateTime<Utc>>,
    pub lines_changed: u64,
    pub status: PrStatus,
    pub reviewers: BTreeSet<String>,
}

/// One tracked unit of work (issue / ticket).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub key: String,
    pub assignee: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Hours. Zero means unknown.
    pub estimate: f64,
    /// Hours. Zero means unknown.
    pub actual_effort: f64,
    /// Raw workflow status name from the tracker.
    pub status: String,
}

/// Keep `ts` only when it does not precede `floor`.
pub fn not_before(ts: Option<DateTime<Utc>>, floor: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ts.map(|t| t.max(floor))
}
