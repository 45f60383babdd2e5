use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_common::{Story, UNASSIGNED};
use pulse_metrics::classify::is_in_progress_status;
use tokio_util::sync::CancellationToken;

use super::client::{JiraClient, MAX_RESULTS};
use super::models::JiraIssue;
use super::query::build_issue_search_jql;
use crate::connector::SourceAdapter;
use crate::http::SourceError;
use crate::window::TimeWindow;

const SECONDS_PER_HOUR: f64 = 3600.0;

pub struct JiraAdapter {
    client: JiraClient,
}

impl JiraAdapter {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for JiraAdapter {
    fn source_name(&self) -> &str {
        "jira"
    }

    async fn fetch_issues(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Story>, SourceError> {
        let config = self.client.config();
        let jql = build_issue_search_jql(&config.project_keys, window.since());
        tracing::debug!(%jql, "searching jira issues");

        let mut start_at = 0;
        let mut stories = Vec::new();

        loop {
            let page = self.client.search_page(&jql, start_at, cancel).await?;
            let page_len = page.issues.len();
            tracing::debug!(start_at = page.start_at, total = page.total, page_len, "jira search page");

            stories.extend(
                page.issues
                    .iter()
                    .map(|issue| map_issue(issue, config.is_cloud, &config.story_points_field))
                    .filter(|story| window.contains(story.created_at)),
            );

            if page_len < MAX_RESULTS {
                break;
            }
            start_at += MAX_RESULTS;
        }

        tracing::info!(source = "jira", count = stories.len(), "fetched issues");
        Ok(stories)
    }
}

fn map_issue(issue: &JiraIssue, is_cloud: bool, story_points_field: &str) -> Story {
    let fields = &issue.fields;

    let estimate = match fields.number(story_points_field) {
        Some(points) if points > 0.0 => points,
        _ => hours(fields.timeestimate),
    };

    Story {
        key: issue.key.clone(),
        assignee: assignee_name(issue, is_cloud),
        created_at: fields.created,
        started_at: first_in_progress(issue),
        completed_at: fields.resolutiondate,
        estimate,
        actual_effort: hours(fields.timespent),
        status: fields.status.name.clone(),
    }
}

fn assignee_name(issue: &JiraIssue, is_cloud: bool) -> String {
    let Some(user) = issue.fields.assignee.as_ref() else {
        return UNASSIGNED.to_string();
    };
    let (preferred, fallback) = if is_cloud {
        (&user.display_name, &user.name)
    } else {
        (&user.name, &user.display_name)
    };
    preferred
        .as_deref()
        .or(fallback.as_deref())
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNASSIGNED.to_string())
}

/// Earliest transition into an in-progress status.
fn first_in_progress(issue: &JiraIssue) -> Option<DateTime<Utc>> {
    issue
        .changelog
        .as_ref()?
        .histories
        .iter()
        .filter(|h| {
            h.items.iter().any(|item| {
                item.field.eq_ignore_ascii_case("status")
                    && item.to_status.as_deref().is_some_and(is_in_progress_status)
            })
        })
        .map(|h| h.created)
        .min()
}

fn hours(seconds: Option<i64>) -> f64 {
    match seconds {
        Some(s) if s > 0 => s as f64 / SECONDS_PER_HOUR,
        _ => 0.0,
    }
}
