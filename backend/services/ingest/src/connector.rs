use async_trait::async_trait;
use pulse_common::{Commit, PullRequest, Story};
use tokio_util::sync::CancellationToken;

use crate::http::SourceError;
use crate::window::TimeWindow;

/// A provider that yields canonical records for a time window.
///
/// Each adapter overrides only the operations its provider supports; the
/// rest yield nothing.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_name(&self) -> &str;

    async fn fetch_commits(
        &self,
        _window: &TimeWindow,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Commit>, SourceError> {
        Ok(Vec::new())
    }

    async fn fetch_pull_requests(
        &self,
        _window: &TimeWindow,
        _cancel: &CancellationToken,
    ) -> Result<Vec<PullRequest>, SourceError> {
        Ok(Vec::new())
    }

    async fn fetch_issues(
        &self,
        _window: &TimeWindow,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Story>, SourceError> {
        Ok(Vec::new())
    }
}
