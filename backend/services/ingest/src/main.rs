mod bitbucket;
mod connector;
mod github;
mod http;
mod jira;
mod pipeline;
mod retry;
mod window;

use std::process::ExitCode;

use pulse_common::PulseResult;
use pulse_config::{init_tracing, AppConfig};
use pulse_metrics::compose_report;
use tokio_util::sync::CancellationToken;

use crate::bitbucket::adapter::BitbucketAdapter;
use crate::bitbucket::client::{BitbucketClient, BitbucketClientConfig};
use crate::connector::SourceAdapter;
use crate::github::adapter::GitHubAdapter;
use crate::github::client::{GitHubClient, GitHubClientConfig};
use crate::jira::adapter::JiraAdapter;
use crate::jira::client::{JiraClient, JiraClientConfig};
use crate::window::TimeWindow;

/// Serialises tests that mutate process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[tokio::main]
async fn main() -> ExitCode {
    // Config first so LOG_LEVEL may come from .env.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    tracing::info!(service = "pulse-ingest", "starting");

    let adapters = match build_adapters(&config) {
        Ok(adapters) => adapters,
        Err(e) => {
            tracing::error!(error = %e, "source configuration failed");
            return ExitCode::FAILURE;
        }
    };
    if adapters.is_empty() {
        tracing::warn!("no sources configured, the report will be empty");
    }

    let cancel = CancellationToken::new();
    let deadline = tokio::spawn({
        let cancel = cancel.clone();
        let timeout = config.run_timeout();
        async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "run deadline reached, cancelling");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("interrupted, cancelling");
                }
            }
            cancel.cancel();
        }
    });

    let window = TimeWindow::trailing_days(config.window_days);
    tracing::info!(
        window_days = config.window_days,
        since = %window.since(),
        sources = adapters.len(),
        "collecting"
    );

    let collected = pipeline::collect(&adapters, &window, &cancel).await;
    deadline.abort();

    let report = compose_report(
        &collected.commits,
        &collected.pull_requests,
        &collected.stories,
    );

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize report");
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(failures = collected.failures, "collection finished");
    ExitCode::SUCCESS
}

/// Build an adapter for every configured source.
fn build_adapters(config: &AppConfig) -> PulseResult<Vec<Box<dyn SourceAdapter>>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();

    if let Some(bb) = BitbucketClientConfig::from_env()? {
        tracing::info!(project = %bb.project, repo = %bb.repo, "bitbucket source configured");
        adapters.push(Box::new(BitbucketAdapter::new(
            BitbucketClient::new(bb)?,
            config.max_concurrency,
        )));
    }

    if let Some(gh) = GitHubClientConfig::from_env()? {
        tracing::info!(owner = %gh.owner, repo = %gh.repo, "github source configured");
        adapters.push(Box::new(GitHubAdapter::new(
            GitHubClient::new(gh)?,
            config.max_concurrency,
        )));
    }

    if let Some(jira) = JiraClientConfig::from_env()? {
        tracing::info!(projects = ?jira.project_keys, cloud = jira.is_cloud, "jira source configured");
        adapters.push(Box::new(JiraAdapter::new(JiraClient::new(jira)?)));
    }

    Ok(adapters)
}
