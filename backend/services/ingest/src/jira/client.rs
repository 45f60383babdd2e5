use pulse_common::{PulseError, PulseResult};
use pulse_config::env::{get_var, get_var_or, parse_csv, require_var};
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use super::models::JiraSearchResponse;
use crate::http::{Credentials, HttpSettings, SourceError, SourceHttp};

pub const MAX_RESULTS: usize = 100;

const DEFAULT_STORY_POINTS_FIELD: &str = "customfield_10016";

#[derive(Debug, Clone)]
pub struct JiraClientConfig {
    pub base_url: String,
    /// Email on Cloud, user name on Server/DC. Absent means bearer auth.
    pub username: Option<String>,
    pub token: String,
    pub project_keys: Vec<String>,
    pub is_cloud: bool,
    pub story_points_field: String,
    pub http: HttpSettings,
}

impl JiraClientConfig {
    /// Load Jira config from environment.
    ///
    /// Returns `Ok(None)` if `JIRA_URL` / `JIRA_TOKEN` are missing.
    /// Returns `Err` if Jira IS configured but `JIRA_PROJECT` is missing or empty.
    pub fn from_env() -> PulseResult<Option<Self>> {
        let (Some(base_url), Some(token)) = (get_var("JIRA_URL"), get_var("JIRA_TOKEN")) else {
            return Ok(None);
        };

        let project_keys = parse_project_keys(&require_var("JIRA_PROJECT")?)?;

        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: get_var("JIRA_USERNAME"),
            token,
            project_keys,
            is_cloud: get_var_or("JIRA_IS_CLOUD", "false").eq_ignore_ascii_case("true"),
            story_points_field: get_var_or("JIRA_STORY_POINTS_FIELD", DEFAULT_STORY_POINTS_FIELD),
            http: HttpSettings::from_env("JIRA")?,
        }))
    }
}

/// Split a comma-separated project list, upper-casing each key.
pub fn parse_project_keys(raw: &str) -> PulseResult<Vec<String>> {
    let keys: Vec<String> = parse_csv(raw).into_iter().map(|k| k.to_uppercase()).collect();
    if keys.is_empty() {
        return Err(PulseError::Config(
            "JIRA_PROJECT is set but contains no valid project keys".to_string(),
        ));
    }
    Ok(keys)
}

#[derive(Clone)]
pub struct JiraClient {
    http: SourceHttp,
    config: JiraClientConfig,
}

impl JiraClient {
    pub fn new(config: JiraClientConfig) -> PulseResult<Self> {
        let credentials = Credentials::new(config.username.clone(), config.token.clone());
        let http = SourceHttp::new(credentials, &config.http, HeaderMap::new())
            .map_err(|e| PulseError::Config(format!("jira http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// For testing: point the client at a mock server.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn config(&self) -> &JiraClientConfig {
        &self.config
    }

    fn search_url(&self) -> String {
        let version = if self.config.is_cloud { 3 } else { 2 };
        format!("{}/rest/api/{version}/search", self.config.base_url)
    }

    /// One page of issues matching `jql`, with changelogs expanded.
    pub async fn search_page(
        &self,
        jql: &str,
        start_at: usize,
        cancel: &CancellationToken,
    ) -> Result<JiraSearchResponse, SourceError> {
        let query = [
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", MAX_RESULTS.to_string()),
            ("expand", "changelog".to_string()),
        ];
        self.http.get_json(&self.search_url(), &query, cancel).await
    }
}
