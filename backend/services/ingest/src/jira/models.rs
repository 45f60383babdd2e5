use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer};

/// Response of `/rest/api/{2,3}/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraSearchResponse {
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: JiraIssueFields,
    pub changelog: Option<JiraChangelog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssueFields {
    pub status: JiraStatus,
    pub assignee: Option<JiraUserRef>,
    #[serde(deserialize_with = "de_jira_time")]
    pub created: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_jira_time_opt")]
    pub resolutiondate: Option<DateTime<Utc>>,
    /// Remaining estimate, in seconds.
    pub timeestimate: Option<i64>,
    /// Logged work, in seconds.
    pub timespent: Option<i64>,
    /// Everything else, including custom fields such as story points.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl JiraIssueFields {
    /// A numeric custom field, if present and set.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.extra.get(field).and_then(serde_json::Value::as_f64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraStatus {
    pub name: String,
}

/// Assignee reference. Cloud populates `displayName`, Server/DC `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUserRef {
    pub display_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraChangelog {
    #[serde(default)]
    pub histories: Vec<JiraHistory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraHistory {
    #[serde(deserialize_with = "de_jira_time")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<JiraChangeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraChangeItem {
    pub field: String,
    #[serde(rename = "toString")]
    pub to_status: Option<String>,
}

/// Parse a Jira timestamp: RFC 3339, or the `2026-03-01T10:00:00.000+0000` form.
pub fn parse_jira_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn de_jira_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_jira_time(&raw).ok_or_else(|| de::Error::custom(format!("invalid Jira timestamp: {raw}")))
}

fn de_jira_time_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_jira_time(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid Jira timestamp: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_both_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_jira_time("2026-03-01T10:00:00.000+0000"), Some(expected));
        assert_eq!(parse_jira_time("2026-03-01T12:00:00.000+0200"), Some(expected));
        assert_eq!(parse_jira_time("2026-03-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_jira_time("2026-03-01T10:00:00+00:00"), Some(expected));
        assert_eq!(parse_jira_time("yesterday"), None);
    }

    #[test]
    fn deserialize_issue_with_custom_field() {
        let json = r#"{
            "key": "DEV-1",
            "fields": {
                "status": {"name": "In Progress"},
                "assignee": {"displayName": "Ana Lima", "name": "ana"},
                "created": "2026-03-01T10:00:00.000+0000",
                "resolutiondate": null,
                "timeestimate": 7200,
                "timespent": null,
                "customfield_10016": 5.0,
                "summary": "Do the thing"
            },
            "changelog": {"histories": [
                {"created": "2026-03-02T09:00:00.000+0000",
                 "items": [{"field": "status", "fromString": "To Do", "toString": "In Progress"}]}
            ]}
        }"#;
        let issue: JiraIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.key, "DEV-1");
        assert_eq!(issue.fields.number("customfield_10016"), Some(5.0));
        assert_eq!(issue.fields.number("customfield_99999"), None);
        assert_eq!(issue.fields.timeestimate, Some(7200));
        assert!(issue.fields.resolutiondate.is_none());
        let histories = &issue.changelog.unwrap().histories;
        assert_eq!(histories[0].items[0].to_status.as_deref(), Some("In Progress"));
    }

    #[test]
    fn deserialize_minimal_issue() {
        let json = r#"{
            "key": "OPS-9",
            "fields": {"status": {"name": "Done"}, "created": "2026-03-01T10:00:00Z"}
        }"#;
        let issue: JiraIssue = serde_json::from_str(json).unwrap();
        assert!(issue.fields.assignee.is_none());
        assert!(issue.changelog.is_none());
        assert!(issue.fields.timespent.is_none());
    }

    #[test]
    fn rejects_unparseable_created() {
        let json = r#"{"key": "X-1", "fields": {"status": {"name": "Done"}, "created": "soon"}}"#;
        assert!(serde_json::from_str::<JiraIssue>(json).is_err());
    }
}
