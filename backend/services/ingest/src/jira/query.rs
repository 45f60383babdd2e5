use chrono::{DateTime, Duration, Utc};

/// Build the issue search JQL for a set of projects and a creation lower bound.
///
/// Generates: `project in (KEY1, KEY2) AND created >= "2026-02-15 00:00" ORDER BY created DESC`
///
/// JQL dates are read in the searching user's time zone, so the bound is pulled
/// back one day; callers filter the results against the exact window.
pub fn build_issue_search_jql(project_keys: &[String], created_after: DateTime<Utc>) -> String {
    let lower = created_after - Duration::days(1);
    let projects_clause = project_in_clause(project_keys);
    let created_clause = format!("created >= \"{}\"", lower.format("%Y-%m-%d %H:%M"));
    format!("{projects_clause} AND {created_clause} ORDER BY created DESC")
}

fn project_in_clause(keys: &[String]) -> String {
    let escaped: Vec<String> = keys.iter().map(|k| escape_jql_value(k)).collect();
    format!("project in ({})", escaped.join(", "))
}

/// Quote a JQL value unless it is a bare identifier.
fn escape_jql_value(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn single_project_key() {
        let keys = vec!["DEV".to_string()];
        let after = Utc.with_ymd_and_hms(2026, 2, 16, 0, 0, 0).unwrap();
        assert_eq!(
            build_issue_search_jql(&keys, after),
            "project in (DEV) AND created >= \"2026-02-15 00:00\" ORDER BY created DESC"
        );
    }

    #[test]
    fn several_project_keys_keep_order() {
        let keys = vec!["DEV".to_string(), "OPS".to_string(), "INFRA".to_string()];
        let after = Utc.with_ymd_and_hms(2026, 1, 2, 12, 30, 0).unwrap();
        assert_eq!(
            build_issue_search_jql(&keys, after),
            "project in (DEV, OPS, INFRA) AND created >= \"2026-01-01 12:30\" ORDER BY created DESC"
        );
    }

    #[test]
    fn key_with_hyphen_is_quoted() {
        assert_eq!(escape_jql_value("MY-PROJ"), "\"MY-PROJ\"");
        assert_eq!(escape_jql_value("DEV"), "DEV");
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(escape_jql_value(r#"A"B\C"#), r#""A\"B\\C""#);
        assert_eq!(escape_jql_value(""), "\"\"");
    }
}
