/// Story status classification.
///
/// Workflow vocabularies differ per tracker configuration, so a status counts as
/// completed when its lower-cased name contains any of these fragments.
pub const COMPLETED_STATUS_FRAGMENTS: &[&str] = &["done", "completed", "resolved"];

/// Changelog destination states that mark the start of active work.
pub const IN_PROGRESS_STATUS_FRAGMENTS: &[&str] = &["progress", "development"];

pub fn is_completed_status(status: &str) -> bool {
    contains_any(status, COMPLETED_STATUS_FRAGMENTS)
}

pub fn is_in_progress_status(status: &str) -> bool {
    contains_any(status, IN_PROGRESS_STATUS_FRAGMENTS)
}

fn contains_any(status: &str, fragments: &[&str]) -> bool {
    let lowered = status.to_lowercase();
    fragments.iter().any(|f| lowered.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_variants_are_completed() {
        assert!(is_completed_status("Done"));
        assert!(is_completed_status("DONE"));
        assert!(is_completed_status("Completed"));
        assert!(is_completed_status("Resolved"));
        assert!(is_completed_status("Won't Do / Done"));
    }

    #[test]
    fn open_states_are_not_completed() {
        assert!(!is_completed_status("To Do"));
        assert!(!is_completed_status("In Progress"));
        assert!(!is_completed_status("Code Review"));
    }

    #[test]
    fn in_progress_variants() {
        assert!(is_in_progress_status("In Progress"));
        assert!(is_in_progress_status("IN DEVELOPMENT"));
        assert!(!is_in_progress_status("Selected for Sprint"));
    }

    #[test]
    fn no_overlap_between_fragment_lists() {
        for f in COMPLETED_STATUS_FRAGMENTS {
            assert!(
                !IN_PROGRESS_STATUS_FRAGMENTS.contains(f),
                "{f} appears in both lists"
            );
        }
    }
}
