//! Testing infrastructure for plansync.
//!
//! - **Mocks**: an in-memory [`IssueTracker`](crate::tracker::IssueTracker)
//!   with failure injection
//! - **Fixtures**: temporary project trees (test-only)
//!
//! # Example
//!
//! ```rust,ignore
//! use plansync::testing::{MockIssueTracker, ProjectFixture};
//! use plansync::tracker::IssueState;
//!
//! let tracker = MockIssueTracker::new()
//!     .with_issue(1, "[Alpha] Login", IssueState::Closed, &["phase-alpha"])
//!     .with_failing_issue(2);
//!
//! let fixture = ProjectFixture::new(SyncConfig::default())
//!     .with_document("alpha.md", "### ☐ Login\n");
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod mocks;

#[cfg(test)]
pub use fixtures::*;
pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{IssueState, IssueTracker, StateFilter};

    // =========================================================================
    // Mock Issue Tracker Tests
    // =========================================================================

    #[test]
    fn test_mock_tracker_default_is_empty() {
        let tracker = MockIssueTracker::default();
        assert!(tracker.list_issues(StateFilter::All).unwrap().is_empty());
        assert!(tracker.labels().is_empty());
    }

    #[test]
    fn test_mock_tracker_filters_by_state() {
        let tracker = MockIssueTracker::new()
            .with_issue(1, "a", IssueState::Open, &[])
            .with_issue(2, "b", IssueState::Closed, &[]);
        assert_eq!(tracker.list_issues(StateFilter::Open).unwrap()[0].id, 1);
        assert_eq!(tracker.list_issues(StateFilter::Closed).unwrap()[0].id, 2);
        assert_eq!(tracker.list_issues(StateFilter::All).unwrap().len(), 2);
    }

    #[test]
    fn test_mock_tracker_create_assigns_ids() {
        let tracker = MockIssueTracker::new().with_issue(5, "a", IssueState::Open, &[]);
        let created = tracker
            .create_issue("b", "body", &["phase-alpha".to_string()])
            .unwrap();
        assert_eq!(created.id, 6);
        assert_eq!(created.phase.as_deref(), Some("alpha"));
        assert_eq!(tracker.issues().len(), 2);
    }

    #[test]
    fn test_mock_tracker_state_changes() {
        let tracker = MockIssueTracker::new().with_issue(1, "a", IssueState::Open, &[]);
        tracker.set_issue_state(1, IssueState::Closed).unwrap();
        assert_eq!(tracker.issue(1).unwrap().state, IssueState::Closed);
        assert_eq!(tracker.state_changes(), vec![(1, IssueState::Closed)]);
        assert!(tracker.set_issue_state(99, IssueState::Open).is_err());
    }

    #[test]
    fn test_mock_tracker_failure_injection() {
        let tracker = MockIssueTracker::new()
            .with_issue(1, "a", IssueState::Open, &[])
            .with_failing_issue(1)
            .with_failing_create("bad");
        assert!(tracker.set_issue_state(1, IssueState::Closed).is_err());
        assert!(tracker.create_issue("bad", "", &[]).is_err());
        assert!(tracker.state_changes().is_empty());

        let broken = MockIssueTracker::new().with_list_error("offline");
        let err = broken.list_issues(StateFilter::All).unwrap_err();
        assert!(err.to_string().contains("offline"));
    }
}
