//! Aggregate results of a single run.

use std::fmt;

/// Message recorded when the lock row could not be inserted.
pub const LOCK_FAILED: &str = "Failed to obtain the lock.";

/// Exit code of a successful run.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of a failed run.
pub const EXIT_FAILURE: i32 = -1;

/// Counters, first error and exit code of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTracker {
    total_count: usize,
    skip_count: usize,
    executed_count: usize,
    errored_change_set: Option<String>,
    error_message: Option<String>,
    exit_code: Option<i32>,
}

impl RunTracker {
    /// Create a fresh tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of changesets in the log.
    pub fn set_total_count(&mut self, total: usize) {
        self.total_count = total;
    }

    /// Count a skipped changeset.
    pub fn skipping_change_set(&mut self) {
        self.skip_count += 1;
    }

    /// Count an executed changeset.
    pub fn executed_change_set(&mut self) {
        self.executed_count += 1;
    }

    /// Record an error. Only the first recorded error is kept.
    pub fn errored_change_set(&mut self, id: Option<&str>, message: impl Into<String>) {
        if self.error_message.is_some() {
            return;
        }
        self.errored_change_set = id.map(str::to_string);
        self.error_message = Some(message.into());
    }

    /// Set the exit code from the overall outcome. The code is set once;
    /// later calls are ignored.
    pub fn complete(&mut self, success: bool) {
        if self.exit_code.is_some() {
            return;
        }
        self.exit_code = Some(if success { EXIT_SUCCESS } else { EXIT_FAILURE });
    }

    /// Number of changesets in the log.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Number of changesets skipped because they were already applied.
    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    /// Number of changesets executed in this run.
    pub fn executed_count(&self) -> usize {
        self.executed_count
    }

    /// Id of the changeset that failed first, if the failure belongs to one.
    pub fn errored_change_set_id(&self) -> Option<&str> {
        self.errored_change_set.as_deref()
    }

    /// First error message.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Check if any error was recorded.
    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Final exit code. Zero until [`RunTracker::complete`] says otherwise.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(EXIT_SUCCESS)
    }

    /// One-line description of the counters and first error.
    pub fn summary(&self) -> String {
        let counts = format!(
            "{} total, {} executed, {} skipped",
            self.total_count, self.executed_count, self.skip_count
        );
        match (&self.errored_change_set, &self.error_message) {
            (Some(id), Some(msg)) => format!("{}; changeset '{}' failed: {}", counts, id, msg),
            (None, Some(msg)) => format!("{}; error: {}", counts, msg),
            _ => counts,
        }
    }
}

impl fmt::Display for RunTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut tracker = RunTracker::new();
        tracker.set_total_count(3);
        tracker.skipping_change_set();
        tracker.executed_change_set();
        tracker.executed_change_set();

        assert_eq!(tracker.total_count(), 3);
        assert_eq!(tracker.skip_count(), 1);
        assert_eq!(tracker.executed_count(), 2);
        assert!(!tracker.has_error());
    }

    #[test]
    fn test_first_error_wins() {
        let mut tracker = RunTracker::new();
        tracker.errored_change_set(Some("a"), "first");
        tracker.errored_change_set(Some("b"), "second");
        tracker.errored_change_set(None, LOCK_FAILED);

        assert_eq!(tracker.errored_change_set_id(), Some("a"));
        assert_eq!(tracker.error_message(), Some("first"));
    }

    #[test]
    fn test_first_error_without_id_wins() {
        let mut tracker = RunTracker::new();
        tracker.errored_change_set(None, LOCK_FAILED);
        tracker.errored_change_set(Some("b"), "later");

        assert_eq!(tracker.errored_change_set_id(), None);
        assert_eq!(tracker.error_message(), Some(LOCK_FAILED));
    }

    #[test]
    fn test_exit_code() {
        let mut tracker = RunTracker::new();
        assert_eq!(tracker.exit_code(), 0);

        tracker.complete(false);
        assert_eq!(tracker.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_exit_code_set_once() {
        let mut tracker = RunTracker::new();
        tracker.complete(false);
        tracker.complete(true);
        assert_eq!(tracker.exit_code(), EXIT_FAILURE);

        let mut tracker = RunTracker::new();
        tracker.complete(true);
        tracker.complete(false);
        assert_eq!(tracker.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_summary() {
        let mut tracker = RunTracker::new();
        tracker.set_total_count(4);
        tracker.executed_change_set();
        assert_eq!(tracker.summary(), "4 total, 1 executed, 0 skipped");

        tracker.errored_change_set(Some("cs-2"), "boom");
        assert_eq!(
            tracker.to_string(),
            "4 total, 1 executed, 0 skipped; changeset 'cs-2' failed: boom"
        );
    }
}
