/// Counts consecutive failed poll cycles.
///
/// The poll loop never gives up on failures; this only decides how loudly
/// they are reported.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive_failures: u32,
    threshold: u32,
}

impl FailureTracker {
    pub const DEFAULT_THRESHOLD: u32 = 5;

    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Returns the failure count that was cleared.
    pub fn record_success(&mut self) -> u32 {
        std::mem::take(&mut self.consecutive_failures)
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }

    pub fn is_persistent(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let tracker = FailureTracker::default();
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(!tracker.is_failing());
        assert!(!tracker.is_persistent());
    }

    #[test]
    fn test_persistent_after_threshold() {
        let mut tracker = FailureTracker::new(3);

        tracker.record_failure();
        tracker.record_failure();
        assert!(tracker.is_failing());
        assert!(!tracker.is_persistent());

        tracker.record_failure();
        assert!(tracker.is_persistent());
    }

    #[test]
    fn test_success_resets() {
        let mut tracker = FailureTracker::new(2);

        tracker.record_failure();
        tracker.record_failure();
        tracker.record_failure();

        assert_eq!(tracker.record_success(), 3);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(!tracker.is_failing());
        assert_eq!(tracker.record_success(), 0);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let mut tracker = FailureTracker::new(0);
        assert!(!tracker.is_persistent());
        tracker.record_failure();
        assert!(tracker.is_persistent());
    }

    #[test]
    fn test_failure_count_saturates() {
        let mut tracker = FailureTracker::default();
        tracker.consecutive_failures = u32::MAX;
        tracker.record_failure();
        assert_eq!(tracker.consecutive_failures(), u32::MAX);
    }
}
