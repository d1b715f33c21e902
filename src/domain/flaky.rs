use chrono::Duration;

use crate::domain::run::TestStatus;

/// Window inspected when judging whether a failing test is flaky.
pub fn flaky_window() -> Duration {
    Duration::hours(24)
}

/// Window used for the success rate quoted in failure tickets.
pub fn success_rate_window() -> Duration {
    Duration::days(7)
}

const MIN_OBSERVATIONS: usize = 3;
const LOWER_BOUND: f64 = 0.2;
const UPPER_BOUND: f64 = 0.8;

/// Returns the failure rate when the outcomes qualify the test as flaky.
///
/// Tests that almost always fail are broken, not flaky, so only the band
/// between the two bounds counts.
pub fn flaky_failure_rate(outcomes: &[TestStatus]) -> Option<f64> {
    let observed: Vec<_> = outcomes
        .iter()
        .filter(|status| !matches!(status, TestStatus::Skipped | TestStatus::Interrupted))
        .collect();
    if observed.len() < MIN_OBSERVATIONS {
        return None;
    }
    let failures = observed.iter().filter(|status| status.is_failure()).count();
    let rate = failures as f64 / observed.len() as f64;
    (rate > LOWER_BOUND && rate < UPPER_BOUND).then_some(rate)
}

pub fn success_rate(outcomes: &[TestStatus]) -> String {
    if outcomes.is_empty() {
        return "new test".to_string();
    }
    let passed = outcomes
        .iter()
        .filter(|status| **status == TestStatus::Passed)
        .count();
    let rate = passed as f64 / outcomes.len() as f64 * 100.0;
    format!("{rate:.1}% ({passed}/{})", outcomes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use TestStatus::{Failed, Passed, Skipped, TimedOut};

    #[test]
    fn needs_three_observations() {
        assert_eq!(flaky_failure_rate(&[Passed, Failed]), None);
        assert_eq!(flaky_failure_rate(&[Passed, Failed, Skipped]), None);
    }

    #[test]
    fn flags_mixed_outcomes() {
        let rate = flaky_failure_rate(&[Passed, Failed, Passed]).unwrap();
        assert!((rate - 1.0 / 3.0).abs() < f64::EPSILON);
        assert!(flaky_failure_rate(&[Passed, TimedOut, Passed, Failed]).is_some());
    }

    #[test]
    fn ignores_stable_and_broken_tests() {
        assert_eq!(flaky_failure_rate(&[Passed; 5]), None);
        assert_eq!(flaky_failure_rate(&[Failed; 5]), None);
        // exactly on a bound is not flaky
        assert_eq!(flaky_failure_rate(&[Failed, Passed, Passed, Passed, Passed]), None);
        assert_eq!(flaky_failure_rate(&[Failed, Failed, Failed, Failed, Passed]), None);
    }

    #[test]
    fn formats_success_rate() {
        assert_eq!(success_rate(&[]), "new test");
        assert_eq!(success_rate(&[Passed, Failed, Passed, Passed]), "75.0% (3/4)");
    }
}
