//! Inactivity policy
//!
//! Elapsed time is rounded up to whole days: 90 days and one hour counts as 91.
//! A user is inactive only when that count is strictly greater than the
//! threshold, so exactly `threshold_days` of silence is still active.

use chrono::{DateTime, Utc};

use crate::activity::Activity;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Ceiling of the absolute distance between two instants, in days
pub fn elapsed_days_ceil(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    let delta = now.signed_duration_since(then);
    match delta.num_microseconds() {
        Some(us) => {
            let us = us.unsigned_abs();
            us.div_ceil(MICROS_PER_DAY as u64) as i64
        }
        // Beyond ~292k years; whole days are precise enough there
        None => delta.num_days().abs() + 1,
    }
}

/// Decides whether resolved activity makes a user a deactivation candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityPolicy {
    threshold_days: u32,
}

impl InactivityPolicy {
    pub fn new(threshold_days: u32) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Apply the policy against the run's captured `now`
    ///
    /// `Activity::Unknown` is never inactive: an account with no history has
    /// not been observed long enough to judge.
    pub fn is_inactive(&self, activity: &Activity, now: DateTime<Utc>) -> bool {
        match activity {
            Activity::LastEvent { at } => {
                elapsed_days_ceil(now, *at) > i64::from(self.threshold_days)
            }
            Activity::Ledger { recent } => !recent,
            Activity::Unknown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
    }

    fn last_event(at: DateTime<Utc>) -> Activity {
        Activity::LastEvent { at }
    }

    #[test]
    fn test_elapsed_days_rounds_up() {
        assert_eq!(elapsed_days_ceil(now(), now()), 0);
        assert_eq!(elapsed_days_ceil(now(), now() - Duration::microseconds(1)), 1);
        assert_eq!(elapsed_days_ceil(now(), now() - Duration::days(90)), 90);
        assert_eq!(
            elapsed_days_ceil(now(), now() - Duration::days(90) - Duration::hours(1)),
            91
        );
    }

    #[test]
    fn test_elapsed_days_is_absolute() {
        assert_eq!(elapsed_days_ceil(now(), now() + Duration::hours(30)), 2);
    }

    #[test]
    fn test_exact_threshold_is_not_inactive() {
        let policy = InactivityPolicy::new(90);
        assert!(!policy.is_inactive(&last_event(now() - Duration::days(90)), now()));
    }

    #[test]
    fn test_one_microsecond_past_threshold_is_inactive() {
        let policy = InactivityPolicy::new(90);
        let at = now() - Duration::days(90) - Duration::microseconds(1);
        assert!(policy.is_inactive(&last_event(at), now()));
    }

    #[test]
    fn test_boundary_holds_for_other_thresholds() {
        for threshold in [1u32, 7, 30, 365] {
            let policy = InactivityPolicy::new(threshold);
            let cutoff = now() - Duration::days(i64::from(threshold));
            assert!(!policy.is_inactive(&last_event(cutoff), now()), "T={}", threshold);
            assert!(
                policy.is_inactive(&last_event(cutoff - Duration::microseconds(1)), now()),
                "T={}",
                threshold
            );
        }
    }

    #[test]
    fn test_recent_activity_is_active() {
        let policy = InactivityPolicy::new(90);
        assert!(!policy.is_inactive(&last_event(now() - Duration::days(10)), now()));
        assert!(policy.is_inactive(&last_event(now() - Duration::days(120)), now()));
    }

    #[test]
    fn test_ledger_membership() {
        let policy = InactivityPolicy::new(90);
        assert!(!policy.is_inactive(&Activity::Ledger { recent: true }, now()));
        assert!(policy.is_inactive(&Activity::Ledger { recent: false }, now()));
    }

    #[test]
    fn test_unknown_is_never_inactive() {
        assert!(!InactivityPolicy::new(0).is_inactive(&Activity::Unknown, now()));
    }
}
