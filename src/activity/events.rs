//! Event-history resolver
//!
//! Asks the directory for each user's authentication history and keeps the
//! newest event. An empty history resolves to `Activity::Unknown`.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{Activity, ActivityResolver};
use crate::directory::{AuthEvent, Directory, UserRecord};
use crate::types::{DormancyError, Result};

/// Newest creation time in a history, whatever order it was returned in
pub fn latest_event(events: &[AuthEvent]) -> Option<DateTime<Utc>> {
    events.iter().map(|e| e.created_at).max()
}

pub struct EventResolver {
    directory: Arc<dyn Directory>,
}

impl EventResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait::async_trait]
impl ActivityResolver for EventResolver {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn resolve(&self, user: &UserRecord) -> Result<Activity> {
        let events = self
            .directory
            .user_events(&user.username)
            .await
            .map_err(|e| match e {
                DormancyError::Resolution { .. } => e,
                other => DormancyError::resolution(&user.username, other),
            })?;

        Ok(match latest_event(&events) {
            Some(at) => Activity::LastEvent { at },
            None => Activity::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_latest_event_ignores_order() {
        let events = vec![
            AuthEvent::at(t0() + Duration::days(5)),
            AuthEvent::at(t0()),
            AuthEvent::at(t0() + Duration::days(2)),
        ];
        assert_eq!(latest_event(&events), Some(t0() + Duration::days(5)));
        assert_eq!(latest_event(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_last_event() {
        let directory = InMemoryDirectory::new()
            .with_events("a", vec![AuthEvent::at(t0()), AuthEvent::at(t0() + Duration::hours(3))]);
        let resolver = EventResolver::new(Arc::new(directory));

        let activity = resolver.resolve(&UserRecord::new("a")).await.unwrap();
        assert_eq!(activity, Activity::LastEvent { at: t0() + Duration::hours(3) });
    }

    #[tokio::test]
    async fn test_resolve_empty_history_is_unknown() {
        let resolver = EventResolver::new(Arc::new(InMemoryDirectory::new()));
        let activity = resolver.resolve(&UserRecord::new("fresh")).await.unwrap();
        assert_eq!(activity, Activity::Unknown);
    }

    #[tokio::test]
    async fn test_resolve_failure_is_resolution_error() {
        let directory = InMemoryDirectory::new().failing_events("a");
        let resolver = EventResolver::new(Arc::new(directory));

        let err = resolver.resolve(&UserRecord::new("a")).await.unwrap_err();
        assert!(matches!(err, DormancyError::Resolution { ref user, .. } if user == "a"));
    }
}
