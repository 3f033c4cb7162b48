//! Ledger-based resolver
//!
//! The ledger is an external record of sessions keyed by user identifier. The
//! resolver reads it once per run: every identifier with a session at or after
//! `now - threshold_days` goes into a set, and each user is then a lookup.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::info;

use super::{Activity, ActivityResolver};
use crate::directory::UserRecord;
use crate::types::{DormancyError, Result};

/// Activity store queried in ledger mode
#[async_trait::async_trait]
pub trait ActivityLedger: Send + Sync {
    /// Distinct user identifiers with a session at or after `since`
    async fn distinct_recent_user_ids(&self, since: DateTime<Utc>) -> Result<HashSet<String>>;

    /// Flag the ledger's mirrored account as inactive
    async fn mark_inactive(&self, identifier: &str) -> Result<()>;
}

/// Resolver backed by a precomputed recent-activity set
#[derive(Debug)]
pub struct LedgerResolver {
    recent: HashSet<String>,
    since: DateTime<Utc>,
}

impl LedgerResolver {
    /// Run the single bulk query for this pass
    pub async fn load(
        ledger: &dyn ActivityLedger,
        now: DateTime<Utc>,
        threshold_days: u32,
    ) -> Result<Self> {
        let since = now
            .checked_sub_signed(Duration::days(i64::from(threshold_days)))
            .ok_or_else(|| {
                DormancyError::Config(format!(
                    "threshold of {} days is out of range for {}",
                    threshold_days, now
                ))
            })?;
        let recent = ledger.distinct_recent_user_ids(since).await?;

        info!(
            since = %since,
            recent_users = recent.len(),
            "Loaded recent-activity set from ledger"
        );

        Ok(Self { recent, since })
    }

    /// Build from an already computed set
    pub fn from_set(recent: HashSet<String>, since: DateTime<Utc>) -> Self {
        Self { recent, since }
    }

    /// Start of the activity window
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn recent_count(&self) -> usize {
        self.recent.len()
    }
}

#[async_trait::async_trait]
impl ActivityResolver for LedgerResolver {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn resolve(&self, user: &UserRecord) -> Result<Activity> {
        Ok(Activity::Ledger {
            recent: self.recent.contains(&user.username),
        })
    }
}

// ============================================================================
// In-Memory Ledger (for testing/local development)
// ============================================================================

#[derive(Default)]
struct LedgerState {
    sessions: Vec<(String, DateTime<Utc>)>,
    marked: Vec<String>,
    queries: usize,
    fail_queries: bool,
    failing_marks: HashSet<String>,
}

/// Simple in-memory session ledger
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session for `identifier` at `at`
    pub fn with_session(mut self, identifier: &str, at: DateTime<Utc>) -> Self {
        self.state.get_mut().sessions.push((identifier.to_string(), at));
        self
    }

    /// Make the bulk query fail
    pub fn failing_queries(mut self) -> Self {
        self.state.get_mut().fail_queries = true;
        self
    }

    /// Make marking `identifier` fail
    pub fn failing_mark(mut self, identifier: &str) -> Self {
        self.state.get_mut().failing_marks.insert(identifier.to_string());
        self
    }

    /// Identifiers marked inactive, in call order
    pub async fn marked_inactive(&self) -> Vec<String> {
        self.state.read().await.marked.clone()
    }

    /// Number of bulk queries served
    pub async fn query_count(&self) -> usize {
        self.state.read().await.queries
    }
}

#[async_trait::async_trait]
impl ActivityLedger for InMemoryLedger {
    async fn distinct_recent_user_ids(&self, since: DateTime<Utc>) -> Result<HashSet<String>> {
        let mut state = self.state.write().await;
        state.queries += 1;
        if state.fail_queries {
            return Err(DormancyError::Database("ledger unavailable".into()));
        }

        Ok(state
            .sessions
            .iter()
            .filter(|(_, at)| *at >= since)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn mark_inactive(&self, identifier: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.failing_marks.contains(identifier) {
            return Err(DormancyError::mutation(identifier, "ledger update rejected"));
        }
        state.marked.push(identifier.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_load_uses_threshold_window() {
        let ledger = InMemoryLedger::new()
            .with_session("recent", now() - Duration::days(3))
            .with_session("edge", now() - Duration::days(90))
            .with_session("stale", now() - Duration::days(91))
            .with_session("recent", now() - Duration::days(200));

        let resolver = LedgerResolver::load(&ledger, now(), 90).await.unwrap();

        assert_eq!(resolver.since(), now() - Duration::days(90));
        assert_eq!(resolver.recent_count(), 2);
        assert_eq!(ledger.query_count().await, 1);

        let expected = [("recent", true), ("edge", true), ("stale", false), ("never", false)];
        for (name, recent) in expected {
            let activity = resolver.resolve(&UserRecord::new(name)).await.unwrap();
            assert_eq!(activity, Activity::Ledger { recent }, "user {}", name);
        }
    }

    #[tokio::test]
    async fn test_load_propagates_query_failure() {
        let ledger = InMemoryLedger::new().failing_queries();
        let err = LedgerResolver::load(&ledger, now(), 90).await.unwrap_err();
        assert!(matches!(err, DormancyError::Database(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_out_of_range_threshold() {
        let ledger = InMemoryLedger::new();
        let err = LedgerResolver::load(&ledger, now(), 100_000_000).await.unwrap_err();

        assert!(matches!(err, DormancyError::Config(_)));
        assert_eq!(ledger.query_count().await, 0);
    }

    #[tokio::test]
    async fn test_mark_inactive_records_calls() {
        let ledger = InMemoryLedger::new().failing_mark("locked");
        ledger.mark_inactive("a").await.unwrap();
        assert!(ledger.mark_inactive("locked").await.is_err());
        assert_eq!(ledger.marked_inactive().await, vec!["a"]);
    }
}
