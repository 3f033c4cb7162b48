//! Activity resolution
//!
//! Answers "when was this user last active" for the reconciler. Two strategies
//! share the `ActivityResolver` seam:
//!
//! - **EventResolver**: one history lookup per user against the directory
//! - **LedgerResolver**: one bulk query per run against the activity ledger,
//!   then a set-membership test per user

pub mod events;
pub mod ledger;

use chrono::{DateTime, Utc};

use crate::directory::UserRecord;
use crate::types::Result;

pub use events::{latest_event, EventResolver};
pub use ledger::{ActivityLedger, InMemoryLedger, LedgerResolver};

/// What a resolver learned about one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Most recent event in the user's history
    LastEvent { at: DateTime<Utc> },
    /// Membership in the ledger's recent-activity set
    Ledger { recent: bool },
    /// No activity on record
    Unknown,
}

impl Activity {
    /// Timestamp of the last known activity, when the strategy provides one
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        match self {
            Activity::LastEvent { at } => Some(*at),
            _ => None,
        }
    }
}

/// Strategy for determining a user's recent activity
#[async_trait::async_trait]
pub trait ActivityResolver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Resolve activity for one user
    async fn resolve(&self, user: &UserRecord) -> Result<Activity>;
}
