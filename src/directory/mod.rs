//! Identity directory access
//!
//! The directory is the identity provider's user pool. This module defines the
//! `Directory` seam used by the reconciler, the record types it yields, and the
//! `DirectoryEnumerator` that walks every page of a pool exactly once.
//!
//! ## Adapters
//!
//! - **CognitoDirectory**: Cognito user-pool JSON protocol over HTTPS
//! - **InMemoryDirectory**: fixed pages and histories for tests and local runs

pub mod cognito;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::types::{DormancyError, Result};

pub use cognito::{CognitoConfig, CognitoDirectory};
pub use memory::InMemoryDirectory;

/// Largest page the provider accepts for a listing call
pub const MAX_PAGE_SIZE: u32 = 60;

/// Snapshot of one directory account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable identifier, shared with the activity ledger
    pub username: String,
    /// Whether the account can currently sign in
    pub enabled: bool,
    /// Provider account status (e.g. CONFIRMED)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Provider attributes, opaque to reconciliation
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl UserRecord {
    /// Create an enabled account with no attributes
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            enabled: true,
            status: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Mark the snapshot as disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One entry of a user's authentication history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthEvent {
    /// Provider event type (SignIn, SignUp, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// When the event happened
    pub created_at: DateTime<Utc>,
}

impl AuthEvent {
    pub fn at(created_at: DateTime<Utc>) -> Self {
        Self {
            event_type: None,
            created_at,
        }
    }
}

/// One page of a directory listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    /// Continuation token; absent or empty on the last page
    pub next_cursor: Option<String>,
}

/// Identity provider operations needed by a reconciliation pass
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// List one page of users, continuing from `cursor` when given
    async fn list_users(&self, limit: u32, cursor: Option<&str>) -> Result<UserPage>;

    /// Fetch the user's authentication history
    async fn user_events(&self, username: &str) -> Result<Vec<AuthEvent>>;

    /// Disable the account so it can no longer sign in
    async fn disable_user(&self, username: &str) -> Result<()>;
}

/// Clamp a configured page size into the range the provider accepts
pub fn clamp_page_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_PAGE_SIZE)
}

/// Walks a directory page by page until the provider stops returning a cursor
///
/// An empty page that still carries a cursor is followed. Any listing failure,
/// or a cursor the provider has already handed out during this walk, ends the
/// enumeration with `DormancyError::Enumeration`.
pub struct DirectoryEnumerator<'a> {
    directory: &'a dyn Directory,
    page_size: u32,
    cursor: Option<String>,
    seen_cursors: HashSet<String>,
    pages_fetched: usize,
    exhausted: bool,
}

impl<'a> DirectoryEnumerator<'a> {
    pub fn new(directory: &'a dyn Directory, page_size: u32) -> Self {
        let clamped = clamp_page_size(page_size);
        if clamped != page_size {
            warn!(
                requested = page_size,
                page_size = clamped,
                "Page size outside provider range, clamping"
            );
        }

        Self {
            directory,
            page_size: clamped,
            cursor: None,
            seen_cursors: HashSet::new(),
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Fetch the next page, or `None` once the last page has been consumed
    pub async fn next_page(&mut self) -> Result<Option<Vec<UserRecord>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .directory
            .list_users(self.page_size, self.cursor.as_deref())
            .await
            .map_err(|e| match e {
                DormancyError::Enumeration(_) => e,
                other => DormancyError::Enumeration(other.to_string()),
            })?;

        self.pages_fetched += 1;
        debug!(
            page = self.pages_fetched,
            users = page.users.len(),
            has_more = page.next_cursor.as_deref().is_some_and(|c| !c.is_empty()),
            "Fetched directory page"
        );

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => {
                if !self.seen_cursors.insert(next.clone()) {
                    return Err(DormancyError::Enumeration(format!(
                        "provider repeated pagination cursor after page {}",
                        self.pages_fetched
                    )));
                }
                self.cursor = Some(next);
            }
            None => {
                self.cursor = None;
                self.exhausted = true;
            }
        }

        Ok(Some(page.users))
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Effective page size sent to the provider
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(names: &[&str]) -> Vec<UserRecord> {
        names.iter().map(|n| UserRecord::new(*n)).collect()
    }

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(200), 60);
        assert_eq!(clamp_page_size(60), 60);
        assert_eq!(clamp_page_size(25), 25);
        assert_eq!(clamp_page_size(0), 1);
    }

    #[tokio::test]
    async fn test_enumerator_follows_every_page() {
        let directory = InMemoryDirectory::new()
            .with_page(None, users(&["a", "b"]), Some("q9"))
            .with_page(Some("q9"), users(&["c"]), Some("a1"))
            .with_page(Some("a1"), users(&["d"]), None);

        let mut enumerator = DirectoryEnumerator::new(&directory, 2);
        let mut seen = Vec::new();
        while let Some(page) = enumerator.next_page().await.unwrap() {
            seen.extend(page.into_iter().map(|u| u.username));
        }

        assert_eq!(seen, vec!["a", "b", "c", "d"]);
        assert_eq!(enumerator.pages_fetched(), 3);
        assert!(enumerator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enumerator_continues_past_empty_page() {
        let directory = InMemoryDirectory::new()
            .with_page(None, Vec::new(), Some("next"))
            .with_page(Some("next"), users(&["late"]), Some(""));

        let mut enumerator = DirectoryEnumerator::new(&directory, 10);
        let first = enumerator.next_page().await.unwrap().unwrap();
        assert!(first.is_empty());
        let second = enumerator.next_page().await.unwrap().unwrap();
        assert_eq!(second[0].username, "late");
        // Empty cursor ends the walk
        assert!(enumerator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enumerator_rejects_repeated_cursor() {
        let directory = InMemoryDirectory::new()
            .with_page(None, users(&["a"]), Some("loop"))
            .with_page(Some("loop"), users(&["b"]), Some("loop"));

        let mut enumerator = DirectoryEnumerator::new(&directory, 10);
        enumerator.next_page().await.unwrap();
        let err = enumerator.next_page().await.unwrap_err();
        assert!(matches!(err, DormancyError::Enumeration(_)));
    }

    #[tokio::test]
    async fn test_enumerator_clamps_page_size() {
        let directory = InMemoryDirectory::with_users(users(&["a"]));
        let mut enumerator = DirectoryEnumerator::new(&directory, 200);
        assert_eq!(enumerator.page_size(), 60);

        enumerator.next_page().await.unwrap();
        assert_eq!(directory.requested_limits().await, vec![60]);
    }

    #[tokio::test]
    async fn test_enumerator_surfaces_listing_failure() {
        let directory = InMemoryDirectory::new()
            .with_page(None, users(&["a"]), Some("p2"))
            .with_page(Some("p2"), users(&["b"]), None)
            .failing_listing_after(1);

        let mut enumerator = DirectoryEnumerator::new(&directory, 10);
        assert!(enumerator.next_page().await.is_ok());
        let err = enumerator.next_page().await.unwrap_err();
        assert!(matches!(err, DormancyError::Enumeration(_)));
    }
}
