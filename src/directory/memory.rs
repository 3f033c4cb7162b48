//! In-memory directory (for testing/local development)
//!
//! Serves either explicit pages keyed by cursor, or a flat user list paged by
//! the requested limit. Records every listing limit and disable call so callers
//! can assert on what the reconciler asked for.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::{AuthEvent, Directory, UserPage, UserRecord};
use crate::types::{DormancyError, Result};

#[derive(Default)]
struct State {
    /// Explicit pages: request cursor -> page
    pages: Option<HashMap<Option<String>, UserPage>>,
    /// Flat user list, used when no explicit pages are set
    users: Vec<UserRecord>,
    events: HashMap<String, Vec<AuthEvent>>,
    failing_events: HashSet<String>,
    failing_disables: HashSet<String>,
    fail_listing_after: Option<usize>,
    list_calls: usize,
    requested_limits: Vec<u32>,
    disabled: Vec<String>,
}

/// Simple in-memory identity directory
#[derive(Default)]
pub struct InMemoryDirectory {
    state: RwLock<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory paged by the caller's limit over a flat user list
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            state: RwLock::new(State {
                users,
                ..Default::default()
            }),
        }
    }

    /// Add an explicit page served for `cursor`
    pub fn with_page(
        mut self,
        cursor: Option<&str>,
        users: Vec<UserRecord>,
        next: Option<&str>,
    ) -> Self {
        let state = self.state.get_mut();
        state.pages.get_or_insert_with(HashMap::new).insert(
            cursor.map(str::to_string),
            UserPage {
                users,
                next_cursor: next.map(str::to_string),
            },
        );
        self
    }

    /// Set the authentication history returned for `username`
    pub fn with_events(mut self, username: &str, events: Vec<AuthEvent>) -> Self {
        self.state.get_mut().events.insert(username.to_string(), events);
        self
    }

    /// Make history lookups for `username` fail
    pub fn failing_events(mut self, username: &str) -> Self {
        self.state.get_mut().failing_events.insert(username.to_string());
        self
    }

    /// Make disable calls for `username` fail
    pub fn failing_disable(mut self, username: &str) -> Self {
        self.state.get_mut().failing_disables.insert(username.to_string());
        self
    }

    /// Fail every listing call after `pages` successful ones
    pub fn failing_listing_after(mut self, pages: usize) -> Self {
        self.state.get_mut().fail_listing_after = Some(pages);
        self
    }

    /// Limits passed to each listing call, in call order
    pub async fn requested_limits(&self) -> Vec<u32> {
        self.state.read().await.requested_limits.clone()
    }

    /// Usernames disabled so far, in call order
    pub async fn disabled_users(&self) -> Vec<String> {
        self.state.read().await.disabled.clone()
    }

    /// Number of listing calls served
    pub async fn list_calls(&self) -> usize {
        self.state.read().await.list_calls
    }
}

fn parse_offset(cursor: Option<&str>) -> Result<usize> {
    match cursor {
        None => Ok(0),
        Some(c) => c
            .strip_prefix("offset-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| DormancyError::Enumeration(format!("Unknown pagination token: {}", c))),
    }
}

#[async_trait::async_trait]
impl Directory for InMemoryDirectory {
    async fn list_users(&self, limit: u32, cursor: Option<&str>) -> Result<UserPage> {
        let mut state = self.state.write().await;
        state.requested_limits.push(limit);

        if let Some(after) = state.fail_listing_after {
            if state.list_calls >= after {
                return Err(DormancyError::Enumeration("listing unavailable".into()));
            }
        }
        state.list_calls += 1;

        if let Some(ref pages) = state.pages {
            return pages
                .get(&cursor.map(str::to_string))
                .cloned()
                .ok_or_else(|| {
                    DormancyError::Enumeration(format!("Unknown pagination token: {:?}", cursor))
                });
        }

        let offset = parse_offset(cursor)?;
        let end = (offset + limit as usize).min(state.users.len());
        let users = state.users.get(offset..end).unwrap_or_default().to_vec();
        let next_cursor = (end < state.users.len()).then(|| format!("offset-{}", end));

        Ok(UserPage { users, next_cursor })
    }

    async fn user_events(&self, username: &str) -> Result<Vec<AuthEvent>> {
        let state = self.state.read().await;
        if state.failing_events.contains(username) {
            return Err(DormancyError::resolution(username, "history unavailable"));
        }
        Ok(state.events.get(username).cloned().unwrap_or_default())
    }

    async fn disable_user(&self, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.failing_disables.contains(username) {
            return Err(DormancyError::mutation(username, "disable rejected"));
        }

        state.disabled.push(username.to_string());

        if let Some(ref mut pages) = state.pages {
            for user in pages.values_mut().flat_map(|p| p.users.iter_mut()) {
                if user.username == username {
                    user.enabled = false;
                }
            }
        }
        for user in state.users.iter_mut() {
            if user.username == username {
                user.enabled = false;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flat_users_paged_by_limit() {
        let users = (0..5).map(|i| UserRecord::new(format!("u{}", i))).collect();
        let directory = InMemoryDirectory::with_users(users);

        let first = directory.list_users(2, None).await.unwrap();
        assert_eq!(first.users.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("offset-2"));

        let last = directory.list_users(2, Some("offset-4")).await.unwrap();
        assert_eq!(last.users[0].username, "u4");
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_disable_updates_snapshot() {
        let directory = InMemoryDirectory::with_users(vec![UserRecord::new("a")]);
        directory.disable_user("a").await.unwrap();

        let page = directory.list_users(10, None).await.unwrap();
        assert!(!page.users[0].enabled);
        assert_eq!(directory.disabled_users().await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_unknown_cursor_is_enumeration_error() {
        let directory = InMemoryDirectory::new().with_page(None, Vec::new(), None);
        let err = directory.list_users(10, Some("bogus")).await.unwrap_err();
        assert!(matches!(err, DormancyError::Enumeration(_)));
    }
}
