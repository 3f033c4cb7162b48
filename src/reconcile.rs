//! Reconciliation driver
//!
//! One pass over the directory:
//!
//! ```text
//! DirectoryEnumerator ──page──▶ ActivityResolver ──▶ InactivityPolicy
//!                                                        │
//!                                          candidates (enumeration order)
//!                                                        │
//!                                      commit mode: disable + mark ledger
//! ```
//!
//! Every page is consumed before any account is touched, so a listing failure
//! part-way through leaves the directory unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::activity::{Activity, ActivityLedger, ActivityResolver};
use crate::directory::{Directory, DirectoryEnumerator, MAX_PAGE_SIZE};
use crate::policy::InactivityPolicy;
use crate::types::Result;

/// Whether a run may change accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Report only
    #[default]
    DryRun,
    /// Report and disable
    Commit,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::Commit => write!(f, "commit"),
        }
    }
}

/// A user selected for deactivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub username: String,
    /// Newest known activity; absent in ledger mode
    pub last_activity: Option<DateTime<Utc>>,
}

/// Overall outcome of a completed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Finished, but some updates or the report failed
    CompletedWithErrors,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub mode: RunMode,
    /// The `now` every comparison in the run used
    pub started_at: DateTime<Utc>,
    /// Candidates in enumeration order
    pub candidates: Vec<Candidate>,
    pub pages_fetched: usize,
    pub users_scanned: usize,
    /// Users with no activity on record
    pub skipped_unknown: usize,
    /// Users whose activity lookup failed
    pub skipped_errors: usize,
    pub disabled: usize,
    /// Candidates the directory already had disabled
    pub already_disabled: usize,
    pub ledger_marked: usize,
    /// Candidates whose disable or ledger update failed
    pub mutation_failures: Vec<String>,
    pub report_sent: bool,
    pub report_error: Option<String>,
}

impl RunResult {
    pub fn new(mode: RunMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            started_at,
            candidates: Vec::new(),
            pages_fetched: 0,
            users_scanned: 0,
            skipped_unknown: 0,
            skipped_errors: 0,
            disabled: 0,
            already_disabled: 0,
            ledger_marked: 0,
            mutation_failures: Vec::new(),
            report_sent: false,
            report_error: None,
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Candidate identifiers in enumeration order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.username.as_str())
    }

    pub fn status(&self) -> RunStatus {
        if self.mutation_failures.is_empty() && self.report_error.is_none() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        }
    }
}

/// Driver settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Requested listing page size; clamped to the provider maximum
    pub page_size: u32,
    pub mode: RunMode,
    /// Also mark candidates inactive in the ledger (commit mode only)
    pub mark_ledger_inactive: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            mode: RunMode::DryRun,
            mark_ledger_inactive: false,
        }
    }
}

pub struct Reconciler {
    config: ReconcilerConfig,
    directory: Arc<dyn Directory>,
    resolver: Arc<dyn ActivityResolver>,
    policy: InactivityPolicy,
    ledger: Option<Arc<dyn ActivityLedger>>,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        directory: Arc<dyn Directory>,
        resolver: Arc<dyn ActivityResolver>,
        policy: InactivityPolicy,
    ) -> Self {
        Self {
            config,
            directory,
            resolver,
            policy,
            ledger: None,
        }
    }

    /// Attach the ledger whose mirrored accounts get marked inactive
    pub fn with_ledger(mut self, ledger: Arc<dyn ActivityLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Run one pass against the captured `now`
    ///
    /// Fails only when enumeration fails; per-user lookup and mutation
    /// failures are recorded in the result.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunResult> {
        let mut result = RunResult::new(self.config.mode, now);
        let mut seen: HashSet<String> = HashSet::new();
        let mut flagged: Vec<(Candidate, bool)> = Vec::new();

        info!(
            mode = %self.config.mode,
            resolver = self.resolver.name(),
            threshold_days = self.policy.threshold_days(),
            "Starting reconciliation pass"
        );

        let mut enumerator =
            DirectoryEnumerator::new(self.directory.as_ref(), self.config.page_size);
        while let Some(page) = enumerator.next_page().await? {
            for user in page {
                if !seen.insert(user.username.clone()) {
                    warn!(user = %user.username, "Directory returned user twice, ignoring repeat");
                    continue;
                }
                result.users_scanned += 1;

                let activity = match self.resolver.resolve(&user).await {
                    Ok(activity) => activity,
                    Err(e) => {
                        warn!(
                            user = %user.username,
                            error = %e,
                            "Activity lookup failed, skipping user"
                        );
                        result.skipped_errors += 1;
                        continue;
                    }
                };

                if activity == Activity::Unknown {
                    debug!(user = %user.username, "No activity on record, skipping");
                    result.skipped_unknown += 1;
                    continue;
                }

                if !self.policy.is_inactive(&activity, now) {
                    continue;
                }

                let last_activity = activity.last_seen();
                match last_activity {
                    Some(at) => info!(
                        user = %user.username,
                        last_activity = %at.format("%Y-%m-%d"),
                        enabled = user.enabled,
                        "User inactive beyond threshold"
                    ),
                    None => info!(
                        user = %user.username,
                        enabled = user.enabled,
                        "User has no recent ledger activity"
                    ),
                }

                flagged.push((
                    Candidate {
                        username: user.username,
                        last_activity,
                    },
                    user.enabled,
                ));
            }
        }
        result.pages_fetched = enumerator.pages_fetched();

        if self.config.mode == RunMode::Commit {
            for (candidate, enabled) in &flagged {
                self.deactivate(candidate, *enabled, &mut result).await;
            }
        }
        result.candidates = flagged.into_iter().map(|(candidate, _)| candidate).collect();

        info!(
            pages = result.pages_fetched,
            scanned = result.users_scanned,
            candidates = result.candidate_count(),
            disabled = result.disabled,
            skipped_unknown = result.skipped_unknown,
            skipped_errors = result.skipped_errors,
            mutation_failures = result.mutation_failures.len(),
            "Reconciliation pass finished"
        );

        Ok(result)
    }

    async fn deactivate(&self, candidate: &Candidate, enabled: bool, result: &mut RunResult) {
        let user = candidate.username.as_str();

        if enabled {
            if let Err(e) = self.directory.disable_user(user).await {
                error!(user = %user, error = %e, "Failed to disable user");
                result.mutation_failures.push(user.to_string());
                return;
            }
            result.disabled += 1;
            info!(user = %user, "User disabled");
        } else {
            result.already_disabled += 1;
            debug!(user = %user, "User already disabled in directory");
        }

        if !self.config.mark_ledger_inactive {
            return;
        }
        if let Some(ref ledger) = self.ledger {
            match ledger.mark_inactive(user).await {
                Ok(()) => result.ledger_marked += 1,
                Err(e) => {
                    error!(user = %user, error = %e, "Failed to mark ledger account inactive");
                    result.mutation_failures.push(user.to_string());
                }
            }
        }
    }
}
