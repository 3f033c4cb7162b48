//! Dormancy - inactive account reconciliation for identity pools
//!
//! One bounded pass per invocation: enumerate every account in the pool,
//! resolve each account's last activity, flag those silent for longer than the
//! threshold, optionally disable them, and send a single report.
//!
//! ## Components
//!
//! - **Directory**: cursor-paginated listing and account mutation
//! - **Activity**: per-user event history or a bulk session-ledger query
//! - **Policy**: ceiling-day inactivity cutoff
//! - **Reconcile**: the pass itself, dry-run or commit
//! - **Report**: one notification with a CSV of flagged identifiers

pub mod activity;
pub mod config;
pub mod db;
pub mod directory;
pub mod handler;
pub mod logging;
pub mod policy;
pub mod reconcile;
pub mod report;
pub mod types;

pub use config::{Args, Settings};
pub use handler::{handle, HandlerResponse};
pub use types::{DormancyError, Result};
