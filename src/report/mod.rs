//! Run reporting
//!
//! Builds one notification per run from the finished `RunResult` and hands it
//! to a `Notifier`. Nothing is sent when there are no candidates.

pub mod mailer;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::reconcile::{RunMode, RunResult};
use crate::types::Result;

pub use mailer::{HttpMailer, LogNotifier, MailerConfig, Notifier};

/// Header row of the candidate CSV
pub const CSV_HEADER: &str = "NTIDs";

/// File attached to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
    pub content_type: String,
}

/// A fully rendered notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Attachment,
}

/// Reporter settings
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub from: String,
    pub to: Vec<String>,
    /// Pool named in the message body
    pub pool_id: String,
    pub threshold_days: u32,
}

/// CSV with a header row and one identifier per line, no trailing newline
pub fn candidates_csv<'a>(identifiers: impl IntoIterator<Item = &'a str>) -> String {
    std::iter::once(CSV_HEADER)
        .chain(identifiers)
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Reporter {
    config: ReporterConfig,
    notifier: Arc<dyn Notifier>,
}

impl Reporter {
    pub fn new(config: ReporterConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self { config, notifier }
    }

    /// Render the notification for a run
    pub fn build_notification(&self, result: &RunResult) -> Notification {
        let date = result.started_at.format("%Y-%m-%d");
        let count = result.candidate_count();

        let mode = match result.mode {
            RunMode::DryRun => "dry run, no accounts were changed".to_string(),
            RunMode::Commit => format!("commit, {} account(s) disabled", result.disabled),
        };

        let mut body = format!(
            "{} user(s) in pool {} have had no activity for more than {} days.\n\n\
             Mode: {}\n\nUsers:\n",
            count, self.config.pool_id, self.config.threshold_days, mode
        );
        for candidate in &result.candidates {
            match candidate.last_activity {
                Some(at) => body.push_str(&format!(
                    "- {} (last active {})\n",
                    candidate.username,
                    at.format("%Y-%m-%d")
                )),
                None => body.push_str(&format!("- {}\n", candidate.username)),
            }
        }
        if !result.mutation_failures.is_empty() {
            body.push_str(&format!(
                "\nFailed to update: {}\n",
                result.mutation_failures.join(", ")
            ));
        }

        Notification {
            from: self.config.from.clone(),
            to: self.config.to.clone(),
            subject: format!("Inactive users report {}: {} user(s)", date, count),
            body,
            attachment: Attachment {
                filename: format!("inactive-users-{}.csv", date),
                content: candidates_csv(result.identifiers()),
                content_type: "text/csv".to_string(),
            },
        }
    }

    /// Send the run's report; returns whether a notification went out
    pub async fn report(&self, result: &RunResult) -> Result<bool> {
        if result.candidates.is_empty() {
            debug!("No inactive users, skipping notification");
            return Ok(false);
        }

        let notification = self.build_notification(result);
        self.notifier.send(&notification).await?;

        info!(
            candidates = result.candidate_count(),
            recipients = notification.to.len(),
            attachment = %notification.attachment.filename,
            "Inactive user report sent"
        );
        Ok(true)
    }
}
