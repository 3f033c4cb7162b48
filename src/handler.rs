//! Run entry point
//!
//! `handle` performs one complete pass (connect, reconcile, report, release) and
//! always returns a `HandlerResponse`; errors never escape it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::activity::{ActivityLedger, ActivityResolver, EventResolver, LedgerResolver};
use crate::config::{ActivitySource, Settings};
use crate::db::{MongoClient, MongoLedger};
use crate::directory::{CognitoDirectory, Directory};
use crate::policy::InactivityPolicy;
use crate::reconcile::{Reconciler, RunResult};
use crate::report::{HttpMailer, LogNotifier, Notifier, Reporter};
use crate::types::{DormancyError, Result};

/// Status returned to whatever triggered the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// External services a run talks to
pub struct Collaborators {
    pub directory: Arc<dyn Directory>,
    pub ledger: Option<Arc<dyn ActivityLedger>>,
    pub notifier: Arc<dyn Notifier>,
}

/// Run one pass with the production collaborators
pub async fn handle(settings: &Settings) -> HandlerResponse {
    let now = Utc::now();
    let span = tracing::info_span!("run", run_id = %Uuid::new_v4());

    async {
        let (collaborators, mongo) = match connect(settings).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Run setup failed");
                return failure(&e);
            }
        };

        let response = run_with(settings, now, collaborators).await;

        // Release the ledger connection on every path out of the run
        if let Some(client) = mongo {
            client.shutdown().await;
        }
        response
    }
    .instrument(span)
    .await
}

/// Build production collaborators; the Mongo handle is returned for shutdown
async fn connect(settings: &Settings) -> Result<(Collaborators, Option<MongoClient>)> {
    let directory: Arc<dyn Directory> =
        Arc::new(CognitoDirectory::new(settings.directory.clone())?);

    let notifier: Arc<dyn Notifier> = match settings.mailer {
        Some(ref config) => Arc::new(HttpMailer::new(config.clone())?),
        None => Arc::new(LogNotifier),
    };

    let (ledger, mongo) = match (settings.needs_ledger(), settings.ledger.as_ref()) {
        (true, Some(config)) => {
            let ledger = MongoLedger::connect(config).await?;
            let client = ledger.client();
            (Some(Arc::new(ledger) as Arc<dyn ActivityLedger>), Some(client))
        }
        (true, None) => {
            return Err(DormancyError::Config("ledger required but MONGODB_URI is not set".into()))
        }
        (false, _) => (None, None),
    };

    Ok((
        Collaborators {
            directory,
            ledger,
            notifier,
        },
        mongo,
    ))
}

/// Run one pass against the given collaborators and captured `now`
pub async fn run_with(
    settings: &Settings,
    now: DateTime<Utc>,
    collaborators: Collaborators,
) -> HandlerResponse {
    match execute(settings, now, collaborators).await {
        Ok(result) => {
            let body = format!(
                "Script executed successfully: {} inactive user(s) found, {} disabled ({})",
                result.candidate_count(),
                result.disabled,
                result.mode
            );
            info!(status = ?result.status(), "{}", body);
            HandlerResponse {
                status_code: 200,
                body,
            }
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            failure(&e)
        }
    }
}

fn failure(e: &DormancyError) -> HandlerResponse {
    HandlerResponse {
        status_code: 500,
        body: format!("Run failed: {}", e),
    }
}

async fn execute(
    settings: &Settings,
    now: DateTime<Utc>,
    collaborators: Collaborators,
) -> Result<RunResult> {
    let Collaborators {
        directory,
        ledger,
        notifier,
    } = collaborators;

    let resolver: Arc<dyn ActivityResolver> = match settings.activity_source {
        ActivitySource::Events => Arc::new(EventResolver::new(Arc::clone(&directory))),
        ActivitySource::Ledger => {
            let ledger = ledger.as_deref().ok_or_else(|| {
                DormancyError::Config("ledger activity source has no ledger".into())
            })?;
            Arc::new(LedgerResolver::load(ledger, now, settings.threshold_days).await?)
        }
    };

    let mut reconciler = Reconciler::new(
        settings.reconciler.clone(),
        directory,
        resolver,
        InactivityPolicy::new(settings.threshold_days),
    );
    if let Some(ledger) = ledger {
        reconciler = reconciler.with_ledger(ledger);
    }

    let mut result = reconciler.run(now).await?;

    let reporter = Reporter::new(settings.report.clone(), notifier);
    match reporter.report(&result).await {
        Ok(sent) => result.report_sent = sent,
        Err(e) => {
            warn!(error = %e, "Report could not be sent");
            result.report_error = Some(e.to_string());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::InMemoryLedger;
    use crate::directory::{AuthEvent, CognitoConfig, InMemoryDirectory, UserRecord};
    use crate::reconcile::{ReconcilerConfig, RunMode};
    use crate::report::{Notification, ReporterConfig};
    use chrono::{Duration, TimeZone};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for Outbox {
        async fn send(&self, notification: &Notification) -> Result<()> {
            if self.fail {
                return Err(DormancyError::Reporting("relay down".into()));
            }
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 3, 0, 0).unwrap()
    }

    fn settings(source: ActivitySource, mode: RunMode) -> Settings {
        Settings {
            directory: CognitoConfig::for_region("eu-west-1", "eu-west-1_pool"),
            reconciler: ReconcilerConfig {
                mode,
                ..Default::default()
            },
            threshold_days: 90,
            activity_source: source,
            ledger: None,
            report: ReporterConfig {
                from: "ops@example.com".into(),
                to: vec!["sec@example.com".into()],
                pool_id: "eu-west-1_pool".into(),
                threshold_days: 90,
            },
            mailer: None,
        }
    }

    fn directory() -> Arc<InMemoryDirectory> {
        Arc::new(
            InMemoryDirectory::with_users(vec![UserRecord::new("A"), UserRecord::new("B")])
                .with_events("A", vec![AuthEvent::at(now() - Duration::days(10))])
                .with_events("B", vec![AuthEvent::at(now() - Duration::days(120))]),
        )
    }

    #[tokio::test]
    async fn test_success_response() {
        let outbox = Arc::new(Outbox::default());
        let collaborators = Collaborators {
            directory: directory(),
            ledger: None,
            notifier: outbox.clone(),
        };

        let config = settings(ActivitySource::Events, RunMode::DryRun);
        let response = run_with(&config, now(), collaborators).await;

        assert!(response.is_success());
        assert!(response.body.starts_with("Script executed successfully: 1 inactive user(s)"));
        assert_eq!(outbox.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_500_without_report() {
        let outbox = Arc::new(Outbox::default());
        let collaborators = Collaborators {
            directory: Arc::new(InMemoryDirectory::new().failing_listing_after(0)),
            ledger: None,
            notifier: outbox.clone(),
        };

        let config = settings(ActivitySource::Events, RunMode::Commit);
        let response = run_with(&config, now(), collaborators).await;

        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("Enumeration failed"));
        assert!(outbox.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_report_failure_keeps_success() {
        let dir = directory();
        let collaborators = Collaborators {
            directory: dir.clone(),
            ledger: None,
            notifier: Arc::new(Outbox {
                fail: true,
                ..Default::default()
            }),
        };

        let config = settings(ActivitySource::Events, RunMode::Commit);
        let response = run_with(&config, now(), collaborators).await;

        assert!(response.is_success());
        assert_eq!(dir.disabled_users().await, vec!["B"]);
    }

    #[tokio::test]
    async fn test_ledger_source_without_ledger_is_500() {
        let collaborators = Collaborators {
            directory: directory(),
            ledger: None,
            notifier: Arc::new(Outbox::default()),
        };

        let config = settings(ActivitySource::Ledger, RunMode::DryRun);
        let response = run_with(&config, now(), collaborators).await;

        assert_eq!(response.status_code, 500);
    }

    #[tokio::test]
    async fn test_ledger_query_failure_is_500() {
        let dir = directory();
        let collaborators = Collaborators {
            directory: dir.clone(),
            ledger: Some(Arc::new(InMemoryLedger::new().failing_queries())),
            notifier: Arc::new(Outbox::default()),
        };

        let config = settings(ActivitySource::Ledger, RunMode::Commit);
        let response = run_with(&config, now(), collaborators).await;

        assert_eq!(response.status_code, 500);
        assert_eq!(dir.list_calls().await, 0);
    }

    #[test]
    fn test_response_json_shape() {
        let response = HandlerResponse {
            status_code: 200,
            body: "ok".into(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "statusCode": 200, "body": "ok" })
        );
    }
}
