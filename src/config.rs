//! Configuration for dormancy
//!
//! CLI arguments and environment variable handling using clap. `Args` is parsed
//! once at start and turned into the immutable `Settings` every component reads.

use clap::Parser;
use std::time::Duration;

use crate::db::schemas::{ACCOUNT_COLLECTION, SESSION_COLLECTION};
use crate::db::LedgerConfig;
use crate::directory::{clamp_page_size, CognitoConfig, MAX_PAGE_SIZE};
use crate::logging::LogFormat;
use crate::reconcile::{ReconcilerConfig, RunMode};
use crate::report::{MailerConfig, ReporterConfig};

/// Largest accepted inactivity threshold (100 years)
pub const MAX_DAYS_INACTIVE: u32 = 36_500;

/// Where activity is looked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ActivitySource {
    /// Per-user authentication history from the identity provider
    #[default]
    Events,
    /// Session ledger in MongoDB, one bulk query per run
    Ledger,
}

/// Dormancy - inactive account reconciliation
///
/// Finds accounts with no activity beyond the threshold and, in commit mode,
/// disables them.
#[derive(Parser, Debug, Clone)]
#[command(name = "dormancy")]
#[command(about = "Disable identity-pool accounts that have been inactive too long")]
#[command(version)]
pub struct Args {
    /// AWS region of the user pool
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Identity pool to reconcile
    #[arg(long, env = "USER_POOL_ID")]
    pub user_pool_id: String,

    /// Identity provider endpoint override (signing proxy, emulator)
    #[arg(long, env = "IDP_ENDPOINT")]
    pub idp_endpoint: Option<String>,

    /// Bearer token forwarded to the identity provider endpoint
    #[arg(long, env = "IDP_TOKEN", hide_env_values = true)]
    pub idp_token: Option<String>,

    /// Users requested per listing page (provider maximum is 60)
    #[arg(long, env = "USER_LOOP_LIMIT", default_value_t = MAX_PAGE_SIZE)]
    pub page_size: u32,

    /// Days without activity before an account is flagged
    #[arg(long, env = "DAYS_INACTIVE", default_value = "90")]
    pub days_inactive: u32,

    /// dry-run reports only; commit also disables accounts
    #[arg(long, env = "RUN_MODE", value_enum, default_value_t = RunMode::DryRun)]
    pub run_mode: RunMode,

    /// Where to look up user activity
    #[arg(long, env = "ACTIVITY_SOURCE", value_enum, default_value_t = ActivitySource::Events)]
    pub activity_source: ActivitySource,

    /// MongoDB connection URI for the session ledger
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "dormancy")]
    pub mongodb_db: String,

    /// Collection holding session records
    #[arg(long, env = "SESSIONS_COLLECTION", default_value = SESSION_COLLECTION)]
    pub sessions_collection: String,

    /// Collection holding mirrored accounts
    #[arg(long, env = "ACCOUNTS_COLLECTION", default_value = ACCOUNT_COLLECTION)]
    pub accounts_collection: String,

    /// Mark mirrored ledger accounts inactive in commit mode
    #[arg(long, env = "MARK_LEDGER_INACTIVE", default_value = "false")]
    pub mark_ledger_inactive: bool,

    /// Create ledger indexes on connect
    #[arg(long, env = "ENSURE_LEDGER_INDEXES", default_value = "false")]
    pub ensure_ledger_indexes: bool,

    /// Sender address for the report
    #[arg(long, env = "MAIL_FROM")]
    pub mail_from: Option<String>,

    /// Comma-separated report recipients
    #[arg(long, env = "MAIL_TO")]
    pub mail_to: Option<String>,

    /// Mail relay endpoint; reports are only logged when unset
    #[arg(long, env = "MAIL_ENDPOINT")]
    pub mail_endpoint: Option<String>,

    /// Bearer token for the mail relay
    #[arg(long, env = "MAIL_TOKEN", hide_env_values = true)]
    pub mail_token: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Immutable run configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub directory: CognitoConfig,
    pub reconciler: ReconcilerConfig,
    pub threshold_days: u32,
    pub activity_source: ActivitySource,
    pub ledger: Option<LedgerConfig>,
    pub report: ReporterConfig,
    pub mailer: Option<MailerConfig>,
}

impl Settings {
    /// Whether this run needs a ledger connection
    pub fn needs_ledger(&self) -> bool {
        self.activity_source == ActivitySource::Ledger || self.reconciler.mark_ledger_inactive
    }
}

impl Args {
    /// Parsed recipient list
    pub fn mail_recipients(&self) -> Vec<String> {
        self.mail_to
            .as_deref()
            .map(|to| {
                to.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Page size actually sent to the provider
    pub fn effective_page_size(&self) -> u32 {
        clamp_page_size(self.page_size)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.user_pool_id.trim().is_empty() {
            return Err("USER_POOL_ID must not be empty".to_string());
        }

        if self.page_size == 0 {
            return Err("USER_LOOP_LIMIT must be at least 1".to_string());
        }

        if self.days_inactive > MAX_DAYS_INACTIVE {
            return Err(format!("DAYS_INACTIVE must be at most {}", MAX_DAYS_INACTIVE));
        }

        let needs_ledger =
            self.activity_source == ActivitySource::Ledger || self.mark_ledger_inactive;
        if needs_ledger && self.mongodb_uri.is_none() {
            return Err("MONGODB_URI is required for ledger activity or ledger marking".to_string());
        }

        if self.mail_endpoint.is_some() {
            if self.mail_from.is_none() {
                return Err("MAIL_FROM is required when MAIL_ENDPOINT is set".to_string());
            }
            if self.mail_recipients().is_empty() {
                return Err(
                    "MAIL_TO needs at least one recipient when MAIL_ENDPOINT is set".to_string()
                );
            }
        }

        Ok(())
    }

    /// Build the immutable settings for a run
    pub fn into_settings(self) -> Settings {
        let timeout = Duration::from_millis(self.request_timeout_ms);

        let directory = CognitoConfig {
            endpoint: self
                .idp_endpoint
                .clone()
                .unwrap_or_else(|| CognitoConfig::endpoint_for_region(&self.region)),
            user_pool_id: self.user_pool_id.clone(),
            bearer_token: self.idp_token.clone(),
            timeout,
        };

        let ledger = self.mongodb_uri.clone().map(|uri| LedgerConfig {
            uri,
            database: self.mongodb_db.clone(),
            sessions_collection: self.sessions_collection.clone(),
            accounts_collection: self.accounts_collection.clone(),
            ensure_indexes: self.ensure_ledger_indexes,
        });

        let mailer = self.mail_endpoint.clone().map(|endpoint| MailerConfig {
            endpoint,
            token: self.mail_token.clone(),
            timeout,
        });

        let report = ReporterConfig {
            from: self.mail_from.clone().unwrap_or_default(),
            to: self.mail_recipients(),
            pool_id: self.user_pool_id.clone(),
            threshold_days: self.days_inactive,
        };

        Settings {
            directory,
            reconciler: ReconcilerConfig {
                page_size: self.page_size,
                mode: self.run_mode,
                mark_ledger_inactive: self.mark_ledger_inactive,
            },
            threshold_days: self.days_inactive,
            activity_source: self.activity_source,
            ledger,
            report,
            mailer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["dormancy", "--user-pool-id", "eu-west-1_pool"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--region", "eu-west-1"]);
        assert_eq!(args.page_size, 60);
        assert_eq!(args.days_inactive, 90);
        assert_eq!(args.run_mode, RunMode::DryRun);
        assert_eq!(args.activity_source, ActivitySource::Events);
        assert!(args.validate().is_ok());

        let settings = args.into_settings();
        assert_eq!(settings.directory.endpoint, "https://cognito-idp.eu-west-1.amazonaws.com");
        assert!(settings.ledger.is_none());
        assert!(settings.mailer.is_none());
        assert!(!settings.needs_ledger());
    }

    #[test]
    fn test_run_mode_values() {
        assert_eq!(parse(&["--run-mode", "commit"]).run_mode, RunMode::Commit);
        assert_eq!(parse(&["--run-mode", "dry-run"]).run_mode, RunMode::DryRun);
        let argv = ["dormancy", "--user-pool-id", "p", "--run-mode", "yolo"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_oversized_page_size_is_clamped() {
        let args = parse(&["--page-size", "200"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.effective_page_size(), 60);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(parse(&["--page-size", "0"]).validate().is_err());
    }

    #[test]
    fn test_days_inactive_upper_bound() {
        assert!(parse(&["--days-inactive", "36500"]).validate().is_ok());
        assert!(parse(&["--days-inactive", "100000000"]).validate().is_err());
    }

    #[test]
    fn test_ledger_requires_mongodb_uri() {
        let args = parse(&["--activity-source", "ledger"]);
        assert!(args.validate().is_err());

        let args = parse(&["--activity-source", "ledger", "--mongodb-uri", "mongodb://db:27017"]);
        assert!(args.validate().is_ok());
        let settings = args.into_settings();
        let ledger = settings.ledger.as_ref().unwrap();
        assert_eq!(ledger.sessions_collection, "sessions");
        assert_eq!(ledger.accounts_collection, "users");
        assert!(settings.needs_ledger());
    }

    #[test]
    fn test_mail_endpoint_requires_addresses() {
        let args = parse(&["--mail-endpoint", "https://relay.example.com/send"]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--mail-endpoint",
            "https://relay.example.com/send",
            "--mail-from",
            "ops@example.com",
            "--mail-to",
            "a@example.com, b@example.com,",
        ]);
        assert!(args.validate().is_ok());
        assert_eq!(args.mail_recipients(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_endpoint_override() {
        let settings = parse(&["--idp-endpoint", "http://localhost:9229"]).into_settings();
        assert_eq!(settings.directory.endpoint, "http://localhost:9229");
    }
}
