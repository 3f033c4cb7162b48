//! Shared error and result types

/// Errors raised during a reconciliation run
#[derive(Debug, thiserror::Error)]
pub enum DormancyError {
    /// Listing the directory failed; the run cannot produce a verdict
    #[error("Enumeration failed: {0}")]
    Enumeration(String),

    /// Looking up one user's activity failed
    #[error("Activity lookup failed for {user}: {message}")]
    Resolution { user: String, message: String },

    /// Disabling or marking a candidate failed
    #[error("Mutation failed for {user}: {message}")]
    Mutation { user: String, message: String },

    /// Sending the run report failed
    #[error("Reporting failed: {0}")]
    Reporting(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl DormancyError {
    pub fn resolution(user: &str, message: impl std::fmt::Display) -> Self {
        Self::Resolution {
            user: user.to_string(),
            message: message.to_string(),
        }
    }

    pub fn mutation(user: &str, message: impl std::fmt::Display) -> Self {
        Self::Mutation {
            user: user.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DormancyError>;
