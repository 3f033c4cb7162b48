//! Ledger schemas
//!
//! MongoDB document structures for sessions and mirrored accounts.

mod account;
mod metadata;
mod session;

pub use account::{deactivate_update, AccountDoc, ACCOUNT_COLLECTION};
pub use metadata::Metadata;
pub use session::{SessionDoc, SESSION_COLLECTION, SESSION_TIME_FIELD, SESSION_USER_FIELD};
