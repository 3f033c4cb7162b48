//! MongoDB-backed activity ledger
//!
//! Sessions are read with a single windowed `distinct` per run; mirrored
//! accounts are updated when ledger marking is enabled.

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, LedgerConfig, MongoClient, MongoLedger};
