//! Mirrored account schema
//!
//! The application's own copy of a directory account. Reconciliation only
//! flips `is_active` on it.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Default collection name for mirrored accounts
pub const ACCOUNT_COLLECTION: &str = "users";

/// Mirrored account document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccountDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Directory identifier
    pub identifier: String,

    /// Whether the account is active
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Update that marks a mirrored account inactive
pub fn deactivate_update(now: bson::DateTime) -> Document {
    doc! {
        "$set": {
            "is_active": false,
            "metadata.updated_at": now,
        }
    }
}

impl IntoIndexes for AccountDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "identifier": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("identifier_unique".to_string())
                    .build(),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_defaults_to_active() {
        let account: AccountDoc = bson::from_document(doc! { "identifier": "jdoe" }).unwrap();
        assert!(account.is_active);
        assert!(!account.metadata.is_deleted);
    }

    #[test]
    fn test_deactivate_update_shape() {
        let update = deactivate_update(bson::DateTime::from_millis(0));
        let set = update.get_document("$set").unwrap();
        assert!(!set.get_bool("is_active").unwrap());
        assert!(set.get_datetime("metadata.updated_at").is_ok());
    }
}
