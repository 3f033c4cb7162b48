//! Session document schema
//!
//! One document per sign-in recorded by the application. Only the user key and
//! the creation time matter to reconciliation.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Default collection name for sessions
pub const SESSION_COLLECTION: &str = "sessions";

/// Field holding the directory identifier
pub const SESSION_USER_FIELD: &str = "user_id";

/// Field holding the session start time
pub const SESSION_TIME_FIELD: &str = "created_at";

/// Session document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Directory identifier of the signed-in user
    pub user_id: String,

    /// When the session started
    pub created_at: DateTime,
}

impl IntoIndexes for SessionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Covers the windowed distinct query
            (
                doc! { SESSION_TIME_FIELD: 1, SESSION_USER_FIELD: 1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_user_id".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_doc_field_names() {
        let session = SessionDoc {
            _id: None,
            user_id: "jdoe".to_string(),
            created_at: DateTime::from_millis(1_700_000_000_000),
        };
        let document = bson::to_document(&session).unwrap();

        assert_eq!(document.get_str(SESSION_USER_FIELD).unwrap(), "jdoe");
        assert!(document.get_datetime(SESSION_TIME_FIELD).is_ok());
        assert!(!document.contains_key("_id"));
    }
}
