//! MongoDB client and ledger adapter

use bson::{doc, Bson, DateTime, Document};
use chrono::Utc;
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::activity::ActivityLedger;
use crate::db::schemas::{
    deactivate_update, AccountDoc, SessionDoc, SESSION_TIME_FIELD, SESSION_USER_FIELD,
};
use crate::types::{DormancyError, Result};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Ledger connection settings
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub uri: String,
    pub database: String,
    pub sessions_collection: String,
    pub accounts_collection: String,
    /// Create the schema indexes on connect
    pub ensure_indexes: bool,
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", redact_uri(uri));

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| DormancyError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        if let Err(e) = client.database(db_name).run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(DormancyError::Database(format!("MongoDB ping failed: {}", e)));
        }

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.client.database(&self.db_name).collection::<T>(name)
    }

    /// Apply schema-defined indexes to a collection
    pub async fn ensure_indexes<T: IntoIndexes + Send + Sync>(&self, name: &str) -> Result<()> {
        let indices: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        if indices.is_empty() {
            return Ok(());
        }

        self.collection::<T>(name)
            .create_indexes(indices)
            .await
            .map_err(|e| {
                DormancyError::Database(format!("Failed to create indexes on {}: {}", name, e))
            })?;

        debug!(collection = %name, "Indexes ensured");
        Ok(())
    }

    /// Close connections and stop background monitoring
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        info!("MongoDB connection closed");
    }
}

/// Strip credentials before logging a connection string
fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}

/// Convert a distinct() value into a directory identifier
fn identifier_from_bson(value: Bson) -> Option<String> {
    match value {
        Bson::String(s) => Some(s),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        other => {
            debug!(value = %other, "Ignoring non-string user key in ledger");
            None
        }
    }
}

/// Session ledger stored in MongoDB
pub struct MongoLedger {
    client: MongoClient,
    sessions: Collection<SessionDoc>,
    accounts: Collection<AccountDoc>,
}

impl MongoLedger {
    /// Connect to the ledger database described by `config`
    pub async fn connect(config: &LedgerConfig) -> Result<Self> {
        let client = MongoClient::new(&config.uri, &config.database).await?;
        Self::from_client(client, config).await
    }

    /// Build the ledger on a connected client; the client is closed if setup fails
    async fn from_client(client: MongoClient, config: &LedgerConfig) -> Result<Self> {
        if config.ensure_indexes {
            if let Err(e) = Self::ensure_ledger_indexes(&client, config).await {
                client.shutdown().await;
                return Err(e);
            }
        }

        Ok(Self {
            sessions: client.collection(&config.sessions_collection),
            accounts: client.collection(&config.accounts_collection),
            client,
        })
    }

    async fn ensure_ledger_indexes(client: &MongoClient, config: &LedgerConfig) -> Result<()> {
        client
            .ensure_indexes::<SessionDoc>(&config.sessions_collection)
            .await?;
        client
            .ensure_indexes::<AccountDoc>(&config.accounts_collection)
            .await
    }

    /// Handle for closing the connection once the run is over
    pub fn client(&self) -> MongoClient {
        self.client.clone()
    }
}

#[async_trait::async_trait]
impl ActivityLedger for MongoLedger {
    async fn distinct_recent_user_ids(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        let filter = doc! { SESSION_TIME_FIELD: { "$gte": DateTime::from_chrono(since) } };

        let values = self
            .sessions
            .distinct(SESSION_USER_FIELD, filter)
            .await
            .map_err(|e| DormancyError::Database(format!("Distinct query failed: {}", e)))?;

        Ok(values.into_iter().filter_map(identifier_from_bson).collect())
    }

    async fn mark_inactive(&self, identifier: &str) -> Result<()> {
        let result = self
            .accounts
            .update_one(doc! { "identifier": identifier }, deactivate_update(DateTime::now()))
            .await
            .map_err(|e| DormancyError::mutation(identifier, format!("Update failed: {}", e)))?;

        if result.matched_count == 0 {
            warn!(user = %identifier, "No mirrored account to mark inactive");
        }

        Ok(())
    }
}
