//! Cognito user-pool adapter
//!
//! Speaks the Cognito Identity Provider JSON protocol (`x-amz-json-1.1`) with
//! one POST per action. Requests are not SigV4-signed here: point the endpoint
//! at a signing proxy or an emulator, or supply a bearer token for gateways
//! that authenticate that way.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{AuthEvent, Directory, UserPage, UserRecord};
use crate::types::{DormancyError, Result};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Configuration for the Cognito adapter
#[derive(Debug, Clone)]
pub struct CognitoConfig {
    /// Service endpoint (regional Cognito URL, proxy, or emulator)
    pub endpoint: String,
    /// User pool to reconcile
    pub user_pool_id: String,
    /// Optional bearer token forwarded as `Authorization`
    pub bearer_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl CognitoConfig {
    /// Regional endpoint for the public Cognito service
    pub fn endpoint_for_region(region: &str) -> String {
        format!("https://cognito-idp.{}.amazonaws.com", region)
    }

    pub fn for_region(region: &str, user_pool_id: &str) -> Self {
        Self {
            endpoint: Self::endpoint_for_region(region),
            user_pool_id: user_pool_id.to_string(),
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListUsersRequest<'a> {
    user_pool_id: &'a str,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListUsersResponse {
    #[serde(default)]
    users: Vec<CognitoUser>,
    pagination_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CognitoUser {
    username: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    user_status: Option<String>,
    #[serde(default)]
    attributes: Vec<AttributeType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType {
    name: String,
    value: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl From<CognitoUser> for UserRecord {
    fn from(user: CognitoUser) -> Self {
        Self {
            username: user.username,
            enabled: user.enabled,
            status: user.user_status,
            attributes: user
                .attributes
                .into_iter()
                .map(|a| (a.name, a.value.unwrap_or_default()))
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UserRequest<'a> {
    user_pool_id: &'a str,
    username: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthEventsResponse {
    #[serde(default)]
    auth_events: Vec<AuthEventType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthEventType {
    event_type: Option<String>,
    /// Epoch seconds, possibly fractional
    creation_date: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Convert a Cognito epoch-seconds timestamp
fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

impl AuthEventType {
    fn into_event(self) -> Option<AuthEvent> {
        Some(AuthEvent {
            event_type: self.event_type,
            created_at: epoch_seconds(self.creation_date?)?,
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Directory backed by a Cognito user pool
pub struct CognitoDirectory {
    http_client: reqwest::Client,
    config: CognitoConfig,
}

impl CognitoDirectory {
    pub fn new(config: CognitoConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DormancyError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &CognitoConfig {
        &self.config
    }

    /// Invoke one Cognito action and decode its response
    async fn call<Req, Resp>(&self, action: &str, body: &Req) -> std::result::Result<Resp, String>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| format!("encode {}: {}", action, e))?;

        let mut request = self
            .http_client
            .post(&self.config.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(payload);
        if let Some(ref token) = self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("{} request failed: {}", action, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("{} response unreadable: {}", action, e))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .map(|b| {
                    format!(
                        "{}: {}",
                        b.error_type.unwrap_or_else(|| "UnknownError".into()),
                        b.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(format!("{} returned HTTP {} ({})", action, status, detail));
        }

        // Actions with no output return an empty body
        let bytes = if bytes.is_empty() { &b"{}"[..] } else { &bytes[..] };
        serde_json::from_slice(bytes).map_err(|e| format!("{} response invalid: {}", action, e))
    }
}

#[async_trait::async_trait]
impl Directory for CognitoDirectory {
    async fn list_users(&self, limit: u32, cursor: Option<&str>) -> Result<UserPage> {
        let request = ListUsersRequest {
            user_pool_id: &self.config.user_pool_id,
            limit,
            pagination_token: cursor,
        };

        let response: ListUsersResponse = self
            .call("ListUsers", &request)
            .await
            .map_err(DormancyError::Enumeration)?;

        debug!(users = response.users.len(), "ListUsers returned");

        Ok(UserPage {
            users: response.users.into_iter().map(UserRecord::from).collect(),
            next_cursor: response.pagination_token,
        })
    }

    async fn user_events(&self, username: &str) -> Result<Vec<AuthEvent>> {
        let request = UserRequest {
            user_pool_id: &self.config.user_pool_id,
            username,
        };

        let response: AuthEventsResponse = self
            .call("AdminListUserAuthEvents", &request)
            .await
            .map_err(|e| DormancyError::resolution(username, e))?;

        Ok(response
            .auth_events
            .into_iter()
            .filter_map(AuthEventType::into_event)
            .collect())
    }

    async fn disable_user(&self, username: &str) -> Result<()> {
        let request = UserRequest {
            user_pool_id: &self.config.user_pool_id,
            username,
        };

        let _: serde_json::Value = self
            .call("AdminDisableUser", &request)
            .await
            .map_err(|e| DormancyError::mutation(username, e))?;

        Ok(())
    }
}
