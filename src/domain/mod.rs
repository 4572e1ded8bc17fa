use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One recorded webhook: the request as received, plus the outcome of
/// forwarding it upstream.
///
/// Serialized with camelCase field names; this is both the persisted format
/// and the read-API response format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    /// Originating request path, used as the grouping key for indexing.
    pub endpoint: String,
    pub method: String,
    /// One value per header name; later duplicates are not modeled.
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// Raw query string, empty when the request had none.
    pub query: String,
    pub ip: Option<String>,
    /// Milliseconds since epoch, assigned by the store at save time.
    pub received_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<EventResponse>,
}

/// Outcome of the forwarding call, attached at creation and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub status: u16,
    pub body: Option<String>,
}

/// Draft of an event before the store assigns its id and timestamp.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub endpoint: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub query: String,
    pub ip: Option<String>,
    pub response: Option<EventResponse>,
}

/// Aggregate record kept per endpoint, one per distinct path.
///
/// `event_count` is a lifetime counter: it keeps counting past the index cap
/// and is never corrected for TTL expiry of the underlying events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMetadata {
    pub endpoint: String,
    pub last_event_at: i64,
    pub event_count: u64,
}
