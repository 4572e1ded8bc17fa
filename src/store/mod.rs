use std::{sync::Arc, time::Duration};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{EndpointMetadata, NewEvent, WebhookEvent},
    errors::AppError,
    kv::KvStore,
};

/// Retention applied to every key; index and metadata keys refresh it on
/// each write, event keys get it once at creation.
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Per-endpoint index cap; older ids are silently dropped beyond it.
const INDEX_CAP: usize = 1000;

fn event_key(id: &str) -> String {
    format!("event:{id}")
}

fn index_key(endpoint: &str) -> String {
    format!("index:{endpoint}")
}

fn meta_key(endpoint: &str) -> String {
    format!("meta:{endpoint}")
}

/// Event store plus the per-endpoint index and metadata registry that hang
/// off it. All state lives in the key-value substrate; the struct itself is
/// a cheap handle.
#[derive(Clone)]
pub struct WebhookStore {
    kv: Arc<dyn KvStore>,
}

impl WebhookStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Assigns an id and timestamp, persists the event, then maintains the
    /// endpoint's index and metadata. Returns only after the primary record
    /// is durable; a failure in the secondary structures is logged and
    /// swallowed, since readers already tolerate index drift.
    pub async fn save_event(&self, draft: NewEvent) -> Result<WebhookEvent, AppError> {
        let event = WebhookEvent {
            id: Uuid::new_v4().to_string(),
            endpoint: draft.endpoint,
            method: draft.method,
            headers: draft.headers,
            body: draft.body,
            query: draft.query,
            ip: draft.ip,
            received_at: Utc::now().timestamp_millis(),
            response: draft.response,
        };

        let payload = serde_json::to_string(&event)?;
        self.kv.put(&event_key(&event.id), &payload, RETENTION).await?;

        if let Err(err) = self.append_to_index(&event.endpoint, &event.id).await {
            tracing::warn!(endpoint = %event.endpoint, error = %err, "index update failed");
        }
        if let Err(err) = self.touch_metadata(&event.endpoint).await {
            tracing::warn!(endpoint = %event.endpoint, error = %err, "metadata update failed");
        }

        Ok(event)
    }

    /// Direct lookup by id. Absence (expired, evicted, or unknown id) is
    /// `Ok(None)`, not an error.
    pub async fn get_event(&self, id: &str) -> Result<Option<WebhookEvent>, AppError> {
        match self.kv.get(&event_key(id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Newest-first history for one endpoint, served from its index. Ids
    /// whose event has expired out from under the index are dropped, so the
    /// result may be shorter than `limit` even when the index is longer.
    pub async fn get_events_by_endpoint(
        &self,
        endpoint: &str,
        limit: usize,
    ) -> Result<Vec<WebhookEvent>, AppError> {
        let Some(raw) = self.kv.get(&index_key(endpoint)).await? else {
            return Ok(Vec::new());
        };
        let ids: Vec<String> = serde_json::from_str(&raw)?;

        let mut events = Vec::new();
        for id in ids.iter().take(limit) {
            if let Some(event) = self.get_event(id).await? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Global newest-first listing via a prefix scan. The limit truncates
    /// the scanned keys before resolution, and the scan order is arbitrary,
    /// so this is the most recent among a limit-sized sample of keys, not a
    /// true system-wide top-N.
    pub async fn get_all_events(&self, limit: usize) -> Result<Vec<WebhookEvent>, AppError> {
        let keys = self.kv.list_keys("event:").await?;

        let mut events = Vec::new();
        for key in keys.iter().take(limit) {
            match self.kv.get(key).await? {
                Some(payload) => match serde_json::from_str::<WebhookEvent>(&payload) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "skipping malformed event record");
                    }
                },
                None => {}
            }
        }

        events.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(events)
    }

    /// Directory of known endpoints, most recently active first. Scans the
    /// whole metadata keyspace.
    pub async fn list_endpoints(&self) -> Result<Vec<EndpointMetadata>, AppError> {
        let keys = self.kv.list_keys("meta:").await?;

        let mut endpoints = Vec::new();
        for key in &keys {
            match self.kv.get(key).await? {
                Some(payload) => match serde_json::from_str::<EndpointMetadata>(&payload) {
                    Ok(meta) => endpoints.push(meta),
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "skipping malformed metadata record");
                    }
                },
                None => {}
            }
        }

        endpoints.sort_by(|a, b| b.last_event_at.cmp(&a.last_event_at));
        Ok(endpoints)
    }

    /// Prepends the id to the endpoint's index and truncates to the cap.
    /// Read-modify-write without synchronization: concurrent saves to the
    /// same endpoint can lose one writer's update. Last writer wins.
    async fn append_to_index(&self, endpoint: &str, event_id: &str) -> Result<(), AppError> {
        let key = index_key(endpoint);
        let mut ids: Vec<String> = match self.kv.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        ids.insert(0, event_id.to_owned());
        ids.truncate(INDEX_CAP);

        self.kv
            .put(&key, &serde_json::to_string(&ids)?, RETENTION)
            .await
    }

    /// Bumps the endpoint's aggregate record. Same unsynchronized
    /// read-modify-write as the index; `event_count` can undercount under
    /// concurrent saves.
    async fn touch_metadata(&self, endpoint: &str) -> Result<(), AppError> {
        let key = meta_key(endpoint);
        let mut meta: EndpointMetadata = match self.kv.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => EndpointMetadata {
                endpoint: endpoint.to_owned(),
                last_event_at: 0,
                event_count: 0,
            },
        };

        meta.last_event_at = Utc::now().timestamp_millis();
        meta.event_count += 1;

        self.kv
            .put(&key, &serde_json::to_string(&meta)?, RETENTION)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        domain::{EventResponse, NewEvent},
        kv::memory::MemoryKvStore,
    };

    use super::*;

    fn store() -> (WebhookStore, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        (WebhookStore::new(kv.clone()), kv)
    }

    fn draft(endpoint: &str, body: &str) -> NewEvent {
        NewEvent {
            endpoint: endpoint.to_owned(),
            method: "POST".to_owned(),
            headers: HashMap::from([("content-type".to_owned(), "text/plain".to_owned())]),
            body: Some(body.to_owned()),
            query: String::new(),
            ip: None,
            response: Some(EventResponse {
                status: 200,
                body: None,
            }),
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let (store, _) = store();

        let saved = store.save_event(draft("/hook", "x")).await.unwrap();
        assert!(!saved.id.is_empty());
        assert!(saved.received_at > 0);

        let fetched = store.get_event(&saved.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, saved.id);
        assert_eq!(fetched.endpoint, "/hook");
        assert_eq!(fetched.method, "POST");
        assert_eq!(fetched.body.as_deref(), Some("x"));
        assert_eq!(fetched.received_at, saved.received_at);
        assert_eq!(fetched.response.unwrap().status, 200);
    }

    #[tokio::test]
    async fn unknown_id_is_none_not_an_error() {
        let (store, _) = store();
        assert!(store.get_event("nonexistent-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn endpoint_history_is_newest_first() {
        let (store, _) = store();

        let a = store.save_event(draft("/hook", "x")).await.unwrap();
        let b = store.save_event(draft("/hook", "y")).await.unwrap();

        let events = store.get_events_by_endpoint("/hook", 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, b.id);
        assert_eq!(events[1].id, a.id);

        let endpoints = store.list_endpoints().await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].endpoint, "/hook");
        assert_eq!(endpoints[0].event_count, 2);
    }

    #[tokio::test]
    async fn endpoint_history_honors_limit() {
        let (store, _) = store();

        for i in 0..5 {
            store
                .save_event(draft("/hook", &i.to_string()))
                .await
                .unwrap();
        }

        let events = store.get_events_by_endpoint("/hook", 3).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].body.as_deref(), Some("4"));
        assert_eq!(events[2].body.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn missing_index_yields_empty_history() {
        let (store, _) = store();
        assert!(store
            .get_events_by_endpoint("/never-seen", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn sequential_saves_accumulate_metadata() {
        let (store, _) = store();

        let mut last = None;
        for _ in 0..4 {
            last = Some(store.save_event(draft("/hook", "x")).await.unwrap());
        }

        let endpoints = store.list_endpoints().await.unwrap();
        assert_eq!(endpoints[0].event_count, 4);
        assert!(endpoints[0].last_event_at >= last.unwrap().received_at);
    }

    #[tokio::test]
    async fn endpoint_directory_sorted_by_recency() {
        let (store, kv) = store();

        store.save_event(draft("/first", "x")).await.unwrap();
        store.save_event(draft("/second", "y")).await.unwrap();

        // Force distinct ordering regardless of timestamp granularity.
        let newer = EndpointMetadata {
            endpoint: "/second".to_owned(),
            last_event_at: i64::MAX,
            event_count: 1,
        };
        kv.put(
            "meta:/second",
            &serde_json::to_string(&newer).unwrap(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let endpoints = store.list_endpoints().await.unwrap();
        assert_eq!(endpoints[0].endpoint, "/second");
        assert_eq!(endpoints[1].endpoint, "/first");
    }

    #[tokio::test]
    async fn global_listing_sorted_descending_with_unique_ids() {
        let (store, _) = store();

        for i in 0..6 {
            store
                .save_event(draft(&format!("/hook-{}", i % 2), &i.to_string()))
                .await
                .unwrap();
        }

        let events = store.get_all_events(100).await.unwrap();
        assert_eq!(events.len(), 6);
        for pair in events.windows(2) {
            assert!(pair[0].received_at >= pair[1].received_at);
            assert_ne!(pair[0].id, pair[1].id);
        }
    }

    #[tokio::test]
    async fn global_listing_limit_caps_the_scan() {
        let (store, _) = store();

        for i in 0..5 {
            store.save_event(draft("/hook", &i.to_string())).await.unwrap();
        }

        let events = store.get_all_events(2).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn expired_event_is_dropped_from_history() {
        let (store, kv) = store();

        let a = store.save_event(draft("/hook", "x")).await.unwrap();
        let b = store.save_event(draft("/hook", "y")).await.unwrap();

        // Simulate TTL expiry of the older event while its id is still in
        // the index.
        kv.put(&format!("event:{}", a.id), "", Duration::from_millis(0))
            .await
            .unwrap();

        let events = store.get_events_by_endpoint("/hook", 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, b.id);
    }

    #[tokio::test]
    async fn index_caps_at_one_thousand_entries() {
        let (store, kv) = store();

        let first = store.save_event(draft("/hook", "0")).await.unwrap();
        for i in 1..=INDEX_CAP {
            store.save_event(draft("/hook", &i.to_string())).await.unwrap();
        }

        let raw = kv.get("index:/hook").await.unwrap().unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(ids.len(), INDEX_CAP);
        assert!(!ids.contains(&first.id));

        // The evicted id still resolves directly, and the lifetime counter
        // keeps counting past the cap.
        assert!(store.get_event(&first.id).await.unwrap().is_some());
        let endpoints = store.list_endpoints().await.unwrap();
        assert_eq!(endpoints[0].event_count, (INDEX_CAP + 1) as u64);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_in_listings() {
        let (store, kv) = store();

        store.save_event(draft("/hook", "x")).await.unwrap();
        kv.put("event:broken", "not-json", Duration::from_secs(60))
            .await
            .unwrap();
        kv.put("meta:broken", "not-json", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get_all_events(100).await.unwrap().len(), 1);
        assert_eq!(store.list_endpoints().await.unwrap().len(), 1);
    }
}
