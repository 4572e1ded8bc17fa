use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    domain::{EndpointMetadata, EventResponse, NewEvent, WebhookEvent},
    errors::AppError,
    store::WebhookStore,
};

/// Inbound headers never relayed upstream or recorded. Platform-internal
/// `cf-*` headers are excluded as well (by prefix, in `forwardable_headers`).
const SKIPPED_REQUEST_HEADERS: [&str; 4] =
    ["host", "content-length", "x-forwarded-proto", "x-real-ip"];

/// Upstream response headers dropped so the server reframes the body itself.
const SKIPPED_RESPONSE_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

const DEFAULT_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: WebhookStore,
    pub client: reqwest::Client,
    pub forward_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/endpoints", get(list_endpoints))
        .route("/api/events", get(list_events))
        .route("/api/events/:id", get(get_event))
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> String {
    format!("Webhook proxy -> {}", state.forward_url)
}

async fn list_endpoints(
    State(state): State<AppState>,
) -> Result<Json<Vec<EndpointMetadata>>, AppError> {
    Ok(Json(state.store.list_endpoints().await?))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    endpoint: Option<String>,
    limit: Option<String>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<Vec<WebhookEvent>>, AppError> {
    // Absent or non-numeric limits fall back rather than erroring.
    let limit = params
        .limit
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_LIMIT);

    let events = match params.endpoint.as_deref() {
        Some(endpoint) => state.store.get_events_by_endpoint(endpoint, limit).await?,
        None => state.store.get_all_events(limit).await?,
    };
    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WebhookEvent>, AppError> {
    state
        .store
        .get_event(&id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[derive(Debug, Serialize)]
struct ForwardFailure {
    error: &'static str,
    message: String,
    stored: bool,
}

/// Catch-all: relay the request to the configured upstream and record the
/// exchange as an event before responding. The event is saved even when the
/// forwarding call fails.
async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_owned();
    if path.starts_with("/api/") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let query = uri.query().unwrap_or("").to_owned();
    let target = if query.is_empty() {
        format!("{}{}", state.forward_url, path)
    } else {
        format!("{}{}?{}", state.forward_url, path, query)
    };

    let forwarded = forwardable_headers(&headers);
    let ip = client_ip(&headers);
    let stored_body = if body.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&body).into_owned())
    };

    let mut request = state.client.request(method.clone(), &target).body(body);
    for (name, value) in &forwarded {
        request = request.header(name.as_str(), value.as_str());
    }

    let draft = NewEvent {
        endpoint: path,
        method: method.to_string(),
        headers: forwarded,
        body: stored_body,
        query,
        ip,
        response: None,
    };

    let outcome = async {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, headers, body))
    }
    .await;

    match outcome {
        Ok((status, upstream_headers, upstream_body)) => {
            let draft = NewEvent {
                response: Some(EventResponse {
                    status: status.as_u16(),
                    body: if upstream_body.is_empty() {
                        None
                    } else {
                        Some(String::from_utf8_lossy(&upstream_body).into_owned())
                    },
                }),
                ..draft
            };
            if let Err(err) = state.store.save_event(draft).await {
                tracing::error!(error = %err, "failed to record forwarded event");
            }

            let mut relayed = HeaderMap::new();
            for (name, value) in &upstream_headers {
                if !SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                    relayed.insert(name.clone(), value.clone());
                }
            }
            (status, relayed, upstream_body).into_response()
        }
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(error = %message, url = %target, "forwarding failed");

            let draft = NewEvent {
                response: Some(EventResponse {
                    status: 502,
                    body: Some(message.clone()),
                }),
                ..draft
            };
            let stored = match state.store.save_event(draft).await {
                Ok(_) => true,
                Err(err) => {
                    tracing::error!(error = %err, "failed to record failed forward");
                    false
                }
            };

            (
                StatusCode::BAD_GATEWAY,
                Json(ForwardFailure {
                    error: "Forward failed",
                    message,
                    stored,
                }),
            )
                .into_response()
        }
    }
}

fn forwardable_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        let name = name.as_str();
        if SKIPPED_REQUEST_HEADERS.contains(&name) || name.starts_with("cf-") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            map.insert(name.to_owned(), value.to_owned());
        }
    }
    map
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    ["cf-connecting-ip", "x-real-ip"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}
