/// In-memory mock of the Base HTTP service
///
/// Serves the `/v1/:project/:base/...` routes on an ephemeral local port and
/// records every request so tests can assert on the exact wire traffic.
use crate::matcher::{apply_update, matches_query};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use dena_client::{ClientConfig, Dena};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// Largest serialized item accepted by the hosted service
pub const DEFAULT_MAX_ITEM_BYTES: usize = 400 * 1024;

/// Page size applied when a query omits `limit`
pub const DEFAULT_QUERY_LIMIT: usize = 1000;

type Record = Map<String, Value>;

/// One request as seen by the mock service
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    /// Raw (percent-encoded) request path
    pub path: String,
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    /// Parsed JSON body; `None` when the request had no body
    pub body: Option<Value>,
}

struct Inner {
    bases: HashMap<(String, String), BTreeMap<String, Record>>,
    requests: Vec<RecordedRequest>,
    /// Accepted project keys; empty accepts any key of the right project
    api_keys: HashSet<String>,
    max_item_bytes: usize,
    default_limit: usize,
    next_key: u64,
}

impl Inner {
    fn base_mut(&mut self, project: &str, base: &str) -> &mut BTreeMap<String, Record> {
        self.bases
            .entry((project.to_string(), base.to_string()))
            .or_default()
    }

    fn generate_key(&mut self) -> String {
        self.next_key += 1;
        format!("{:012}", self.next_key)
    }
}

#[derive(Clone)]
struct MockState(Arc<Mutex<Inner>>);

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn reject(status: StatusCode, message: &str) -> Response {
    reply(status, json!({ "errors": [message] }))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

impl MockState {
    /// Record the request, check the API key against the path's project and
    /// parse the body.
    fn begin(
        &self,
        method: &str,
        uri: &Uri,
        headers: &HeaderMap,
        body: &Bytes,
        project: &str,
    ) -> Result<Option<Value>, Response> {
        let api_key = header(headers, "x-api-key");
        let parsed = if body.is_empty() {
            Ok(None)
        } else {
            serde_json::from_slice::<Value>(body).map(Some)
        };

        debug!(method, path = uri.path(), "mock service received request");
        let mut inner = self.0.lock();
        inner.requests.push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            api_key: api_key.clone(),
            content_type: header(headers, "content-type"),
            body: parsed.as_ref().ok().cloned().flatten(),
        });

        let authorized = api_key.as_deref().map_or(false, |key| {
            let key_project = key.split('_').next().unwrap_or_default();
            key_project == project && (inner.api_keys.is_empty() || inner.api_keys.contains(key))
        });
        drop(inner);
        if !authorized {
            return Err(reject(StatusCode::UNAUTHORIZED, "Unauthorized"));
        }

        parsed.map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid JSON body"))
    }
}

async fn put_items(
    State(state): State<MockState>,
    Path((project, base)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match state.begin("PUT", &uri, &headers, &body, &project) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let items = match body.as_ref().and_then(|b| b.get("items")).and_then(Value::as_array) {
        Some(items) => items.clone(),
        None => return reject(StatusCode::BAD_REQUEST, "Body must contain an items list"),
    };

    let mut inner = state.0.lock();
    let max_item_bytes = inner.max_item_bytes;
    let mut processed = Vec::new();
    let mut failed = Vec::new();

    for item in items {
        let record = match item.as_object() {
            Some(record) => record.clone(),
            None => {
                failed.push(item);
                continue;
            }
        };
        let too_large = serde_json::to_vec(&record).map_or(true, |bytes| bytes.len() > max_item_bytes);
        let key = match record.get("key") {
            None => Some(inner.generate_key()),
            Some(Value::String(key)) if !key.is_empty() => Some(key.clone()),
            Some(_) => None,
        };

        match key {
            Some(key) if !too_large => {
                let mut stored = record;
                stored.insert("key".to_string(), Value::String(key.clone()));
                inner.base_mut(&project, &base).insert(key, stored.clone());
                processed.push(Value::Object(stored));
            }
            _ => failed.push(item),
        }
    }

    let mut response = json!({ "processed": { "items": processed } });
    if !failed.is_empty() {
        response["failed"] = json!({ "items": failed });
    }
    reply(StatusCode::MULTI_STATUS, response)
}

async fn insert_item(
    State(state): State<MockState>,
    Path((project, base)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match state.begin("POST", &uri, &headers, &body, &project) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let mut record = match body.as_ref().and_then(|b| b.get("item")).and_then(Value::as_object) {
        Some(record) => record.clone(),
        None => return reject(StatusCode::BAD_REQUEST, "Body must contain an item object"),
    };

    let mut inner = state.0.lock();
    let key = match record.get("key") {
        None => inner.generate_key(),
        Some(Value::String(key)) if !key.is_empty() => key.clone(),
        Some(_) => return reject(StatusCode::BAD_REQUEST, "Key must be a non-empty string"),
    };

    let items = inner.base_mut(&project, &base);
    if items.contains_key(&key) {
        return reject(StatusCode::CONFLICT, "Key already exists");
    }
    record.insert("key".to_string(), Value::String(key.clone()));
    items.insert(key, record.clone());
    reply(StatusCode::CREATED, Value::Object(record))
}

async fn get_item(
    State(state): State<MockState>,
    Path((project, base, key)): Path<(String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = state.begin("GET", &uri, &headers, &body, &project) {
        return response;
    }

    match state.0.lock().base_mut(&project, &base).get(&key) {
        Some(record) => reply(StatusCode::OK, Value::Object(record.clone())),
        None => reject(StatusCode::NOT_FOUND, "Key not found"),
    }
}

async fn delete_item(
    State(state): State<MockState>,
    Path((project, base, key)): Path<(String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = state.begin("DELETE", &uri, &headers, &body, &project) {
        return response;
    }

    state.0.lock().base_mut(&project, &base).remove(&key);
    reply(StatusCode::OK, json!({ "key": key }))
}

async fn update_item(
    State(state): State<MockState>,
    Path((project, base, key)): Path<(String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match state.begin("PATCH", &uri, &headers, &body, &project) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let update = match body {
        Some(Value::Object(update)) => update,
        _ => return reject(StatusCode::BAD_REQUEST, "Body must be an update object"),
    };

    let mut inner = state.0.lock();
    let items = inner.base_mut(&project, &base);
    let current = match items.get(&key) {
        Some(record) => record,
        None => return reject(StatusCode::NOT_FOUND, "Key not found"),
    };

    let mut updated = current.clone();
    if let Err(message) = apply_update(&mut updated, &update) {
        return reject(StatusCode::BAD_REQUEST, &message);
    }
    items.insert(key.clone(), updated);

    let mut response = update;
    response.insert("key".to_string(), Value::String(key));
    reply(StatusCode::OK, Value::Object(response))
}

async fn query_items(
    State(state): State<MockState>,
    Path((project, base)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match state.begin("POST", &uri, &headers, &body, &project) {
        Ok(body) => body.unwrap_or_else(|| json!({})),
        Err(response) => return response,
    };

    let filters = match body.get("query") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(filters)) => filters.clone(),
        Some(_) => return reject(StatusCode::BAD_REQUEST, "query must be a list"),
    };
    let last = body.get("last").and_then(Value::as_str).map(str::to_string);

    let mut inner = state.0.lock();
    let limit = match body.get("limit") {
        None | Some(Value::Null) => inner.default_limit,
        Some(limit) => match limit.as_u64() {
            Some(limit) if limit > 0 => limit as usize,
            _ => return reject(StatusCode::BAD_REQUEST, "limit must be a positive integer"),
        },
    };

    let mut matching = Vec::new();
    for (key, record) in inner.base_mut(&project, &base).iter() {
        if last.as_deref().map_or(false, |last| key.as_str() <= last) {
            continue;
        }
        match matches_query(record, &filters) {
            Ok(true) => matching.push(record.clone()),
            Ok(false) => {}
            Err(message) => return reject(StatusCode::BAD_REQUEST, &message),
        }
    }

    let has_more = matching.len() > limit;
    matching.truncate(limit);

    let mut paging = json!({ "size": matching.len() });
    if has_more {
        if let Some(last_key) = matching.last().and_then(|record| record.get("key")) {
            paging["last"] = last_key.clone();
        }
    }

    let items: Vec<Value> = matching.into_iter().map(Value::Object).collect();
    reply(StatusCode::OK, json!({ "paging": paging, "items": items }))
}

/// Builder for a [`MockServer`]
pub struct MockServerBuilder {
    api_keys: HashSet<String>,
    max_item_bytes: usize,
    default_limit: usize,
}

impl MockServerBuilder {
    /// Accept only the registered keys. Without any, every key whose
    /// project matches the path is accepted.
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_keys.insert(key.to_string());
        self
    }

    /// Reject items in `put` whose serialized size exceeds `bytes`
    pub fn max_item_bytes(mut self, bytes: usize) -> Self {
        self.max_item_bytes = bytes;
        self
    }

    /// Page size used when a query has no `limit`
    pub fn default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Bind an ephemeral port and start serving in the background
    pub async fn start(self) -> anyhow::Result<MockServer> {
        let state = MockState(Arc::new(Mutex::new(Inner {
            bases: HashMap::new(),
            requests: Vec::new(),
            api_keys: self.api_keys,
            max_item_bytes: self.max_item_bytes,
            default_limit: self.default_limit,
            next_key: 0,
        })));

        let app = Router::new()
            .route("/v1/:project/:base/items", put(put_items).post(insert_item))
            .route(
                "/v1/:project/:base/items/:key",
                axum::routing::get(get_item).delete(delete_item).patch(update_item),
            )
            .route("/v1/:project/:base/query", post(query_items))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Mock server error: {}", e);
            }
        });

        debug!(%addr, "mock service listening");
        Ok(MockServer { addr, state, handle })
    }
}

/// Running mock service; stops when dropped
pub struct MockServer {
    addr: SocketAddr,
    state: MockState,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder {
            api_keys: HashSet::new(),
            max_item_bytes: DEFAULT_MAX_ITEM_BYTES,
            default_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    /// Start with default limits
    pub async fn start() -> anyhow::Result<Self> {
        Self::builder().start().await
    }

    /// Root URL to use as the client's base endpoint
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client factory pointed at this server
    pub fn client(&self, key: &str) -> dena_client::Result<Dena> {
        Dena::with_config(key, ClientConfig::new().with_base_endpoint(self.endpoint()))
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.0.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.0.lock().requests.clear();
    }

    /// Stored item, bypassing the HTTP layer
    pub fn stored_item(&self, project: &str, base: &str, key: &str) -> Option<Value> {
        self.state
            .0
            .lock()
            .bases
            .get(&(project.to_string(), base.to_string()))
            .and_then(|items| items.get(key))
            .cloned()
            .map(Value::Object)
    }

    pub fn item_count(&self, project: &str, base: &str) -> usize {
        self.state
            .0
            .lock()
            .bases
            .get(&(project.to_string(), base.to_string()))
            .map_or(0, BTreeMap::len)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
