use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::request::{
    AckResponse, BulkRequest, BulkResponse, CountResponse, GetResponse, Hit, Hits, SearchResponse,
    StoreRequest, WriteResponse,
};
use crate::traits::StoreClient;

/// Type name used when a request does not carry one.
const DEFAULT_TYPE: &str = "_doc";

/// The operations of [`StoreClient`], for call logs and failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Bulk,
    Get,
    Search,
    Scroll,
    ClearScroll,
    Count,
    Create,
    Index,
    Update,
    Delete,
    Close,
    CreateIndex,
    DeleteIndex,
    IndexExists,
    FlushIndex,
    RefreshIndex,
    PutMapping,
}

/// One call received by the store, successful or not.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub request: Value,
}

struct InjectedFailure {
    /// Calls still allowed to succeed before the failure fires.
    remaining: usize,
    error: StoreError,
}

struct StoredDocument {
    source: Value,
    version: u64,
}

#[derive(Default)]
struct IndexState {
    settings: Option<Value>,
    mappings: Map<String, Value>,
    documents: IndexMap<(String, String), StoredDocument>,
}

struct ScrollCursor {
    pending: Vec<Hit>,
    size: usize,
}

#[derive(Default)]
struct State {
    indices: BTreeMap<String, IndexState>,
    next_id: u64,
    next_scroll: u64,
    scrolls: HashMap<String, ScrollCursor>,
    calls: Vec<RecordedCall>,
    failures: HashMap<Operation, InjectedFailure>,
    closed: bool,
}

/// In-memory document store.
///
/// Intended for tests and embedding. Documents live per index, keyed by
/// type and id. Search and scroll return every document of the addressed
/// index (there is no query language); `from`/`size` page through them.
/// Writes create missing indices on the fly. Every call is logged, and a
/// failure can be injected for any operation.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Make the call to `operation` that follows `successes` successful
    /// ones fail with `error`. The failure fires once.
    pub fn fail_after(&self, operation: Operation, successes: usize, error: StoreError) {
        self.state.write().expect("lock poisoned").failures.insert(
            operation,
            InjectedFailure {
                remaining: successes,
                error,
            },
        );
    }

    /// Make the next call to `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: StoreError) {
        self.fail_after(operation, 0, error);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.read().expect("lock poisoned").calls.clone()
    }

    /// Calls received for `operation`, in order.
    pub fn calls_of(&self, operation: Operation) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == operation)
            .collect()
    }

    /// Bulk requests received so far, in order.
    pub fn bulk_requests(&self) -> Vec<BulkRequest> {
        self.calls_of(Operation::Bulk)
            .into_iter()
            .filter_map(|call| serde_json::from_value(call.request).ok())
            .collect()
    }

    /// The stored source of one document.
    pub fn document(&self, index: &str, type_name: &str, id: &str) -> Option<Value> {
        let state = self.state.read().expect("lock poisoned");
        state
            .indices
            .get(index)?
            .documents
            .get(&(type_name.to_string(), id.to_string()))
            .map(|doc| doc.source.clone())
    }

    /// Stored sources of an index, in insertion order.
    pub fn documents(&self, index: &str) -> Vec<Value> {
        let state = self.state.read().expect("lock poisoned");
        state
            .indices
            .get(index)
            .map(|idx| idx.documents.values().map(|doc| doc.source.clone()).collect())
            .unwrap_or_default()
    }

    /// The mapping installed for a type of an index.
    pub fn mapping(&self, index: &str, type_name: &str) -> Option<Value> {
        let state = self.state.read().expect("lock poisoned");
        state.indices.get(index)?.mappings.get(type_name).cloned()
    }

    /// The settings an index was created with.
    pub fn settings(&self, index: &str) -> Option<Value> {
        let state = self.state.read().expect("lock poisoned");
        state.indices.get(index)?.settings.clone()
    }

    /// Scroll cursors still held.
    pub fn open_scrolls(&self) -> usize {
        self.state.read().expect("lock poisoned").scrolls.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().expect("lock poisoned").closed
    }

    /// Log the call, then apply the closed flag and injected failures.
    fn begin<R: Serialize>(&self, state: &mut State, operation: Operation, request: &R) -> StoreResult<()> {
        let request = serde_json::to_value(request).unwrap_or(Value::Null);
        state.calls.push(RecordedCall { operation, request });

        if state.closed && operation != Operation::Close {
            return Err(StoreError::Closed);
        }

        if let Some(failure) = state.failures.get_mut(&operation) {
            if failure.remaining == 0 {
                let error = failure.error.clone();
                state.failures.remove(&operation);
                debug!(?operation, %error, "injected failure");
                return Err(error);
            }
            failure.remaining -= 1;
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryStore")
            .field("indices", &state.indices.len())
            .field("calls", &state.calls.len())
            .field("closed", &state.closed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Document operations on the raw state
// ---------------------------------------------------------------------------

fn required_index(request: &StoreRequest) -> StoreResult<String> {
    request
        .index
        .clone()
        .filter(|index| !index.is_empty())
        .ok_or_else(|| StoreError::Rejected("index is required".into()))
}

fn type_of(request: &StoreRequest) -> String {
    request
        .type_name
        .clone()
        .filter(|type_name| !type_name.is_empty())
        .unwrap_or_else(|| DEFAULT_TYPE.to_string())
}

/// The cursor id, from the `scroll_id` parameter or the body.
fn required_scroll_id(request: &StoreRequest) -> StoreResult<String> {
    request
        .param_str("scroll_id")
        .or_else(|| {
            request
                .body
                .as_ref()
                .and_then(|body| body.get("scroll_id"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .ok_or_else(|| StoreError::Rejected("scroll_id is required".into()))
}

fn required_id(request: &StoreRequest) -> StoreResult<String> {
    request
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::Rejected("id is required".into()))
}

impl State {
    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("auto-{}", self.next_id)
    }

    fn existing_index(&mut self, index: &str) -> StoreResult<&mut IndexState> {
        self.indices
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    fn write(
        &mut self,
        index: String,
        type_name: String,
        id: Option<String>,
        source: Value,
        must_be_new: bool,
    ) -> StoreResult<WriteResponse> {
        let id = match id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => self.generate_id(),
        };
        let state = self.indices.entry(index.clone()).or_default();
        let key = (type_name.clone(), id.clone());

        let previous = state.documents.get(&key).map(|doc| doc.version);
        if must_be_new && previous.is_some() {
            return Err(StoreError::Conflict { index, id });
        }

        let version = previous.map_or(1, |v| v + 1);
        state.documents.insert(key, StoredDocument { source, version });
        Ok(WriteResponse {
            index,
            type_name,
            id,
            version,
            result: if previous.is_some() { "updated" } else { "created" }.into(),
        })
    }

    fn update(&mut self, index: String, type_name: String, id: String, body: &Value) -> StoreResult<WriteResponse> {
        let Some(Value::Object(partial)) = body.get("doc") else {
            return Err(StoreError::Rejected("update body must carry a `doc` object".into()));
        };
        let state = self.existing_index(&index)?;
        let key = (type_name.clone(), id.clone());
        let Some(document) = state.documents.get_mut(&key) else {
            return Err(StoreError::NotFound { index, id });
        };

        match &mut document.source {
            Value::Object(source) => {
                for (name, value) in partial {
                    source.insert(name.clone(), value.clone());
                }
            }
            other => *other = Value::Object(partial.clone()),
        }
        document.version += 1;
        Ok(WriteResponse {
            index,
            type_name,
            id,
            version: document.version,
            result: "updated".into(),
        })
    }

    fn delete(&mut self, index: String, type_name: String, id: String) -> StoreResult<WriteResponse> {
        let state = self.existing_index(&index)?;
        match state.documents.shift_remove(&(type_name.clone(), id.clone())) {
            Some(document) => Ok(WriteResponse {
                index,
                type_name,
                id,
                version: document.version + 1,
                result: "deleted".into(),
            }),
            None => Err(StoreError::NotFound { index, id }),
        }
    }

    /// Every document of `index` (or of all indices), optionally restricted
    /// to one type.
    fn matching_hits(&self, index: Option<&str>, type_name: Option<&str>) -> StoreResult<Vec<Hit>> {
        let indices: Vec<(&String, &IndexState)> = match index {
            Some(name) => vec![self
                .indices
                .get_key_value(name)
                .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))?],
            None => self.indices.iter().collect(),
        };

        Ok(indices
            .into_iter()
            .flat_map(|(name, state)| {
                state
                    .documents
                    .iter()
                    .filter(move |((doc_type, _), _)| type_name.map_or(true, |t| doc_type.as_str() == t))
                    .map(move |((doc_type, id), doc)| Hit {
                        index: name.clone(),
                        type_name: doc_type.clone(),
                        id: id.clone(),
                        score: Some(1.0),
                        source: Some(doc.source.clone()),
                    })
            })
            .collect())
    }
}

/// Apply one bulk item, returning the item report.
fn apply_bulk_item(state: &mut State, action: &str, meta: &Map<String, Value>, document: Option<&Value>) -> Value {
    let text = |key: &str| meta.get(key).and_then(Value::as_str).map(str::to_string);
    let index = text("_index").unwrap_or_default();
    let type_name = text("_type").unwrap_or_else(|| DEFAULT_TYPE.to_string());
    let id = text("_id");

    let outcome = if index.is_empty() {
        Err(StoreError::Rejected("index is required".into()))
    } else {
        match (action, document) {
            ("index", Some(doc)) => state.write(index.clone(), type_name.clone(), id.clone(), doc.clone(), false),
            ("create", Some(doc)) => state.write(index.clone(), type_name.clone(), id.clone(), doc.clone(), true),
            ("update", Some(doc)) => match id.clone() {
                Some(id) => state.update(index.clone(), type_name.clone(), id, doc),
                None => Err(StoreError::Rejected("id is required".into())),
            },
            ("delete", _) => match id.clone() {
                Some(id) => state.delete(index.clone(), type_name.clone(), id),
                None => Err(StoreError::Rejected("id is required".into())),
            },
            _ => Err(StoreError::Rejected(format!("unsupported bulk action {action}"))),
        }
    };

    let report = match outcome {
        Ok(write) => {
            let status = if write.result == "created" { 201 } else { 200 };
            json!({
                "_index": write.index,
                "_type": write.type_name,
                "_id": write.id,
                "_version": write.version,
                "result": write.result,
                "status": status,
            })
        }
        Err(error) => {
            let status = match &error {
                StoreError::Conflict { .. } => 409,
                StoreError::NotFound { .. } | StoreError::IndexNotFound(_) => 404,
                _ => 400,
            };
            json!({
                "_index": index,
                "_type": type_name,
                "_id": id,
                "status": status,
                "error": error.to_string(),
            })
        }
    };

    let mut item = Map::new();
    item.insert(action.to_string(), report);
    Value::Object(item)
}

fn page(hits: Vec<Hit>, request: &StoreRequest) -> (Vec<Hit>, Vec<Hit>, usize) {
    let from = request.param_u64("from").unwrap_or(0) as usize;
    let size = request
        .param_u64("size")
        .map(|size| size as usize)
        .unwrap_or(usize::MAX);
    let mut remaining: Vec<Hit> = hits.into_iter().skip(from).collect();
    let rest = remaining.split_off(size.min(remaining.len()));
    (remaining, rest, size)
}

// ---------------------------------------------------------------------------
// StoreClient
// ---------------------------------------------------------------------------

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn bulk(&self, request: BulkRequest) -> StoreResult<BulkResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Bulk, &request)?;

        let mut items = Vec::new();
        let mut errors = false;
        let mut lines = request.body.iter();
        while let Some(line) = lines.next() {
            let (action, meta) = match line.as_object().filter(|record| record.len() == 1) {
                Some(record) => match record.iter().next() {
                    Some((action, Value::Object(meta))) => (action.as_str(), meta),
                    _ => return Err(StoreError::Rejected("malformed bulk action".into())),
                },
                None => return Err(StoreError::Rejected("malformed bulk action".into())),
            };
            let document = if action == "delete" {
                None
            } else {
                Some(
                    lines
                        .next()
                        .ok_or_else(|| StoreError::Rejected(format!("bulk {action} without a document")))?,
                )
            };

            let item = apply_bulk_item(&mut state, action, meta, document);
            errors |= item[action].get("error").is_some();
            items.push(item);
        }

        debug!(items = items.len(), errors, "bulk applied");
        Ok(BulkResponse {
            took: 0,
            errors,
            items,
        })
    }

    async fn get(&self, request: StoreRequest) -> StoreResult<GetResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Get, &request)?;
        let index = required_index(&request)?;
        let type_name = type_of(&request);
        let id = required_id(&request)?;

        let documents = &state.existing_index(&index)?.documents;
        let document = documents
            .get(&(type_name.clone(), id.clone()))
            .ok_or_else(|| StoreError::NotFound {
                index: index.clone(),
                id: id.clone(),
            })?;
        Ok(GetResponse {
            index,
            type_name,
            id,
            version: Some(document.version),
            found: true,
            source: Some(document.source.clone()),
        })
    }

    async fn search(&self, request: StoreRequest) -> StoreResult<SearchResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Search, &request)?;

        let hits = state.matching_hits(request.index.as_deref(), request.type_name.as_deref())?;
        let total = hits.len() as u64;
        let (hits, rest, size) = page(hits, &request);

        let scroll_id = if request.params.contains_key("scroll") {
            state.next_scroll += 1;
            let scroll_id = format!("scroll-{}", state.next_scroll);
            state
                .scrolls
                .insert(scroll_id.clone(), ScrollCursor { pending: rest, size });
            Some(scroll_id)
        } else {
            None
        };

        Ok(SearchResponse {
            scroll_id,
            took: 0,
            hits: Hits { total, hits },
        })
    }

    async fn scroll(&self, request: StoreRequest) -> StoreResult<SearchResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Scroll, &request)?;

        let scroll_id = required_scroll_id(&request)?;
        let cursor = state
            .scrolls
            .get_mut(&scroll_id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown scroll id {scroll_id}")))?;
        let take = cursor.size.min(cursor.pending.len());
        let hits: Vec<Hit> = cursor.pending.drain(..take).collect();
        let total = hits.len() as u64 + cursor.pending.len() as u64;
        if hits.is_empty() {
            state.scrolls.remove(&scroll_id);
        }

        Ok(SearchResponse {
            scroll_id: Some(scroll_id),
            took: 0,
            hits: Hits { total, hits },
        })
    }

    async fn clear_scroll(&self, request: StoreRequest) -> StoreResult<AckResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::ClearScroll, &request)?;
        let scroll_id = required_scroll_id(&request)?;
        if state.scrolls.remove(&scroll_id).is_none() {
            debug!(%scroll_id, "clearing unknown scroll");
        }
        Ok(AckResponse::ok())
    }

    async fn count(&self, request: StoreRequest) -> StoreResult<CountResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Count, &request)?;
        let hits = state.matching_hits(request.index.as_deref(), request.type_name.as_deref())?;
        Ok(CountResponse {
            count: hits.len() as u64,
        })
    }

    async fn create(&self, request: StoreRequest) -> StoreResult<WriteResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Create, &request)?;
        let index = required_index(&request)?;
        let source = request
            .body
            .clone()
            .ok_or_else(|| StoreError::Rejected("document body is required".into()))?;
        state.write(index, type_of(&request), request.id.clone(), source, true)
    }

    async fn index(&self, request: StoreRequest) -> StoreResult<WriteResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Index, &request)?;
        let index = required_index(&request)?;
        let source = request
            .body
            .clone()
            .ok_or_else(|| StoreError::Rejected("document body is required".into()))?;
        state.write(index, type_of(&request), request.id.clone(), source, false)
    }

    async fn update(&self, request: StoreRequest) -> StoreResult<WriteResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Update, &request)?;
        let index = required_index(&request)?;
        let id = required_id(&request)?;
        let body = request.body.clone().unwrap_or(Value::Null);
        state.update(index, type_of(&request), id, &body)
    }

    async fn delete(&self, request: StoreRequest) -> StoreResult<WriteResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Delete, &request)?;
        let index = required_index(&request)?;
        let id = required_id(&request)?;
        state.delete(index, type_of(&request), id)
    }

    async fn close(&self) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::Close, &Value::Null)?;
        state.closed = true;
        state.scrolls.clear();
        Ok(())
    }

    async fn create_index(&self, request: StoreRequest) -> StoreResult<AckResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::CreateIndex, &request)?;
        let index = required_index(&request)?;
        if state.indices.contains_key(&index) {
            return Err(StoreError::Rejected(format!("index {index} already exists")));
        }
        state.indices.insert(
            index,
            IndexState {
                settings: request.body.clone(),
                ..IndexState::default()
            },
        );
        Ok(AckResponse::ok())
    }

    async fn delete_index(&self, request: StoreRequest) -> StoreResult<AckResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::DeleteIndex, &request)?;
        let index = required_index(&request)?;
        state
            .indices
            .remove(&index)
            .map(|_| AckResponse::ok())
            .ok_or(StoreError::IndexNotFound(index))
    }

    async fn index_exists(&self, request: StoreRequest) -> StoreResult<bool> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::IndexExists, &request)?;
        let index = required_index(&request)?;
        Ok(state.indices.contains_key(&index))
    }

    async fn flush_index(&self, request: StoreRequest) -> StoreResult<AckResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::FlushIndex, &request)?;
        let index = required_index(&request)?;
        state.existing_index(&index)?;
        Ok(AckResponse::ok())
    }

    async fn refresh_index(&self, request: StoreRequest) -> StoreResult<AckResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::RefreshIndex, &request)?;
        let index = required_index(&request)?;
        state.existing_index(&index)?;
        Ok(AckResponse::ok())
    }

    async fn put_mapping(&self, request: StoreRequest) -> StoreResult<AckResponse> {
        let mut state = self.state.write().expect("lock poisoned");
        self.begin(&mut state, Operation::PutMapping, &request)?;
        let index = required_index(&request)?;
        let type_name = type_of(&request);
        let body = request
            .body
            .clone()
            .ok_or_else(|| StoreError::Rejected("mapping body is required".into()))?;
        state.existing_index(&index)?.mappings.insert(type_name, body);
        Ok(AckResponse::ok())
    }
}
