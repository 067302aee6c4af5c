//! Request and response shapes exchanged with a document store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A single-target request: `{ index, type, id?, body? }` plus any extra
/// query parameters (`size`, `scroll`, `refresh`, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl StoreRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Address the request to `index`/`type_name`, replacing any previous
    /// target.
    pub fn targeting(mut self, index: &str, type_name: &str) -> Self {
        self.index = Some(index.to_string());
        self.type_name = Some(type_name.to_string());
        self
    }

    /// A numeric parameter, if present.
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    /// A string parameter, if present.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// A bulk request: alternating action-description records and documents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub body: Vec<Value>,
}

impl BulkRequest {
    pub fn new(body: Vec<Value>) -> Self {
        Self { body }
    }

    /// Number of action records in the body. Every action except `delete`
    /// is followed by a document line.
    pub fn action_count(&self) -> usize {
        let mut count = 0;
        let mut lines = self.body.iter();
        while let Some(line) = lines.next() {
            count += 1;
            let is_delete = line.as_object().is_some_and(|record| record.contains_key("delete"));
            if !is_delete {
                lines.next();
            }
        }
        count
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Single-document response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", default)]
    pub type_name: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// One search hit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", default)]
    pub type_name: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Multi-document response (search and scroll).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "_scroll_id", default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub hits: Hits,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Response to a single-document write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", default)]
    pub type_name: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: u64,
    /// `created`, `updated` or `deleted`.
    pub result: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    /// `true` if at least one item failed.
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Acknowledgement of an index administration call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub acknowledged: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { acknowledged: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_flat() {
        let request = StoreRequest::new()
            .targeting("twitter", "tweet")
            .id("1")
            .param("refresh", json!(true));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "index": "twitter", "type": "tweet", "id": "1", "refresh": true })
        );
    }

    #[test]
    fn targeting_replaces_index_and_type() {
        let request = StoreRequest::new().index("a").type_name("b").targeting("c", "d");
        assert_eq!(request.index.as_deref(), Some("c"));
        assert_eq!(request.type_name.as_deref(), Some("d"));
    }

    #[test]
    fn bulk_action_count_skips_delete_documents() {
        let request = BulkRequest::new(vec![
            json!({ "index": { "_index": "a" } }),
            json!({ "name": "Bob" }),
            json!({ "delete": { "_index": "a", "_id": "2" } }),
            json!({ "create": { "_index": "a" } }),
            json!({ "name": "Tom" }),
        ]);
        assert_eq!(request.action_count(), 3);
    }

    #[test]
    fn search_response_from_wire() {
        let response: SearchResponse = serde_json::from_value(json!({
            "took": 3,
            "hits": {
                "total": 1,
                "hits": [{ "_index": "a", "_type": "t", "_id": "1", "_score": 1.0, "_source": { "name": "Bob" } }]
            }
        }))
        .unwrap();
        assert_eq!(response.hits.hits[0].source, Some(json!({ "name": "Bob" })));
        assert_eq!(response.scroll_id, None);
    }
}
