//! Document-oriented data store abstraction
//!
//! The query engine only ever speaks this interface: equality/range/"in"
//! filtering, multi-key ordering, cursor pagination, bulk reads.
//! Currently backed by an in-memory implementation; a hosted document
//! database can be swapped in behind the same trait.

use crate::error::AgentError;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

//
// ================= Query Plan =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// One concrete query against a named collection
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Vec<SortKey>,
    /// Cursor: ordered tuple of scalar values matching `order_by`
    pub start_after: Vec<Value>,
    pub limit: Option<usize>,
}

impl CollectionQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }
}

//
// ================= Store Trait =================
//

/// Trait for document-store access
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a filtered/ordered/paginated query. Returned documents carry
    /// their document id under the `id` field.
    async fn run_query(&self, query: &CollectionQuery) -> Result<Vec<Value>>;

    /// Fetch one document by id.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Read a whole collection, unordered.
    async fn list_collection(&self, collection: &str) -> Result<Vec<Value>>;
}

//
// ================= In-Memory Store =================
//

/// In-memory document store for development and tests
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<(String, Value)>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, collection: &str, id: &str, document: Value) {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(Vec::new)
            .push((id.to_string(), document));
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn run_query(&self, query: &CollectionQuery) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        let docs = collections
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();

        let mut matched: Vec<Value> = docs
            .into_iter()
            .filter(|(_, doc)| query.filters.iter().all(|f| matches_filter(doc, f)))
            .map(|(id, doc)| with_id(id, doc))
            .collect();

        if !query.order_by.is_empty() {
            matched.sort_by(|a, b| compare_by_keys(a, b, &query.order_by));
        }

        if !query.start_after.is_empty() && !query.order_by.is_empty() {
            if query.start_after.len() > query.order_by.len() {
                return Err(AgentError::QueryError(
                    "Cursor has more values than sort keys".to_string(),
                ));
            }
            let cursor = &query.start_after;
            let keys = &query.order_by;
            matched.retain(|doc| cursor_position(doc, cursor, keys) == Ordering::Greater);
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(doc_id, _)| doc_id == id)
                .map(|(doc_id, doc)| with_id(doc_id.clone(), doc.clone()))
        }))
    }

    async fn list_collection(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| with_id(id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn with_id(id: String, mut doc: Value) -> Value {
    if let Some(map) = doc.as_object_mut() {
        map.entry("id".to_string())
            .or_insert_with(|| Value::String(id));
    }
    doc
}

//
// ================= Matching & Ordering =================
//

fn matches_filter(doc: &Value, filter: &FieldFilter) -> bool {
    let field_value = doc.get(&filter.field);

    match filter.op {
        FilterOp::Eq => field_value.is_some_and(|v| values_equal(v, &filter.value)),
        FilterOp::Gt => cmp_ordered(field_value, &filter.value, Ordering::Greater, false),
        FilterOp::Gte => cmp_ordered(field_value, &filter.value, Ordering::Greater, true),
        FilterOp::Lt => cmp_ordered(field_value, &filter.value, Ordering::Less, false),
        FilterOp::Lte => cmp_ordered(field_value, &filter.value, Ordering::Less, true),
        FilterOp::In => match (&filter.value, field_value) {
            (Value::Array(candidates), Some(v)) => {
                candidates.iter().any(|c| values_equal(v, c))
            }
            _ => false,
        },
        FilterOp::NotIn => match (&filter.value, field_value) {
            (Value::Array(candidates), Some(v)) => {
                !candidates.iter().any(|c| values_equal(v, c))
            }
            _ => false,
        },
        FilterOp::ArrayContains => match field_value {
            Some(Value::Array(items)) => items.iter().any(|i| values_equal(i, &filter.value)),
            _ => false,
        },
        FilterOp::ArrayContainsAny => match (field_value, &filter.value) {
            (Some(Value::Array(items)), Value::Array(candidates)) => items
                .iter()
                .any(|i| candidates.iter().any(|c| values_equal(i, c))),
            _ => false,
        },
    }
}

fn cmp_ordered(
    field_value: Option<&Value>,
    bound: &Value,
    wanted: Ordering,
    or_equal: bool,
) -> bool {
    let Some(v) = field_value else {
        return false;
    };
    let ordering = compare_values(v, bound);
    ordering == wanted || (or_equal && ordering == Ordering::Equal)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over scalar JSON values: null < bool < number < string
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_by_keys(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let null = Value::Null;
        let av = a.get(&key.field).unwrap_or(&null);
        let bv = b.get(&key.field).unwrap_or(&null);
        let mut ordering = compare_values(av, bv);
        if key.direction == SortDirection::Desc {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Where the document stands relative to a cursor tuple, in sort order.
/// `Greater` means strictly after the cursor position.
fn cursor_position(doc: &Value, cursor: &[Value], keys: &[SortKey]) -> Ordering {
    for (value, key) in cursor.iter().zip(keys) {
        let null = Value::Null;
        let doc_value = doc.get(&key.field).unwrap_or(&null);
        let mut ordering = compare_values(doc_value, value);
        if key.direction == SortDirection::Desc {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded_store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .insert("transactions", "t1", json!({"amount": 100.0, "date": 1000, "category": "Comida"}))
            .await;
        store
            .insert("transactions", "t2", json!({"amount": 50.0, "date": 2000, "category": "Transporte"}))
            .await;
        store
            .insert("transactions", "t3", json!({"amount": 75.0, "date": 3000, "category": "Comida"}))
            .await;
        store
    }

    #[tokio::test]
    async fn test_equality_and_range_filters() {
        let store = seeded_store().await;
        let mut query = CollectionQuery::new("transactions");
        query.filters = vec![
            FieldFilter::eq("category", "Comida"),
            FieldFilter {
                field: "amount".to_string(),
                op: FilterOp::Gte,
                value: json!(80),
            },
        ];

        let docs = store.run_query(&query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "t1");
    }

    #[tokio::test]
    async fn test_ordering_and_limit() {
        let store = seeded_store().await;
        let mut query = CollectionQuery::new("transactions");
        query.order_by = vec![SortKey::new("date", SortDirection::Desc)];
        query.limit = Some(2);

        let docs = store.run_query(&query).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["id"], "t3");
        assert_eq!(docs[1]["id"], "t2");
    }

    #[tokio::test]
    async fn test_cursor_skips_up_to_tuple() {
        let store = seeded_store().await;
        let mut query = CollectionQuery::new("transactions");
        query.order_by = vec![SortKey::new("date", SortDirection::Asc)];
        query.start_after = vec![json!(1000)];

        let docs = store.run_query(&query).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["id"], "t2");
    }

    #[tokio::test]
    async fn test_in_membership() {
        let store = seeded_store().await;
        let mut query = CollectionQuery::new("transactions");
        query.filters = vec![FieldFilter {
            field: "category".to_string(),
            op: FilterOp::In,
            value: json!(["Comida", "Otros"]),
        }];

        let docs = store.run_query(&query).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_filter_op_wire_names() {
        let filter: FieldFilter =
            serde_json::from_str(r#"{"field":"amount","op":">=","value":10}"#).unwrap();
        assert_eq!(filter.op, FilterOp::Gte);
    }
}
