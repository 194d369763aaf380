//! Transaction query engine
//!
//! Translates one validated argument set into a concrete store query
//! (filters, sort, cursor, limit), then post-processes rows: description
//! substring filtering, user display-name resolution, date display
//! formatting, and optional in-memory grouping with per-group sums.
//!
//! Sort keys that name a summed field, or the synthetic `yearMonth` key,
//! never reach the store — those values only exist after aggregation, so
//! ordering for them happens in memory.

use crate::catalog::{normalize_name, CatalogCache};
use crate::datastore::{
    CollectionQuery, DocumentStore, FieldFilter, FilterOp, SortDirection, SortKey,
};
use crate::error::AgentError;
use crate::Result;
use chrono::{DateTime, Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const TRANSACTIONS_COLLECTION: &str = "transactions";
const USERS_COLLECTION: &str = "users";
const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 2000;
const MAX_IN_TERMS: usize = 10;

//
// ================= Arguments =================
//

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AmountRange {
    pub gte: Option<f64>,
    pub lte: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub by: Vec<String>,
    #[serde(default)]
    pub sum: Vec<String>,
    #[serde(default)]
    pub include_docs: bool,
}

/// Fully-defaulted argument set for one transactions query.
/// Field names match the tool-call schema the model sees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryArgs {
    // User (one or the other)
    pub user_uid: Option<String>,
    pub user_path: Option<String>,

    // Type (by id or name; resolved against the types catalog)
    pub type_id: Option<String>,
    pub type_name: Option<String>,

    // Category (by id, by name, or multiple names)
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub categories: Vec<String>,

    pub tenant: Option<String>,

    pub amount: AmountRange,
    pub date: DateRange,

    // Free filters, applied verbatim
    pub filters: Vec<FieldFilter>,

    pub description_contains: Option<String>,

    pub order_by: Vec<SortKey>,
    pub limit: Option<usize>,
    pub start_after: Vec<Value>,

    pub project: Vec<String>,
    pub group: Option<GroupSpec>,
}

//
// ================= Output =================
//

/// Terminal payload of a query: plain rows or aggregated groups,
/// each carrying the total row count.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Groups { groups: Vec<Value>, count: usize },
    Rows { docs: Vec<Value>, count: usize },
}

//
// ================= Engine =================
//

/// Executes transaction queries against the document store
pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
    catalogs: Arc<CatalogCache>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn DocumentStore>, catalogs: Arc<CatalogCache>) -> Self {
        Self { store, catalogs }
    }

    pub async fn run(&self, args: QueryArgs) -> Result<QueryOutcome> {
        // 1) User reference → canonical "/users/<uid>" path
        let user_path = resolve_user_path(&args);

        // 2) Type / category resolution against the catalogs
        let type_name = self.resolve_type(&args).await?;
        let category_name = self.resolve_category(&args).await?;

        let order_by_list: Vec<SortKey> = if args.order_by.is_empty() {
            vec![SortKey::new("date", SortDirection::Desc)]
        } else {
            args.order_by.clone()
        };

        let limit = args.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        if limit == 0 {
            return Err(AgentError::InvalidToolInput(
                "limit must be positive".to_string(),
            ));
        }

        // 3) Equality and range filters
        let mut query = CollectionQuery::new(TRANSACTIONS_COLLECTION);

        if let Some(path) = &user_path {
            query.filters.push(FieldFilter::eq("user", path.clone()));
        }
        if let Some(name) = &type_name {
            query.filters.push(FieldFilter::eq("type", name.clone()));
        }

        if let Some(name) = &category_name {
            query.filters.push(FieldFilter::eq("category", name.clone()));
        } else if args.categories.len() == 1 {
            query
                .filters
                .push(FieldFilter::eq("category", args.categories[0].clone()));
        } else if args.categories.len() > 1 {
            let terms: Vec<Value> = args
                .categories
                .iter()
                .take(MAX_IN_TERMS)
                .map(|c| Value::String(c.clone()))
                .collect();
            query.filters.push(FieldFilter {
                field: "category".to_string(),
                op: FilterOp::In,
                value: Value::Array(terms),
            });
        }

        if let Some(tenant) = &args.tenant {
            query.filters.push(FieldFilter::eq("tenant", tenant.clone()));
        }

        if let Some(gte) = args.amount.gte {
            query.filters.push(FieldFilter {
                field: "amount".to_string(),
                op: FilterOp::Gte,
                value: json!(gte),
            });
        }
        if let Some(lte) = args.amount.lte {
            query.filters.push(FieldFilter {
                field: "amount".to_string(),
                op: FilterOp::Lte,
                value: json!(lte),
            });
        }

        // Date range; an unset range means the current calendar month
        let (from_ms, to_ms) = match (args.date.from_ms, args.date.to_ms) {
            (None, None) => {
                let (from, to) = month_bounds(Local::now());
                (Some(from), Some(to))
            }
            (from, to) => (from, to),
        };

        if let Some(from) = from_ms {
            query.filters.push(FieldFilter {
                field: "date".to_string(),
                op: FilterOp::Gte,
                value: json!(from),
            });
        }
        if let Some(to) = to_ms {
            query.filters.push(FieldFilter {
                field: "date".to_string(),
                op: FilterOp::Lte,
                value: json!(to),
            });
        }

        // 4) Free-form filters, verbatim
        query.filters.extend(args.filters.iter().cloned());

        // 5) Sort keys, minus the ones only computable after aggregation
        let grouping_by_year_month = args
            .group
            .as_ref()
            .map(|g| g.by.iter().any(|f| f == "yearMonth"))
            .unwrap_or(false);

        for key in &order_by_list {
            if grouping_by_year_month && key.field == "yearMonth" {
                continue;
            }
            if let Some(group) = &args.group {
                if !group.sum.is_empty()
                    && (group.sum.contains(&key.field) || key.field.starts_with("sum_"))
                {
                    continue;
                }
            }
            query.order_by.push(key.clone());
        }

        // 6) Cursor + page size
        if !args.start_after.is_empty() && !query.order_by.is_empty() {
            query.start_after = args.start_after.clone();
        }
        query.limit = Some(limit);

        debug!(
            filters = query.filters.len(),
            order_keys = query.order_by.len(),
            limit,
            "Executing transactions query"
        );

        // 7) Execute and post-process rows
        let mut docs = self.store.run_query(&query).await?;

        if let Some(needle) = &args.description_contains {
            let needle = normalize_name(needle);
            docs.retain(|doc| {
                let haystack = doc
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                !needle.is_empty() && normalize_name(haystack).contains(&needle)
            });
        }

        self.enrich_rows(&mut docs).await;

        // 8) Grouping
        if let Some(group) = &args.group {
            let groups = build_groups(&docs, group, &order_by_list, grouping_by_year_month);
            return Ok(QueryOutcome::Groups {
                count: docs.len(),
                groups,
            });
        }

        // 9) Projection
        if !args.project.is_empty() {
            let mut fields = args.project.clone();
            if !fields.iter().any(|f| f == "userDisplayName") {
                fields.push("userDisplayName".to_string());
            }

            let projected: Vec<Value> = docs
                .iter()
                .map(|doc| {
                    let mut out = Map::new();
                    if let Some(id) = doc.get("id") {
                        out.insert("id".to_string(), id.clone());
                    }
                    for field in &fields {
                        out.insert(
                            field.clone(),
                            doc.get(field).cloned().unwrap_or(Value::Null),
                        );
                    }
                    Value::Object(out)
                })
                .collect();

            let count = projected.len();
            return Ok(QueryOutcome::Rows {
                docs: projected,
                count,
            });
        }

        let count = docs.len();
        Ok(QueryOutcome::Rows { docs, count })
    }

    async fn resolve_type(&self, args: &QueryArgs) -> Result<Option<String>> {
        if args.type_name.is_none() && args.type_id.is_none() {
            return Ok(None);
        }
        let types = self.catalogs.types().await?;

        if let Some(name) = &args.type_name {
            return Ok(Some(
                types
                    .canonical_name(name)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| name.clone()),
            ));
        }
        Ok(args
            .type_id
            .as_ref()
            .and_then(|id| types.resolve_id(id))
            .map(|s| s.to_string()))
    }

    async fn resolve_category(&self, args: &QueryArgs) -> Result<Option<String>> {
        if args.category_name.is_none() && args.category_id.is_none() {
            return Ok(None);
        }
        let categories = self.catalogs.categories().await?;

        if let Some(name) = &args.category_name {
            return Ok(Some(
                categories
                    .canonical_name(name)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| name.clone()),
            ));
        }
        Ok(args
            .category_id
            .as_ref()
            .and_then(|id| categories.resolve_id(id))
            .map(|s| s.to_string()))
    }

    /// Resolve user display names (one store read per distinct uid) and
    /// derive the display date and `yearMonth` key for each row.
    async fn enrich_rows(&self, docs: &mut [Value]) {
        let mut user_cache: HashMap<String, String> = HashMap::new();

        for doc in docs.iter_mut() {
            let uid = doc
                .get("user")
                .and_then(|v| v.as_str())
                .map(user_uid_from_path);

            let display_name = match uid {
                Some(uid) if !uid.is_empty() => {
                    if !user_cache.contains_key(&uid) {
                        let resolved = self
                            .store
                            .get_document(USERS_COLLECTION, &uid)
                            .await
                            .ok()
                            .flatten()
                            .and_then(|user| {
                                user.get("display_name")
                                    .and_then(|v| v.as_str())
                                    .map(|s| s.to_string())
                            })
                            .unwrap_or_else(|| uid.clone());
                        user_cache.insert(uid.clone(), resolved);
                    }
                    user_cache.get(&uid).cloned()
                }
                _ => None,
            };

            let Some(map) = doc.as_object_mut() else {
                continue;
            };

            if let Some(name) = display_name {
                map.insert("user".to_string(), Value::String(name.clone()));
                map.insert("userDisplayName".to_string(), Value::String(name));
            }

            if let Some(millis) = map.get("date").and_then(|v| v.as_i64()) {
                if let Some(local) = Local.timestamp_millis_opt(millis).single() {
                    map.insert(
                        "date".to_string(),
                        Value::String(local.format("%d/%m/%Y").to_string()),
                    );
                    map.insert(
                        "yearMonth".to_string(),
                        Value::String(local.format("%Y-%m").to_string()),
                    );
                }
            }
        }
    }
}

fn resolve_user_path(args: &QueryArgs) -> Option<String> {
    if let Some(uid) = &args.user_uid {
        let trimmed = uid.trim().trim_start_matches('/');
        return Some(format!("/users/{}", trimmed));
    }
    args.user_path
        .as_ref()
        .map(|path| format!("/{}", path.trim().trim_start_matches('/')))
}

fn user_uid_from_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .next_back()
        .unwrap_or_default()
        .to_string()
}

/// Inclusive millisecond bounds of the calendar month containing `now`,
/// in the server's local timezone.
pub fn month_bounds(now: DateTime<Local>) -> (i64, i64) {
    let year = now.year();
    let month = now.month();
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let from = local_month_start_millis(year, month);
    let to = local_month_start_millis(next_year, next_month) - 1;
    (from, to)
}

fn local_month_start_millis(year: i32, month: u32) -> i64 {
    match Local.with_ymd_and_hms(year, month, 1, 0, 0, 0) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.timestamp_millis()
        }
        // Midnight skipped by a DST transition: fall back to the UTC instant
        chrono::LocalResult::None => chrono::Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_default(),
    }
}

//
// ================= Grouping =================
//

fn group_field_alias(field: &str) -> &str {
    match field {
        "categoryName" => "category",
        "typeName" => "type",
        other => other,
    }
}

fn build_groups(
    docs: &[Value],
    spec: &GroupSpec,
    order_by_list: &[SortKey],
    grouping_by_year_month: bool,
) -> Vec<Value> {
    let by: Vec<&str> = spec.by.iter().map(|f| group_field_alias(f)).collect();

    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Map<String, Value>> = HashMap::new();

    for doc in docs {
        let key_values: Vec<Value> = by
            .iter()
            .map(|field| doc.get(*field).cloned().unwrap_or(Value::Null))
            .collect();
        let bucket_id = serde_json::to_string(&key_values).unwrap_or_default();

        let bucket = buckets.entry(bucket_id.clone()).or_insert_with(|| {
            order.push(bucket_id);
            let mut key = Map::new();
            for (field, value) in by.iter().zip(&key_values) {
                key.insert((*field).to_string(), value.clone());
            }
            let mut group = Map::new();
            group.insert("key".to_string(), Value::Object(key));
            group.insert("count".to_string(), json!(0));
            group
        });

        let count = bucket.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
        bucket.insert("count".to_string(), json!(count + 1));

        for field in &spec.sum {
            let current = bucket.get(field.as_str()).and_then(|v| v.as_f64()).unwrap_or(0.0);
            let addend = doc.get(field.as_str()).and_then(|v| v.as_f64()).unwrap_or(0.0);
            bucket.insert(field.clone(), json!(current + addend));
        }

        if spec.include_docs {
            let members = bucket
                .entry("docs".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(list) = members.as_array_mut() {
                list.push(doc.clone());
            }
        }
    }

    let mut groups: Vec<Value> = order
        .into_iter()
        .filter_map(|id| buckets.remove(&id).map(Value::Object))
        .collect();

    let order_field = order_by_list.first();

    if let Some(key) = order_field.filter(|k| spec.sum.contains(&k.field)) {
        // Ordering on a summed field happens here, numerically
        let sign = if key.direction == SortDirection::Desc {
            -1.0
        } else {
            1.0
        };
        groups.sort_by(|a, b| {
            let av = a.get(&key.field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            let bv = b.get(&key.field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            (sign * av)
                .partial_cmp(&(sign * bv))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    } else if grouping_by_year_month {
        let descending = order_by_list
            .iter()
            .find(|k| k.field == "yearMonth")
            .map(|k| k.direction == SortDirection::Desc)
            .unwrap_or(false);
        groups.sort_by(|a, b| {
            let av = group_year_month(a);
            let bv = group_year_month(b);
            if descending {
                bv.cmp(&av)
            } else {
                av.cmp(&bv)
            }
        });
    } else {
        // Deterministic output for every other grouping
        groups.sort_by_key(|g| {
            g.get("key")
                .map(|k| k.to_string())
                .unwrap_or_default()
        });
    }

    groups
}

fn group_year_month(group: &Value) -> String {
    group
        .get("key")
        .and_then(|k| k.get("yearMonth"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDocumentStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tokio::sync::Mutex;

    /// Store wrapper that records the queries the engine issues
    struct RecordingStore {
        inner: InMemoryDocumentStore,
        last_query: Mutex<Option<CollectionQuery>>,
        user_lookups: AtomicUsize,
    }

    impl RecordingStore {
        fn new(inner: InMemoryDocumentStore) -> Self {
            Self {
                inner,
                last_query: Mutex::new(None),
                user_lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn run_query(&self, query: &CollectionQuery) -> Result<Vec<Value>> {
            *self.last_query.lock().await = Some(query.clone());
            self.inner.run_query(query).await
        }

        async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
            if collection == USERS_COLLECTION {
                self.user_lookups.fetch_add(1, AtomicOrdering::SeqCst);
            }
            self.inner.get_document(collection, id).await
        }

        async fn list_collection(&self, collection: &str) -> Result<Vec<Value>> {
            self.inner.list_collection(collection).await
        }
    }

    fn current_month_millis(day_offset_ms: i64) -> i64 {
        let (from, _) = month_bounds(Local::now());
        from + day_offset_ms
    }

    async fn seeded_store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();

        store
            .insert("users", "u1", json!({"display_name": "Seba"}))
            .await;

        store
            .insert(
                "transactionCategories",
                "c1",
                json!({"id": "c1", "name": "Comida"}),
            )
            .await;
        store
            .insert(
                "transactionTypes",
                "t1",
                json!({"id": "t1", "name": "Gasto"}),
            )
            .await;

        store
            .insert(
                "transactions",
                "tx1",
                json!({
                    "user": "/users/u1",
                    "amount": 1500.0,
                    "date": current_month_millis(60_000),
                    "category": "Comida",
                    "type": "Gasto",
                    "tenant": "home",
                    "description": "Café La Biela"
                }),
            )
            .await;
        store
            .insert(
                "transactions",
                "tx2",
                json!({
                    "user": "/users/u1",
                    "amount": 300.0,
                    "date": current_month_millis(120_000),
                    "category": "Transporte",
                    "type": "Gasto",
                    "tenant": "home",
                    "description": "Subte"
                }),
            )
            .await;
        // Outside the current month
        store
            .insert(
                "transactions",
                "tx3",
                json!({
                    "user": "/users/u1",
                    "amount": 900.0,
                    "date": month_bounds(Local::now()).0 - 86_400_000,
                    "category": "Comida",
                    "type": "Gasto",
                    "tenant": "home",
                    "description": "Supermercado"
                }),
            )
            .await;

        store
    }

    fn engine_for(store: Arc<dyn DocumentStore>) -> QueryEngine {
        let catalogs = Arc::new(CatalogCache::new(store.clone()));
        QueryEngine::new(store, catalogs)
    }

    #[test]
    fn test_month_bounds_cover_whole_month() {
        let now = Local.with_ymd_and_hms(2026, 8, 7, 12, 30, 0).single().unwrap();
        let (from, to) = month_bounds(now);

        let start = Local.timestamp_millis_opt(from).single().unwrap();
        assert_eq!(start.day(), 1);
        assert_eq!(start.month(), 8);

        let end = Local.timestamp_millis_opt(to).single().unwrap();
        assert_eq!(end.month(), 8);
        assert_eq!(end.day(), 31);

        // `to` is the last millisecond before the next month starts
        let next = Local.timestamp_millis_opt(to + 1).single().unwrap();
        assert_eq!(next.month(), 9);
        assert_eq!(next.day(), 1);
    }

    #[tokio::test]
    async fn test_default_date_range_is_current_month() {
        let store = Arc::new(seeded_store().await);
        let engine = engine_for(store);

        let outcome = engine.run(QueryArgs::default()).await.unwrap();
        let QueryOutcome::Rows { docs, count } = outcome else {
            panic!("expected rows");
        };

        assert_eq!(count, 2);
        assert!(docs.iter().all(|d| d["id"] != "tx3"));
    }

    #[tokio::test]
    async fn test_category_name_resolution_and_user_display() {
        let store = Arc::new(RecordingStore::new(seeded_store().await));
        let engine = engine_for(store.clone());

        let args = QueryArgs {
            category_name: Some("comida".to_string()),
            ..Default::default()
        };
        let outcome = engine.run(args).await.unwrap();
        let QueryOutcome::Rows { docs, count } = outcome else {
            panic!("expected rows");
        };

        assert_eq!(count, 1);
        assert_eq!(docs[0]["user"], "Seba");
        assert_eq!(docs[0]["userDisplayName"], "Seba");

        let recorded = store.last_query.lock().await.clone().unwrap();
        assert!(recorded
            .filters
            .iter()
            .any(|f| f.field == "category" && f.value == json!("Comida")));
    }

    #[tokio::test]
    async fn test_user_resolution_uses_per_request_cache() {
        let store = Arc::new(RecordingStore::new(seeded_store().await));
        let engine = engine_for(store.clone());

        let outcome = engine.run(QueryArgs::default()).await.unwrap();
        let QueryOutcome::Rows { count, .. } = outcome else {
            panic!("expected rows");
        };

        // Two rows, one distinct user, one lookup
        assert_eq!(count, 2);
        assert_eq!(store.user_lookups.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_description_filter_is_accent_insensitive() {
        let store = Arc::new(seeded_store().await);
        let engine = engine_for(store);

        let args = QueryArgs {
            description_contains: Some("cafe".to_string()),
            ..Default::default()
        };
        let outcome = engine.run(args).await.unwrap();
        let QueryOutcome::Rows { docs, count } = outcome else {
            panic!("expected rows");
        };

        assert_eq!(count, 1);
        assert_eq!(docs[0]["id"], "tx1");
    }

    #[tokio::test]
    async fn test_grouped_sort_keys_are_deferred() {
        let store = Arc::new(RecordingStore::new(seeded_store().await));
        let engine = engine_for(store.clone());

        let args = QueryArgs {
            order_by: vec![SortKey::new("amount", SortDirection::Desc)],
            group: Some(GroupSpec {
                by: vec!["yearMonth".to_string()],
                sum: vec!["amount".to_string()],
                include_docs: false,
            }),
            date: DateRange {
                from_ms: Some(0),
                to_ms: Some(i64::MAX / 2),
            },
            ..Default::default()
        };

        let outcome = engine.run(args).await.unwrap();

        // Neither the summed field nor yearMonth reached the store
        let recorded = store.last_query.lock().await.clone().unwrap();
        assert!(recorded
            .order_by
            .iter()
            .all(|k| k.field != "amount" && k.field != "yearMonth"));

        // Groups ordered descending by summed amount, in memory
        let QueryOutcome::Groups { groups, count } = outcome else {
            panic!("expected groups");
        };
        assert_eq!(count, 3);
        let sums: Vec<f64> = groups
            .iter()
            .map(|g| g["amount"].as_f64().unwrap())
            .collect();
        let mut sorted = sums.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(sums, sorted);
    }

    #[tokio::test]
    async fn test_grouping_conserves_sums_and_counts() {
        let store = Arc::new(seeded_store().await);
        let engine = engine_for(store);

        let args = QueryArgs {
            group: Some(GroupSpec {
                by: vec!["categoryName".to_string()],
                sum: vec!["amount".to_string()],
                include_docs: true,
            }),
            date: DateRange {
                from_ms: Some(0),
                to_ms: Some(i64::MAX / 2),
            },
            ..Default::default()
        };

        let outcome = engine.run(args).await.unwrap();
        let QueryOutcome::Groups { groups, count } = outcome else {
            panic!("expected groups");
        };

        let total_amount: f64 = groups
            .iter()
            .map(|g| g["amount"].as_f64().unwrap())
            .sum();
        let total_count: u64 = groups
            .iter()
            .map(|g| g["count"].as_u64().unwrap())
            .sum();

        assert_eq!(total_amount, 1500.0 + 300.0 + 900.0);
        assert_eq!(total_count as usize, count);

        // The alias maps to the underlying field name in the group key
        assert!(groups.iter().all(|g| g["key"].get("category").is_some()));
        assert!(groups.iter().all(|g| g["docs"].is_array()));
    }

    #[tokio::test]
    async fn test_projection_always_carries_display_name() {
        let store = Arc::new(seeded_store().await);
        let engine = engine_for(store);

        let args = QueryArgs {
            project: vec!["amount".to_string()],
            ..Default::default()
        };
        let outcome = engine.run(args).await.unwrap();
        let QueryOutcome::Rows { docs, .. } = outcome else {
            panic!("expected rows");
        };

        for doc in &docs {
            assert!(doc.get("amount").is_some());
            assert_eq!(doc["userDisplayName"], "Seba");
            assert!(doc.get("description").is_none());
        }
    }

    #[tokio::test]
    async fn test_multi_category_membership() {
        let store = Arc::new(seeded_store().await);
        let engine = engine_for(store);

        let args = QueryArgs {
            categories: vec!["Comida".to_string(), "Transporte".to_string()],
            ..Default::default()
        };
        let outcome = engine.run(args).await.unwrap();
        let QueryOutcome::Rows { count, .. } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(count, 2);
    }

    #[test]
    fn test_args_deserialize_with_defaults() {
        let args: QueryArgs = serde_json::from_str(
            r#"{"categoryName": "comida", "date": {"fromMs": 1000, "toMs": 2000}}"#,
        )
        .unwrap();
        assert_eq!(args.category_name.as_deref(), Some("comida"));
        assert_eq!(args.date.from_ms, Some(1000));
        assert!(args.order_by.is_empty());
        assert!(args.group.is_none());
    }
}
