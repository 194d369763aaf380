//! Catalog listing and user search tools

use crate::catalog::{CatalogCache, CatalogKind};
use crate::datastore::{CollectionQuery, DocumentStore, FieldFilter, FilterOp};
use crate::tools::Tool;
use crate::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

// Membership queries against the users collection cap at 30 terms
const MAX_USER_IN_TERMS: usize = 30;

//
// ================= Catalog Listing =================
//

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CatalogListArgs {
    query: Option<String>,
    top_k: Option<usize>,
}

/// Lists one taxonomy and fuzzy-matches free text against it.
/// Registered twice, once per catalog.
pub struct CatalogListTool {
    kind: CatalogKind,
    catalogs: Arc<CatalogCache>,
    accept_threshold: f64,
    default_top_k: usize,
}

impl CatalogListTool {
    pub fn new(
        kind: CatalogKind,
        catalogs: Arc<CatalogCache>,
        accept_threshold: f64,
        default_top_k: usize,
    ) -> Self {
        Self {
            kind,
            catalogs,
            accept_threshold,
            default_top_k,
        }
    }
}

#[async_trait::async_trait]
impl Tool for CatalogListTool {
    fn name(&self) -> &'static str {
        match self.kind {
            CatalogKind::Types => "list_transaction_types",
            CatalogKind::Categories => "list_transaction_categories",
        }
    }

    fn description(&self) -> &'static str {
        match self.kind {
            CatalogKind::Types => {
                "Get all documents from 'transactionTypes' with {id,name}. If 'query' is \
                 provided, returns fuzzy matches to help validate user typos."
            }
            CatalogKind::Categories => {
                "Get all documents from 'transactionCategories' with {id,name}. If 'query' is \
                 provided, returns fuzzy matches to help validate user typos."
            }
        }
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "topK": { "type": "integer", "minimum": 1, "maximum": 50 }
            }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let args: CatalogListArgs = serde_json::from_value(arguments).unwrap_or_default();
        let top_k = args.top_k.unwrap_or(self.default_top_k).clamp(1, 50);

        let catalog = self.catalogs.catalog(self.kind).await?;
        let items: Vec<Value> = catalog
            .entries()
            .iter()
            .map(|entry| json!({ "id": entry.id, "name": entry.name }))
            .collect();

        let Some(query) = args.query.filter(|q| !q.trim().is_empty()) else {
            return Ok(json!({ "items": items, "count": items.len() }));
        };

        let ranked = catalog.rank(&query);
        let best = ranked.first().cloned();
        // The caller decides what to do below the threshold; the tool
        // only reports whether the best hit clears it.
        let accepted = best
            .as_ref()
            .map(|b| b.score >= self.accept_threshold)
            .unwrap_or(false);
        let top: Vec<_> = ranked.into_iter().take(top_k).collect();

        Ok(json!({
            "items": items,
            "count": items.len(),
            "match": {
                "query": query,
                "best": best,
                "accepted": accepted,
                "top": top,
            }
        }))
    }
}

//
// ================= User Search =================
//

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UserQueryArgs {
    display_names: Vec<String>,
    emails: Vec<String>,
}

/// Finds users by display name or email so the model can resolve a
/// person mentioned in the question to a uid.
pub struct UserQueryTool {
    store: Arc<dyn DocumentStore>,
}

impl UserQueryTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn find_by(&self, field: &str, terms: &[String]) -> Result<Vec<Value>> {
        let mut query = CollectionQuery::new("users");
        let values: Vec<Value> = terms
            .iter()
            .take(MAX_USER_IN_TERMS)
            .map(|t| Value::String(t.clone()))
            .collect();
        query.filters.push(FieldFilter {
            field: field.to_string(),
            op: FilterOp::In,
            value: Value::Array(values),
        });
        self.store.run_query(&query).await
    }
}

#[async_trait::async_trait]
impl Tool for UserQueryTool {
    fn name(&self) -> &'static str {
        "user_query"
    }

    fn description(&self) -> &'static str {
        "Busca usuarios en la colección 'users' por listas de 'displayNames' o 'emails'. \
         Devuelve 'userUid', 'displayName' y 'email' por cada coincidencia. Usar para obtener \
         el 'userUid' cuando haya que filtrar transacciones por un usuario específico."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "displayNames": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Posibles nombres (display_name) a buscar"
                },
                "emails": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Posibles correos electrónicos a buscar"
                }
            }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let args: UserQueryArgs = serde_json::from_value(arguments).unwrap_or_default();

        if args.display_names.is_empty() && args.emails.is_empty() {
            return Ok(json!({
                "error": "Se debe proporcionar al menos una lista de 'displayNames' o 'emails'."
            }));
        }

        let mut matched: Vec<Value> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (field, terms) in [
            ("display_name", &args.display_names),
            ("email", &args.emails),
        ] {
            if terms.is_empty() {
                continue;
            }
            match self.find_by(field, terms).await {
                Ok(docs) => {
                    for doc in docs {
                        let uid = doc
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        if uid.is_empty() || !seen.insert(uid.clone()) {
                            continue;
                        }
                        matched.push(json!({
                            "userUid": uid,
                            "displayName": doc.get("display_name").and_then(|v| v.as_str()).unwrap_or(""),
                            "email": doc.get("email").and_then(|v| v.as_str()).unwrap_or(""),
                        }));
                    }
                }
                Err(error) => {
                    warn!("User query failed: {}", error);
                    return Ok(json!({
                        "error": "Failed to query users.",
                        "details": error.to_string(),
                    }));
                }
            }
        }

        Ok(json!({ "users": matched, "count": matched.len() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDocumentStore;

    async fn seeded_store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .insert(
                "transactionCategories",
                "c1",
                json!({"id": "c1", "name": "Comida"}),
            )
            .await;
        store
            .insert(
                "transactionCategories",
                "c2",
                json!({"id": "c2", "name": "Transporte"}),
            )
            .await;
        store
            .insert(
                "users",
                "u1",
                json!({"display_name": "Seba", "email": "seba@example.com"}),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_listing_without_query() {
        let store = seeded_store().await;
        let catalogs = Arc::new(CatalogCache::new(store.clone() as Arc<dyn DocumentStore>));
        let tool = CatalogListTool::new(CatalogKind::Categories, catalogs, 0.8, 5);

        let output = tool.execute(json!({})).await.unwrap();
        assert_eq!(output["count"], 2);
        assert!(output.get("match").is_none());
    }

    #[tokio::test]
    async fn test_fuzzy_match_block() {
        let store = seeded_store().await;
        let catalogs = Arc::new(CatalogCache::new(store.clone() as Arc<dyn DocumentStore>));
        let tool = CatalogListTool::new(CatalogKind::Categories, catalogs, 0.8, 5);

        // One dropped letter: similarity 5/6, still above the 0.8 bar
        let output = tool.execute(json!({"query": "comda"})).await.unwrap();
        assert_eq!(output["match"]["best"]["name"], "Comida");
        assert_eq!(output["match"]["accepted"], true);
        assert_eq!(output["match"]["top"].as_array().unwrap().len(), 2);

        let far = tool.execute(json!({"query": "zapatillas"})).await.unwrap();
        assert_eq!(far["match"]["accepted"], false);
    }

    #[tokio::test]
    async fn test_user_query_requires_criteria() {
        let store = seeded_store().await;
        let tool = UserQueryTool::new(store as Arc<dyn DocumentStore>);

        let output = tool.execute(json!({})).await.unwrap();
        assert!(output.get("error").is_some());
    }

    #[tokio::test]
    async fn test_user_query_by_display_name() {
        let store = seeded_store().await;
        let tool = UserQueryTool::new(store as Arc<dyn DocumentStore>);

        let output = tool
            .execute(json!({"displayNames": ["Seba", "Otro"]}))
            .await
            .unwrap();
        assert_eq!(output["count"], 1);
        assert_eq!(output["users"][0]["userUid"], "u1");
        assert_eq!(output["users"][0]["email"], "seba@example.com");
    }
}
