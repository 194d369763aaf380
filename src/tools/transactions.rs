//! The transactions query tool

use crate::error::AgentError;
use crate::query::{QueryArgs, QueryEngine};
use crate::tools::Tool;
use crate::Result;
use serde_json::{json, Value};
use tracing::debug;

/// Exposes the query engine to the model as `transaction_query`
pub struct TransactionQueryTool {
    engine: QueryEngine,
}

impl TransactionQueryTool {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl Tool for TransactionQueryTool {
    fn name(&self) -> &'static str {
        "transaction_query"
    }

    fn description(&self) -> &'static str {
        "Consulta 'transactions' con filtros por user, type, category, tenant, amount y rango de \
         fechas; permite ordenar (por defecto 'date' desc), paginar (startAfter) y agrupar \
         (group by / sum). El campo 'date' es un timestamp en milisegundos y 'user' es un path \
         '/users/<uid>'. Permite filtrar por substring en 'description' mediante \
         'descriptionContains'. Para agrupar se puede usar 'categoryName', 'typeName' o \
         'yearMonth' (formato YYYY-MM)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "userUid": { "type": ["string", "null"] },
                "userPath": { "type": ["string", "null"] },
                "typeId": { "type": ["string", "null"] },
                "typeName": { "type": ["string", "null"] },
                "categoryId": { "type": ["string", "null"] },
                "categoryName": { "type": ["string", "null"] },
                "categories": { "type": "array", "items": { "type": "string" } },
                "tenant": { "type": ["string", "null"] },
                "amount": {
                    "type": "object",
                    "properties": {
                        "gte": { "type": ["number", "null"] },
                        "lte": { "type": ["number", "null"] }
                    }
                },
                "date": {
                    "type": "object",
                    "properties": {
                        "fromMs": { "type": ["number", "null"] },
                        "toMs": { "type": ["number", "null"] }
                    }
                },
                "filters": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": { "type": "string" },
                            "op": {
                                "type": "string",
                                "enum": ["==", ">", ">=", "<", "<=", "in",
                                         "array-contains", "array-contains-any", "not-in"]
                            },
                            "value": {}
                        },
                        "required": ["field", "op", "value"]
                    }
                },
                "descriptionContains": { "type": ["string", "null"] },
                "orderBy": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": { "type": "string" },
                            "direction": { "type": "string", "enum": ["asc", "desc"] }
                        },
                        "required": ["field"]
                    }
                },
                "limit": { "type": "integer", "minimum": 1, "maximum": 2000 },
                "startAfter": { "type": "array" },
                "project": { "type": "array", "items": { "type": "string" } },
                "group": {
                    "type": ["object", "null"],
                    "properties": {
                        "by": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
                        "sum": { "type": "array", "items": { "type": "string" } },
                        "includeDocs": { "type": "boolean" }
                    },
                    "required": ["by"]
                }
            }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let args: QueryArgs = serde_json::from_value(arguments)
            .map_err(|e| AgentError::InvalidToolInput(format!("Invalid query arguments: {}", e)))?;

        debug!(?args.category_name, ?args.type_name, "Running transaction query");

        let outcome = self.engine.run(args).await?;
        Ok(serde_json::to_value(outcome)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogCache;
    use crate::datastore::{DocumentStore, InMemoryDocumentStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_rejects_malformed_arguments() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let catalogs = Arc::new(CatalogCache::new(store.clone()));
        let tool = TransactionQueryTool::new(QueryEngine::new(store, catalogs));

        let result = tool.execute(json!({"limit": "cien"})).await;
        assert!(matches!(result, Err(AgentError::InvalidToolInput(_))));
    }

    #[tokio::test]
    async fn test_empty_store_returns_zero_rows() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let catalogs = Arc::new(CatalogCache::new(store.clone()));
        let tool = TransactionQueryTool::new(QueryEngine::new(store, catalogs));

        let output = tool.execute(json!({})).await.unwrap();
        assert_eq!(output["count"], 0);
        assert!(output["docs"].as_array().unwrap().is_empty());
    }
}
