//! Tool trait and registry
//!
//! Tools are the only way the model touches the data store. Each one
//! advertises a JSON-schema parameter shape; the loop hands those to the
//! model and routes its calls back here by name.

use crate::catalog::{CatalogCache, CatalogKind};
use crate::config::AgentConfig;
use crate::datastore::DocumentStore;
use crate::llm::ToolDefinition;
use crate::query::QueryEngine;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub mod catalogs;
pub mod transactions;

pub use catalogs::{CatalogListTool, UserQueryTool};
pub use transactions::TransactionQueryTool;

/// Trait for a single callable tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, arguments: Value) -> Result<Value>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Definitions handed to the model on every loop hop
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the default registry wired against one store and catalog cache.
pub fn create_default_registry(
    store: Arc<dyn DocumentStore>,
    catalogs: Arc<CatalogCache>,
    config: &AgentConfig,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let engine = QueryEngine::new(store.clone(), catalogs.clone());
    registry.register(Arc::new(TransactionQueryTool::new(engine)));

    registry.register(Arc::new(CatalogListTool::new(
        CatalogKind::Categories,
        catalogs.clone(),
        config.fuzzy_accept_threshold,
        config.fuzzy_top_k,
    )));
    registry.register(Arc::new(CatalogListTool::new(
        CatalogKind::Types,
        catalogs,
        config.fuzzy_accept_threshold,
        config.fuzzy_top_k,
    )));

    registry.register(Arc::new(UserQueryTool::new(store)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDocumentStore;

    #[test]
    fn test_default_registry_contents() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let catalogs = Arc::new(CatalogCache::new(store.clone()));
        let registry = create_default_registry(store, catalogs, &AgentConfig::default());

        let mut names = registry.list();
        names.sort();
        assert_eq!(
            names,
            vec![
                "list_transaction_categories",
                "list_transaction_types",
                "transaction_query",
                "user_query",
            ]
        );
        assert_eq!(registry.definitions().len(), 4);
        assert!(registry.get("transaction_query").is_some());
        assert!(registry.get("chart_generator").is_none());
    }
}
