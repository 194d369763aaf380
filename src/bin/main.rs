use balance_agent::catalog::CatalogCache;
use balance_agent::config::AgentConfig;
use balance_agent::datastore::{DocumentStore, InMemoryDocumentStore};
use balance_agent::graph::{Orchestrator, TurnState};
use balance_agent::llm::{MockChatModel, ModelResponse};
use balance_agent::memory::InMemoryMemoryStore;
use balance_agent::models::ToolCall;
use balance_agent::query::month_bounds;
use balance_agent::tools::create_default_registry;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// One scripted demo turn against seeded in-memory stores, no network.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Transaction-chat agent demo starting");

    let store = Arc::new(InMemoryDocumentStore::new());
    seed_demo_data(&store).await;
    let store: Arc<dyn DocumentStore> = store;

    let config = AgentConfig::default();
    let catalogs = Arc::new(CatalogCache::new(store.clone()));
    let tools = Arc::new(create_default_registry(store, catalogs, &config));
    let memory = Arc::new(InMemoryMemoryStore::new());

    // Scripted model: route to the full flow, query food expenses for the
    // month, then answer.
    let model = Arc::new(MockChatModel::new(vec![
        ModelResponse::text("null"),
        ModelResponse::with_calls(
            "",
            vec![ToolCall {
                id: Some("call_1".to_string()),
                name: "transaction_query".to_string(),
                arguments: json!({ "categoryName": "comida" }),
            }],
        ),
        ModelResponse::text(r#"{"text": "Hola Seba, este mes gastaste $ 1.800 en Comida."}"#),
    ]));

    let orchestrator = Orchestrator::new(model, tools, memory, config);

    let turn = TurnState {
        user_id: "u1".to_string(),
        input: "cuánto gasté en comida este mes".to_string(),
        user_name: "Seba".to_string(),
        lang: "es".to_string(),
        ..Default::default()
    };

    match orchestrator.run(turn).await {
        Ok(reply) => {
            println!("\n=== REPLY ===");
            println!("{}", reply);
            Ok(())
        }
        Err(e) => {
            eprintln!("Turn failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

async fn seed_demo_data(store: &InMemoryDocumentStore) {
    let (month_start, _) = month_bounds(chrono::Local::now());

    store
        .insert("users", "u1", json!({"display_name": "Seba", "language": "es"}))
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
            "transactionCategories",
            "c2",
            json!({"id": "c2", "name": "Transporte"}),
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
                "amount": 1200.0,
                "date": month_start + 86_400_000,
                "category": "Comida",
                "type": "Gasto",
                "tenant": "home",
                "description": "Supermercado"
            }),
        )
        .await;
    store
        .insert(
            "transactions",
            "tx2",
            json!({
                "user": "/users/u1",
                "amount": 600.0,
                "date": month_start + 172_800_000,
                "category": "Comida",
                "type": "Gasto",
                "tenant": "home",
                "description": "Café La Biela"
            }),
        )
        .await;
}
