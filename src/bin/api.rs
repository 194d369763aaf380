use balance_agent::api::{start_server, ApiState};
use balance_agent::catalog::CatalogCache;
use balance_agent::config::AgentConfig;
use balance_agent::datastore::{DocumentStore, InMemoryDocumentStore};
use balance_agent::graph::Orchestrator;
use balance_agent::llm::OpenAiClient;
use balance_agent::memory::build_memory_store;
use balance_agent::profile::ProfileRepository;
use balance_agent::tools::create_default_registry;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!("OPENAI_API_KEY not set; model calls will fail until it is configured");
        String::new()
    });

    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let config = AgentConfig::from_env();

    info!("Transaction-chat agent - API server");
    info!(port, model = %config.model_name, "Configuration loaded");

    // Create components
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let catalogs = Arc::new(CatalogCache::new(store.clone()));
    let tools = Arc::new(create_default_registry(store.clone(), catalogs, &config));
    let memory = build_memory_store();
    let model = Arc::new(OpenAiClient::new(
        api_key,
        config.model_base_url.clone(),
        config.model_name.clone(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(model, tools, memory, config));
    let profiles = Arc::new(ProfileRepository::new(store));

    info!("Orchestrator initialized, starting API server");

    start_server(
        ApiState {
            orchestrator,
            profiles,
        },
        port,
    )
    .await?;

    Ok(())
}
