use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plumeflow_ai::{LlmClientFactory, OpenAIClientFactory};
use plumeflow_core::{AppCore, api};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path =
        std::env::var("PLUMEFLOW_DB_PATH").unwrap_or_else(|_| "plumeflow.db".to_string());
    let addr = std::env::var("PLUMEFLOW_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let api_key = std::env::var("PLUMEFLOW_API_KEY").unwrap_or_else(|_| {
        warn!("PLUMEFLOW_API_KEY is not set; model calls will be rejected by the provider");
        String::new()
    });
    let mut factory = OpenAIClientFactory::new(api_key);
    if let Ok(base_url) = std::env::var("PLUMEFLOW_BASE_URL") {
        factory = factory.with_base_url(base_url);
    }
    let factory: Arc<dyn LlmClientFactory> = Arc::new(factory);

    let core = Arc::new(AppCore::new(&db_path, factory)?);
    let app = api::create_router(core);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, db_path = %db_path, "Plumeflow running");

    axum::serve(listener, app).await?;
    Ok(())
}
