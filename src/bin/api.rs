use crypto_portfolio_assistant::{agent::Assistant, api::start_server, config::AssistantConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AssistantConfig::from_env()?;
    if config.gemini_api_key.is_empty() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
    }

    info!("🚀 Crypto Portfolio Assistant - API Server");
    info!("📍 Port: {}", config.port);

    let assistant = Arc::new(Assistant::from_config(&config).await?);
    info!("✅ Assistant initialized");

    // Sweep idle sessions in the background
    let sweeper = assistant.clone();
    let max_idle = config.session_idle_timeout;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sweeper.sessions().evict_idle(max_idle).await;
        }
    });

    info!("📡 Starting API server...");
    start_server(assistant, config.port).await?;

    Ok(())
}
