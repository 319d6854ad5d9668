mod config;
mod error;
mod handlers;
mod models;
mod services;
#[cfg(feature = "http-server")]
mod server; // HTTP surface for the label analyzer

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::AppConfig;
use handlers::LabelAnalyzer;
use services::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the logger reads RUST_LOG
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Cocoa Label Analyzer...");

    let config = AppConfig::from_env()?;

    let gemini = GeminiClient::new(config.gemini.clone())?;
    log::info!("✅ Gemini client initialized with model: {}", gemini.model());

    let analyzer = Arc::new(LabelAnalyzer::new(Arc::new(gemini)));
    log::info!("✅ Label analyzer initialized");

    #[cfg(feature = "http-server")]
    {
        let app = server::create_router(analyzer.clone());
        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

        log::info!("🌐 HTTP server listening on {}", config.bind_addr);
        axum::serve(listener, app).await?;
    }

    #[cfg(not(feature = "http-server"))]
    {
        let _ = analyzer;
        log::warn!("⚠️ Built without the http-server feature, nothing to serve");
    }

    Ok(())
}
