//! Policy Explainer API Server
//!
//! Serves grounded explanations of health insurance policy documents.
//! Provides REST API endpoints for:
//!
//! - Document ingestion (pre-extracted page text)
//! - Section summaries with validated citations
//! - Question answering with page markers and confidence
//! - Summary evaluation (faithfulness, completeness, simplicity)
//!
//! ## Architecture
//!
//! Grounding, scoring and evaluation live in `grounding-engine`; this server
//! wires it to a filesystem store, lexical retrieval and an
//! OpenAI-compatible chat completion endpoint, adding:
//!
//! - Rate limiting via tower-governor
//! - CORS and request tracing via tower-http

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod handlers;
mod llm;
mod state;
#[cfg(test)]
mod tests;

use handlers::{
    handle_chunks, handle_delete, handle_evaluate, handle_generate_summary, handle_get_evaluation,
    handle_get_summary, handle_health, handle_ingest, handle_list_documents, handle_qa,
};
use state::{AppState, StateConfig};

/// Command-line arguments for the policy API server
#[derive(Parser, Debug)]
#[command(name = "policy-api")]
#[command(about = "Grounded summaries and Q&A for insurance policy documents")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for document, summary and evaluation records
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Engine configuration TOML, merged over the built-in defaults
    #[arg(long, env = "ENGINE_CONFIG")]
    engine_config: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Chat model name
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// API key for the LLM provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// LLM request timeout in milliseconds
    #[arg(long, env = "LLM_TIMEOUT_MS", default_value = "60000")]
    llm_timeout_ms: u64,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Routes without the rate limiter, shared by the server and the tests
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Documents
        .route("/api/documents", post(handle_ingest).get(handle_list_documents))
        .route("/api/documents/:id", axum::routing::delete(handle_delete))
        .route("/api/documents/:id/chunks", get(handle_chunks))
        // Grounded outputs
        .route(
            "/api/documents/:id/summary",
            post(handle_generate_summary).get(handle_get_summary),
        )
        .route("/api/documents/:id/qa", post(handle_qa))
        .route(
            "/api/documents/:id/evaluation",
            post(handle_evaluate).get(handle_get_evaluation),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting policy API on {}:{}", args.host, args.port);

    let state = AppState::new(&StateConfig {
        data_dir: args.data_dir.clone(),
        engine_config: args.engine_config.clone(),
        llm_base_url: args.llm_base_url.clone(),
        llm_model: args.llm_model.clone(),
        llm_api_key: args.api_key.clone(),
        llm_timeout: Duration::from_millis(args.llm_timeout_ms),
    })
    .await?;

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.max(1).into())
            .burst_size(args.rate_limit.max(1) * 2)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit: {}", args.rate_limit))?,
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(Arc::new(state))
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!("LLM: {} via {}", args.llm_model, args.llm_base_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
