//! Edge agent - main entry point.
//!
//! Exit codes:
//! - 0: Clean shutdown
//! - 1: Startup failure (configuration, reference files, bind)

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use edge_chat::HttpGateway;
use edge_context::{ContextEnricher, ReferenceLibrary};
use edge_core::AgentConfig;
use edge_server::{router, AgentService};

mod cli;

use cli::Cli;

const DEFAULT_LOG_FILTER: &str = "edge=info,warn";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let log_result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    if let Err(e) = log_result {
        eprintln!("Logging not initialized: {e}");
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AgentConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(
        api_url = %config.llm.api_url,
        model = %config.llm.model,
        rag = config.rag.enabled,
        "Starting edge agent"
    );

    let library = Arc::new(
        ReferenceLibrary::load(&config.references).context("Failed to load reference documents")?,
    );
    let enricher = ContextEnricher::from_config(&config, library.clone())
        .context("Failed to set up context enrichment")?;
    let gateway = HttpGateway::from_settings(&config.llm).context("Failed to set up model client")?;

    let service = Arc::new(AgentService::new(config, Arc::new(gateway), &library, enricher));
    let app = router(service);

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!(addr = %cli.bind, "Edge agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Edge agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
