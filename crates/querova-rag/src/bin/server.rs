//! Querova server binary
//!
//! Run with: cargo run -p querova-rag --bin querova-server -- --config querova.toml

use clap::Parser;
use querova_rag::{config::RagConfig, server::QuerovaServer, QaService};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "querova-server", version, about = "Evidence-grounded document Q&A server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "querova_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Batch concurrency: {}", config.processing.concurrency());

    let service = QaService::from_config(config)?;

    let (embedding, llm) = service.health().await;
    if !(embedding && llm) {
        tracing::warn!("Ollama not reachable at {}", service.config().llm.base_url);
        tracing::warn!("  Start it with `ollama serve` and pull the configured models");
    }

    QuerovaServer::new(service).start().await?;

    Ok(())
}
