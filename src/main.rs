use anyhow::Context;
use clap::Parser;
use pdfqa::{api, config, logging, processing};
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_PORT: u16 = 8000;

/// Upload PDFs and ask questions about them over HTTP.
#[derive(Debug, Parser)]
#[command(name = "pdfqa", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind; overrides `SERVER_PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();
    let service = processing::ProcessingService::new(config)
        .context("failed to initialize processing service")?;
    let app = api::create_router(Arc::new(service), api::RouterConfig::from_config(config));

    let port = cli.port.or(config.server_port).unwrap_or(DEFAULT_PORT);
    let listener = TcpListener::bind((cli.host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{port}", cli.host))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
