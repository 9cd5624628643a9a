// shiori: streaming chat orchestration server
// Argument parsing, process wiring, HTTP serving

mod routes;
mod sink;

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use shiori_core::tools::{CountryLookup, MemoryCatalog};
use shiori_core::{Config, HttpGateway, Orchestrator, ToolRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shiori", version, about = "Streaming chat orchestration server")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref()).map_err(io::Error::other)?;

    let mut registry = ToolRegistry::new();
    let catalog = Arc::new(MemoryCatalog::seeded());
    registry.register(
        CountryLookup::spec(),
        Arc::new(CountryLookup::new(catalog)),
    );

    let gateway = Arc::new(HttpGateway::new(&config).map_err(io::Error::other)?);
    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        Arc::new(registry),
        config.max_tool_rounds,
    ));

    let app = routes::router(orchestrator);
    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    info!(addr = %cli.addr, model = %config.model, "shiori listening");
    axum::serve(listener, app).await
}
