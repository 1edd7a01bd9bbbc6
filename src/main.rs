use anyhow::Context;
use assetledger::storage::DurabilityMode;
use assetledger::{Ledger, LedgerConfig, ServerConfig, web};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "assetledger")]
#[command(about = "Subscriber asset ledger with per-key audit history over HTTP")]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "ASSETLEDGER_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "ASSETLEDGER_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory for the block journal; in-memory only when omitted
    #[arg(long, env = "ASSETLEDGER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Journal durability: sync, async or none
    #[arg(long, env = "ASSETLEDGER_DURABILITY", default_value_t = DurabilityMode::Async)]
    durability: DurabilityMode,

    /// Write the starter assets when the ledger is empty
    #[arg(long, env = "ASSETLEDGER_SEED")]
    seed: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        let ledger = match cli.data_dir {
            Some(dir) => LedgerConfig::persistent(dir),
            None => LedgerConfig::in_memory(),
        }
        .durability(cli.durability)
        .seed_on_start(cli.seed);

        ServerConfig::new(ledger).host(&cli.host).port(cli.port)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from(Cli::parse());

    let ledger = Ledger::open(&config.ledger).context("open ledger")?;
    if config.ledger.seed_on_start && ledger.is_empty().await {
        let receipt = ledger.init_ledger().await.context("seed starter assets")?;
        info!(tx_id = %receipt.tx_id, "seeded empty ledger");
    }

    let app = web::router(Arc::new(ledger));
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, journaled = config.ledger.is_journaled(), "assetledger listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
