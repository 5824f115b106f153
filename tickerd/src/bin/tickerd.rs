use clap::Parser;
use std::sync::Arc;
use tickerd::config::TickerdConfig;
use tickerd::memory::{InMemoryAdapter, InMemoryProcessRegistry, InMemoryTickerStore, NullCredentialResolver, StaticConfigStore};
use tickerd::model::SymbolRef;
use tickerd::telemetry::{self, LogFormat};
use tickerd::Daemon;
use tracing::info;

/// Ticker collection daemon: maintains exchange WebSocket subscriptions and
/// publishes the latest price per symbol.
#[derive(Parser, Debug)]
#[command(name = "tickerd", version, about)]
struct Cli {
    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "TICKERD_LOG_JSON", default_value_t = false)]
    log_json: bool,

    /// Comma-separated "exchange:exchange_id:symbol" triples to collect, e.g.
    /// "binance:1:BTCUSDT,coinbase:2:BTC-USD". With no value, the daemon starts with
    /// an empty symbol set and symbols can only arrive via `process_ticker` in a
    /// library embedding.
    #[arg(long, env = "TICKERD_SYMBOLS", value_delimiter = ',')]
    symbols: Vec<String>,
}

fn parse_symbol(raw: &str) -> Option<SymbolRef> {
    let mut parts = raw.splitn(3, ':');
    let exchange_name = parts.next()?.to_string();
    let exchange_id = parts.next()?.parse::<u32>().ok()?;
    let symbol = parts.next()?.to_string();
    Some(SymbolRef {
        symbol,
        exchange_name,
        exchange_id,
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = TickerdConfig::from_env();

    telemetry::init(if cli.log_json { LogFormat::Json } else { LogFormat::Pretty });

    info!(prefix = %config.log_prefix, rate_gate_window = ?config.rate_gate_window, "starting tickerd");

    let symbols: Vec<SymbolRef> = cli.symbols.iter().filter_map(|s| parse_symbol(s)).collect();
    if symbols.len() != cli.symbols.len() {
        tracing::warn!("one or more --symbols entries could not be parsed and were skipped");
    }

    let daemon = Arc::new(Daemon::new(
        Arc::new(InMemoryAdapter::new()),
        Arc::new(NullCredentialResolver),
        Arc::new(InMemoryTickerStore::new()),
        Arc::new(InMemoryProcessRegistry::new()),
        Arc::new(StaticConfigStore::new(symbols)),
        config.rate_gate_window,
        config.shutdown_timeout,
        config.admin_identity.clone(),
    ));

    if let Err(e) = daemon.start().await {
        tracing::error!(error = %e, "daemon failed to start");
        std::process::exit(1);
    }

    wait_for_shutdown_signal().await;

    info!("shutdown signal received, stopping daemon");
    daemon.stop().await;
    info!("tickerd stopped");
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
