use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tickerd::memory::{InMemoryAdapter, InMemoryProcessRegistry, InMemoryTickerStore, NullCredentialResolver, StaticConfigStore};
use tickerd::model::{Credentials, ExchangeDescriptor, SymbolRef, TickRecord};
use tickerd::ports::{AdapterFactory, ExchangeHandler};
use tickerd::Daemon;

/// Adapter whose `shutdown` never resolves, used to exercise `Daemon::stop`'s
/// configured shutdown timeout.
#[derive(Debug, Default)]
struct HangingShutdownAdapter {
    inner: InMemoryAdapter,
}

#[async_trait]
impl AdapterFactory for HangingShutdownAdapter {
    async fn handler(
        &self,
        exchange: &ExchangeDescriptor,
        credentials: Credentials,
    ) -> tickerd::Result<Arc<dyn ExchangeHandler>> {
        self.inner.handler(exchange, credentials).await
    }

    async fn shutdown(&self) -> tickerd::Result<()> {
        std::future::pending().await
    }
}

fn symbol(exchange_name: &str, exchange_id: u32, symbol: &str) -> SymbolRef {
    SymbolRef {
        symbol: symbol.to_string(),
        exchange_name: exchange_name.to_string(),
        exchange_id,
    }
}

fn tick(exchange: &str, symbol: &str, price: i64) -> TickRecord {
    TickRecord {
        symbol: symbol.to_string(),
        exchange: exchange.to_string(),
        price: Decimal::from(price),
        bid: None,
        ask: None,
        volume: None,
        time: 0,
    }
}

struct Harness {
    daemon: Arc<Daemon>,
    adapter: Arc<InMemoryAdapter>,
    ticker_store: Arc<InMemoryTickerStore>,
    registry: Arc<InMemoryProcessRegistry>,
}

fn build(initial_symbols: Vec<SymbolRef>) -> Harness {
    let adapter = Arc::new(InMemoryAdapter::new());
    let ticker_store = Arc::new(InMemoryTickerStore::new());
    let registry = Arc::new(InMemoryProcessRegistry::new());
    let daemon = Arc::new(Daemon::new(
        adapter.clone() as Arc<_>,
        Arc::new(NullCredentialResolver),
        ticker_store.clone() as Arc<_>,
        registry.clone() as Arc<_>,
        Arc::new(StaticConfigStore::new(initial_symbols)),
        Duration::from_secs(30),
        None,
        None,
    ));
    Harness {
        daemon,
        adapter,
        ticker_store,
        registry,
    }
}

// S1. Cold start, single symbol.
#[tokio::test]
async fn cold_start_single_symbol() {
    let h = build(Vec::new());
    h.daemon
        .process_ticker(symbol("kraken", 1, "BTC/USD"))
        .await
        .unwrap();

    let health = h.daemon.health();
    assert_eq!(health.status.to_string(), "running");
    assert_eq!(health.active_count, 1);
    assert_eq!(health.exchanges, vec!["kraken".to_string()]);
    assert_eq!(h.adapter.handler_count(), 1);
}

// S2. Bulk start, mixed exchanges.
#[tokio::test]
async fn bulk_start_mixed_exchanges() {
    let h = build(vec![
        symbol("kraken", 1, "BTC/USD"),
        symbol("kraken", 1, "ETH/USD"),
        symbol("bitmex", 2, "XBT/USD"),
    ]);
    h.daemon.start().await.unwrap();

    let health = h.daemon.health();
    assert_eq!(health.active_count, 3);
    assert_eq!(health.exchanges.len(), 2);
    assert_eq!(h.adapter.handler_count(), 2);
    assert_eq!(h.adapter.subscribe_call_count("kraken"), 2);
    assert_eq!(h.adapter.subscribe_call_count("bitmex"), 1);
}

// S3. Dynamic add while running.
#[tokio::test]
async fn dynamic_add_while_running() {
    let h = build(vec![
        symbol("kraken", 1, "BTC/USD"),
        symbol("kraken", 1, "ETH/USD"),
        symbol("bitmex", 2, "XBT/USD"),
    ]);
    h.daemon.start().await.unwrap();

    h.daemon
        .process_ticker(symbol("kraken", 1, "XRP/USD"))
        .await
        .unwrap();

    let health = h.daemon.health();
    assert_eq!(health.active_count, 4);
    assert_eq!(health.exchanges.len(), 2);
    assert_eq!(h.adapter.handler_count(), 2);
    assert_eq!(h.adapter.subscribe_call_count("kraken"), 3);
}

// S4. Add-duplicate no-op.
#[tokio::test]
async fn add_duplicate_is_noop() {
    let h = build(vec![symbol("kraken", 1, "BTC/USD")]);
    h.daemon.start().await.unwrap();
    h.daemon
        .process_ticker(symbol("kraken", 1, "XRP/USD"))
        .await
        .unwrap();
    assert_eq!(h.daemon.health().active_count, 2);

    h.daemon
        .process_ticker(symbol("kraken", 1, "XRP/USD"))
        .await
        .unwrap();

    assert_eq!(h.daemon.health().active_count, 2);
    assert_eq!(h.adapter.subscribe_call_count("kraken"), 2);
}

// S5. Subscription failure isolated.
#[tokio::test]
async fn subscription_failure_is_isolated() {
    let h = build(vec![
        symbol("kraken", 1, "BTC/USD"),
        symbol("kraken", 1, "BAD/SYMBOL"),
        symbol("kraken", 1, "ETH/USD"),
    ]);
    h.adapter.fail_symbol("kraken", "BAD/SYMBOL");

    h.daemon.start().await.unwrap();

    let health = h.daemon.health();
    assert_eq!(health.active_count, 2);
    assert_eq!(health.status.to_string(), "running");
    assert!(!h.daemon.is_symbol_collecting(&symbol("kraken", 1, "BAD/SYMBOL")));
}

// S6 (scaled). Rate gate throttles registry updates for a hot symbol.
#[tokio::test]
async fn rate_gate_throttles_registry_updates() {
    let h = build(vec![symbol("kraken", 1, "BTC/USD")]);
    h.daemon.start().await.unwrap();

    for i in 0..100 {
        h.adapter
            .deliver("kraken", "BTC/USD", tick("kraken", "BTC/USD", 100 + i))
            .await;
    }

    assert_eq!(h.ticker_store.len(), 1);
    assert_eq!(
        h.ticker_store.get("kraken", "BTC/USD").unwrap().price,
        Decimal::from(199)
    );
    // Every tick is written (P5); only the first admits through the 30s rate gate.
    let updates = h.registry.update_count();
    let running_updates = updates
        .iter()
        .filter(|(_, status, _)| status.to_string() == "running")
        .count();
    assert_eq!(running_updates, 1);
}

// P3. Daemon.stop leaves status stopped and collector absent.
#[tokio::test]
async fn stop_leaves_status_stopped() {
    let h = build(vec![symbol("kraken", 1, "BTC/USD")]);
    h.daemon.start().await.unwrap();
    h.daemon.stop().await;

    let health = h.daemon.health();
    assert_eq!(health.status.to_string(), "stopped");
    assert!(!health.collector_present);
}

// shutdown_timeout bounds stop() even when the adapter's own shutdown never resolves.
#[tokio::test(start_paused = true)]
async fn stop_respects_shutdown_timeout() {
    let registry = Arc::new(InMemoryProcessRegistry::new());
    let ticker_store = Arc::new(InMemoryTickerStore::new());
    let daemon = Arc::new(Daemon::new(
        Arc::new(HangingShutdownAdapter::default()),
        Arc::new(NullCredentialResolver),
        ticker_store as Arc<_>,
        registry as Arc<_>,
        Arc::new(StaticConfigStore::new(vec![symbol("kraken", 1, "BTC/USD")])),
        Duration::from_secs(30),
        Some(Duration::from_millis(50)),
        None,
    ));

    daemon.start().await.unwrap();

    let stop_task = {
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.stop().await })
    };
    tokio::time::advance(Duration::from_millis(60)).await;
    tokio::time::timeout(Duration::from_secs(5), stop_task)
        .await
        .expect("stop() must return once shutdown_timeout elapses, even though the adapter's shutdown() never resolves")
        .unwrap();

    assert_eq!(daemon.health().status.to_string(), "stopped");
}

// admin_identity, when configured, is recorded against the daemon-level registration.
#[tokio::test]
async fn admin_identity_is_recorded_on_daemon_registration() {
    let registry = Arc::new(InMemoryProcessRegistry::new());
    let daemon = Arc::new(Daemon::new(
        Arc::new(InMemoryAdapter::new()),
        Arc::new(NullCredentialResolver),
        Arc::new(InMemoryTickerStore::new()),
        registry.clone() as Arc<_>,
        Arc::new(StaticConfigStore::new(vec![symbol("kraken", 1, "BTC/USD")])),
        Duration::from_secs(30),
        None,
        Some("ops-oncall".to_string()),
    ));

    daemon.start().await.unwrap();

    let params = registry.params_for("tickerd:daemon");
    assert_eq!(params.len(), 1);
    assert_eq!(params[0]["admin_identity"], "ops-oncall");
}

// P7. start/stop idempotency.
#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let h = build(vec![symbol("kraken", 1, "BTC/USD")]);
    h.daemon.start().await.unwrap();
    h.daemon.start().await.unwrap();
    assert_eq!(h.daemon.health().active_count, 1);

    h.daemon.stop().await;
    h.daemon.stop().await;
    assert_eq!(h.daemon.health().status.to_string(), "stopped");
}

// B3. A tick delivered after stop is cleanly skipped, not partially applied.
#[tokio::test]
async fn tick_after_stop_is_skipped_cleanly() {
    let h = build(vec![symbol("kraken", 1, "BTC/USD")]);
    h.daemon.start().await.unwrap();
    let callback_adapter = h.adapter.clone();
    h.daemon.stop().await;

    // The adapter itself is shut down and handlers cleared by stop_all, so delivery
    // through it is already a no-op; this only guards against a future change that
    // keeps the handler alive past shutdown.
    callback_adapter
        .deliver("kraken", "BTC/USD", tick("kraken", "BTC/USD", 999))
        .await;

    assert!(h.ticker_store.get("kraken", "BTC/USD").is_none() || h.ticker_store.len() == 1);
}

// RT1. set-ticker followed by get-ticker round-trips the record.
#[tokio::test]
async fn set_then_get_round_trips() {
    let store = InMemoryTickerStore::new();
    let t = tick("kraken", "BTC/USD", 42);
    use tickerd::ports::TickerStore;
    store.set_ticker(&t).await.unwrap();

    let got = store.get("kraken", "BTC/USD").unwrap();
    assert_eq!(got, t);
}

// Inconsistent-state refusal: processTicker never leaves the daemon able to reach
// a state with a collector present but status not running through the public API,
// but we can exercise the documented error path's Display/logging shape directly
// through an invalid symbol instead, which is the one client-reachable rejection.
#[tokio::test]
async fn process_ticker_rejects_invalid_symbol() {
    let h = build(Vec::new());
    let err = h
        .daemon
        .process_ticker(symbol("", 1, "BTC/USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, tickerd::TickerError::InvalidInput(_)));
}
