use crate::collector::CollectorState;
use crate::error::{Result, TickerError};
use crate::model::{ExchangeDescriptor, ProcessStatus, SubscriptionKey, TickRecord};
use crate::ports::{AdapterFactory, CredentialResolver, ExchangeHandler, ProcessRegistry, TickCallback, TickerStore};
use crate::rate_gate::RateGate;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// One logical WebSocket session to one exchange. Subscribes one symbol at a time via
/// the adapter's `subscribe_ticker`, passing the same shared callback for every
/// symbol on this exchange. Exposes no API beyond `subscribe` — it is an internal
/// detail of [`crate::collector::LiveCollector`].
pub struct ExchangeSession {
    exchange_name: String,
    handler: Arc<dyn ExchangeHandler>,
}

impl std::fmt::Debug for ExchangeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeSession")
            .field("exchange_name", &self.exchange_name)
            .finish_non_exhaustive()
    }
}

impl ExchangeSession {
    /// Acquire credentials (falling back to public/empty on resolver failure — that
    /// is not an error, public ticker streams don't need authentication) and open a
    /// handler through the adapter factory. A session is ready once the adapter
    /// acknowledges connection.
    pub async fn connect(
        descriptor: &ExchangeDescriptor,
        credentials: &dyn CredentialResolver,
        adapter: &dyn AdapterFactory,
    ) -> Result<Self> {
        let creds = credentials.resolve(descriptor.exchange_id).unwrap_or_default();
        let handler = adapter.handler(descriptor, creds).await.map_err(|e| {
            TickerError::SessionConstruction {
                exchange: descriptor.name.clone(),
                source: e.to_string(),
            }
        })?;
        Ok(Self {
            exchange_name: descriptor.name.clone(),
            handler,
        })
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Subscribe `symbol` on this session's handler. Any error here is the caller's
    /// to isolate per-symbol — it must never disturb other symbols on this session.
    pub async fn subscribe(&self, symbol: &str, callback: Arc<dyn TickCallback>) -> Result<()> {
        self.handler
            .subscribe_ticker(symbol, callback)
            .await
            .map_err(|e| TickerError::Subscription {
                exchange: self.exchange_name.clone(),
                symbol: symbol.to_string(),
                source: e.to_string(),
            })
    }
}

/// The shared per-tick callback: writes to the ticker store unconditionally, then
/// throttles the registry update through the rate gate. Captures the exchange's
/// collaborators once so a single value can serve every symbol on that exchange's
/// session — the struct-with-method equivalent of the source's closure-over-exchange
/// pattern.
///
/// Holds the same `Arc<Mutex<CollectorState>>` the collector mutates during
/// lifecycle operations, but only ever reads `process_ids` through it, per the
/// design's lock discipline.
pub struct TickPipeline {
    ticker_store: Arc<dyn TickerStore>,
    registry: Arc<dyn ProcessRegistry>,
    rate_gate: Arc<RateGate>,
    state: Arc<Mutex<CollectorState>>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for TickPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickPipeline")
            .field("rate_gate", &self.rate_gate)
            .field("running", &self.running.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl TickPipeline {
    pub fn new(
        ticker_store: Arc<dyn TickerStore>,
        registry: Arc<dyn ProcessRegistry>,
        rate_gate: Arc<RateGate>,
        state: Arc<Mutex<CollectorState>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ticker_store,
            registry,
            rate_gate,
            state,
            running,
        }
    }
}

#[async_trait]
impl TickCallback for TickPipeline {
    async fn on_tick(&self, tick: TickRecord) {
        // Shutdown may have been signalled while this tick was in flight; a clean
        // skip is acceptable (B3), a partial update is not.
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let key = SubscriptionKey::new(&tick.exchange, &tick.symbol);

        // Step 1: mandatory on every call. Failure is logged and swallowed — the
        // next tick supersedes the last one.
        if let Err(e) = self.ticker_store.set_ticker(&tick).await {
            warn!(exchange = %tick.exchange, symbol = %tick.symbol, error = %e, "ticker store write failed");
        }

        // Step 2: consult the gate. This never suspends.
        let now = Instant::now();
        if !self.rate_gate.admit(&key, now) {
            return;
        }

        // Step 3: advisory registry update, skipped when the gate rejects.
        let process_id = self.state.lock().process_ids.get(&key).copied();
        let Some(process_id) = process_id else {
            return;
        };
        let message = match chrono::DateTime::from_timestamp(tick.time, 0) {
            Some(ts) => format!("tick received at {}", ts.to_rfc3339()),
            None => format!("tick received at {}", tick.time),
        };
        if let Err(e) = self
            .registry
            .update_process(process_id, ProcessStatus::Running, &message)
            .await
        {
            warn!(exchange = %tick.exchange, symbol = %tick.symbol, error = %e, "registry update failed");
        }
    }
}
