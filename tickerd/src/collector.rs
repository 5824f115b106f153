use crate::error::Result;
use crate::model::{ExchangeDescriptor, ProcessId, ProcessStatus, ProcessType, SubscriptionKey, SymbolRef};
use crate::ports::{AdapterFactory, CredentialResolver, ProcessRegistry, TickerStore};
use crate::rate_gate::RateGate;
use crate::session::{ExchangeSession, TickPipeline};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// The trio the design requires to live behind a single mutex: the per-exchange
/// session map, the active-subscription set, and the process-registry id map.
/// Callbacks are handed an `Arc` to this same state but only ever read
/// `process_ids` — they never mutate the trio.
#[derive(Default)]
pub(crate) struct CollectorState {
    pub sessions: HashMap<String, Arc<ExchangeSession>>,
    pub active: HashSet<SubscriptionKey>,
    pub process_ids: HashMap<SubscriptionKey, ProcessId>,
}

impl std::fmt::Debug for CollectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorState")
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("process_ids", &self.process_ids)
            .finish()
    }
}

/// Aggregate over all [`ExchangeSession`]s. Tracks the active subscription set,
/// owns the process-registry ids and the [`RateGate`]. `start_all` and `start_one`
/// are the two admission paths; `is_collecting` and `stop_all` round out the API.
pub struct LiveCollector {
    adapter: Arc<dyn AdapterFactory>,
    credentials: Arc<dyn CredentialResolver>,
    ticker_store: Arc<dyn TickerStore>,
    registry: Arc<dyn ProcessRegistry>,
    rate_gate: Arc<RateGate>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<CollectorState>>,
}

impl std::fmt::Debug for LiveCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCollector")
            .field("rate_gate", &self.rate_gate)
            .field("running", &self.running.load(Ordering::Acquire))
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LiveCollector {
    pub fn new(
        adapter: Arc<dyn AdapterFactory>,
        credentials: Arc<dyn CredentialResolver>,
        ticker_store: Arc<dyn TickerStore>,
        registry: Arc<dyn ProcessRegistry>,
        rate_gate_window: Duration,
    ) -> Self {
        Self {
            adapter,
            credentials,
            ticker_store,
            registry,
            rate_gate: Arc::new(RateGate::new(rate_gate_window)),
            running: Arc::new(AtomicBool::new(true)),
            state: Arc::new(Mutex::new(CollectorState::default())),
        }
    }

    /// Subscribe to a preloaded list of [`SymbolRef`]s, grouped by exchange. A
    /// failure for one symbol or one whole exchange is isolated: logged and
    /// skipped, other symbols/exchanges proceed.
    pub async fn start_all(&self, symbols: Vec<SymbolRef>) {
        let mut by_exchange: HashMap<String, Vec<SymbolRef>> = HashMap::new();
        for s in symbols {
            by_exchange.entry(s.exchange_name.clone()).or_default().push(s);
        }

        for (exchange_name, group) in by_exchange {
            let exchange_id = group.first().map(|s| s.exchange_id).unwrap_or_default();
            let session = match self.session_for(&exchange_name, exchange_id).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(exchange = %exchange_name, error = %e, "failed to construct session, skipping exchange");
                    continue;
                }
            };

            for symbol in group {
                self.start_symbol(&session, &symbol).await;
            }
        }
    }

    /// Idempotent single-symbol admission: if already collecting, this is a no-op.
    /// Otherwise the session for `symbol`'s exchange is created if absent, then the
    /// per-symbol body of `start_all` runs for `symbol` alone.
    pub async fn start_one(&self, symbol: SymbolRef) {
        if self.is_collecting(&symbol) {
            return;
        }
        let session = match self.session_for(&symbol.exchange_name, symbol.exchange_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(exchange = %symbol.exchange_name, error = %e, "failed to construct session, skipping symbol");
                return;
            }
        };
        self.start_symbol(&session, &symbol).await;
    }

    /// Pure membership test against the canonical key. O(1) expected.
    pub fn is_collecting(&self, symbol: &SymbolRef) -> bool {
        let key = SubscriptionKey::from(symbol);
        self.state.lock().active.contains(&key)
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn exchange_names(&self) -> Vec<String> {
        self.state.lock().sessions.keys().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Signal shutdown, clear in-memory subscription state, and release adapter
    /// resources. Outstanding registry entries are expected to be reaped by the
    /// registry's own liveness policy (see DESIGN.md).
    pub async fn stop_all(&self) {
        self.running.store(false, Ordering::Release);
        {
            let mut state = self.state.lock();
            state.active.clear();
            state.process_ids.clear();
            state.sessions.clear();
        }
        if let Err(e) = self.adapter.shutdown().await {
            warn!(error = %e, "adapter factory shutdown reported an error");
        }
    }

    /// Resolve or lazily create the session for `exchange_name`. At most one
    /// session per exchange name lives for the lifetime of this collector.
    async fn session_for(&self, exchange_name: &str, exchange_id: u32) -> Result<Arc<ExchangeSession>> {
        if let Some(existing) = self.state.lock().sessions.get(exchange_name).cloned() {
            return Ok(existing);
        }

        let descriptor = ExchangeDescriptor {
            name: exchange_name.to_string(),
            exchange_id,
        };
        let session = Arc::new(
            ExchangeSession::connect(&descriptor, self.credentials.as_ref(), self.adapter.as_ref()).await?,
        );

        let mut state = self.state.lock();
        // Another caller may have raced us to create the same exchange's session;
        // keep whichever was inserted first so `SessionMap` never holds two.
        let session = state
            .sessions
            .entry(exchange_name.to_string())
            .or_insert(session)
            .clone();
        Ok(session)
    }

    /// Register, subscribe, and (on success) admit one symbol. Isolation is
    /// mandatory: a failure here must never touch any other symbol's state.
    async fn start_symbol(&self, session: &Arc<ExchangeSession>, symbol: &SymbolRef) {
        let key = SubscriptionKey::from(symbol);
        let component = key.as_str().to_string();

        let process_id = match self
            .registry
            .register_process(
                ProcessType::Tick,
                &component,
                serde_json::json!({
                    "exchange": symbol.exchange_name,
                    "symbol": symbol.symbol,
                }),
                "starting ticker collection",
                ProcessStatus::Starting,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(exchange = %symbol.exchange_name, symbol = %symbol.symbol, error = %e, "failed to register process, skipping symbol");
                return;
            }
        };

        let callback = Arc::new(TickPipeline::new(
            self.ticker_store.clone(),
            self.registry.clone(),
            self.rate_gate.clone(),
            self.state.clone(),
            self.running.clone(),
        ));

        if let Err(e) = session.subscribe(&symbol.symbol, callback).await {
            warn!(exchange = %symbol.exchange_name, symbol = %symbol.symbol, error = %e, "subscribe failed, skipping symbol");
            return;
        }

        let mut state = self.state.lock();
        state.active.insert(key.clone());
        state.process_ids.insert(key, process_id);
    }
}
