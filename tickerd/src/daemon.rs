use crate::collector::LiveCollector;
use crate::error::{Result, TickerError};
use crate::model::{
    DaemonStatus, HealthSnapshot, ProcessId, ProcessStatus, ProcessType, SymbolRef,
};
use crate::ports::{AdapterFactory, ConfigStore, CredentialResolver, ProcessRegistry, TickerStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// The externally visible lifecycle object: the three-valued state machine and the
/// health surface. `status` and `collector` are updated together under one lock so a
/// reader never observes one without the other (that pairing is the whole
/// dispatch logic of `process_ticker` and must never be checked in isolation).
pub struct Daemon {
    adapter: Arc<dyn AdapterFactory>,
    credentials: Arc<dyn CredentialResolver>,
    ticker_store: Arc<dyn TickerStore>,
    registry: Arc<dyn ProcessRegistry>,
    config_store: Arc<dyn ConfigStore>,
    rate_gate_window: Duration,
    shutdown_timeout: Option<Duration>,
    admin_identity: Option<String>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("rate_gate_window", &self.rate_gate_window)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Inner {
    status: DaemonStatus,
    collector: Option<Arc<LiveCollector>>,
    process_id: Option<ProcessId>,
}

impl Daemon {
    pub fn new(
        adapter: Arc<dyn AdapterFactory>,
        credentials: Arc<dyn CredentialResolver>,
        ticker_store: Arc<dyn TickerStore>,
        registry: Arc<dyn ProcessRegistry>,
        config_store: Arc<dyn ConfigStore>,
        rate_gate_window: Duration,
        shutdown_timeout: Option<Duration>,
        admin_identity: Option<String>,
    ) -> Self {
        Self {
            adapter,
            credentials,
            ticker_store,
            registry,
            config_store,
            rate_gate_window,
            shutdown_timeout,
            admin_identity,
            inner: Mutex::new(Inner {
                status: DaemonStatus::Stopped,
                collector: None,
                process_id: None,
            }),
        }
    }

    /// `Stopped -> Running`: load all symbols from configuration, construct a
    /// collector around them, register the daemon-level process entry, subscribe to
    /// everything. The daemon-level registration carries `admin_identity` in its
    /// params when configured, so a liveness directory can attribute the run to
    /// whoever started it. Idempotent: a no-op if already `Running`. Any failure before
    /// `start_all` (configuration load, registration) transitions to `Errored` and
    /// is propagated; partial subscription failures inside `start_all` are isolated
    /// per the collector's own contract and never reach this level.
    pub async fn start(&self) -> Result<()> {
        {
            let inner = self.inner.lock();
            if matches!(inner.status, DaemonStatus::Running) {
                return Ok(());
            }
        }

        let symbols = self
            .config_store
            .list_all_symbols()
            .await
            .map_err(|e| TickerError::ConfigStore(e.to_string()))?;

        let mut params = serde_json::json!({ "symbol_count": symbols.len() });
        if let Some(identity) = &self.admin_identity {
            params["admin_identity"] = serde_json::Value::String(identity.clone());
        }

        let process_id = match self
            .registry
            .register_process(
                ProcessType::Tick,
                "tickerd:daemon",
                params,
                "starting ticker collection daemon",
                ProcessStatus::Starting,
            )
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                self.transition_to_errored();
                return Err(TickerError::ProcessRegistry(format!(
                    "failed to register daemon process: {e}"
                )));
            }
        };

        let collector = Arc::new(LiveCollector::new(
            self.adapter.clone(),
            self.credentials.clone(),
            self.ticker_store.clone(),
            self.registry.clone(),
            self.rate_gate_window,
        ));

        collector.start_all(symbols).await;

        let mut inner = self.inner.lock();
        inner.status = DaemonStatus::Running;
        inner.collector = Some(collector);
        inner.process_id = process_id;
        Ok(())
    }

    /// Rejects a malformed `SymbolRef` immediately. Otherwise consults the
    /// three-valued state: `Stopped` cold-starts a collector around just this
    /// symbol; `Running` admits it if not already collecting; any other
    /// combination (collector present, status not `Running`) is the inconsistent
    /// programmer-error state and is refused with a logged error.
    pub async fn process_ticker(&self, symbol: SymbolRef) -> Result<()> {
        symbol.validate()?;

        enum Action {
            ColdStart,
            StartOne(Arc<LiveCollector>),
            Refuse(DaemonStatus, bool),
        }

        let action = {
            let inner = self.inner.lock();
            match (&inner.status, &inner.collector) {
                (DaemonStatus::Stopped, None) => Action::ColdStart,
                (DaemonStatus::Running, Some(collector)) => Action::StartOne(collector.clone()),
                (DaemonStatus::Errored, None) => Action::ColdStart,
                (status, collector) => Action::Refuse(*status, collector.is_some()),
            }
        };

        match action {
            Action::ColdStart => {
                let collector = Arc::new(LiveCollector::new(
                    self.adapter.clone(),
                    self.credentials.clone(),
                    self.ticker_store.clone(),
                    self.registry.clone(),
                    self.rate_gate_window,
                ));
                collector.start_one(symbol).await;
                let mut inner = self.inner.lock();
                inner.status = DaemonStatus::Running;
                inner.collector = Some(collector);
                Ok(())
            }
            Action::StartOne(collector) => {
                if collector.is_collecting(&symbol) {
                    return Ok(());
                }
                collector.start_one(symbol).await;
                Ok(())
            }
            Action::Refuse(status, collector_present) => {
                error!(
                    status = %status,
                    collector_present,
                    "processTicker refused: daemon is in an inconsistent state"
                );
                Err(TickerError::InconsistentState {
                    status,
                    collector_present,
                })
            }
        }
    }

    /// `Running -> Stopped`: tear down the collector and deregister. Errors during
    /// teardown are logged, never raised — this is the single cancellation entry
    /// point and must always leave the daemon `Stopped`. Idempotent: a no-op if
    /// already `Stopped`. Teardown is bounded by `shutdown_timeout` when configured;
    /// a timeout abandons the in-flight `stop_all` task rather than blocking forever,
    /// since the daemon's own state has already flipped to `Stopped` by the time the
    /// wait begins.
    pub async fn stop(&self) {
        let collector = {
            let mut inner = self.inner.lock();
            if matches!(inner.status, DaemonStatus::Stopped) && inner.collector.is_none() {
                return;
            }
            let collector = inner.collector.take();
            inner.process_id = None;
            inner.status = DaemonStatus::Stopped;
            collector
        };

        if let Some(collector) = collector {
            match self.shutdown_timeout {
                Some(timeout) => {
                    if tokio::time::timeout(timeout, collector.stop_all()).await.is_err() {
                        warn!(?timeout, "shutdown timed out, abandoning in-flight teardown");
                    }
                }
                None => collector.stop_all().await,
            }
        }
        // The daemon-level registry entry is left for the registry's own liveness
        // policy to reap, same as the per-symbol entries LiveCollector::stop_all
        // leaves behind — ProcessStatus has no terminal "stopped" variant to report.
    }

    /// Snapshot of daemon health. Copies out the minimal set of fields so no
    /// long-lived lock is ever held on collector state.
    pub fn health(&self) -> HealthSnapshot {
        let inner = self.inner.lock();
        let (exchanges, active_count) = match &inner.collector {
            Some(collector) => (collector.exchange_names(), collector.active_count()),
            None => (Vec::new(), 0),
        };
        HealthSnapshot {
            status: inner.status,
            running: matches!(inner.status, DaemonStatus::Running),
            daemon_process_id: inner.process_id,
            collector_present: inner.collector.is_some(),
            exchanges,
            active_count,
        }
    }

    /// Whether `symbol` is currently an active subscription. `false` when there is no
    /// collector at all.
    pub fn is_symbol_collecting(&self, symbol: &SymbolRef) -> bool {
        let inner = self.inner.lock();
        match &inner.collector {
            Some(collector) => collector.is_collecting(symbol),
            None => false,
        }
    }

    fn transition_to_errored(&self) {
        let mut inner = self.inner.lock();
        inner.status = DaemonStatus::Errored;
        inner.collector = None;
    }
}
