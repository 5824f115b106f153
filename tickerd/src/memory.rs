//! In-process reference implementations of every port. Used by the binary's default
//! (no external infrastructure) mode and by this crate's integration tests. Mirrors
//! the trait + in-memory-implementation pairing the Barter ecosystem uses for its own
//! store abstractions (an in-memory implementation alongside a production backend).

use crate::error::Result;
use crate::model::{Credentials, ExchangeDescriptor, ProcessId, ProcessStatus, ProcessType, SymbolRef, TickRecord};
use crate::ports::{
    AdapterFactory, ConfigStore, CredentialResolver, ExchangeHandler, ProcessRegistry, TickCallback, TickerStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latest-value ticker store keyed by `(exchange, symbol)`.
#[derive(Debug, Default)]
pub struct InMemoryTickerStore {
    values: Mutex<HashMap<(String, String), TickRecord>>,
}

impl InMemoryTickerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, exchange: &str, symbol: &str) -> Option<TickRecord> {
        self.values
            .lock()
            .get(&(exchange.to_string(), symbol.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TickerStore for InMemoryTickerStore {
    async fn set_ticker(&self, tick: &TickRecord) -> Result<()> {
        self.values
            .lock()
            .insert((tick.exchange.clone(), tick.symbol.clone()), tick.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ProcessEntry {
    #[allow(dead_code)]
    process_type: ProcessType,
    component: String,
    params: serde_json::Value,
    status: ProcessStatus,
    message: String,
}

/// Process registry backed by an in-memory map, assigning monotonically increasing
/// ids.
#[derive(Debug, Default)]
pub struct InMemoryProcessRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<ProcessId, ProcessEntry>>,
}

impl InMemoryProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, id: ProcessId) -> Option<ProcessStatus> {
        self.entries.lock().get(&id).map(|e| e.status)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn update_count(&self) -> Vec<(String, ProcessStatus, String)> {
        self.entries
            .lock()
            .values()
            .map(|e| (e.component.clone(), e.status, e.message.clone()))
            .collect()
    }

    /// Params recorded for every entry matching `component`, in registration order.
    pub fn params_for(&self, component: &str) -> Vec<serde_json::Value> {
        self.entries
            .lock()
            .values()
            .filter(|e| e.component == component)
            .map(|e| e.params.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessRegistry for InMemoryProcessRegistry {
    async fn register_process(
        &self,
        process_type: ProcessType,
        component: &str,
        params: serde_json::Value,
        message: &str,
        status: ProcessStatus,
    ) -> Result<ProcessId> {
        let id = ProcessId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().insert(
            id,
            ProcessEntry {
                process_type,
                component: component.to_string(),
                params,
                status,
                message: message.to_string(),
            },
        );
        Ok(id)
    }

    async fn update_process(&self, id: ProcessId, status: ProcessStatus, message: &str) -> Result<()> {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.status = status;
            entry.message = message.to_string();
        }
        Ok(())
    }
}

/// Fixed-list configuration store: returns the same symbol list every call.
#[derive(Debug)]
pub struct StaticConfigStore {
    symbols: Vec<SymbolRef>,
}

impl StaticConfigStore {
    pub fn new(symbols: Vec<SymbolRef>) -> Self {
        Self { symbols }
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn list_all_symbols(&self) -> Result<Vec<SymbolRef>> {
        Ok(self.symbols.clone())
    }
}

/// Credential resolver that never finds anything — every exchange falls back to
/// public/empty credentials. Suitable for exchanges whose ticker stream needs no
/// authentication, which is the common case this daemon targets.
#[derive(Debug, Default)]
pub struct NullCredentialResolver;

impl CredentialResolver for NullCredentialResolver {
    fn resolve(&self, _exchange_id: u32) -> Option<Credentials> {
        None
    }
}

/// A fixed lookup-table credential resolver, for deployments that do need to
/// authenticate to some exchanges.
#[derive(Debug, Default)]
pub struct StaticCredentialResolver {
    by_exchange_id: HashMap<u32, Credentials>,
}

impl StaticCredentialResolver {
    pub fn new(by_exchange_id: HashMap<u32, Credentials>) -> Self {
        Self { by_exchange_id }
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self, exchange_id: u32) -> Option<Credentials> {
        self.by_exchange_id.get(&exchange_id).cloned()
    }
}

/// In-memory exchange adapter used for tests and for running the daemon without a
/// real exchange connection. Each exchange gets a handle that records subscriptions;
/// [`InMemoryAdapter::deliver`] lets a test push a tick through to every matching
/// callback, simulating the adapter's delivery contract.
#[derive(Default)]
pub struct InMemoryAdapter {
    handlers: Mutex<HashMap<String, Arc<InMemoryHandler>>>,
    /// Exchanges for which `handler()` should fail, simulating a session
    /// construction failure (e.g. no credentials and no public access).
    pub fail_exchanges: Mutex<std::collections::HashSet<String>>,
    /// Symbols (by "exchange:symbol" key) for which `subscribe_ticker` should fail.
    /// Shared with every [`InMemoryHandler`] so a test can flip this after handlers
    /// already exist.
    fail_symbols: Arc<Mutex<std::collections::HashSet<String>>>,
}

impl std::fmt::Debug for InMemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAdapter")
            .field("handlers", &self.handlers.lock().len())
            .finish()
    }
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail_symbols_handle(&self) -> Arc<Mutex<std::collections::HashSet<String>>> {
        self.fail_symbols.clone()
    }

    pub fn fail_exchange(&self, exchange: &str) {
        self.fail_exchanges.lock().insert(exchange.to_string());
    }

    pub fn fail_symbol(&self, exchange: &str, symbol: &str) {
        self.fail_symbols
            .lock()
            .insert(format!("{exchange}:{symbol}"));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn subscribe_call_count(&self, exchange: &str) -> usize {
        self.handlers
            .lock()
            .get(exchange)
            .map(|h| h.subscriptions.lock().len())
            .unwrap_or(0)
    }

    /// Deliver one tick as if the exchange pushed it through the given symbol's
    /// callback.
    pub async fn deliver(&self, exchange: &str, symbol: &str, tick: TickRecord) {
        let callback = self
            .handlers
            .lock()
            .get(exchange)
            .and_then(|h| h.subscriptions.lock().get(symbol).cloned());
        if let Some(callback) = callback {
            callback.on_tick(tick).await;
        }
    }
}

#[async_trait]
impl AdapterFactory for InMemoryAdapter {
    async fn handler(
        &self,
        exchange: &ExchangeDescriptor,
        _credentials: Credentials,
    ) -> Result<Arc<dyn ExchangeHandler>> {
        if self.fail_exchanges.lock().contains(&exchange.name) {
            return Err(crate::error::TickerError::AdapterFactory(format!(
                "simulated connection failure for {}",
                exchange.name
            )));
        }
        let fail_symbols = self.fail_symbols_handle();
        let mut handlers = self.handlers.lock();
        let handler = handlers
            .entry(exchange.name.clone())
            .or_insert_with(|| Arc::new(InMemoryHandler::new(exchange.name.clone(), fail_symbols)))
            .clone();
        Ok(handler as Arc<dyn ExchangeHandler>)
    }

    async fn shutdown(&self) -> Result<()> {
        self.handlers.lock().clear();
        Ok(())
    }
}

struct InMemoryHandler {
    exchange: String,
    subscriptions: Mutex<HashMap<String, Arc<dyn TickCallback>>>,
    fail_symbols: Arc<Mutex<std::collections::HashSet<String>>>,
}

impl InMemoryHandler {
    fn new(exchange: String, fail_symbols: Arc<Mutex<std::collections::HashSet<String>>>) -> Self {
        Self {
            exchange,
            subscriptions: Mutex::new(HashMap::new()),
            fail_symbols,
        }
    }
}

#[async_trait]
impl ExchangeHandler for InMemoryHandler {
    async fn subscribe_ticker(&self, symbol: &str, callback: Arc<dyn TickCallback>) -> Result<()> {
        if self
            .fail_symbols
            .lock()
            .contains(&format!("{}:{}", self.exchange, symbol))
        {
            return Err(crate::error::TickerError::AdapterFactory(format!(
                "simulated subscribe failure for {}:{}",
                self.exchange, symbol
            )));
        }
        self.subscriptions
            .lock()
            .insert(symbol.to_string(), callback);
        Ok(())
    }
}
