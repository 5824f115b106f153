//! Trait boundaries for the four external collaborators the design treats as out of
//! scope: the exchange adapter, the ticker store, the process registry, and the
//! configuration store. A fifth, the credential resolver, is synchronous since it is
//! expected to be a cheap local lookup.
//!
//! These are the seams a real deployment plugs into (an adapter wired to a library
//! like `barter-data`, a Redis-backed ticker store, a registry service, ...). The
//! `memory` module provides in-process implementations of all five used by the
//! binary's default mode and by this crate's tests.

use crate::error::Result;
use crate::model::{Credentials, ExchangeDescriptor, ProcessId, ProcessStatus, ProcessType, SymbolRef, TickRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked by an [`ExchangeHandler`] for every delivered tick. Implemented as
/// a trait object rather than a plain closure so the shared per-exchange state
/// (ticker store, registry, rate gate) can be captured once and cloned cheaply into
/// every `subscribe_ticker` call for that exchange's symbols.
#[async_trait]
pub trait TickCallback: Send + Sync {
    async fn on_tick(&self, tick: TickRecord);
}

/// Initialise-once, shutdown-once lifecycle for acquiring exchange handlers.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    /// Acquire a handler for `exchange`. The adapter owns connection establishment,
    /// authentication (if any), and automatic reconnection; a session is ready as
    /// soon as this returns `Ok`.
    async fn handler(
        &self,
        exchange: &ExchangeDescriptor,
        credentials: Credentials,
    ) -> Result<Arc<dyn ExchangeHandler>>;

    /// Close every handler and cancel outstanding subscriptions.
    async fn shutdown(&self) -> Result<()>;
}

/// One connected WebSocket handler for a single exchange, as provided by
/// [`AdapterFactory::handler`].
#[async_trait]
pub trait ExchangeHandler: Send + Sync {
    /// Subscribe to ticker updates for `symbol`, invoking `callback` for every tick
    /// delivered on this handler from now on.
    async fn subscribe_ticker(&self, symbol: &str, callback: Arc<dyn TickCallback>) -> Result<()>;
}

/// Latest-value keyed store receiving tick writes. The store key is implicitly
/// `(tick.exchange, tick.symbol)`; only the latest value is retained. Must be safe
/// under concurrent writers.
#[async_trait]
pub trait TickerStore: Send + Sync {
    async fn set_ticker(&self, tick: &TickRecord) -> Result<()>;
}

/// External health/liveness directory.
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    async fn register_process(
        &self,
        process_type: ProcessType,
        component: &str,
        params: serde_json::Value,
        message: &str,
        status: ProcessStatus,
    ) -> Result<ProcessId>;

    async fn update_process(&self, id: ProcessId, status: ProcessStatus, message: &str) -> Result<()>;
}

/// Returns the set of symbols and exchange metadata to collect.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list_all_symbols(&self) -> Result<Vec<SymbolRef>>;
}

/// Resolves API key material by exchange id. A resolver failure (returning `None`) is
/// not an error: the caller falls back to [`Credentials::public`].
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, exchange_id: u32) -> Option<Credentials>;
}
