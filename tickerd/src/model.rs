use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TickerError};

/// One decoded price update delivered by the exchange adapter.
///
/// Transient: owned only by the in-flight callback invocation, never stored by the
/// core. `time` is seconds since epoch, monotonically non-decreasing per
/// (exchange, symbol) on the wire but not guaranteed across reconnects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub symbol: String,
    pub exchange: String,
    pub price: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub time: i64,
}

/// Descriptor of a target subscription.
///
/// `(exchange_name, symbol)` uniquely identifies a subscription; `exchange_id` is the
/// stable identifier used to look up credentials and is carried alongside so callers
/// never need a second round-trip to the configuration store just to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolRef {
    pub symbol: String,
    pub exchange_name: String,
    pub exchange_id: u32,
}

impl SymbolRef {
    /// Reject a `SymbolRef` missing any required field.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(TickerError::InvalidInput("symbol is empty".into()));
        }
        if self.exchange_name.trim().is_empty() {
            return Err(TickerError::InvalidInput("exchangeName is empty".into()));
        }
        Ok(())
    }
}

/// Canonical identifier `"exchangeName:symbol"` used as the identity of an active
/// subscription — the key for the active set, the rate gate, and the registry map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[display("{_0}")]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    pub fn new(exchange_name: &str, symbol: &str) -> Self {
        Self(format!("{exchange_name}:{symbol}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&SymbolRef> for SubscriptionKey {
    fn from(value: &SymbolRef) -> Self {
        Self::new(&value.exchange_name, &value.symbol)
    }
}

/// Opaque id returned by the process registry at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enum of process kinds registered with the process registry. Ticker
/// collection is the only kind the core ever registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessType {
    Tick,
}

/// Closed status enum understood by the process registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Starting,
    Running,
    Error,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::Starting => "starting",
            ProcessStatus::Running => "running",
            ProcessStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// The daemon's three-valued status tag. Crossed with collector presence this forms
/// the state machine described in the design: `Stopped`/`Errored` must have no
/// collector; `Running` must have one. Any other combination is the "Inconsistent"
/// programmer-error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonStatus {
    Stopped,
    Running,
    Errored,
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DaemonStatus::Stopped => "stopped",
            DaemonStatus::Running => "running",
            DaemonStatus::Errored => "error",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time snapshot returned by `Daemon::health`. Copying out these fields
/// avoids holding any collector lock for longer than it takes to read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: DaemonStatus,
    pub running: bool,
    pub daemon_process_id: Option<ProcessId>,
    pub collector_present: bool,
    pub exchanges: Vec<String>,
    pub active_count: usize,
}

/// API key material for one exchange. Empty strings are valid: public ticker streams
/// do not require authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn public() -> Self {
        Self::default()
    }
}

/// Minimal exchange identity passed to the adapter factory when opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeDescriptor {
    pub name: String,
    pub exchange_id: u32,
}
