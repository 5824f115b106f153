use crate::model::DaemonStatus;
use thiserror::Error;

/// All errors generated by `tickerd`.
///
/// Several failure modes described in the design (credential resolution failure,
/// a single symbol's subscribe failure, a ticker-store or registry write failure
/// inside the hot-path callback) are deliberately *not* variants here: the design
/// requires those to be logged and swallowed rather than surfaced as `Result::Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("invalid SymbolRef: {0}")]
    InvalidInput(String),

    #[error(
        "inconsistent daemon state: status={status:?} collector_present={collector_present}"
    )]
    InconsistentState {
        status: DaemonStatus,
        collector_present: bool,
    },

    #[error("failed to subscribe {exchange}:{symbol}: {source}")]
    Subscription {
        exchange: String,
        symbol: String,
        source: String,
    },

    #[error("failed to construct session for exchange {exchange}: {source}")]
    SessionConstruction { exchange: String, source: String },

    #[error("configuration store error: {0}")]
    ConfigStore(String),

    #[error("adapter factory error: {0}")]
    AdapterFactory(String),

    #[error("process registry error: {0}")]
    ProcessRegistry(String),
}

pub type Result<T> = std::result::Result<T, TickerError>;
