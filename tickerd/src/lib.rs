#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! `tickerd` — a long-running daemon that maintains WebSocket ticker subscriptions
//! against one or more exchanges and publishes the latest price for each symbol into
//! a shared store.
//!
//! [`daemon::Daemon`] is the top-level lifecycle object. It owns a
//! [`collector::LiveCollector`] once running, which in turn owns one
//! [`session::ExchangeSession`] per exchange and a [`rate_gate::RateGate`] shared by
//! every session. The four external collaborators — exchange adapter, ticker store,
//! process registry, and symbol configuration — are modelled as traits in
//! [`ports`]; [`memory`] supplies in-process implementations of each for tests and
//! for running without external infrastructure.

pub mod collector;
pub mod config;
pub mod daemon;
pub mod error;
pub mod memory;
pub mod model;
pub mod ports;
pub mod rate_gate;
pub mod session;
pub mod telemetry;

pub use daemon::Daemon;
pub use error::{Result, TickerError};
