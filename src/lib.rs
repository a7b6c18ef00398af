//! Cash-and-carry basis arbitrage paper-trading bot.
//!
//! Watches the same asset on a spot venue and a perpetual-swap venue,
//! derives the basis and the funding rate, and simulates a long-spot /
//! short-futures position whenever both clear the configured thresholds:
//!
//! ```text
//! spot ask:     $100.00
//! futures bid:  $101.00
//! ─────────────────────
//! basis:        1.00% > open threshold ✅
//! funding:      0.05% > funding floor  ✅
//! → open: buy spot, short futures, sized to the fixed notional
//! ```
//!
//! No real orders are ever placed: fills, fees, and PnL are applied to an
//! in-memory paper portfolio. Either a REST polling feed or a WebSocket
//! streaming feed can drive the same decision engine.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`engine`]: Snapshot store, evaluator, paper ledger, decision actor
//! - [`feed`]: REST/WebSocket feed adapters and the scripted mock feed
//! - [`api`]: HTTP API for health/status
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod utils;

pub use config::Config;
pub use error::{BotError, Result};
