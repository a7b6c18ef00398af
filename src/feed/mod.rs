//! Market data acquisition.
//!
//! This module handles:
//! - Feed event and venue payload types
//! - REST polling and funding-rate refresh
//! - WebSocket book ticker streams with reconnection
//! - Feed freshness tracking and a scripted mock feed

pub mod health;
pub mod mock;
pub mod rest;
pub mod types;
pub mod ws;

pub use health::{FeedHealth, FUNDING_FEED};
pub use mock::ScriptedFeed;
pub use rest::{run_funding_refresher, run_ticker_poller, VenueRestClient};
pub use types::{BookTickerResponse, FeedEvent, PremiumIndexResponse, Venue, WsBookTicker};
pub use ws::{BookTickerStream, ReconnectConfig};
