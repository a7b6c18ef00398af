//! Feed event and venue payload types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Which venue a market data update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Venue {
    /// Spot market.
    Spot,
    /// Perpetual swap market.
    Futures,
}

/// A discrete market data observation delivered to the engine.
///
/// Every feed adapter (REST poller, WebSocket stream, funding timer, test
/// script) speaks this type; the engine consumes them from a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    /// Best bid/ask for one venue.
    Ticker {
        /// Venue the quote belongs to.
        venue: Venue,
        /// Best bid price.
        bid: Decimal,
        /// Best ask price.
        ask: Decimal,
    },
    /// Refreshed funding rate, already converted to a percentage.
    FundingRate {
        /// Funding rate as a percentage (0.01 = 0.01%).
        rate_pct: Decimal,
    },
}

/// REST book ticker response (`/api/v3/ticker/bookTicker`,
/// `/fapi/v1/ticker/bookTicker`).
#[derive(Debug, Clone, Deserialize)]
pub struct BookTickerResponse {
    /// Symbol the quote is for.
    pub symbol: String,
    /// Best bid price.
    #[serde(rename = "bidPrice", with = "rust_decimal::serde::str")]
    pub bid_price: Decimal,
    /// Best ask price.
    #[serde(rename = "askPrice", with = "rust_decimal::serde::str")]
    pub ask_price: Decimal,
}

/// REST premium index response (`/fapi/v1/premiumIndex`).
#[derive(Debug, Clone, Deserialize)]
pub struct PremiumIndexResponse {
    /// Symbol the funding rate is for.
    pub symbol: String,
    /// Latest funding rate as a fraction (0.0001 = 0.01%).
    #[serde(rename = "lastFundingRate", with = "rust_decimal::serde::str")]
    pub last_funding_rate: Decimal,
    /// Next funding settlement time (Unix ms).
    #[serde(rename = "nextFundingTime", default)]
    pub next_funding_time: i64,
}

impl PremiumIndexResponse {
    /// Funding rate as a percentage.
    pub fn rate_pct(&self) -> Decimal {
        self.last_funding_rate * Decimal::ONE_HUNDRED
    }
}

/// WebSocket book ticker payload (`<symbol>@bookTicker`).
#[derive(Debug, Clone, Deserialize)]
pub struct WsBookTicker {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,
    /// Best bid price.
    #[serde(rename = "b", with = "rust_decimal::serde::str")]
    pub bid_price: Decimal,
    /// Best bid quantity.
    #[serde(rename = "B", with = "rust_decimal::serde::str")]
    pub bid_qty: Decimal,
    /// Best ask price.
    #[serde(rename = "a", with = "rust_decimal::serde::str")]
    pub ask_price: Decimal,
    /// Best ask quantity.
    #[serde(rename = "A", with = "rust_decimal::serde::str")]
    pub ask_qty: Decimal,
}
