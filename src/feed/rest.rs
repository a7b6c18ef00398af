//! REST polling feed adapter.
//!
//! One poller task per venue fetches the book ticker on a fixed interval;
//! a separate task refreshes the funding rate on its own (much slower)
//! period. Transient errors are logged and retried; the engine only ever
//! sees successfully decoded quotes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::health::FeedHealth;
use super::types::{BookTickerResponse, FeedEvent, PremiumIndexResponse, Venue};
use crate::config::Config;
use crate::error::{BotError, FeedError};
use crate::metrics;

/// Delay before retrying a failed funding refresh.
const FUNDING_RETRY_DELAY: Duration = Duration::from_secs(30);

/// REST client for both venues.
#[derive(Debug, Clone)]
pub struct VenueRestClient {
    http: reqwest::Client,
    spot_base: String,
    futures_base: String,
    spot_symbol: String,
    futures_symbol: String,
}

impl VenueRestClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            spot_base: config.spot_rest_url.trim_end_matches('/').to_string(),
            futures_base: config.futures_rest_url.trim_end_matches('/').to_string(),
            spot_symbol: config.spot_symbol.clone(),
            futures_symbol: config.futures_symbol.clone(),
        })
    }

    /// Fetch the best bid/ask for a venue.
    pub async fn book_ticker(&self, venue: Venue) -> Result<BookTickerResponse, FeedError> {
        let (url, symbol) = match venue {
            Venue::Spot => (
                format!("{}/api/v3/ticker/bookTicker", self.spot_base),
                &self.spot_symbol,
            ),
            Venue::Futures => (
                format!("{}/fapi/v1/ticker/bookTicker", self.futures_base),
                &self.futures_symbol,
            ),
        };

        let ticker: BookTickerResponse = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !ticker.symbol.eq_ignore_ascii_case(symbol) {
            return Err(FeedError::MalformedPayload {
                venue,
                reason: format!("expected symbol {}, got {}", symbol, ticker.symbol),
            });
        }

        Ok(ticker)
    }

    /// Fetch the latest funding rate, as a percentage.
    pub async fn funding_rate_pct(&self) -> Result<Decimal, FeedError> {
        let url = format!("{}/fapi/v1/premiumIndex", self.futures_base);

        let premium: PremiumIndexResponse = self
            .http
            .get(&url)
            .query(&[("symbol", self.futures_symbol.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !premium.symbol.eq_ignore_ascii_case(&self.futures_symbol) {
            return Err(FeedError::MalformedPayload {
                venue: Venue::Futures,
                reason: format!(
                    "expected symbol {}, got {}",
                    self.futures_symbol, premium.symbol
                ),
            });
        }

        Ok(premium.rate_pct())
    }
}

/// Poll one venue's book ticker until shutdown.
///
/// Fetch failures are logged and the next interval tick retries; the poll
/// cadence never propagates errors downstream.
pub async fn run_ticker_poller(
    client: Arc<VenueRestClient>,
    venue: Venue,
    interval: Duration,
    tx: mpsc::Sender<FeedEvent>,
    health: Arc<FeedHealth>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(venue = %venue, interval_ms = interval.as_millis() as u64, "Ticker poller started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!(venue = %venue, "Ticker poller shutting down");
                return;
            }
            _ = ticker.tick() => {
                let start = Instant::now();
                match client.book_ticker(venue).await {
                    Ok(response) => {
                        metrics::record_rest_poll_latency(start, venue);
                        health.record_tick(venue);

                        let event = FeedEvent::Ticker {
                            venue,
                            bid: response.bid_price,
                            ask: response.ask_price,
                        };
                        if tx.send(event).await.is_err() {
                            debug!(venue = %venue, "Engine gone, ticker poller stopping");
                            return;
                        }
                    }
                    Err(e) => {
                        metrics::inc_feed_errors(venue);
                        warn!(venue = %venue, error = %e, "Book ticker fetch failed, will retry");
                    }
                }
            }
        }
    }
}

/// Refresh the funding rate on a fixed period until shutdown.
///
/// Fetches immediately on startup so the engine does not wait a full period
/// for its first rate, then sleeps `period` between refreshes (or a short
/// retry delay after a failure).
pub async fn run_funding_refresher(
    client: Arc<VenueRestClient>,
    period: Duration,
    tx: mpsc::Sender<FeedEvent>,
    health: Arc<FeedHealth>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(period_secs = period.as_secs(), "Funding refresher started");

    loop {
        let delay = match client.funding_rate_pct().await {
            Ok(rate_pct) => {
                health.record_funding();
                if tx.send(FeedEvent::FundingRate { rate_pct }).await.is_err() {
                    debug!("Engine gone, funding refresher stopping");
                    return;
                }
                period
            }
            Err(e) => {
                metrics::inc_feed_errors(Venue::Futures);
                warn!(error = %e, "Funding rate fetch failed, will retry");
                FUNDING_RETRY_DELAY
            }
        };

        tokio::select! {
            _ = shutdown.recv() => {
                debug!("Funding refresher shutting down");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            spot_symbol: "BTCUSDT".to_string(),
            futures_symbol: "BTCUSDT".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            spot_taker_fee: Decimal::new(1, 3),
            futures_taker_fee: Decimal::new(4, 4),
            open_basis_pct: Decimal::new(5, 1),
            close_basis_pct: Decimal::new(1, 1),
            min_funding_rate_pct: Decimal::new(1, 2),
            fee_aware_entry: false,
            trade_notional: Decimal::new(1000, 0),
            initial_balances: "USDT=10000".to_string(),
            spot_rest_url: "https://api.example.com/".to_string(),
            futures_rest_url: "https://fapi.example.com".to_string(),
            spot_ws_url: String::new(),
            futures_ws_url: String::new(),
            use_wss: false,
            poll_interval_ms: 1000,
            funding_refresh_secs: 3600,
            ws_reconnect_max_delay_s: 30,
            show_feed_updates: false,
            port: 8080,
            rust_log: "info".to_string(),
            verbose: false,
        }
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = VenueRestClient::new(&test_config()).unwrap();
        assert_eq!(client.spot_base, "https://api.example.com");
        assert_eq!(client.futures_base, "https://fapi.example.com");
    }

    #[test]
    fn client_keeps_symbols_per_venue() {
        let mut config = test_config();
        config.futures_symbol = "BTCUSD_PERP".to_string();

        let client = VenueRestClient::new(&config).unwrap();
        assert_eq!(client.spot_symbol, "BTCUSDT");
        assert_eq!(client.futures_symbol, "BTCUSD_PERP");
    }
}
