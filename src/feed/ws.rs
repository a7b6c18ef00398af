//! WebSocket streaming feed adapter.
//!
//! One stream task per venue subscribes to the `<symbol>@bookTicker` stream
//! and forwards every quote into the engine channel. Disconnects are
//! retried forever with exponential backoff; the engine simply sees no
//! updates while a stream is down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use super::health::FeedHealth;
use super::types::{FeedEvent, Venue, WsBookTicker};
use crate::error::WsError;
use crate::metrics;

/// Reconnection configuration for a venue stream.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_s: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential).
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_s: 30,
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Create from config values.
    pub fn from_config(max_delay_s: u64) -> Self {
        Self {
            max_delay_s,
            ..Default::default()
        }
    }

    /// Calculate next delay with exponential backoff.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let max_delay_ms = self.max_delay_s * 1000;
        let clamped_ms = delay_ms.min(max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }
}

/// Book ticker stream for one venue.
pub struct BookTickerStream {
    venue: Venue,
    ws_base: String,
    symbol: String,
    reconnect_config: ReconnectConfig,
    connected: Arc<AtomicBool>,
}

impl BookTickerStream {
    /// Create a stream with default reconnection behavior.
    pub fn new(venue: Venue, ws_base: String, symbol: String) -> Self {
        Self::with_reconnect_config(venue, ws_base, symbol, ReconnectConfig::default())
    }

    /// Create a stream with explicit reconnection behavior.
    pub fn with_reconnect_config(
        venue: Venue,
        ws_base: String,
        symbol: String,
        reconnect_config: ReconnectConfig,
    ) -> Self {
        Self {
            venue,
            ws_base,
            symbol,
            reconnect_config,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the stream currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Shareable handle to the connection flag.
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    /// Full stream URL for this venue's book ticker.
    pub fn stream_url(&self) -> Result<Url, WsError> {
        let raw = format!(
            "{}/{}@bookTicker",
            self.ws_base.trim_end_matches('/'),
            self.symbol.to_lowercase()
        );
        Ok(raw.parse()?)
    }

    /// Run the stream until shutdown, reconnecting on any failure.
    pub async fn run(
        self,
        tx: mpsc::Sender<FeedEvent>,
        health: Arc<FeedHealth>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), WsError> {
        let url = self.stream_url()?;
        let mut attempt: u32 = 0;

        loop {
            if shutdown.try_recv().is_ok() {
                debug!(venue = %self.venue, "Stream shutting down before connect");
                return Ok(());
            }

            info!(venue = %self.venue, url = %url, "Connecting to book ticker stream");

            match connect_async(url.as_str()).await {
                Ok((mut ws, _response)) => {
                    self.connected.store(true, Ordering::SeqCst);
                    attempt = 0;
                    info!(venue = %self.venue, "Stream connected");

                    let disconnect_reason = self
                        .read_messages(&mut ws, &tx, &health, &mut shutdown)
                        .await;
                    self.connected.store(false, Ordering::SeqCst);

                    match disconnect_reason {
                        StreamEnd::Shutdown => {
                            let _ = ws.close(None).await;
                            return Ok(());
                        }
                        StreamEnd::EngineGone => {
                            debug!(venue = %self.venue, "Engine gone, stream stopping");
                            return Ok(());
                        }
                        StreamEnd::Disconnected(reason) => {
                            warn!(venue = %self.venue, reason = %reason, "Stream disconnected");
                        }
                    }
                }
                Err(e) => {
                    warn!(venue = %self.venue, error = %e, "Stream connect failed");
                }
            }

            metrics::inc_ws_reconnects(self.venue);
            let delay = self.reconnect_config.next_delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                venue = %self.venue,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );

            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(venue = %self.venue, "Stream shutting down during backoff");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn read_messages<S>(
        &self,
        ws: &mut S,
        tx: &mpsc::Sender<FeedEvent>,
        health: &FeedHealth,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> StreamEnd
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Sink<Message>
            + Unpin,
    {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return StreamEnd::Shutdown,
                maybe_msg = ws.next() => {
                    match maybe_msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<WsBookTicker>(&text) {
                                Ok(ticker) => {
                                    metrics::inc_ws_messages(self.venue);
                                    health.record_tick(self.venue);

                                    let event = FeedEvent::Ticker {
                                        venue: self.venue,
                                        bid: ticker.bid_price,
                                        ask: ticker.ask_price,
                                    };
                                    if tx.send(event).await.is_err() {
                                        return StreamEnd::EngineGone;
                                    }
                                }
                                Err(e) => {
                                    debug!(venue = %self.venue, error = %e, "Ignoring non-ticker message");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if ws.send(Message::Pong(payload)).await.is_err() {
                                return StreamEnd::Disconnected("pong send failed".to_string());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "no close frame".to_string());
                            return StreamEnd::Disconnected(reason);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return StreamEnd::Disconnected(e.to_string()),
                        None => return StreamEnd::Disconnected("stream ended".to_string()),
                    }
                }
            }
        }
    }
}

/// Why a connected stream stopped reading.
enum StreamEnd {
    Shutdown,
    EngineGone,
    Disconnected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_lowercase_stream_url() {
        let stream = BookTickerStream::new(
            Venue::Spot,
            "wss://stream.binance.com:9443/ws".to_string(),
            "BTCUSDT".to_string(),
        );

        let url = stream.stream_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://stream.binance.com:9443/ws/btcusdt@bookTicker"
        );
    }

    #[test]
    fn stream_url_tolerates_trailing_slash() {
        let stream = BookTickerStream::new(
            Venue::Futures,
            "wss://fstream.binance.com/ws/".to_string(),
            "ETHUSDT".to_string(),
        );

        let url = stream.stream_url().unwrap();
        assert_eq!(url.as_str(), "wss://fstream.binance.com/ws/ethusdt@bookTicker");
    }

    #[test]
    fn backoff_grows_and_clamps() {
        let config = ReconnectConfig::default();

        assert_eq!(config.next_delay(0), Duration::from_millis(1000));
        assert_eq!(config.next_delay(1), Duration::from_millis(2000));
        assert_eq!(config.next_delay(2), Duration::from_millis(4000));
        // Clamped at max_delay_s
        assert_eq!(config.next_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn from_config_overrides_max_delay() {
        let config = ReconnectConfig::from_config(5);

        assert_eq!(config.max_delay_s, 5);
        assert_eq!(config.next_delay(10), Duration::from_secs(5));
    }

    #[test]
    fn starts_disconnected() {
        let stream = BookTickerStream::new(
            Venue::Spot,
            "wss://stream.binance.com:9443/ws".to_string(),
            "BTCUSDT".to_string(),
        );

        assert!(!stream.is_connected());
    }
}
