//! HTTP API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::engine::{status_handle, EngineStatus, StatusHandle};
use crate::feed::FeedHealth;

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether the bot is ready (feeds wired, engine running).
    pub ready: Arc<std::sync::atomic::AtomicBool>,
    /// Trading pair description (e.g., "BTCUSDT spot / BTCUSDT perp").
    pub pair: Arc<tokio::sync::RwLock<Option<String>>>,
    /// Feed mode: "polling" or "websocket".
    pub feed_mode: Arc<tokio::sync::RwLock<&'static str>>,
    /// Engine state published by the decision task.
    pub status: StatusHandle,
    /// Feed freshness tracker.
    pub health: Arc<FeedHealth>,
}

impl AppState {
    /// Create new app state around the engine's status handle.
    pub fn new(status: StatusHandle, health: Arc<FeedHealth>) -> Self {
        Self {
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            pair: Arc::new(tokio::sync::RwLock::new(None)),
            feed_mode: Arc::new(tokio::sync::RwLock::new("polling")),
            status,
            health,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(status_handle(), Arc::new(FeedHealth::new()))
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Trading pair if configured.
    pub pair: Option<String>,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Trading pair.
    pub pair: Option<String>,
    /// Feed mode in use.
    pub feed_mode: &'static str,
    /// Open position, if any.
    pub position: Option<PositionResponse>,
    /// Latest basis observation.
    pub last_reading: Option<ReadingResponse>,
    /// Portfolio balances.
    pub portfolio: Vec<BalanceResponse>,
    /// Seconds since each feed last updated.
    pub feed_ages_secs: Vec<FeedAgeResponse>,
    /// Session statistics.
    pub stats: StatsResponse,
}

/// Position in the status response.
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    /// When the position was opened (RFC 3339-ish display form).
    pub opened_at: String,
    /// Base-currency amount.
    pub amount: String,
    /// Entry spot price.
    pub entry_spot_price: String,
    /// Entry futures price.
    pub entry_futures_price: String,
    /// Basis percentage at entry.
    pub entry_basis_pct: String,
}

/// Basis reading in the status response.
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    /// Basis in quote currency.
    pub basis: String,
    /// Basis percentage.
    pub basis_pct: String,
    /// Funding rate percentage.
    pub funding_rate_pct: String,
    /// Round-trip fee percentage.
    pub round_trip_fee_pct: String,
}

/// One portfolio balance in the status response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Asset symbol.
    pub asset: String,
    /// Current balance.
    pub balance: String,
}

/// Feed freshness entry in the status response.
#[derive(Debug, Serialize)]
pub struct FeedAgeResponse {
    /// Feed name (spot, futures, funding).
    pub feed: String,
    /// Seconds since the last update.
    pub age_secs: u64,
}

/// Statistics in status response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Ticker events consumed.
    pub ticks_received: u64,
    /// Funding refreshes consumed.
    pub funding_updates: u64,
    /// Evaluations performed.
    pub evaluations: u64,
    /// Positions opened.
    pub trades_opened: u64,
    /// Positions closed.
    pub trades_closed: u64,
    /// Fees charged across simulated fills.
    pub fees_paid: String,
    /// Net PnL over closed trades.
    pub realized_pnl: String,
}

fn status_response(
    state: &AppState,
    pair: Option<String>,
    feed_mode: &'static str,
    engine: &EngineStatus,
) -> StatusResponse {
    StatusResponse {
        status: if state.is_ready() { "running" } else { "starting" },
        pair,
        feed_mode,
        position: engine.position.as_ref().map(|p| PositionResponse {
            opened_at: p.opened_at.to_string(),
            amount: p.amount.to_string(),
            entry_spot_price: p.entry_spot_price.to_string(),
            entry_futures_price: p.entry_futures_price.to_string(),
            entry_basis_pct: p.entry_basis_pct.to_string(),
        }),
        last_reading: engine.last_reading.as_ref().map(|r| ReadingResponse {
            basis: r.basis.to_string(),
            basis_pct: r.basis_pct.to_string(),
            funding_rate_pct: r.funding_rate_pct.to_string(),
            round_trip_fee_pct: r.round_trip_fee_pct.to_string(),
        }),
        portfolio: engine
            .portfolio
            .iter()
            .map(|(asset, balance)| BalanceResponse {
                asset: asset.clone(),
                balance: balance.to_string(),
            })
            .collect(),
        feed_ages_secs: state
            .health
            .ages()
            .into_iter()
            .map(|(feed, age_secs)| FeedAgeResponse { feed, age_secs })
            .collect(),
        stats: StatsResponse {
            ticks_received: engine.stats.ticks_received,
            funding_updates: engine.stats.funding_updates,
            evaluations: engine.stats.evaluations,
            trades_opened: engine.stats.trades_opened,
            trades_closed: engine.stats.trades_closed,
            fees_paid: engine.stats.fees_paid.to_string(),
            realized_pnl: engine.stats.realized_pnl.to_string(),
        },
    }
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let pair = state.pair.read().await.clone();

    let response = ReadyResponse {
        ready: is_ready,
        pair,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns bot status, position, portfolio, and stats.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let pair = state.pair.read().await.clone();
    let feed_mode = *state.feed_mode.read().await;
    let engine = state.status.read().await;

    Json(status_response(&state, pair, feed_mode, &engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn app_state_ready_toggle() {
        let state = AppState::default();
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn status_response_maps_engine_state() {
        let state = AppState::default();
        {
            let mut engine = state.status.write().await;
            engine.portfolio = vec![("USDT".to_string(), dec!(10000))];
            engine.stats.trades_opened = 2;
            engine.stats.realized_pnl = dec!(1.25);
        }

        let engine = state.status.read().await;
        let response = status_response(&state, Some("BTCUSDT".to_string()), "polling", &engine);

        assert_eq!(response.status, "starting");
        assert_eq!(response.portfolio.len(), 1);
        assert_eq!(response.portfolio[0].balance, "10000");
        assert_eq!(response.stats.trades_opened, 2);
        assert_eq!(response.stats.realized_pnl, "1.25");
    }
}
