//! The decision engine: one task that serializes every feed event through
//! store update, evaluation, and ledger action.
//!
//! Both acquisition strategies (REST polling and WebSocket streaming) drive
//! this same component through the [`FeedEvent`] channel, so the business
//! logic exists exactly once.

use std::sync::Arc;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info};

use super::evaluator::{evaluate, BasisReading, Decision};
use super::ledger::{PaperLedger, Position};
use super::store::MarketSnapshot;
use crate::config::Config;
use crate::error::{BotError, LedgerError};
use crate::feed::FeedEvent;
use crate::metrics;

/// Running totals for the session.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
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
    /// Taker fees charged across all simulated fills.
    pub fees_paid: Decimal,
    /// Cumulative net PnL over closed trades.
    pub realized_pnl: Decimal,
}

/// Engine state shared with the HTTP API.
#[derive(Debug, Clone, Default)]
pub struct EngineStatus {
    /// Open position, if any.
    pub position: Option<Position>,
    /// Most recent basis/funding observation.
    pub last_reading: Option<BasisReading>,
    /// Portfolio balances.
    pub portfolio: Vec<(String, Decimal)>,
    /// Session totals.
    pub stats: EngineStats,
}

/// Shared handle the API reads engine state through.
pub type StatusHandle = Arc<RwLock<EngineStatus>>;

/// Create a fresh status handle.
pub fn status_handle() -> StatusHandle {
    Arc::new(RwLock::new(EngineStatus::default()))
}

/// The decision-serializing core.
pub struct Engine {
    config: Config,
    snapshot: MarketSnapshot,
    ledger: PaperLedger,
    stats: EngineStats,
    last_reading: Option<BasisReading>,
}

impl Engine {
    /// Build an engine from validated configuration.
    pub fn new(config: Config) -> Result<Self, BotError> {
        let ledger = PaperLedger::from_config(&config).map_err(BotError::InvalidConfig)?;

        Ok(Self {
            config,
            snapshot: MarketSnapshot::new(),
            ledger,
            stats: EngineStats::default(),
            last_reading: None,
        })
    }

    /// The paper ledger (position + portfolio).
    pub fn ledger(&self) -> &PaperLedger {
        &self.ledger
    }

    /// Session totals so far.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Apply one feed event: mutate the snapshot, then (for ticker events)
    /// evaluate and act on the decision.
    ///
    /// A funding refresh only writes the snapshot; the next ticker event
    /// evaluates against the new rate.
    pub fn handle(&mut self, event: FeedEvent) -> Result<Decision, LedgerError> {
        match event {
            FeedEvent::Ticker { venue, bid, ask } => {
                self.stats.ticks_received += 1;
                metrics::inc_ticks_received(venue);

                let accepted = self.snapshot.update_venue(venue, bid, ask);
                if accepted && self.config.show_feed_updates {
                    info!(venue = %venue, bid = %bid, ask = %ask, "Feed update");
                }

                self.evaluate_and_act()
            }
            FeedEvent::FundingRate { rate_pct } => {
                self.stats.funding_updates += 1;
                metrics::inc_funding_updates();

                self.snapshot.update_funding_rate(rate_pct);
                info!(funding_rate_pct = %rate_pct, "Funding rate refreshed");

                Ok(Decision::NoAction)
            }
        }
    }

    fn evaluate_and_act(&mut self) -> Result<Decision, LedgerError> {
        let (decision, reading) =
            evaluate(&self.snapshot, self.ledger.has_position(), &self.config);
        self.stats.evaluations += 1;
        if reading.is_some() {
            self.last_reading = reading;
        }

        if let Some(reading) = &reading {
            debug!(
                basis_pct = %reading.basis_pct,
                funding_rate_pct = %reading.funding_rate_pct,
                round_trip_fee_pct = %reading.round_trip_fee_pct,
                decision = ?decision,
                "Evaluated"
            );
        }

        match (decision, reading) {
            (Decision::Open, Some(reading)) => {
                let (Some(spot), Some(futures)) = (self.snapshot.spot(), self.snapshot.futures())
                else {
                    return Ok(Decision::NoAction);
                };

                info!(
                    basis_pct = %reading.basis_pct,
                    funding_rate_pct = %reading.funding_rate_pct,
                    round_trip_fee_pct = %reading.round_trip_fee_pct,
                    "Arbitrage entry triggered"
                );

                let trade = self.ledger.open(
                    spot.ask,
                    futures.bid,
                    reading.basis_pct,
                    OffsetDateTime::now_utc(),
                )?;

                self.stats.trades_opened += 1;
                self.stats.fees_paid += trade.spot_fee + trade.futures_fee;
                metrics::inc_trades_opened();
                self.log_portfolio();
            }
            (Decision::Close, Some(reading)) => {
                let (Some(spot), Some(futures)) = (self.snapshot.spot(), self.snapshot.futures())
                else {
                    return Ok(Decision::NoAction);
                };

                info!(
                    basis_pct = %reading.basis_pct,
                    "Arbitrage exit triggered"
                );

                let report = self.ledger.close(spot.bid, futures.ask)?;

                self.stats.trades_closed += 1;
                self.stats.fees_paid += report.exit_spot_fee + report.exit_futures_fee;
                self.stats.realized_pnl += report.net_pnl;
                metrics::inc_trades_closed();

                info!(
                    spot_pnl = %report.spot_pnl,
                    futures_pnl = %report.futures_pnl,
                    total_fees = %report.total_fees,
                    net_pnl = %report.net_pnl,
                    session_pnl = %self.stats.realized_pnl,
                    "Trade closed"
                );
                self.log_portfolio();
            }
            _ => {}
        }

        Ok(decision)
    }

    fn log_portfolio(&self) {
        for (asset, balance) in self.ledger.portfolio().snapshot() {
            info!(asset = %asset, balance = %balance, "Portfolio balance");
        }
    }

    /// Snapshot the engine state into the shared status handle.
    async fn publish_status(&self, status: &StatusHandle) {
        let mut guard = status.write().await;
        guard.position = self.ledger.position().cloned();
        guard.portfolio = self.ledger.portfolio().snapshot();
        guard.stats = self.stats.clone();
        guard.last_reading = self.last_reading;
    }

    /// Consume feed events until shutdown or channel close.
    ///
    /// A `LedgerError` here means the evaluator/ledger invariant broke; the
    /// engine stops rather than continuing on corrupt balances.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<FeedEvent>,
        status: StatusHandle,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), BotError> {
        self.publish_status(&status).await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Engine shutting down");
                    break;
                }
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        info!("Feed channel closed, engine stopping");
                        break;
                    };

                    if let Err(e) = self.handle(event) {
                        error!(error = %e, "Ledger invariant violated, aborting");
                        return Err(e.into());
                    }

                    self.publish_status(&status).await;
                }
            }
        }

        self.log_summary();
        Ok(())
    }

    /// Final session summary.
    fn log_summary(&self) {
        info!("========================================");
        info!("SESSION SUMMARY");
        info!("========================================");
        info!("Ticks received:    {}", self.stats.ticks_received);
        info!("Evaluations:       {}", self.stats.evaluations);
        info!("Trades opened:     {}", self.stats.trades_opened);
        info!("Trades closed:     {}", self.stats.trades_closed);
        info!("Fees paid:         {}", self.stats.fees_paid);
        info!("Realized PnL:      {}", self.stats.realized_pnl);
        for (asset, balance) in self.ledger.portfolio().snapshot() {
            info!("Balance {:<10} {}", asset, balance);
        }
        if let Some(position) = self.ledger.position() {
            info!(
                "Open position:     {} @ spot {} / futures {}",
                position.amount, position.entry_spot_price, position.entry_futures_price
            );
        }
        info!("========================================");
    }
}
