//! Paper portfolio and simulated trade execution.
//!
//! The ledger owns the single optional [`Position`] and the [`Portfolio`]
//! balances. Balances change only inside [`PaperLedger::open`] and
//! [`PaperLedger::close`]; everything else reads snapshots.

use std::collections::HashMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::info;

use crate::config::Config;
use crate::error::LedgerError;

/// Asset balances of the paper account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Portfolio {
    balances: HashMap<String, Decimal>,
}

impl Portfolio {
    /// Create a portfolio from initial balances.
    pub fn new(initial: HashMap<String, Decimal>) -> Self {
        Self { balances: initial }
    }

    /// Current balance for an asset (zero if the asset was never touched).
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Snapshot of all balances, sorted by asset for stable output.
    pub fn snapshot(&self) -> Vec<(String, Decimal)> {
        let mut entries: Vec<_> = self
            .balances
            .iter()
            .map(|(asset, amount)| (asset.clone(), *amount))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn credit(&mut self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    fn debit(&mut self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO) -= amount;
    }
}

/// The simulated long-spot/short-futures pair.
///
/// Exists exactly while the state machine is in `Positioned`; created whole
/// on open, destroyed whole on close, never mutated in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// When the position was opened.
    pub opened_at: OffsetDateTime,
    /// Base-currency quantity held on both legs.
    pub amount: Decimal,
    /// Spot ask paid on entry.
    pub entry_spot_price: Decimal,
    /// Futures bid sold on entry.
    pub entry_futures_price: Decimal,
    /// Basis percentage that triggered the entry.
    pub entry_basis_pct: Decimal,
}

/// Fill report for a simulated open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTrade {
    /// Base-currency amount bought/sold.
    pub amount: Decimal,
    /// Spot fill price.
    pub spot_price: Decimal,
    /// Futures fill price.
    pub futures_price: Decimal,
    /// Spot taker fee charged.
    pub spot_fee: Decimal,
    /// Futures taker fee charged.
    pub futures_fee: Decimal,
    /// Quote-currency notional committed.
    pub notional: Decimal,
}

/// Fill and PnL report for a simulated close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedTrade {
    /// Base-currency amount unwound.
    pub amount: Decimal,
    /// Spot bid received on exit.
    pub exit_spot_price: Decimal,
    /// Futures ask paid to buy back on exit.
    pub exit_futures_price: Decimal,
    /// PnL on the spot leg.
    pub spot_pnl: Decimal,
    /// PnL on the short futures leg.
    pub futures_pnl: Decimal,
    /// Spot taker fee charged on exit.
    pub exit_spot_fee: Decimal,
    /// Futures taker fee charged on exit.
    pub exit_futures_fee: Decimal,
    /// All four taker fees: entry and exit, both legs.
    pub total_fees: Decimal,
    /// spot_pnl + futures_pnl - total_fees.
    pub net_pnl: Decimal,
    /// Portfolio balances after the close.
    pub portfolio: Vec<(String, Decimal)>,
}

/// Owns the position and portfolio; executes simulated opens and closes.
#[derive(Debug, Clone)]
pub struct PaperLedger {
    quote_asset: String,
    base_asset: String,
    spot_taker_fee: Decimal,
    futures_taker_fee: Decimal,
    trade_notional: Decimal,
    position: Option<Position>,
    portfolio: Portfolio,
}

impl PaperLedger {
    /// Build a ledger from configuration (fee rates, notional, balances).
    pub fn from_config(config: &Config) -> Result<Self, String> {
        Ok(Self::new(
            config.quote_asset.clone(),
            config.base_asset.clone(),
            config.spot_taker_fee,
            config.futures_taker_fee,
            config.trade_notional,
            config.parsed_initial_balances()?,
        ))
    }

    /// Build a ledger directly from parameters.
    pub fn new(
        quote_asset: String,
        base_asset: String,
        spot_taker_fee: Decimal,
        futures_taker_fee: Decimal,
        trade_notional: Decimal,
        initial_balances: HashMap<String, Decimal>,
    ) -> Self {
        Self {
            quote_asset,
            base_asset,
            spot_taker_fee,
            futures_taker_fee,
            trade_notional,
            position: None,
            portfolio: Portfolio::new(initial_balances),
        }
    }

    /// The open position, if any.
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Whether a position is currently held.
    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Current portfolio balances.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Simulate opening the pair: buy spot at `spot_ask`, sell futures at
    /// `futures_bid`, sized to the fixed notional.
    ///
    /// Debits the quote balance by notional plus both taker fees and credits
    /// the base balance with the bought amount. The base-asset entry is
    /// created at zero on first use.
    pub fn open(
        &mut self,
        spot_ask: Decimal,
        futures_bid: Decimal,
        entry_basis_pct: Decimal,
        opened_at: OffsetDateTime,
    ) -> Result<OpenedTrade, LedgerError> {
        if let Some(position) = &self.position {
            return Err(LedgerError::PositionAlreadyOpen {
                amount: position.amount,
            });
        }

        let notional = self.trade_notional;
        let amount = notional / spot_ask;
        let spot_fee = notional * self.spot_taker_fee;
        let futures_fee = amount * futures_bid * self.futures_taker_fee;

        self.portfolio
            .debit(&self.quote_asset, notional + spot_fee + futures_fee);
        self.portfolio.credit(&self.base_asset, amount);

        self.position = Some(Position {
            opened_at,
            amount,
            entry_spot_price: spot_ask,
            entry_futures_price: futures_bid,
            entry_basis_pct,
        });

        info!(
            amount = %amount,
            spot_price = %spot_ask,
            futures_price = %futures_bid,
            spot_fee = %spot_fee,
            futures_fee = %futures_fee,
            basis_pct = %entry_basis_pct,
            "Simulated open: long spot / short futures"
        );

        Ok(OpenedTrade {
            amount,
            spot_price: spot_ask,
            futures_price: futures_bid,
            spot_fee,
            futures_fee,
            notional,
        })
    }

    /// Simulate closing the pair: sell spot at `spot_bid`, buy the futures
    /// back at `futures_ask`.
    ///
    /// Entry fees are recomputed from the recorded entry prices and amount
    /// rather than carried over from open time, so a fee-rate change while
    /// the position is held changes the reported net PnL.
    pub fn close(
        &mut self,
        spot_bid: Decimal,
        futures_ask: Decimal,
    ) -> Result<ClosedTrade, LedgerError> {
        let position = self.position.take().ok_or(LedgerError::NoOpenPosition)?;
        let amount = position.amount;

        let spot_sell_value = amount * spot_bid;
        let exit_spot_fee = spot_sell_value * self.spot_taker_fee;
        let exit_futures_fee = amount * futures_ask * self.futures_taker_fee;

        let entry_spot_fee = amount * position.entry_spot_price * self.spot_taker_fee;
        let entry_futures_fee = amount * position.entry_futures_price * self.futures_taker_fee;

        let spot_pnl = (spot_bid - position.entry_spot_price) * amount;
        let futures_pnl = (position.entry_futures_price - futures_ask) * amount;

        let total_fees = exit_spot_fee + exit_futures_fee + entry_spot_fee + entry_futures_fee;
        let net_pnl = spot_pnl + futures_pnl - total_fees;

        self.portfolio.credit(
            &self.quote_asset,
            spot_sell_value - exit_spot_fee - exit_futures_fee,
        );
        self.portfolio.debit(&self.base_asset, amount);

        info!(
            amount = %amount,
            exit_spot_price = %spot_bid,
            exit_futures_price = %futures_ask,
            spot_pnl = %spot_pnl,
            futures_pnl = %futures_pnl,
            total_fees = %total_fees,
            net_pnl = %net_pnl,
            "Simulated close: position unwound"
        );

        Ok(ClosedTrade {
            amount,
            exit_spot_price: spot_bid,
            exit_futures_price: futures_ask,
            spot_pnl,
            futures_pnl,
            exit_spot_fee,
            exit_futures_fee,
            total_fees,
            net_pnl,
            portfolio: self.portfolio.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn test_ledger() -> PaperLedger {
        let mut balances = HashMap::new();
        balances.insert("USDT".to_string(), dec!(10000));

        PaperLedger::new(
            "USDT".to_string(),
            "BTC".to_string(),
            dec!(0.001),
            dec!(0.001),
            dec!(100),
            balances,
        )
    }

    fn t0() -> OffsetDateTime {
        datetime!(2024-06-01 12:00 UTC)
    }

    #[test]
    fn open_sizes_amount_from_notional() {
        let mut ledger = test_ledger();

        let trade = ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        // amount = 100 / 100 = 1
        assert_eq!(trade.amount, dec!(1));
        assert_eq!(trade.spot_fee, dec!(0.1));
        // 1 * 101 * 0.001
        assert_eq!(trade.futures_fee, dec!(0.101));
    }

    #[test]
    fn open_mutates_balances_and_creates_position() {
        let mut ledger = test_ledger();

        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        // 10000 - (100 + 0.1 + 0.101)
        assert_eq!(ledger.portfolio().balance("USDT"), dec!(9899.799));
        assert_eq!(ledger.portfolio().balance("BTC"), dec!(1));

        let position = ledger.position().unwrap();
        assert_eq!(position.amount, dec!(1));
        assert_eq!(position.entry_spot_price, dec!(100));
        assert_eq!(position.entry_futures_price, dec!(101));
        assert_eq!(position.entry_basis_pct, dec!(1));
    }

    #[test]
    fn base_asset_entry_created_at_zero_when_absent() {
        let mut ledger = test_ledger();
        assert_eq!(ledger.portfolio().balance("BTC"), dec!(0));

        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        assert_eq!(ledger.portfolio().balance("BTC"), dec!(1));
        assert!(ledger.portfolio().balance("BTC") >= Decimal::ZERO);
    }

    #[test]
    fn open_while_positioned_is_an_invariant_break() {
        let mut ledger = test_ledger();
        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        let err = ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap_err();

        assert_eq!(err, LedgerError::PositionAlreadyOpen { amount: dec!(1) });
        // Balances untouched by the rejected open.
        assert_eq!(ledger.portfolio().balance("USDT"), dec!(9899.799));
    }

    #[test]
    fn close_while_flat_is_an_invariant_break() {
        let mut ledger = test_ledger();

        let err = ledger.close(dec!(100), dec!(101)).unwrap_err();

        assert_eq!(err, LedgerError::NoOpenPosition);
    }

    #[test]
    fn close_computes_exact_pnl() {
        // Entry 100/101, amount 1; exit spot bid 100.2, futures ask 100.3.
        let mut ledger = test_ledger();
        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        let report = ledger.close(dec!(100.2), dec!(100.3)).unwrap();

        assert_eq!(report.spot_pnl, dec!(0.2));
        assert_eq!(report.futures_pnl, dec!(0.7));
        // exit: 0.1002 + 0.1003, entry recomputed: 0.1 + 0.101
        assert_eq!(report.total_fees, dec!(0.4025));
        assert_eq!(report.net_pnl, dec!(0.4975));
    }

    #[test]
    fn close_mutates_balances_and_clears_position() {
        let mut ledger = test_ledger();
        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        let report = ledger.close(dec!(100.2), dec!(100.3)).unwrap();

        // 9899.799 + (100.2 - 0.1002 - 0.1003)
        assert_eq!(ledger.portfolio().balance("USDT"), dec!(9999.7985));
        assert_eq!(ledger.portfolio().balance("BTC"), dec!(0));
        assert!(ledger.position().is_none());

        let snapshot: HashMap<_, _> = report.portfolio.into_iter().collect();
        assert_eq!(snapshot.get("USDT"), Some(&dec!(9999.7985)));
    }

    #[test]
    fn round_trip_at_unchanged_prices_costs_exactly_the_fees() {
        let mut ledger = test_ledger();
        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        // Exit at the entry prices: zero price PnL, pure fee cost.
        let report = ledger.close(dec!(100), dec!(101)).unwrap();

        assert_eq!(report.spot_pnl, dec!(0));
        assert_eq!(report.futures_pnl, dec!(0));
        assert_eq!(report.net_pnl, -report.total_fees);
        assert_eq!(report.total_fees, dec!(0.402));
    }

    #[test]
    fn entry_fees_recomputed_from_entry_prices() {
        // The recomputed entry fees must equal the fees charged at open as
        // long as the rates are unchanged: amount * entry_spot * rate is
        // exactly notional * rate.
        let mut ledger = test_ledger();
        let opened = ledger.open(dec!(128), dec!(129.5), dec!(1.17), t0()).unwrap();

        let report = ledger.close(dec!(128), dec!(129.5)).unwrap();

        let expected_entry_fees = opened.spot_fee + opened.futures_fee;
        // total = entry (recomputed) + exit at identical prices = 2x entry
        assert_eq!(report.total_fees, expected_entry_fees * dec!(2));
    }

    #[test]
    fn reopening_after_close_is_allowed() {
        let mut ledger = test_ledger();
        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();
        ledger.close(dec!(100), dec!(101)).unwrap();

        assert!(ledger.open(dec!(100), dec!(101), dec!(1), t0()).is_ok());
        assert!(ledger.has_position());
    }

    #[test]
    fn portfolio_snapshot_is_sorted() {
        let mut ledger = test_ledger();
        ledger.open(dec!(100), dec!(101), dec!(1), t0()).unwrap();

        let snapshot = ledger.portfolio().snapshot();
        let assets: Vec<_> = snapshot.iter().map(|(a, _)| a.as_str()).collect();

        assert_eq!(assets, vec!["BTC", "USDT"]);
    }
}
