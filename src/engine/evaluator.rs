//! Entry/exit decision logic for the cash-and-carry position.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::store::MarketSnapshot;
use crate::config::Config;

/// What the evaluator decided for the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Nothing to do.
    NoAction,
    /// Open a long-spot/short-futures pair.
    Open,
    /// Close the held pair.
    Close,
}

/// Basis and funding observation that backed a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasisReading {
    /// Futures bid minus spot ask.
    pub basis: Decimal,
    /// Basis as a percentage of the spot ask.
    pub basis_pct: Decimal,
    /// Funding rate percentage at evaluation time.
    pub funding_rate_pct: Decimal,
    /// Round-trip taker fee percentage. Logged alongside the basis; the
    /// basic entry rule deliberately does not gate on it.
    pub round_trip_fee_pct: Decimal,
}

/// Decide whether to open, close, or do nothing.
///
/// Pure with respect to portfolio state: the caller owns the position and
/// acts on the returned decision. Returns `NoAction` with no reading when
/// any required market field is still unknown. Threshold comparisons are
/// strict on both sides, so a basis sitting exactly on a threshold never
/// triggers.
pub fn evaluate(
    snapshot: &MarketSnapshot,
    has_position: bool,
    config: &Config,
) -> (Decision, Option<BasisReading>) {
    let (Some(spot), Some(futures), Some(funding_rate_pct)) = (
        snapshot.spot(),
        snapshot.futures(),
        snapshot.funding_rate_pct(),
    ) else {
        debug!("Market snapshot incomplete, skipping evaluation");
        return (Decision::NoAction, None);
    };

    let basis = futures.bid - spot.ask;
    let basis_pct = basis / spot.ask * Decimal::ONE_HUNDRED;

    let reading = BasisReading {
        basis,
        basis_pct,
        funding_rate_pct,
        round_trip_fee_pct: config.round_trip_fee_pct(),
    };

    let decision = if has_position {
        if basis_pct < config.close_basis_pct {
            Decision::Close
        } else {
            Decision::NoAction
        }
    } else {
        let entry_floor = if config.fee_aware_entry {
            config.open_basis_pct + reading.round_trip_fee_pct
        } else {
            config.open_basis_pct
        };

        if basis_pct > entry_floor && funding_rate_pct > config.min_funding_rate_pct {
            Decision::Open
        } else {
            Decision::NoAction
        }
    };

    (decision, Some(reading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_config() -> Config {
        Config {
            spot_symbol: "BTCUSDT".to_string(),
            futures_symbol: "BTCUSDT".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            spot_taker_fee: dec!(0.001),
            futures_taker_fee: dec!(0.001),
            open_basis_pct: dec!(0.5),
            close_basis_pct: dec!(0.1),
            min_funding_rate_pct: dec!(0.01),
            fee_aware_entry: false,
            trade_notional: dec!(1000),
            initial_balances: "USDT=10000".to_string(),
            spot_rest_url: String::new(),
            futures_rest_url: String::new(),
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

    fn full_snapshot(spot_ask: Decimal, futures_bid: Decimal, funding_pct: Decimal) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::new();
        snapshot.update_spot(spot_ask - dec!(0.1), spot_ask);
        snapshot.update_futures(futures_bid, futures_bid + dec!(0.1));
        snapshot.update_funding_rate(funding_pct);
        snapshot
    }

    #[test]
    fn opens_when_basis_and_funding_clear_thresholds() {
        // spot ask 100, futures bid 101 -> basis 1.0%
        let snapshot = full_snapshot(dec!(100), dec!(101), dec!(0.05));
        let config = test_config();

        let (decision, reading) = evaluate(&snapshot, false, &config);

        assert_eq!(decision, Decision::Open);
        let reading = reading.unwrap();
        assert_eq!(reading.basis, dec!(1));
        assert_eq!(reading.basis_pct, dec!(1));
    }

    #[test]
    fn no_action_when_funding_below_floor() {
        let snapshot = full_snapshot(dec!(100), dec!(101), dec!(0.005));
        let config = test_config();

        let (decision, _) = evaluate(&snapshot, false, &config);

        assert_eq!(decision, Decision::NoAction);
    }

    #[test]
    fn no_action_when_any_field_unknown() {
        let config = test_config();
        let mut snapshot = MarketSnapshot::new();
        snapshot.update_spot(dec!(99.9), dec!(100));

        // Futures and funding unknown.
        let (decision, reading) = evaluate(&snapshot, false, &config);
        assert_eq!(decision, Decision::NoAction);
        assert!(reading.is_none());

        snapshot.update_futures(dec!(101), dec!(101.1));

        // Funding still unknown.
        let (decision, reading) = evaluate(&snapshot, false, &config);
        assert_eq!(decision, Decision::NoAction);
        assert!(reading.is_none());
    }

    #[test]
    fn equality_at_open_threshold_never_triggers() {
        // basis_pct == 0.5 exactly
        let snapshot = full_snapshot(dec!(100), dec!(100.5), dec!(0.05));
        let config = test_config();

        let (decision, reading) = evaluate(&snapshot, false, &config);

        assert_eq!(reading.unwrap().basis_pct, dec!(0.5));
        assert_eq!(decision, Decision::NoAction);
    }

    #[test]
    fn equality_at_funding_floor_never_triggers() {
        let snapshot = full_snapshot(dec!(100), dec!(101), dec!(0.01));
        let config = test_config();

        let (decision, _) = evaluate(&snapshot, false, &config);

        assert_eq!(decision, Decision::NoAction);
    }

    #[test]
    fn closes_when_basis_drops_below_close_threshold() {
        // basis 0.05% < close threshold 0.1%
        let snapshot = full_snapshot(dec!(100), dec!(100.05), dec!(0.05));
        let config = test_config();

        let (decision, _) = evaluate(&snapshot, true, &config);

        assert_eq!(decision, Decision::Close);
    }

    #[test]
    fn equality_at_close_threshold_never_triggers() {
        // basis_pct == 0.1 exactly
        let snapshot = full_snapshot(dec!(100), dec!(100.1), dec!(0.05));
        let config = test_config();

        let (decision, reading) = evaluate(&snapshot, true, &config);

        assert_eq!(reading.unwrap().basis_pct, dec!(0.1));
        assert_eq!(decision, Decision::NoAction);
    }

    #[test]
    fn holds_position_while_basis_above_close_threshold() {
        let snapshot = full_snapshot(dec!(100), dec!(101), dec!(0.05));
        let config = test_config();

        let (decision, _) = evaluate(&snapshot, true, &config);

        assert_eq!(decision, Decision::NoAction);
    }

    #[test]
    fn repeated_evaluation_is_idempotent() {
        let snapshot = full_snapshot(dec!(100), dec!(101), dec!(0.05));
        let config = test_config();

        let (first, _) = evaluate(&snapshot, false, &config);
        for _ in 0..10 {
            let (again, _) = evaluate(&snapshot, false, &config);
            assert_eq!(again, first);
        }
    }

    #[test]
    fn fee_pct_is_reported_but_does_not_gate_entry() {
        // Basis 0.6% clears the 0.5% threshold but not 0.5% + 0.4% fees.
        let snapshot = full_snapshot(dec!(100), dec!(100.6), dec!(0.05));
        let config = test_config();

        let (decision, reading) = evaluate(&snapshot, false, &config);

        assert_eq!(reading.unwrap().round_trip_fee_pct, dec!(0.4000));
        assert_eq!(decision, Decision::Open);
    }

    #[test]
    fn fee_aware_entry_raises_the_floor() {
        let snapshot = full_snapshot(dec!(100), dec!(100.6), dec!(0.05));
        let mut config = test_config();
        config.fee_aware_entry = true;

        // 0.6% does not clear 0.5% + 0.4%
        let (decision, _) = evaluate(&snapshot, false, &config);
        assert_eq!(decision, Decision::NoAction);

        // 1.0% clears the raised 0.9% floor
        let snapshot = full_snapshot(dec!(100), dec!(101), dec!(0.05));
        let (decision, _) = evaluate(&snapshot, false, &config);
        assert_eq!(decision, Decision::Open);
    }
}
