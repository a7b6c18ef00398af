//! Application configuration loaded from environment variables.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Trading Pair ===
    /// Spot market symbol (e.g., BTCUSDT).
    #[serde(default = "default_symbol")]
    pub spot_symbol: String,

    /// Perpetual swap symbol (e.g., BTCUSDT).
    #[serde(default = "default_symbol")]
    pub futures_symbol: String,

    /// Base asset of the pair (the asset bought on the spot leg).
    #[serde(default = "default_base_asset")]
    pub base_asset: String,

    /// Quote asset of the pair (the currency the notional is expressed in).
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    // === Fees ===
    /// Spot taker fee as a fraction (0.001 = 0.1%).
    #[serde(default = "default_spot_taker_fee")]
    pub spot_taker_fee: Decimal,

    /// Futures taker fee as a fraction.
    #[serde(default = "default_futures_taker_fee")]
    pub futures_taker_fee: Decimal,

    // === Arbitrage Thresholds ===
    /// Basis percentage above which a position is opened.
    #[serde(default = "default_open_basis_pct")]
    pub open_basis_pct: Decimal,

    /// Basis percentage below which an open position is closed.
    #[serde(default = "default_close_basis_pct")]
    pub close_basis_pct: Decimal,

    /// Minimum funding rate percentage required to open.
    #[serde(default = "default_min_funding_rate_pct")]
    pub min_funding_rate_pct: Decimal,

    /// Require the basis to also clear the round-trip fee percentage
    /// before opening (off by default: fees are logged, not gated on).
    #[serde(default)]
    pub fee_aware_entry: bool,

    // === Sizing & Balances ===
    /// Fixed notional per trade, in quote currency.
    #[serde(default = "default_trade_notional")]
    pub trade_notional: Decimal,

    /// Starting paper balances as comma-separated ASSET=AMOUNT pairs.
    #[serde(default = "default_initial_balances")]
    pub initial_balances: String,

    // === Feed Configuration ===
    /// Spot venue REST base URL.
    #[serde(default = "default_spot_rest_url")]
    pub spot_rest_url: String,

    /// Futures venue REST base URL.
    #[serde(default = "default_futures_rest_url")]
    pub futures_rest_url: String,

    /// Spot venue WebSocket base URL.
    #[serde(default = "default_spot_ws_url")]
    pub spot_ws_url: String,

    /// Futures venue WebSocket base URL.
    #[serde(default = "default_futures_ws_url")]
    pub futures_ws_url: String,

    /// Enable WebSocket market feed instead of polling.
    #[serde(default)]
    pub use_wss: bool,

    /// REST polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Funding rate refresh period in seconds.
    #[serde(default = "default_funding_refresh_secs")]
    pub funding_refresh_secs: u64,

    /// Maximum WebSocket reconnect backoff in seconds.
    #[serde(default = "default_ws_reconnect_max_delay_s")]
    pub ws_reconnect_max_delay_s: u64,

    /// Log every feed update at info level (noisy).
    #[serde(default)]
    pub show_feed_updates: bool,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_base_asset() -> String {
    "BTC".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_spot_taker_fee() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

fn default_futures_taker_fee() -> Decimal {
    Decimal::new(4, 4) // 0.0004
}

fn default_open_basis_pct() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}

fn default_close_basis_pct() -> Decimal {
    Decimal::new(1, 1) // 0.1%
}

fn default_min_funding_rate_pct() -> Decimal {
    Decimal::new(1, 2) // 0.01%
}

fn default_trade_notional() -> Decimal {
    Decimal::new(1000, 0) // 1000 quote units
}

fn default_initial_balances() -> String {
    "USDT=10000".to_string()
}

fn default_spot_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_futures_rest_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_spot_ws_url() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_futures_ws_url() -> String {
    "wss://fstream.binance.com/ws".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_funding_refresh_secs() -> u64 {
    3600
}

fn default_ws_reconnect_max_delay_s() -> u64 {
    30
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.spot_symbol.is_empty() || self.futures_symbol.is_empty() {
            return Err("SPOT_SYMBOL and FUTURES_SYMBOL are required".to_string());
        }

        if self.trade_notional <= Decimal::ZERO {
            return Err("TRADE_NOTIONAL must be positive".to_string());
        }

        if self.spot_taker_fee < Decimal::ZERO || self.spot_taker_fee >= Decimal::ONE {
            return Err("SPOT_TAKER_FEE must be a fraction in [0, 1)".to_string());
        }

        if self.futures_taker_fee < Decimal::ZERO || self.futures_taker_fee >= Decimal::ONE {
            return Err("FUTURES_TAKER_FEE must be a fraction in [0, 1)".to_string());
        }

        if self.open_basis_pct <= self.close_basis_pct {
            return Err("OPEN_BASIS_PCT must exceed CLOSE_BASIS_PCT".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("POLL_INTERVAL_MS must be positive".to_string());
        }

        self.parsed_initial_balances().map(|_| ())
    }

    /// Parse the initial balances string into an asset -> amount map.
    pub fn parsed_initial_balances(&self) -> Result<HashMap<String, Decimal>, String> {
        let mut balances = HashMap::new();

        for pair in self
            .initial_balances
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let (asset, amount) = pair
                .split_once('=')
                .ok_or_else(|| format!("INITIAL_BALANCES entry '{pair}' is not ASSET=AMOUNT"))?;

            let amount: Decimal = amount
                .trim()
                .parse()
                .map_err(|_| format!("INITIAL_BALANCES amount '{amount}' is not a decimal"))?;

            if amount < Decimal::ZERO {
                return Err(format!("INITIAL_BALANCES amount for {asset} is negative"));
            }

            balances.insert(asset.trim().to_uppercase(), amount);
        }

        Ok(balances)
    }

    /// Round-trip taker fee percentage: both legs, entry and exit.
    pub fn round_trip_fee_pct(&self) -> Decimal {
        (self.spot_taker_fee + self.futures_taker_fee) * Decimal::TWO * Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_config() -> Config {
        Config {
            spot_symbol: default_symbol(),
            futures_symbol: default_symbol(),
            base_asset: default_base_asset(),
            quote_asset: default_quote_asset(),
            spot_taker_fee: default_spot_taker_fee(),
            futures_taker_fee: default_futures_taker_fee(),
            open_basis_pct: default_open_basis_pct(),
            close_basis_pct: default_close_basis_pct(),
            min_funding_rate_pct: default_min_funding_rate_pct(),
            fee_aware_entry: false,
            trade_notional: default_trade_notional(),
            initial_balances: default_initial_balances(),
            spot_rest_url: default_spot_rest_url(),
            futures_rest_url: default_futures_rest_url(),
            spot_ws_url: default_spot_ws_url(),
            futures_ws_url: default_futures_ws_url(),
            use_wss: false,
            poll_interval_ms: default_poll_interval_ms(),
            funding_refresh_secs: default_funding_refresh_secs(),
            ws_reconnect_max_delay_s: default_ws_reconnect_max_delay_s(),
            show_feed_updates: false,
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_spot_taker_fee(), dec!(0.001));
        assert_eq!(default_open_basis_pct(), dec!(0.5));
        assert_eq!(default_close_basis_pct(), dec!(0.1));
        assert_eq!(default_trade_notional(), dec!(1000));
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut config = test_config();
        config.open_basis_pct = dec!(0.1);
        config.close_basis_pct = dec!(0.5);

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_notional() {
        let mut config = test_config();
        config.trade_notional = Decimal::ZERO;

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_fee_out_of_range() {
        let mut config = test_config();
        config.spot_taker_fee = dec!(1.5);

        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_initial_balances() {
        let mut config = test_config();
        config.initial_balances = "USDT=10000, btc=0.5".to_string();

        let balances = config.parsed_initial_balances().unwrap();
        assert_eq!(balances.get("USDT"), Some(&dec!(10000)));
        assert_eq!(balances.get("BTC"), Some(&dec!(0.5)));
    }

    #[test]
    fn rejects_malformed_balances() {
        let mut config = test_config();
        config.initial_balances = "USDT:10000".to_string();

        assert!(config.parsed_initial_balances().is_err());

        config.initial_balances = "USDT=abc".to_string();
        assert!(config.parsed_initial_balances().is_err());

        config.initial_balances = "USDT=-1".to_string();
        assert!(config.parsed_initial_balances().is_err());
    }

    #[test]
    fn round_trip_fee_pct_sums_both_legs_twice() {
        let config = test_config();

        // (0.001 + 0.0004) * 2 * 100 = 0.28%
        assert_eq!(config.round_trip_fee_pct(), dec!(0.2800));
    }
}
