//! Unified error types for the basis arbitrage bot.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::feed::Venue;

/// Unified error type for the bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Market data feed error.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Paper ledger invariant violation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Market data acquisition errors.
///
/// These are transient by design: feed tasks log them and retry with
/// backoff, and the decision engine never sees them.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Venue returned a payload we could not decode.
    #[error("malformed {venue} payload: {reason}")]
    MalformedPayload {
        /// Which venue sent the payload.
        venue: Venue,
        /// What was wrong with it.
        reason: String,
    },

    /// The engine side of the event channel is gone.
    #[error("feed event channel closed")]
    ChannelClosed,
}

/// Paper ledger invariant violations.
///
/// The evaluator guarantees it never asks for an invalid transition; the
/// ledger re-checks anyway and the engine treats any of these as a defect,
/// terminating the process rather than trading on corrupt balances.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// Open requested while a position is already held.
    #[error("open requested but a position is already held (amount {amount})")]
    PositionAlreadyOpen {
        /// Size of the position already held.
        amount: Decimal,
    },

    /// Close requested with no open position.
    #[error("close requested with no open position")]
    NoOpenPosition,
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Message parsing failed.
    #[error("failed to parse websocket message: {0}")]
    ParseError(String),

    /// Stream URL could not be built.
    #[error("invalid stream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
