//! Scripted feed for tests and offline runs.
//!
//! Builds a fixed sequence of feed events and plays it into the engine
//! channel, standing in for both venue adapters without any network.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::types::{FeedEvent, Venue};
use crate::error::FeedError;

/// A pre-scripted sequence of feed events.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    events: Vec<FeedEvent>,
    tick_delay: Option<Duration>,
}

impl ScriptedFeed {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a spot ticker event.
    pub fn spot_tick(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.events.push(FeedEvent::Ticker {
            venue: Venue::Spot,
            bid,
            ask,
        });
        self
    }

    /// Append a futures ticker event.
    pub fn futures_tick(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.events.push(FeedEvent::Ticker {
            venue: Venue::Futures,
            bid,
            ask,
        });
        self
    }

    /// Append a funding rate refresh.
    pub fn funding(mut self, rate_pct: Decimal) -> Self {
        self.events.push(FeedEvent::FundingRate { rate_pct });
        self
    }

    /// Sleep between events when driving, to exercise timing-sensitive
    /// consumers.
    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = Some(delay);
        self
    }

    /// Number of scripted events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Play every event into the channel, in order.
    pub async fn drive(self, tx: &mpsc::Sender<FeedEvent>) -> Result<(), FeedError> {
        for event in self.events {
            tx.send(event).await.map_err(|_| FeedError::ChannelClosed)?;
            if let Some(delay) = self.tick_delay {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }
}
