//! Latest-quote store for both venues plus the funding rate.

use rust_decimal::Decimal;
use tracing::warn;

use crate::feed::Venue;

/// Best bid/ask snapshot for one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
}

impl Quote {
    /// Create a new quote.
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }

    /// A quote is usable when both sides are positive and not crossed.
    pub fn is_valid(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.bid <= self.ask
    }
}

/// Latest market state: one quote per venue and the current funding rate.
///
/// Fields start unknown and are overwritten wholesale per update. A rejected
/// update clears its field back to unknown, so evaluation pauses instead of
/// running on a quote known to be bad.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    spot: Option<Quote>,
    futures: Option<Quote>,
    funding_rate_pct: Option<Decimal>,
}

impl MarketSnapshot {
    /// Create an empty snapshot (everything unknown).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a spot quote. Returns whether the quote was accepted.
    pub fn update_spot(&mut self, bid: Decimal, ask: Decimal) -> bool {
        self.update_venue(Venue::Spot, bid, ask)
    }

    /// Store a futures quote. Returns whether the quote was accepted.
    pub fn update_futures(&mut self, bid: Decimal, ask: Decimal) -> bool {
        self.update_venue(Venue::Futures, bid, ask)
    }

    /// Store a quote for the given venue.
    pub fn update_venue(&mut self, venue: Venue, bid: Decimal, ask: Decimal) -> bool {
        let quote = Quote::new(bid, ask);
        let slot = match venue {
            Venue::Spot => &mut self.spot,
            Venue::Futures => &mut self.futures,
        };

        if quote.is_valid() {
            *slot = Some(quote);
            true
        } else {
            warn!(
                venue = %venue,
                bid = %bid,
                ask = %ask,
                "Rejecting invalid quote, clearing to unknown"
            );
            *slot = None;
            false
        }
    }

    /// Store a refreshed funding rate percentage.
    pub fn update_funding_rate(&mut self, rate_pct: Decimal) {
        self.funding_rate_pct = Some(rate_pct);
    }

    /// Latest spot quote, if known.
    pub fn spot(&self) -> Option<Quote> {
        self.spot
    }

    /// Latest futures quote, if known.
    pub fn futures(&self) -> Option<Quote> {
        self.futures
    }

    /// Latest funding rate percentage, if known.
    pub fn funding_rate_pct(&self) -> Option<Decimal> {
        self.funding_rate_pct
    }

    /// Whether every field needed for evaluation is known.
    pub fn is_complete(&self) -> bool {
        self.spot.is_some() && self.futures.is_some() && self.funding_rate_pct.is_some()
    }
}
