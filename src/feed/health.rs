//! Feed freshness tracking shared between adapters and the HTTP API.

use std::time::Instant;

use dashmap::DashMap;

use super::Venue;

/// Key for the funding refresh feed.
pub const FUNDING_FEED: &str = "funding";

/// Last-update times per feed, written by the adapters and read by the
/// status endpoint to surface staleness.
#[derive(Debug, Default)]
pub struct FeedHealth {
    last_update: DashMap<String, Instant>,
}

impl FeedHealth {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ticker update for a venue.
    pub fn record_tick(&self, venue: Venue) {
        self.last_update.insert(venue.to_string(), Instant::now());
    }

    /// Record a funding refresh.
    pub fn record_funding(&self) {
        self.last_update
            .insert(FUNDING_FEED.to_string(), Instant::now());
    }

    /// Seconds since the named feed last updated, if it ever has.
    pub fn age_secs(&self, feed: &str) -> Option<u64> {
        self.last_update
            .get(feed)
            .map(|at| at.elapsed().as_secs())
    }

    /// Ages for every feed seen so far, sorted by feed name.
    pub fn ages(&self) -> Vec<(String, u64)> {
        let mut ages: Vec<_> = self
            .last_update
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().elapsed().as_secs()))
            .collect();
        ages.sort_by(|a, b| a.0.cmp(&b.0));
        ages
    }
}
