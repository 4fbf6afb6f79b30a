//! Price domain - read-only market price inputs

mod price_feed;

pub use price_feed::{PriceSource, StaticPriceSource};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest observed price of a market, in basis points of one settlement unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Price {
    pub ticker: String,
    pub yes_bps: u16,
    pub no_bps: u16,
    pub observed_at: DateTime<Utc>,
}

impl Price {
    pub fn new(ticker: impl Into<String>, yes_bps: u16, no_bps: u16) -> Self {
        Self {
            ticker: ticker.into(),
            yes_bps,
            no_bps,
            observed_at: Utc::now(),
        }
    }
}
