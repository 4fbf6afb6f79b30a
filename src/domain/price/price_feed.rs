//! Price feed port

use std::collections::HashMap;
use std::sync::RwLock;

use super::Price;

/// Read port over whatever keeps live prices (ticker relay, cache, test fixture).
///
/// The settlement engine only ever reads through this trait.
pub trait PriceSource: Send + Sync {
    fn get_price(&self, ticker: &str) -> Option<Price>;
}

/// In-memory price source fed by the caller
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    prices: RwLock<HashMap<String, Price>>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, price: Price) {
        if let Ok(mut prices) = self.prices.write() {
            prices.insert(price.ticker.clone(), price);
        }
    }
}

impl PriceSource for StaticPriceSource {
    fn get_price(&self, ticker: &str) -> Option<Price> {
        self.prices.read().ok()?.get(ticker).cloned()
    }
}
