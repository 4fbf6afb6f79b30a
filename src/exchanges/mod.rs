//! Upstream trade and metadata services

pub mod api_clients;
pub mod types;

pub use api_clients::{DflowMetadataClient, DflowTradeClient, MarketDataApi, QuoteApiClient};
pub use types::OrderStatusSnapshot;
