pub mod dflow_metadata_client;
pub mod dflow_trade_client;

pub use dflow_metadata_client::{DflowMetadataClient, DEFAULT_METADATA_API_URL};
pub use dflow_trade_client::{DflowTradeClient, DEFAULT_TRADE_API_URL};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::domain::execution::TradeRoute;
use crate::domain::quote::{QuoteRequest, QuoteResponse};
use crate::domain::redemption::MarketSnapshot;
use crate::exchanges::types::OrderStatusSnapshot;
use crate::shared::errors::{ApiError, QuoteError, SubmissionError};

/// Trade API: quotes, unsigned transactions and intent order tracking
#[async_trait]
pub trait QuoteApiClient: Send + Sync {
    /// `GET /order`; unsigned transaction plus the execution mode the server chose
    async fn get_order(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError>;

    /// `GET /quote`; always sync, no transaction until [`QuoteApiClient::build_swap`]
    async fn get_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError>;

    /// `POST /swap`; returns the base64 unsigned transaction for `quote`
    async fn build_swap(&self, quote: &QuoteResponse, user: &Pubkey) -> Result<String, QuoteError>;

    /// `GET /intent`; always async, carries the unsigned open transaction
    async fn get_intent(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError>;

    /// `POST /submit-intent`; returns the order signature
    async fn submit_intent(&self, quote: &QuoteResponse, signed_transaction: &str) -> Result<String, SubmissionError>;

    /// `GET /order-status`
    async fn order_status(&self, signature: &str) -> Result<OrderStatusSnapshot, ApiError>;

    /// Validate and quote `request` over the chosen upstream path
    async fn request_quote(&self, request: &QuoteRequest, route: TradeRoute) -> Result<QuoteResponse, QuoteError> {
        request.validate()?;
        match route {
            TradeRoute::Order => self.get_order(request).await,
            TradeRoute::Imperative => self.get_quote(request).await,
            TradeRoute::Declarative => self.get_intent(request).await,
        }
    }
}

/// Prediction-market metadata API
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// `GET /api/v1/market/by-mint/{mint}`
    async fn market_by_mint(&self, mint: &Pubkey) -> Result<MarketSnapshot, ApiError>;

    /// `POST /api/v1/filter_outcome_mints`; the subset of `mints` that are outcome tokens
    async fn filter_outcome_mints(&self, mints: &[Pubkey]) -> Result<Vec<Pubkey>, ApiError>;
}
