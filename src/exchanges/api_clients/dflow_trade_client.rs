use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::QuoteApiClient;
use crate::domain::quote::{ExecutionMode, QuoteRequest, QuoteResponse};
use crate::exchanges::types::{
    OrderStatusSnapshot, OrderStatusWire, QuoteWire, SubmitIntentRequestWire, SubmitIntentWire, SwapRequestWire,
    SwapWire,
};
use crate::shared::errors::{ApiError, QuoteError, SubmissionError};
use crate::shared::utils::short_id;

pub const DEFAULT_TRADE_API_URL: &str = "https://quote-api.dflow.net";

/// HTTP client for the DFlow trade API
pub struct DflowTradeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl DflowTradeClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn fetch_quote(
        &self,
        path: &str,
        request: &QuoteRequest,
        default_mode: ExecutionMode,
    ) -> Result<QuoteResponse, QuoteError> {
        request.validate()?;
        debug!("GET {} {} -> {} amount={}", path, request.input_mint, request.output_mint, request.amount);

        let response = self
            .authorize(self.client.get(self.url(path)).query(&request.query_pairs()))
            .send()
            .await
            .map_err(ApiError::from)?;

        let raw = match read_json(response).await {
            Ok(raw) => raw,
            Err(ApiError::Upstream { status, body }) => return Err(classify_quote_failure(request, status, body)),
            Err(e) => return Err(e.into()),
        };
        let quote = QuoteWire::parse(raw, default_mode)?.ensure_valid()?;

        info!(
            "🔍 Quote {}: in={} out={} min_out={} mode={} legs={}",
            path,
            quote.in_amount,
            quote.out_amount,
            quote.min_out_amount,
            quote.execution_mode,
            quote.route.len()
        );
        Ok(quote)
    }
}

async fn read_json(response: Response) -> Result<serde_json::Value, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// The quote endpoints answer a missing route with a non-2xx body
fn classify_quote_failure(request: &QuoteRequest, status: u16, body: String) -> QuoteError {
    let lowered = body.to_ascii_lowercase();
    if lowered.contains("route_not_found") || lowered.contains("no route") {
        return QuoteError::NoRouteFound {
            input_mint: request.input_mint.to_string(),
            output_mint: request.output_mint.to_string(),
        };
    }
    QuoteError::Api(ApiError::Upstream { status, body })
}

#[async_trait]
impl QuoteApiClient for DflowTradeClient {
    async fn get_order(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        self.fetch_quote("/order", request, ExecutionMode::Sync).await
    }

    async fn get_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let mut quote = self.fetch_quote("/quote", request, ExecutionMode::Sync).await?;
        quote.execution_mode = ExecutionMode::Sync;
        Ok(quote)
    }

    async fn build_swap(&self, quote: &QuoteResponse, user: &Pubkey) -> Result<String, QuoteError> {
        let body = SwapRequestWire {
            user_public_key: user.to_string(),
            quote_response: &quote.raw,
            wrap_and_unwrap_sol: true,
        };
        let response = self
            .authorize(self.client.post(self.url("/swap")).json(&body))
            .send()
            .await
            .map_err(ApiError::from)?;
        let raw = read_json(response).await?;
        let swap: SwapWire =
            serde_json::from_value(raw).map_err(|e| ApiError::Decode(format!("swap: {}", e)))?;
        debug!("Swap transaction built for {}", user);
        Ok(swap.swap_transaction)
    }

    async fn get_intent(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let mut quote = self.fetch_quote("/intent", request, ExecutionMode::Async).await?;
        quote.execution_mode = ExecutionMode::Async;
        Ok(quote)
    }

    async fn submit_intent(&self, quote: &QuoteResponse, signed_transaction: &str) -> Result<String, SubmissionError> {
        let body = SubmitIntentRequestWire {
            quote_response: &quote.raw,
            signed_open_transaction: signed_transaction,
        };
        let response = self
            .authorize(self.client.post(self.url("/submit-intent")).json(&body))
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let raw = read_json(response).await.map_err(|e| match e {
            ApiError::Upstream { status, body } => SubmissionError::Rejected(format!("{}: {}", status, body)),
            other => SubmissionError::Transport(other.to_string()),
        })?;
        let submitted: SubmitIntentWire = serde_json::from_value(raw)
            .map_err(|e| SubmissionError::Transport(format!("unreadable submit-intent response: {}", e)))?;

        info!("✅ Intent submitted: {}", short_id(&submitted.open_transaction_signature));
        Ok(submitted.open_transaction_signature)
    }

    async fn order_status(&self, signature: &str) -> Result<OrderStatusSnapshot, ApiError> {
        let response = self
            .authorize(self.client.get(self.url("/order-status")).query(&[("signature", signature)]))
            .send()
            .await?;
        let raw = read_json(response).await?;
        let wire: OrderStatusWire =
            serde_json::from_value(raw).map_err(|e| ApiError::Decode(format!("order-status: {}", e)))?;
        let snapshot = OrderStatusSnapshot::from(wire);
        if snapshot.status.is_none() {
            warn!("Unrecognized order status '{}' for {}", snapshot.raw_status, short_id(signature));
        }
        Ok(snapshot)
    }
}
