use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::MarketDataApi;
use crate::domain::redemption::MarketSnapshot;
use crate::exchanges::types::{FilterOutcomeMintsRequestWire, FilterOutcomeMintsWire, MarketWire};
use crate::shared::errors::ApiError;

pub const DEFAULT_METADATA_API_URL: &str = "https://prediction-markets-api.dflow.net";

/// HTTP client for the prediction-market metadata API
pub struct DflowMetadataClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl DflowMetadataClient {
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

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn upstream_error(response: reqwest::Response) -> ApiError {
        let status = response.status();
        ApiError::Upstream {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl MarketDataApi for DflowMetadataClient {
    async fn market_by_mint(&self, mint: &Pubkey) -> Result<MarketSnapshot, ApiError> {
        let url = format!("{}/api/v1/market/by-mint/{}", self.base_url, mint);
        debug!("GET {}", url);
        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }
        let wire: MarketWire = response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        MarketSnapshot::try_from(wire)
    }

    async fn filter_outcome_mints(&self, mints: &[Pubkey]) -> Result<Vec<Pubkey>, ApiError> {
        if mints.is_empty() {
            return Ok(Vec::new());
        }
        let body = FilterOutcomeMintsRequestWire {
            addresses: mints.iter().map(Pubkey::to_string).collect(),
        };
        let url = format!("{}/api/v1/filter_outcome_mints", self.base_url);
        let response = self.authorize(self.client.post(url).json(&body)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }
        let wire: FilterOutcomeMintsWire = response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;

        let mut outcome = Vec::with_capacity(wire.outcome_mints.len());
        for mint in wire.outcome_mints {
            match Pubkey::from_str(&mint) {
                Ok(key) => outcome.push(key),
                Err(e) => warn!("Skipping malformed outcome mint '{}': {}", mint, e),
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_filter_is_local() {
        let client = DflowMetadataClient::new("http://127.0.0.1:9", None, Duration::from_millis(50)).unwrap();
        assert!(client.filter_outcome_mints(&[]).await.unwrap().is_empty());
    }
}
