//! Terminal caller-facing trade result

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use super::order::{Fill, FillLedger, IntentStatus, Order, OrderPhase};
use crate::domain::price::Price;
use crate::domain::quote::{ExecutionMode, QuoteRequest, QuoteResponse};
use crate::shared::errors::TradeFailure;
use crate::shared::utils::pubkey_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Filled,
    /// Intent closed with less input consumed than requested. Not an error.
    PartiallyFilled,
    Failed,
    /// Submitted but no terminal state observed; check the signature.
    Unknown,
}

/// Realized amounts: sums of the fills when any were recorded, otherwise
/// the quoted amounts.
pub fn realized_amounts(ledger: &FillLedger, quote: &QuoteResponse) -> (u64, u64) {
    if ledger.is_empty() {
        (quote.in_amount, quote.out_amount)
    } else {
        (ledger.total_in(), ledger.total_out())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeResult {
    pub order_id: Uuid,
    pub success: bool,
    pub status: TradeStatus,
    pub signature: Option<String>,
    pub execution_mode: Option<ExecutionMode>,
    #[serde(with = "pubkey_string")]
    pub input_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub quoted_in_amount: Option<u64>,
    pub quoted_out_amount: Option<u64>,
    pub min_out_amount: Option<u64>,
    pub fills: Vec<Fill>,
    pub slot: Option<u64>,
    pub intent_status: Option<IntentStatus>,
    pub failure: Option<TradeFailure>,
    pub reference_price: Option<Price>,
    pub completed_at: DateTime<Utc>,
}

impl TradeResult {
    /// Failure before anything was sent
    pub fn pre_trade(order_id: Uuid, request: &QuoteRequest, failure: TradeFailure) -> Self {
        Self {
            order_id,
            success: false,
            status: TradeStatus::Failed,
            signature: failure.signature().map(str::to_string),
            execution_mode: None,
            input_mint: request.input_mint,
            output_mint: request.output_mint,
            in_amount: 0,
            out_amount: 0,
            quoted_in_amount: None,
            quoted_out_amount: None,
            min_out_amount: None,
            fills: Vec::new(),
            slot: None,
            intent_status: None,
            failure: Some(failure),
            reference_price: None,
            completed_at: Utc::now(),
        }
    }

    fn from_order(order: &Order, quote: &QuoteResponse) -> Self {
        let intent_status = match order.phase() {
            OrderPhase::Intent(status) => Some(status),
            _ => None,
        };
        Self {
            order_id: order.id,
            success: false,
            status: TradeStatus::Failed,
            signature: order.signature().map(str::to_string),
            execution_mode: Some(quote.execution_mode),
            input_mint: quote.input_mint,
            output_mint: quote.output_mint,
            in_amount: order.ledger().total_in(),
            out_amount: order.ledger().total_out(),
            quoted_in_amount: Some(quote.in_amount),
            quoted_out_amount: Some(quote.out_amount),
            min_out_amount: Some(quote.min_out_amount),
            fills: order.ledger().fills().to_vec(),
            slot: None,
            intent_status,
            failure: None,
            reference_price: None,
            completed_at: Utc::now(),
        }
    }

    /// Confirmed sync swap or closed intent
    pub fn settled(order: &Order, quote: &QuoteResponse, slot: Option<u64>) -> Self {
        let mut result = Self::from_order(order, quote);
        let (in_amount, out_amount) = realized_amounts(order.ledger(), quote);
        let partial = !order.ledger().is_empty() && order.ledger().is_partial();
        result.success = true;
        result.status = if partial { TradeStatus::PartiallyFilled } else { TradeStatus::Filled };
        result.in_amount = in_amount;
        result.out_amount = out_amount;
        result.slot = slot;
        result
    }

    /// Failure after submission; the signature travels with it
    pub fn unsuccessful(order: &Order, quote: &QuoteResponse, failure: TradeFailure) -> Self {
        let mut result = Self::from_order(order, quote);
        result.status = match failure {
            TradeFailure::PostSubmissionUnknown { .. } => TradeStatus::Unknown,
            _ => TradeStatus::Failed,
        };
        if result.signature.is_none() {
            result.signature = failure.signature().map(str::to_string);
        }
        result.failure = Some(failure);
        result
    }

    pub fn with_reference_price(mut self, price: Option<Price>) -> Self {
        self.reference_price = price;
        self
    }
}
