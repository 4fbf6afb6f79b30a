//! Wire types for the trade and metadata HTTP APIs

use chrono::Utc;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::execution::{Fill, IntentStatus};
use crate::domain::quote::{ExecutionMode, QuoteResponse, RouteLeg};
use crate::domain::redemption::{MarketSnapshot, MarketStatus, RedemptionStatus, SettlementAccount, Side};
use crate::shared::errors::{ApiError, QuoteError};
use crate::shared::utils::{pubkey_string, u64_string};

/// Quote body shared by `/order`, `/quote` and `/intent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteWire {
    #[serde(with = "pubkey_string")]
    pub input_mint: Pubkey,
    #[serde(with = "u64_string")]
    pub in_amount: u64,
    #[serde(with = "pubkey_string")]
    pub output_mint: Pubkey,
    #[serde(with = "u64_string")]
    pub out_amount: u64,
    #[serde(default, deserialize_with = "u64_string::option::deserialize")]
    pub min_out_amount: Option<u64>,
    #[serde(default, deserialize_with = "u64_string::option::deserialize")]
    pub other_amount_threshold: Option<u64>,
    #[serde(default)]
    pub slippage_bps: Option<u16>,
    #[serde(default)]
    pub price_impact_pct: Option<serde_json::Value>,
    #[serde(default)]
    pub route_plan: Vec<RoutePlanLegWire>,
    #[serde(default)]
    pub execution_mode: Option<String>,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub open_transaction: Option<String>,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
    #[serde(default)]
    pub context_slot: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanLegWire {
    #[serde(default, alias = "label")]
    pub venue: String,
    #[serde(default)]
    pub market_key: Option<String>,
    #[serde(with = "pubkey_string")]
    pub input_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub output_mint: Pubkey,
    #[serde(with = "u64_string")]
    pub in_amount: u64,
    #[serde(with = "u64_string")]
    pub out_amount: u64,
}

impl From<RoutePlanLegWire> for RouteLeg {
    fn from(leg: RoutePlanLegWire) -> Self {
        RouteLeg {
            venue: leg.venue,
            market_key: leg.market_key,
            input_mint: leg.input_mint,
            output_mint: leg.output_mint,
            in_amount: leg.in_amount,
            out_amount: leg.out_amount,
        }
    }
}

impl QuoteWire {
    /// Decode a raw response body, keeping the JSON for later echo
    pub fn parse(raw: serde_json::Value, default_mode: ExecutionMode) -> Result<QuoteResponse, QuoteError> {
        let wire: QuoteWire = serde_json::from_value(raw.clone())
            .map_err(|e| QuoteError::Api(ApiError::Decode(format!("quote: {}", e))))?;
        wire.into_response(raw, default_mode)
    }

    pub fn into_response(self, raw: serde_json::Value, default_mode: ExecutionMode) -> Result<QuoteResponse, QuoteError> {
        let min_out_amount = self
            .min_out_amount
            .or(self.other_amount_threshold)
            .ok_or_else(|| QuoteError::InvalidQuote("missing minOutAmount".to_string()))?;

        let execution_mode = match self.execution_mode.as_deref() {
            Some(mode) => ExecutionMode::parse(mode)
                .ok_or_else(|| QuoteError::InvalidQuote(format!("unknown executionMode '{}'", mode)))?,
            None => default_mode,
        };

        let price_impact_pct = self.price_impact_pct.and_then(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(QuoteResponse {
            input_mint: self.input_mint,
            output_mint: self.output_mint,
            in_amount: self.in_amount,
            out_amount: self.out_amount,
            min_out_amount,
            slippage_bps: self.slippage_bps,
            price_impact_pct,
            route: self.route_plan.into_iter().map(RouteLeg::from).collect(),
            execution_mode,
            transaction: self.transaction.or(self.open_transaction),
            last_valid_block_height: self.last_valid_block_height,
            context_slot: self.context_slot,
            received_at: Utc::now(),
            raw,
        })
    }
}

/// `POST /swap` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequestWire<'a> {
    pub user_public_key: String,
    pub quote_response: &'a serde_json::Value,
    pub wrap_and_unwrap_sol: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapWire {
    pub swap_transaction: String,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
}

/// `POST /submit-intent` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIntentRequestWire<'a> {
    pub quote_response: &'a serde_json::Value,
    pub signed_open_transaction: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIntentWire {
    #[serde(alias = "signature")]
    pub open_transaction_signature: String,
    #[serde(default)]
    pub order_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillWire {
    #[serde(alias = "txId")]
    pub signature: String,
    #[serde(alias = "qtyIn", with = "u64_string")]
    pub in_amount: u64,
    #[serde(alias = "qtyOut", with = "u64_string")]
    pub out_amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusWire {
    pub status: String,
    #[serde(default, deserialize_with = "u64_string::option::deserialize")]
    pub in_amount: Option<u64>,
    #[serde(default, deserialize_with = "u64_string::option::deserialize")]
    pub out_amount: Option<u64>,
    #[serde(default)]
    pub fills: Vec<FillWire>,
}

/// One poll of `/order-status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusSnapshot {
    /// `None` when the upstream reported a status outside the lifecycle
    pub status: Option<IntentStatus>,
    pub raw_status: String,
    pub fills: Vec<Fill>,
}

impl From<OrderStatusWire> for OrderStatusSnapshot {
    fn from(wire: OrderStatusWire) -> Self {
        OrderStatusSnapshot {
            status: IntentStatus::parse(&wire.status),
            raw_status: wire.status,
            fills: wire
                .fills
                .into_iter()
                .map(|f| Fill::new(f.signature, f.in_amount, f.out_amount))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAccountWire {
    pub yes_mint: String,
    pub no_mint: String,
    #[serde(default)]
    pub market_ledger: Option<String>,
    #[serde(default)]
    pub redemption_status: Option<String>,
    #[serde(default)]
    pub scalar_outcome_pct: Option<u16>,
}

/// `GET /api/v1/market/by-mint/{mint}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketWire {
    pub ticker: String,
    #[serde(default)]
    pub title: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
    /// Keyed by settlement mint
    #[serde(default)]
    pub accounts: HashMap<String, MarketAccountWire>,
}

fn decode_pubkey(field: &str, value: &str) -> Result<Pubkey, ApiError> {
    Pubkey::from_str(value.trim()).map_err(|e| ApiError::Decode(format!("{} '{}': {}", field, value, e)))
}

impl TryFrom<MarketWire> for MarketSnapshot {
    type Error = ApiError;

    fn try_from(wire: MarketWire) -> Result<Self, Self::Error> {
        let mut accounts = wire
            .accounts
            .iter()
            .map(|(settlement, acc)| {
                Ok(SettlementAccount {
                    settlement_mint: decode_pubkey("settlement mint", settlement)?,
                    yes_mint: decode_pubkey("yesMint", &acc.yes_mint)?,
                    no_mint: decode_pubkey("noMint", &acc.no_mint)?,
                    redemption_status: RedemptionStatus::parse(acc.redemption_status.as_deref()),
                    scalar_outcome_pct: acc.scalar_outcome_pct,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;
        accounts.sort_by(|a, b| a.settlement_mint.cmp(&b.settlement_mint));

        Ok(MarketSnapshot {
            ticker: wire.ticker,
            title: wire.title,
            status: MarketStatus::parse(&wire.status),
            result: wire.result.as_deref().and_then(Side::parse),
            accounts,
        })
    }
}

/// `POST /api/v1/filter_outcome_mints` request body
#[derive(Debug, Serialize)]
pub struct FilterOutcomeMintsRequestWire {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcomeMintsWire {
    #[serde(default)]
    pub outcome_mints: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn order_fixture(input: &Pubkey, output: &Pubkey) -> serde_json::Value {
        json!({
            "inputMint": input.to_string(),
            "inAmount": "10000000",
            "outputMint": output.to_string(),
            "outAmount": "9900000",
            "otherAmountThreshold": "9702000",
            "slippageBps": 200,
            "priceImpactPct": "0.01",
            "executionMode": "async",
            "routePlan": [{
                "venue": "Kalshi",
                "marketKey": "KXFED-26DEC",
                "inputMint": input.to_string(),
                "outputMint": output.to_string(),
                "inAmount": "10000000",
                "outAmount": "9900000"
            }],
            "transaction": "AQAB",
            "lastValidBlockHeight": 300000123,
            "contextSlot": 321
        })
    }

    #[test]
    fn test_order_response_decodes() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let raw = order_fixture(&input, &output);

        let quote = QuoteWire::parse(raw.clone(), ExecutionMode::Sync).unwrap();
        assert_eq!(quote.in_amount, 10_000_000);
        assert_eq!(quote.min_out_amount, 9_702_000);
        assert_eq!(quote.execution_mode, ExecutionMode::Async);
        assert_eq!(quote.route.len(), 1);
        assert_eq!(quote.route[0].market_key.as_deref(), Some("KXFED-26DEC"));
        assert_eq!(quote.transaction.as_deref(), Some("AQAB"));
        assert_eq!(quote.raw, raw);
    }

    #[test]
    fn test_missing_min_out_is_invalid() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let mut raw = order_fixture(&input, &output);
        raw.as_object_mut().unwrap().remove("otherAmountThreshold");
        assert!(matches!(
            QuoteWire::parse(raw, ExecutionMode::Sync),
            Err(QuoteError::InvalidQuote(_))
        ));
    }

    #[test]
    fn test_intent_response_uses_open_transaction() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let mut raw = order_fixture(&input, &output);
        let obj = raw.as_object_mut().unwrap();
        obj.remove("transaction");
        obj.remove("executionMode");
        obj.insert("openTransaction".to_string(), json!("AgAC"));

        let quote = QuoteWire::parse(raw, ExecutionMode::Async).unwrap();
        assert_eq!(quote.transaction.as_deref(), Some("AgAC"));
        assert_eq!(quote.execution_mode, ExecutionMode::Async);
    }

    #[test]
    fn test_order_status_fills() {
        let wire: OrderStatusWire = serde_json::from_value(json!({
            "status": "pendingClose",
            "fills": [
                { "signature": "f1", "inAmount": "4000000", "outAmount": "3800000" },
                { "txId": "f2", "qtyIn": 6000000, "qtyOut": 5700000 }
            ]
        }))
        .unwrap();
        let snapshot = OrderStatusSnapshot::from(wire);
        assert_eq!(snapshot.status, Some(IntentStatus::PendingClose));
        assert_eq!(snapshot.fills.len(), 2);
        assert_eq!(snapshot.fills[1].signature, "f2");
        assert_eq!(snapshot.fills[1].qty_out, 5_700_000);

        let odd: OrderStatusWire = serde_json::from_value(json!({ "status": "settling" })).unwrap();
        let snapshot = OrderStatusSnapshot::from(odd);
        assert_eq!(snapshot.status, None);
        assert_eq!(snapshot.raw_status, "settling");
    }

    #[test]
    fn test_market_decodes_and_sorts_accounts() {
        let other = Pubkey::new_unique();
        let yes = Pubkey::new_unique();
        let no = Pubkey::new_unique();
        let wire: MarketWire = serde_json::from_value(json!({
            "ticker": "KXFED-26DEC",
            "title": "Fed cuts in December?",
            "status": "determined",
            "result": "no",
            "accounts": {
                USDC: {
                    "yesMint": yes.to_string(),
                    "noMint": no.to_string(),
                    "marketLedger": Pubkey::new_unique().to_string(),
                    "redemptionStatus": "open"
                },
                (other.to_string()): {
                    "yesMint": Pubkey::new_unique().to_string(),
                    "noMint": Pubkey::new_unique().to_string(),
                    "redemptionStatus": "pending",
                    "scalarOutcomePct": 2500
                }
            }
        }))
        .unwrap();

        let market = MarketSnapshot::try_from(wire).unwrap();
        assert_eq!(market.status, MarketStatus::Determined);
        assert_eq!(market.result, Some(Side::No));
        assert_eq!(market.accounts.len(), 2);
        assert!(market.accounts[0].settlement_mint < market.accounts[1].settlement_mint);

        let usdc = Pubkey::from_str(USDC).unwrap();
        let account = market.accounts.iter().find(|a| a.settlement_mint == usdc).unwrap();
        assert_eq!(account.side_of(&no), Some(Side::No));
        assert_eq!(account.redemption_status, RedemptionStatus::Open);
    }

    #[test]
    fn test_market_with_bad_mint_is_decode_error() {
        let wire: MarketWire = serde_json::from_value(json!({
            "ticker": "T",
            "status": "active",
            "accounts": { USDC: { "yesMint": "nope", "noMint": "nope" } }
        }))
        .unwrap();
        assert!(matches!(MarketSnapshot::try_from(wire), Err(ApiError::Decode(_))));
    }
}
