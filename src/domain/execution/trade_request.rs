//! Typed trade requests and validation of untyped tool-call payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::quote::{QuoteRequest, RouteConstraints, Slippage, MAX_SLIPPAGE_BPS};
use crate::shared::errors::TradeFailure;
use crate::shared::types::{Amount, OUTCOME_TOKEN_DECIMALS};
use crate::shared::utils::{parse_pubkey, u64_string};

/// Which upstream path executes the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeRoute {
    /// `GET /order`; the server picks sync or async
    #[default]
    Order,
    /// `GET /quote` + `POST /swap`; always sync
    Imperative,
    /// `GET /intent` + `POST /submit-intent`; always async
    Declarative,
}

impl FromStr for TradeRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(TradeRoute::Order),
            "imperative" | "swap" => Ok(TradeRoute::Imperative),
            "declarative" | "intent" => Ok(TradeRoute::Declarative),
            other => Err(format!("unknown trade route '{}'", other)),
        }
    }
}

impl fmt::Display for TradeRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeRoute::Order => f.write_str("order"),
            TradeRoute::Imperative => f.write_str("imperative"),
            TradeRoute::Declarative => f.write_str("declarative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub quote: QuoteRequest,
    pub route: TradeRoute,
    /// Market ticker for price lookups; purely informational
    pub market_ticker: Option<String>,
}

impl TradeRequest {
    pub fn new(quote: QuoteRequest) -> Self {
        Self {
            quote,
            route: TradeRoute::default(),
            market_ticker: None,
        }
    }

    pub fn with_route(mut self, route: TradeRoute) -> Self {
        self.route = route;
        self
    }

    pub fn with_market_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.market_ticker = Some(ticker.into());
        self
    }

    /// Validate a tool-call payload from the agent layer into a typed request.
    ///
    /// Accepts either `amount` (raw integer units) or `uiAmount` (decimal
    /// string scaled by `decimals`, default 6). Unknown fields are rejected.
    pub fn from_tool_args(args: serde_json::Value) -> Result<Self, TradeFailure> {
        let args: ToolArgs = serde_json::from_value(args)
            .map_err(|e| TradeFailure::pre_trade(format!("invalid trade arguments: {}", e)))?;

        let input_mint = parse_pubkey("inputMint", &args.input_mint).map_err(TradeFailure::pre_trade)?;
        let output_mint = parse_pubkey("outputMint", &args.output_mint).map_err(TradeFailure::pre_trade)?;

        let amount = match (args.amount, args.ui_amount.as_deref()) {
            (Some(raw), None) => raw,
            (None, Some(ui)) => {
                let decimals = args.decimals.unwrap_or(OUTCOME_TOKEN_DECIMALS);
                Amount::parse_ui(ui, decimals)
                    .map_err(|e| TradeFailure::pre_trade(format!("invalid uiAmount: {}", e)))?
                    .value
            }
            (Some(_), Some(_)) => return Err(TradeFailure::pre_trade("pass either amount or uiAmount, not both")),
            (None, None) => return Err(TradeFailure::pre_trade("missing amount")),
        };

        let slippage = match args.slippage_bps {
            None => Slippage::Auto,
            Some(SlippageArg::Bps(bps)) if bps <= MAX_SLIPPAGE_BPS => Slippage::Bps(bps),
            Some(SlippageArg::Bps(bps)) => {
                return Err(TradeFailure::pre_trade(format!("slippageBps {} exceeds {}", bps, MAX_SLIPPAGE_BPS)))
            }
            Some(SlippageArg::Text(text)) => text.parse().map_err(TradeFailure::pre_trade)?,
        };

        let constraints = RouteConstraints {
            only_direct_routes: args.only_direct_routes.unwrap_or(false),
            max_route_length: args.max_route_length,
            ..RouteConstraints::default()
        };
        let quote = QuoteRequest::new(input_mint, output_mint, amount, slippage).with_constraints(constraints);
        quote.validate()?;

        Ok(Self {
            quote,
            route: args.route.unwrap_or_default(),
            market_ticker: args.market_ticker,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ToolArgs {
    input_mint: String,
    output_mint: String,
    #[serde(default, deserialize_with = "u64_string::option::deserialize")]
    amount: Option<u64>,
    ui_amount: Option<String>,
    decimals: Option<u8>,
    slippage_bps: Option<SlippageArg>,
    route: Option<TradeRoute>,
    market_ticker: Option<String>,
    only_direct_routes: Option<bool>,
    max_route_length: Option<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlippageArg {
    Bps(u16),
    Text(String),
}
