//! Quote domain - swap requests and the server-computed quotes answering them

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

use crate::shared::errors::QuoteError;
use crate::shared::utils::pubkey_string;

/// Maximum slippage ceiling the engine accepts (100%)
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// Slippage tolerance: either a fixed basis-point ceiling or `Auto`,
/// which lets the quoting service choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slippage {
    Auto,
    Bps(u16),
}

impl Slippage {
    pub fn query_value(&self) -> String {
        match self {
            Slippage::Auto => "auto".to_string(),
            Slippage::Bps(bps) => bps.to_string(),
        }
    }
}

impl Default for Slippage {
    fn default() -> Self {
        Slippage::Auto
    }
}

impl std::str::FromStr for Slippage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Slippage::Auto);
        }
        let bps: u16 = s.parse().map_err(|_| format!("invalid slippage '{}'", s))?;
        if bps > MAX_SLIPPAGE_BPS {
            return Err(format!("slippage {} bps exceeds {}", bps, MAX_SLIPPAGE_BPS));
        }
        Ok(Slippage::Bps(bps))
    }
}

/// Optional routing constraints forwarded to the quoting service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConstraints {
    pub only_direct_routes: bool,
    pub max_route_length: Option<u8>,
    pub dexes: Vec<String>,
    pub exclude_dexes: Vec<String>,
}

/// Immutable swap request: sell `amount` raw units of `input_mint` for `output_mint`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteRequest {
    #[serde(with = "pubkey_string")]
    pub input_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage: Slippage,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_pubkey")]
    pub user_public_key: Option<Pubkey>,
    pub constraints: RouteConstraints,
}

fn serialize_opt_pubkey<S: serde::Serializer>(key: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(k) => serializer.collect_str(k),
        None => serializer.serialize_none(),
    }
}

impl QuoteRequest {
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64, slippage: Slippage) -> Self {
        Self {
            input_mint,
            output_mint,
            amount,
            slippage,
            user_public_key: None,
            constraints: RouteConstraints::default(),
        }
    }

    pub fn with_user(mut self, user: Pubkey) -> Self {
        self.user_public_key = Some(user);
        self
    }

    pub fn with_constraints(mut self, constraints: RouteConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.amount == 0 {
            return Err(QuoteError::InvalidRequest("amount must be greater than zero".to_string()));
        }
        if self.input_mint == self.output_mint {
            return Err(QuoteError::InvalidRequest("input and output mint are identical".to_string()));
        }
        if let Slippage::Bps(bps) = self.slippage {
            if bps > MAX_SLIPPAGE_BPS {
                return Err(QuoteError::InvalidRequest(format!("slippage {} bps exceeds {}", bps, MAX_SLIPPAGE_BPS)));
            }
        }
        if self.constraints.max_route_length == Some(0) {
            return Err(QuoteError::InvalidRequest("max route length must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Query string pairs shared by `/order`, `/quote` and `/intent`
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("inputMint", self.input_mint.to_string()),
            ("outputMint", self.output_mint.to_string()),
            ("amount", self.amount.to_string()),
            ("slippageBps", self.slippage.query_value()),
        ];
        if let Some(user) = &self.user_public_key {
            pairs.push(("userPublicKey", user.to_string()));
        }
        if self.constraints.only_direct_routes {
            pairs.push(("onlyDirectRoutes", "true".to_string()));
        }
        if let Some(max) = self.constraints.max_route_length {
            pairs.push(("maxRouteLength", max.to_string()));
        }
        if !self.constraints.dexes.is_empty() {
            pairs.push(("dexes", self.constraints.dexes.join(",")));
        }
        if !self.constraints.exclude_dexes.is_empty() {
            pairs.push(("excludeDexes", self.constraints.exclude_dexes.join(",")));
        }
        pairs
    }
}

/// How the quoted order settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Atomic swap settled in the submitted transaction
    Sync,
    /// Standing intent order filled by later transactions
    Async,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync" => Some(ExecutionMode::Sync),
            "async" => Some(ExecutionMode::Async),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sync => f.write_str("sync"),
            ExecutionMode::Async => f.write_str("async"),
        }
    }
}

/// One hop of a quoted route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteLeg {
    pub venue: String,
    pub market_key: Option<String>,
    #[serde(with = "pubkey_string")]
    pub input_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
}

/// Server-computed, time-bounded quote.
///
/// `min_out_amount` is the slippage floor enforced on-chain; a quote whose
/// `out_amount` is below it is rejected by [`QuoteResponse::ensure_valid`].
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    #[serde(with = "pubkey_string")]
    pub input_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub min_out_amount: u64,
    pub slippage_bps: Option<u16>,
    pub price_impact_pct: Option<String>,
    pub route: Vec<RouteLeg>,
    pub execution_mode: ExecutionMode,
    /// Base64 unsigned transaction, when the endpoint returns one
    #[serde(skip)]
    pub transaction: Option<String>,
    pub last_valid_block_height: Option<u64>,
    pub context_slot: Option<u64>,
    pub received_at: DateTime<Utc>,
    /// Server JSON as received; echoed back to `/swap` and `/submit-intent`
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl QuoteResponse {
    /// Enforce the quote contract: a non-empty route and `out >= min_out`.
    pub fn ensure_valid(self) -> Result<Self, QuoteError> {
        if self.route.is_empty() {
            return Err(QuoteError::NoRouteFound {
                input_mint: self.input_mint.to_string(),
                output_mint: self.output_mint.to_string(),
            });
        }
        if self.out_amount < self.min_out_amount {
            return Err(QuoteError::InvalidQuote(format!(
                "outAmount {} is below minOutAmount {}",
                self.out_amount, self.min_out_amount
            )));
        }
        if self.in_amount == 0 {
            return Err(QuoteError::InvalidQuote("inAmount is zero".to_string()));
        }
        Ok(self)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.received_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    pub fn ensure_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Result<(), QuoteError> {
        if self.is_stale(now, ttl) {
            return Err(QuoteError::Stale { age_ms: self.age(now).num_milliseconds() });
        }
        Ok(())
    }
}
