//! Error handling for the settlement engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount parsing and arithmetic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("amount has more than {decimals} fractional digits")]
    TooPrecise { decimals: u8 },

    #[error("amount overflow")]
    Overflow,

    #[error("amount underflow")]
    Underflow,

    #[error("decimals mismatch: {left} vs {right}")]
    DecimalsMismatch { left: u8, right: u8 },
}

/// Errors talking to the trade / metadata HTTP services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Quote client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("invalid quote request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no route found for {input_mint} -> {output_mint}")]
    NoRouteFound { input_mint: String, output_mint: String },

    #[error("invalid quote: {0}")]
    InvalidQuote(String),

    #[error("quote is stale ({age_ms} ms old)")]
    Stale { age_ms: i64 },
}

/// Wallet and transaction signing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("no private key bound to wallet {address}")]
    SignerUnavailable { address: String },

    #[error("invalid transaction payload: {0}")]
    InvalidPayload(String),

    #[error("wallet {address} is not a required signer of this transaction")]
    NotARequiredSigner { address: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Failures sending a signed transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// Read-side RPC failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("rpc request failed: {0}")]
    Request(String),

    #[error("unexpected rpc response: {0}")]
    Decode(String),
}

/// Order lifecycle violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("invalid order transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("fill of {attempted} would exceed requested input {requested} (already filled {filled})")]
    OverFill { requested: u64, filled: u64, attempted: u64 },

    #[error("fill totals overflow")]
    Overflow,
}

/// Redemption resolver errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedemptionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("{mint} is not an outcome mint of market {market}")]
    UnknownOutcomeMint { mint: String, market: String },

    #[error("market {market} has no settlement account for {settlement_mint}")]
    SettlementAccountMissing { market: String, settlement_mint: String },

    #[error("{mint} is not redeemable: {reason}")]
    NotRedeemable { mint: String, reason: String },
}

/// Direct transfer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("invalid transfer: {0}")]
    Invalid(String),

    #[error("failed to build transfer instruction: {0}")]
    Build(String),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Send failed in transit; the transaction may still land under `signature`
    #[error("transfer {signature} may have been sent: {reason}")]
    Transport { signature: String, reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Caller-facing classification of an unsuccessful trade.
///
/// The split that matters is whether a signature exists: everything after
/// submission carries it so the caller can check chain state before acting.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeFailure {
    /// Nothing was sent; no funds at risk.
    #[error("pre-trade failure: {reason}")]
    PreTrade { reason: String },

    /// Sending failed at the transport layer.
    #[error("submission failed: {reason}")]
    Submission {
        reason: String,
        signature: Option<String>,
    },

    /// Monitoring ran out of attempts without a terminal state.
    #[error("trade {signature} status unknown after {attempts} polls (last status: {last_status})")]
    PostSubmissionUnknown {
        signature: String,
        last_status: String,
        attempts: u32,
    },

    /// The chain or settlement service explicitly rejected the order.
    #[error("trade {signature} failed: {reason}")]
    OnChainFailure { signature: String, reason: String },
}

impl TradeFailure {
    pub fn pre_trade(reason: impl Into<String>) -> Self {
        TradeFailure::PreTrade { reason: reason.into() }
    }

    /// Signature the caller must verify before retrying, if one exists.
    pub fn signature(&self) -> Option<&str> {
        match self {
            TradeFailure::PreTrade { .. } => None,
            TradeFailure::Submission { signature, .. } => signature.as_deref(),
            TradeFailure::PostSubmissionUnknown { signature, .. }
            | TradeFailure::OnChainFailure { signature, .. } => Some(signature),
        }
    }

    /// Whether a caller may retry with a fresh quote without first
    /// inspecting chain state.
    pub fn is_retry_safe(&self) -> bool {
        !matches!(self, TradeFailure::PostSubmissionUnknown { .. })
    }

    /// Message an agent should surface to its user.
    pub fn user_message(&self) -> String {
        match self {
            TradeFailure::PostSubmissionUnknown { signature, .. } => {
                format!("trade status uncertain, check wallet (signature {})", signature)
            }
            other => other.to_string(),
        }
    }
}

impl From<QuoteError> for TradeFailure {
    fn from(err: QuoteError) -> Self {
        TradeFailure::pre_trade(err.to_string())
    }
}

impl From<SignerError> for TradeFailure {
    fn from(err: SignerError) -> Self {
        TradeFailure::pre_trade(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_distinct_from_on_chain_failure() {
        let unknown = TradeFailure::PostSubmissionUnknown {
            signature: "sig".to_string(),
            last_status: "open".to_string(),
            attempts: 5,
        };
        let failed = TradeFailure::OnChainFailure {
            signature: "sig".to_string(),
            reason: "openFailed".to_string(),
        };

        assert_ne!(unknown, failed);
        assert!(!unknown.is_retry_safe());
        assert!(failed.is_retry_safe());
        assert_eq!(unknown.signature(), Some("sig"));
        assert!(unknown.user_message().starts_with("trade status uncertain"));
    }

    #[test]
    fn test_pre_trade_conversions_carry_no_signature() {
        let failure: TradeFailure = QuoteError::NoRouteFound {
            input_mint: "A".to_string(),
            output_mint: "B".to_string(),
        }
        .into();
        assert!(matches!(failure, TradeFailure::PreTrade { .. }));
        assert_eq!(failure.signature(), None);

        let failure: TradeFailure = SignerError::SignerUnavailable { address: "W".to_string() }.into();
        assert!(failure.to_string().contains("no private key"));
    }

    #[test]
    fn test_failure_serializes_with_kind_tag() {
        let failure = TradeFailure::Submission {
            reason: "connection reset".to_string(),
            signature: None,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "submission");
    }
}
