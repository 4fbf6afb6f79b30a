//! Redemption domain - market resolution state and derived eligibility

mod eligibility;

pub use eligibility::evaluate_eligibility;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::fmt;

use crate::shared::types::{Amount, TokenHolding};
use crate::shared::utils::pubkey_string;

/// Full payout in basis points
pub const FULL_PAYOUT_BPS: u16 = 10_000;

/// Outcome side, derived from which mint is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Side::Yes),
            "no" => Some(Side::No),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => f.write_str("yes"),
            Side::No => f.write_str("no"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Initialized,
    Active,
    Inactive,
    Closed,
    Determined,
    Finalized,
    Other(String),
}

impl MarketStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "initialized" => MarketStatus::Initialized,
            "active" => MarketStatus::Active,
            "inactive" => MarketStatus::Inactive,
            "closed" => MarketStatus::Closed,
            "determined" => MarketStatus::Determined,
            "finalized" => MarketStatus::Finalized,
            other => MarketStatus::Other(other.to_string()),
        }
    }

    /// Resolution is known and redemption may open
    pub fn is_resolved(&self) -> bool {
        matches!(self, MarketStatus::Determined | MarketStatus::Finalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Open,
    Pending,
    Closed,
    Unknown,
}

impl RedemptionStatus {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "open" => RedemptionStatus::Open,
            Some(v) if v == "pending" => RedemptionStatus::Pending,
            Some(v) if v == "closed" => RedemptionStatus::Closed,
            _ => RedemptionStatus::Unknown,
        }
    }
}

/// Per-settlement-currency accounts of a market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementAccount {
    pub settlement_mint: Pubkey,
    pub yes_mint: Pubkey,
    pub no_mint: Pubkey,
    pub redemption_status: RedemptionStatus,
    /// Scalar resolution: YES payout in bps, NO receives the complement
    pub scalar_outcome_pct: Option<u16>,
}

impl SettlementAccount {
    pub fn side_of(&self, mint: &Pubkey) -> Option<Side> {
        if *mint == self.yes_mint {
            Some(Side::Yes)
        } else if *mint == self.no_mint {
            Some(Side::No)
        } else {
            None
        }
    }
}

/// Market state as read from the metadata service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub title: Option<String>,
    pub status: MarketStatus,
    /// Binary resolution, when the market resolved yes/no
    pub result: Option<Side>,
    /// Sorted by settlement mint
    pub accounts: Vec<SettlementAccount>,
}

/// Payout of one outcome token, in basis points of one settlement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PayoutFraction(u16);

impl PayoutFraction {
    pub const ZERO: PayoutFraction = PayoutFraction(0);
    pub const FULL: PayoutFraction = PayoutFraction(FULL_PAYOUT_BPS);

    pub fn from_bps(bps: u16) -> Option<Self> {
        (bps <= FULL_PAYOUT_BPS).then_some(PayoutFraction(bps))
    }

    pub fn bps(&self) -> u16 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Presentation only, e.g. `0.75`
    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / FULL_PAYOUT_BPS as f64
    }

    /// Settlement amount paid for `amount` outcome tokens, rounded down
    pub fn apply(&self, amount: Amount) -> Amount {
        amount.mul_bps(self.0)
    }
}

/// Derived per outcome mint; never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedemptionEligibility {
    #[serde(with = "pubkey_string")]
    pub outcome_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub settlement_mint: Pubkey,
    pub market_ticker: String,
    pub side: Side,
    pub market_status: MarketStatus,
    pub redemption_status: RedemptionStatus,
    pub is_redeemable: bool,
    /// Payout in bps
    pub payout: PayoutFraction,
    /// Why the position is not redeemable
    pub reason: Option<String>,
}

impl RedemptionEligibility {
    pub fn payout_pct(&self) -> f64 {
        self.payout.as_fraction()
    }
}

/// A held outcome token that can be redeemed now
#[derive(Debug, Clone, Serialize)]
pub struct RedeemablePosition {
    pub holding: TokenHolding,
    pub eligibility: RedemptionEligibility,
    /// Settlement currency expected back
    pub expected_payout: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_fraction() {
        assert_eq!(PayoutFraction::from_bps(7_500).unwrap().as_fraction(), 0.75);
        assert!(PayoutFraction::from_bps(10_001).is_none());
        assert_eq!(
            PayoutFraction::from_bps(2_500).unwrap().apply(Amount::new(10_000_000, 6)),
            Amount::new(2_500_000, 6)
        );
    }

    #[test]
    fn test_status_parsing() {
        assert!(MarketStatus::parse("Determined").is_resolved());
        assert!(MarketStatus::parse("finalized").is_resolved());
        assert!(!MarketStatus::parse("active").is_resolved());
        assert_eq!(MarketStatus::parse("settling"), MarketStatus::Other("settling".to_string()));
        assert_eq!(RedemptionStatus::parse(Some("open")), RedemptionStatus::Open);
        assert_eq!(RedemptionStatus::parse(None), RedemptionStatus::Unknown);
        assert_eq!(Side::parse("NO"), Some(Side::No));
        assert_eq!(Side::parse(""), None);
    }
}
