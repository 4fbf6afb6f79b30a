//! Common types used across the engine

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

use crate::shared::errors::AmountError;
use crate::shared::utils::pubkey_string;

/// Decimals of native SOL (lamports)
pub const SOL_DECIMALS: u8 = 9;
/// Decimals of USDC and of every prediction-market outcome token
pub const USDC_DECIMALS: u8 = 6;
pub const OUTCOME_TOKEN_DECIMALS: u8 = 6;

/// USDC mint on mainnet
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
/// Wrapped SOL mint
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
/// Token-2022 program id
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Fixed-point token amount: raw integer units plus the mint's decimals.
///
/// All arithmetic stays in integers. Human-readable strings are produced
/// by [`Amount::to_ui_string`] and parsed by [`Amount::parse_ui`] without
/// going through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub value: u64,
    pub decimals: u8,
}

impl Amount {
    pub fn new(value: u64, decimals: u8) -> Self {
        Self { value, decimals }
    }

    pub fn zero(decimals: u8) -> Self {
        Self { value: 0, decimals }
    }

    pub fn from_lamports(value: u64) -> Self {
        Self { value, decimals: SOL_DECIMALS }
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.ensure_same_scale(other)?;
        let value = self.value.checked_add(other.value).ok_or(AmountError::Overflow)?;
        Ok(Amount::new(value, self.decimals))
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.ensure_same_scale(other)?;
        let value = self.value.checked_sub(other.value).ok_or(AmountError::Underflow)?;
        Ok(Amount::new(value, self.decimals))
    }

    /// Multiply by a basis-point fraction, rounding down.
    pub fn mul_bps(&self, bps: u16) -> Amount {
        let scaled = (self.value as u128 * bps as u128) / 10_000;
        // bps <= u16::MAX keeps this bounded by 6.5x the input; clamp anyway.
        Amount::new(u64::try_from(scaled).unwrap_or(u64::MAX), self.decimals)
    }

    fn ensure_same_scale(&self, other: &Amount) -> Result<(), AmountError> {
        if self.decimals != other.decimals {
            return Err(AmountError::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }

    /// Parse a decimal string such as `"10"` or `"0.25"` into raw units.
    pub fn parse_ui(input: &str, decimals: u8) -> Result<Amount, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::Invalid(input.to_string()));
        }
        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(AmountError::Invalid(input.to_string()));
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > decimals as usize {
            return Err(AmountError::TooPrecise { decimals });
        }

        let scale = 10u64.checked_pow(decimals as u32).ok_or(AmountError::Overflow)?;
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| AmountError::Overflow)?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = decimals as usize);
            padded.parse::<u64>().map_err(|_| AmountError::Overflow)?
        };

        let value = whole_units
            .checked_mul(scale)
            .and_then(|v| v.checked_add(fraction_units))
            .ok_or(AmountError::Overflow)?;
        Ok(Amount::new(value, decimals))
    }

    /// Exact decimal rendering, trailing zeros trimmed.
    pub fn to_ui_string(&self) -> String {
        if self.decimals == 0 {
            return self.value.to_string();
        }
        let value = self.value as u128;
        // u64 values sit entirely in the fraction past 38 decimals
        let (whole, fraction) = match 10u128.checked_pow(self.decimals as u32) {
            Some(scale) => (value / scale, value % scale),
            None => (0, value),
        };
        if fraction == 0 {
            return whole.to_string();
        }
        let fraction = format!("{:0>width$}", fraction, width = self.decimals as usize);
        format!("{}.{}", whole, fraction.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ui_string())
    }
}

/// A token account held by a wallet, as reported by `getTokenAccountsByOwner`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenHolding {
    #[serde(with = "pubkey_string")]
    pub token_account: Pubkey,
    #[serde(with = "pubkey_string")]
    pub mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub token_program: Pubkey,
    pub amount: Amount,
}
