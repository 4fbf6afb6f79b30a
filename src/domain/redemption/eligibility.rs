//! Redemption eligibility rules

use solana_sdk::pubkey::Pubkey;

use super::{
    MarketSnapshot, PayoutFraction, RedemptionEligibility, RedemptionStatus, SettlementAccount, Side,
    FULL_PAYOUT_BPS,
};
use crate::shared::errors::RedemptionError;

/// Decide whether `outcome_mint` is redeemable in `market`.
///
/// Redeemable iff the market is determined or finalized, the settlement
/// account's redemption status is open, and the held side pays out:
/// either the binary result matches it or a scalar outcome gives it a
/// payout above zero. When `settlement_mint` is `None` the first account
/// (by settlement mint) listing the outcome mint is used.
pub fn evaluate_eligibility(
    market: &MarketSnapshot,
    outcome_mint: &Pubkey,
    settlement_mint: Option<&Pubkey>,
) -> Result<RedemptionEligibility, RedemptionError> {
    let (account, side) = locate_account(market, outcome_mint, settlement_mint)?;

    let (payout, payout_issue) = side_payout(market, account, side);
    let mut reason = None;
    if !market.status.is_resolved() {
        reason = Some(format!("market status is {:?}", market.status).to_lowercase());
    } else if account.redemption_status != RedemptionStatus::Open {
        reason = Some(format!("redemption status is {:?}", account.redemption_status).to_lowercase());
    } else if payout.is_zero() {
        reason = Some(payout_issue.unwrap_or_else(|| format!("{} side pays nothing", side)));
    }

    Ok(RedemptionEligibility {
        outcome_mint: *outcome_mint,
        settlement_mint: account.settlement_mint,
        market_ticker: market.ticker.clone(),
        side,
        market_status: market.status.clone(),
        redemption_status: account.redemption_status.clone(),
        is_redeemable: reason.is_none(),
        payout,
        reason,
    })
}

fn locate_account<'a>(
    market: &'a MarketSnapshot,
    outcome_mint: &Pubkey,
    settlement_mint: Option<&Pubkey>,
) -> Result<(&'a SettlementAccount, Side), RedemptionError> {
    if let Some(settlement) = settlement_mint {
        let account = market
            .accounts
            .iter()
            .find(|a| a.settlement_mint == *settlement)
            .ok_or_else(|| RedemptionError::SettlementAccountMissing {
                market: market.ticker.clone(),
                settlement_mint: settlement.to_string(),
            })?;
        let side = account.side_of(outcome_mint).ok_or_else(|| RedemptionError::UnknownOutcomeMint {
            mint: outcome_mint.to_string(),
            market: market.ticker.clone(),
        })?;
        return Ok((account, side));
    }

    market
        .accounts
        .iter()
        .find_map(|a| a.side_of(outcome_mint).map(|side| (a, side)))
        .ok_or_else(|| RedemptionError::UnknownOutcomeMint {
            mint: outcome_mint.to_string(),
            market: market.ticker.clone(),
        })
}

/// Payout for `side`, plus a note when the outcome data is unusable
fn side_payout(market: &MarketSnapshot, account: &SettlementAccount, side: Side) -> (PayoutFraction, Option<String>) {
    if let Some(result) = market.result {
        let payout = if result == side { PayoutFraction::FULL } else { PayoutFraction::ZERO };
        return (payout, None);
    }

    match account.scalar_outcome_pct {
        Some(pct) if pct <= FULL_PAYOUT_BPS => {
            let bps = match side {
                Side::Yes => pct,
                Side::No => FULL_PAYOUT_BPS - pct,
            };
            (PayoutFraction::from_bps(bps).unwrap_or(PayoutFraction::ZERO), None)
        }
        Some(pct) => (PayoutFraction::ZERO, Some(format!("scalar outcome {} bps is out of range", pct))),
        None => (PayoutFraction::ZERO, Some("market has no result".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::redemption::MarketStatus;

    struct Fixture {
        usdc: Pubkey,
        yes: Pubkey,
        no: Pubkey,
    }

    fn fixture() -> Fixture {
        Fixture {
            usdc: Pubkey::new_unique(),
            yes: Pubkey::new_unique(),
            no: Pubkey::new_unique(),
        }
    }

    fn market(
        f: &Fixture,
        status: MarketStatus,
        result: Option<Side>,
        redemption: RedemptionStatus,
        scalar: Option<u16>,
    ) -> MarketSnapshot {
        MarketSnapshot {
            ticker: "KXTEST-26".to_string(),
            title: None,
            status,
            result,
            accounts: vec![SettlementAccount {
                settlement_mint: f.usdc,
                yes_mint: f.yes,
                no_mint: f.no,
                redemption_status: redemption,
                scalar_outcome_pct: scalar,
            }],
        }
    }

    #[test]
    fn test_winning_side_is_redeemable() {
        let f = fixture();
        let m = market(&f, MarketStatus::Determined, Some(Side::Yes), RedemptionStatus::Open, None);
        let e = evaluate_eligibility(&m, &f.yes, Some(&f.usdc)).unwrap();
        assert!(e.is_redeemable);
        assert_eq!(e.side, Side::Yes);
        assert_eq!(e.payout_pct(), 1.0);
        assert_eq!(e.reason, None);
    }

    #[test]
    fn test_yes_mint_on_no_result_is_not_redeemable() {
        let f = fixture();
        let m = market(&f, MarketStatus::Finalized, Some(Side::No), RedemptionStatus::Open, None);
        let e = evaluate_eligibility(&m, &f.yes, None).unwrap();
        assert!(!e.is_redeemable);
        assert_eq!(e.payout_pct(), 0.0);
        assert_eq!(e.payout, PayoutFraction::ZERO);

        let no = evaluate_eligibility(&m, &f.no, None).unwrap();
        assert!(no.is_redeemable);
        assert_eq!(no.side, Side::No);
    }

    #[test]
    fn test_scalar_outcome_pays_both_sides() {
        let f = fixture();
        let m = market(&f, MarketStatus::Determined, None, RedemptionStatus::Open, Some(7_500));

        let yes = evaluate_eligibility(&m, &f.yes, Some(&f.usdc)).unwrap();
        let no = evaluate_eligibility(&m, &f.no, Some(&f.usdc)).unwrap();
        assert!(yes.is_redeemable);
        assert!(no.is_redeemable);
        assert_eq!(yes.payout_pct(), 0.75);
        assert_eq!(no.payout_pct(), 0.25);
    }

    #[test]
    fn test_scalar_full_payout_leaves_other_side_empty() {
        let f = fixture();
        let m = market(&f, MarketStatus::Determined, None, RedemptionStatus::Open, Some(10_000));
        assert!(!evaluate_eligibility(&m, &f.no, None).unwrap().is_redeemable);

        let bad = market(&f, MarketStatus::Determined, None, RedemptionStatus::Open, Some(12_000));
        let e = evaluate_eligibility(&bad, &f.yes, None).unwrap();
        assert!(!e.is_redeemable);
        assert!(e.reason.unwrap().contains("out of range"));
    }

    #[test]
    fn test_unresolved_or_closed_redemption_blocks() {
        let f = fixture();
        let active = market(&f, MarketStatus::Active, Some(Side::Yes), RedemptionStatus::Open, None);
        let e = evaluate_eligibility(&active, &f.yes, None).unwrap();
        assert!(!e.is_redeemable);
        assert_eq!(e.payout, PayoutFraction::FULL);

        let pending = market(&f, MarketStatus::Determined, Some(Side::Yes), RedemptionStatus::Pending, None);
        let e = evaluate_eligibility(&pending, &f.yes, None).unwrap();
        assert!(!e.is_redeemable);
        assert!(e.reason.unwrap().contains("pending"));
    }

    #[test]
    fn test_unknown_mint_and_missing_settlement_account() {
        let f = fixture();
        let m = market(&f, MarketStatus::Determined, Some(Side::Yes), RedemptionStatus::Open, None);

        let stranger = Pubkey::new_unique();
        assert!(matches!(
            evaluate_eligibility(&m, &stranger, None),
            Err(RedemptionError::UnknownOutcomeMint { .. })
        ));
        assert!(matches!(
            evaluate_eligibility(&m, &f.yes, Some(&stranger)),
            Err(RedemptionError::SettlementAccountMissing { .. })
        ));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let f = fixture();
        let m = market(&f, MarketStatus::Determined, None, RedemptionStatus::Open, Some(4_200));
        let first = evaluate_eligibility(&m, &f.no, None).unwrap();
        let second = evaluate_eligibility(&m, &f.no, None).unwrap();
        assert_eq!(first, second);
    }
}
