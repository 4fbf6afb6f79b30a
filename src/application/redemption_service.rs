//! Redemption of resolved outcome positions

use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::trade_executor::{MonitorOptions, TradeExecutor};
use crate::domain::execution::{TradeRequest, TradeResult, TradeRoute};
use crate::domain::quote::{QuoteRequest, QuoteResponse, Slippage};
use crate::domain::redemption::{evaluate_eligibility, RedeemablePosition, RedemptionEligibility};
use crate::exchanges::{MarketDataApi, QuoteApiClient};
use crate::infrastructure::blockchain::{ChainRpc, WalletSigner};
use crate::shared::errors::{RedemptionError, RpcError};
use crate::shared::types::{TokenHolding, TOKEN_2022_PROGRAM_ID};

pub struct RedemptionResolver {
    markets: Arc<dyn MarketDataApi>,
    trade_api: Arc<dyn QuoteApiClient>,
    rpc: Arc<dyn ChainRpc>,
    executor: Arc<TradeExecutor>,
}

impl RedemptionResolver {
    pub fn new(
        markets: Arc<dyn MarketDataApi>,
        trade_api: Arc<dyn QuoteApiClient>,
        rpc: Arc<dyn ChainRpc>,
        executor: Arc<TradeExecutor>,
    ) -> Self {
        Self {
            markets,
            trade_api,
            rpc,
            executor,
        }
    }

    /// Pure read against the current market state
    pub async fn check_eligibility(
        &self,
        outcome_mint: &Pubkey,
        settlement_mint: Option<&Pubkey>,
    ) -> Result<RedemptionEligibility, RedemptionError> {
        let market = self.markets.market_by_mint(outcome_mint).await?;
        let eligibility = evaluate_eligibility(&market, outcome_mint, settlement_mint)?;
        debug!(
            "Eligibility {} ({} {}): redeemable={} payout={}bps",
            outcome_mint,
            eligibility.market_ticker,
            eligibility.side,
            eligibility.is_redeemable,
            eligibility.payout.bps()
        );
        Ok(eligibility)
    }

    async fn require_redeemable(
        &self,
        outcome_mint: &Pubkey,
        settlement_mint: &Pubkey,
    ) -> Result<RedemptionEligibility, RedemptionError> {
        let eligibility = self.check_eligibility(outcome_mint, Some(settlement_mint)).await?;
        if !eligibility.is_redeemable {
            return Err(RedemptionError::NotRedeemable {
                mint: outcome_mint.to_string(),
                reason: eligibility.reason.unwrap_or_else(|| "not redeemable".to_string()),
            });
        }
        Ok(eligibility)
    }

    fn redemption_request(outcome_mint: &Pubkey, settlement_mint: &Pubkey, amount: u64) -> QuoteRequest {
        QuoteRequest::new(*outcome_mint, *settlement_mint, amount, Slippage::Auto)
    }

    /// Quote an outcome -> settlement swap through the order path
    pub async fn request_redemption_order(
        &self,
        outcome_mint: &Pubkey,
        settlement_mint: &Pubkey,
        amount: u64,
        wallet: &Pubkey,
    ) -> Result<QuoteResponse, RedemptionError> {
        self.require_redeemable(outcome_mint, settlement_mint).await?;
        let request = Self::redemption_request(outcome_mint, settlement_mint, amount).with_user(*wallet);
        let quote = self.trade_api.request_quote(&request, TradeRoute::Order).await?;
        info!(
            "🔍 Redemption order for {}: {} -> {} {}",
            outcome_mint, quote.in_amount, quote.out_amount, settlement_mint
        );
        Ok(quote)
    }

    /// Held positions that can be redeemed now, across both token programs
    pub async fn get_redeemable_positions(&self, wallet: &Pubkey) -> Result<Vec<RedeemablePosition>, RedemptionError> {
        let token_2022 = Pubkey::from_str(TOKEN_2022_PROGRAM_ID)
            .map_err(|e| RpcError::Decode(format!("token-2022 program id: {}", e)))?;

        let mut holdings: Vec<TokenHolding> = Vec::new();
        for program in [spl_token::id(), token_2022] {
            let accounts = self.rpc.token_accounts_by_owner(wallet, &program).await?;
            holdings.extend(accounts.into_iter().filter(|h| !h.amount.is_zero()));
        }
        if holdings.is_empty() {
            return Ok(Vec::new());
        }

        let mut mints: Vec<Pubkey> = holdings.iter().map(|h| h.mint).collect();
        mints.sort();
        mints.dedup();
        let outcome: HashSet<Pubkey> = self.markets.filter_outcome_mints(&mints).await?.into_iter().collect();
        let candidates: Vec<TokenHolding> = holdings.into_iter().filter(|h| outcome.contains(&h.mint)).collect();
        debug!("{} outcome position(s) held by {}", candidates.len(), wallet);

        let evaluations = join_all(candidates.into_iter().map(|holding| async move {
            let eligibility = self.check_eligibility(&holding.mint, None).await;
            (holding, eligibility)
        }))
        .await;

        let mut positions = Vec::new();
        for (holding, eligibility) in evaluations {
            match eligibility {
                Ok(eligibility) if eligibility.is_redeemable => {
                    let expected_payout = eligibility.payout.apply(holding.amount);
                    positions.push(RedeemablePosition {
                        holding,
                        eligibility,
                        expected_payout,
                    });
                }
                Ok(eligibility) => debug!(
                    "Skipping {}: {}",
                    holding.mint,
                    eligibility.reason.as_deref().unwrap_or("not redeemable")
                ),
                Err(e) => warn!("Skipping position {}: {}", holding.mint, e),
            }
        }
        info!("📦 {} redeemable position(s) for {}", positions.len(), wallet);
        Ok(positions)
    }

    /// Eligibility check, then the outcome -> settlement order through the trade façade
    pub async fn redeem(
        &self,
        outcome_mint: &Pubkey,
        settlement_mint: &Pubkey,
        amount: u64,
        signer: &dyn WalletSigner,
        options: &MonitorOptions,
    ) -> Result<TradeResult, RedemptionError> {
        let eligibility = self.require_redeemable(outcome_mint, settlement_mint).await?;
        info!(
            "Redeeming {} of {} ({} {}, payout {}bps)",
            amount,
            outcome_mint,
            eligibility.market_ticker,
            eligibility.side,
            eligibility.payout.bps()
        );
        let request = TradeRequest::new(Self::redemption_request(outcome_mint, settlement_mint, amount))
            .with_route(TradeRoute::Order)
            .with_market_ticker(eligibility.market_ticker);
        Ok(self.executor.execute_trade(&request, signer, options).await)
    }
}
