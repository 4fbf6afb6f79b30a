//! Trade façade: quote, sign, submit, monitor, report

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::async_monitor::AsyncOrderMonitor;
use super::clock::{PollSchedule, Sleeper};
use super::sync_monitor::{ConfirmationResult, SubmissionMonitor};
use crate::domain::execution::{Order, TradeRequest, TradeResult, TradeRoute, TradeStatus};
use crate::domain::price::{Price, PriceSource};
use crate::domain::quote::{ExecutionMode, QuoteResponse};
use crate::exchanges::QuoteApiClient;
use crate::infrastructure::blockchain::{ChainRpc, ConfirmationLevel, TransactionBuilder, WalletSigner};
use crate::shared::errors::{SignerError, SubmissionError, TradeFailure};
use crate::shared::utils::short_id;

/// Per-call monitoring knobs
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub sync: PollSchedule,
    pub intent: PollSchedule,
    /// Quotes older than this are not signed
    pub quote_ttl: chrono::Duration,
}

pub struct TradeExecutor {
    api: Arc<dyn QuoteApiClient>,
    submission: SubmissionMonitor,
    intents: AsyncOrderMonitor,
    prices: Option<Arc<dyn PriceSource>>,
}

impl TradeExecutor {
    pub fn new(api: Arc<dyn QuoteApiClient>, rpc: Arc<dyn ChainRpc>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            submission: SubmissionMonitor::new(rpc, sleeper.clone()),
            intents: AsyncOrderMonitor::new(api.clone(), sleeper),
            api,
            prices: None,
        }
    }

    pub fn with_confirmation_level(mut self, level: ConfirmationLevel) -> Self {
        self.submission = self.submission.with_target(level);
        self
    }

    pub fn with_price_source(mut self, prices: Arc<dyn PriceSource>) -> Self {
        self.prices = Some(prices);
        self
    }

    fn reference_price(&self, request: &TradeRequest) -> Option<Price> {
        let ticker = request.market_ticker.as_deref()?;
        let price = self.prices.as_ref()?.get_price(ticker);
        if let Some(p) = &price {
            debug!("Reference price {}: yes={} no={} bps", p.ticker, p.yes_bps, p.no_bps);
        }
        price
    }

    /// Run one order to a terminal result. Never retries or resubmits.
    pub async fn execute_trade(
        &self,
        request: &TradeRequest,
        signer: &dyn WalletSigner,
        options: &MonitorOptions,
    ) -> TradeResult {
        let mut order = Order::new();
        info!(
            "🎯 Order {}: {} {} -> {} via {}",
            order.id, request.quote.amount, request.quote.input_mint, request.quote.output_mint, request.route
        );
        let reference = self.reference_price(request);

        let result = self.run(&mut order, request, signer, options).await;
        let result = result.with_reference_price(reference);

        match result.status {
            TradeStatus::Filled | TradeStatus::PartiallyFilled => info!(
                "✅ Order {} {:?}: in={} out={} sig={}",
                order.id,
                result.status,
                result.in_amount,
                result.out_amount,
                result.signature.as_deref().map(short_id).unwrap_or_default()
            ),
            TradeStatus::Unknown => warn!(
                "⚠️ Order {} status unknown: {}",
                order.id,
                result.failure.as_ref().map(TradeFailure::user_message).unwrap_or_default()
            ),
            TradeStatus::Failed => error!(
                "❌ Order {} failed: {}",
                order.id,
                result.failure.as_ref().map(ToString::to_string).unwrap_or_default()
            ),
        }
        result
    }

    async fn run(
        &self,
        order: &mut Order,
        request: &TradeRequest,
        signer: &dyn WalletSigner,
        options: &MonitorOptions,
    ) -> TradeResult {
        let order_id = order.id;
        let pre_trade = |failure: TradeFailure| TradeResult::pre_trade(order_id, &request.quote, failure);

        if !signer.can_sign() {
            return pre_trade(
                SignerError::SignerUnavailable {
                    address: signer.address().to_string(),
                }
                .into(),
            );
        }

        let quote_request = request.quote.clone().with_user(signer.address());
        let quote = match self.api.request_quote(&quote_request, request.route).await {
            Ok(quote) => quote,
            Err(e) => return pre_trade(e.into()),
        };
        if let Err(e) = quote.ensure_fresh(Utc::now(), options.quote_ttl) {
            return pre_trade(e.into());
        }

        let payload = match self.unsigned_payload(request.route, &quote, signer).await {
            Ok(payload) => payload,
            Err(failure) => return pre_trade(failure),
        };
        if let Err(e) = order.mark_quoted(quote.execution_mode, quote.in_amount) {
            return pre_trade(TradeFailure::pre_trade(e.to_string()));
        }

        let signed = match TransactionBuilder::sign(&payload, signer) {
            Ok(signed) => signed,
            Err(e) => return pre_trade(e.into()),
        };
        if let Err(e) = order.mark_signed(signed.signature.clone()) {
            return pre_trade(TradeFailure::pre_trade(e.to_string()));
        }

        let submitted = match request.route {
            TradeRoute::Declarative => self.api.submit_intent(&quote, &signed.encoded).await,
            _ => self.submission.submit(&signed).await,
        };
        let signature = match submitted {
            Ok(signature) => signature,
            Err(e) => return TradeResult::unsuccessful(order, &quote, submission_failure(e, &signed.signature)),
        };
        if let Err(e) = order.mark_submitted(Some(signature.clone())) {
            warn!("Order {} bookkeeping after submit: {}", order.id, e);
        }

        match quote.execution_mode {
            ExecutionMode::Sync => self.settle_sync(order, &quote, &signature, options.sync).await,
            ExecutionMode::Async => self.settle_async(order, &quote, &signature, options.intent).await,
        }
    }

    async fn unsigned_payload(
        &self,
        route: TradeRoute,
        quote: &QuoteResponse,
        signer: &dyn WalletSigner,
    ) -> Result<String, TradeFailure> {
        if route == TradeRoute::Imperative {
            return self
                .api
                .build_swap(quote, &signer.address())
                .await
                .map_err(TradeFailure::from);
        }
        quote
            .transaction
            .clone()
            .ok_or_else(|| TradeFailure::pre_trade("quote carries no transaction"))
    }

    async fn settle_sync(
        &self,
        order: &mut Order,
        quote: &QuoteResponse,
        signature: &str,
        schedule: PollSchedule,
    ) -> TradeResult {
        match self.submission.monitor_sync(signature, schedule).await {
            ConfirmationResult::Confirmed { slot, .. } => {
                if let Err(e) = order.settle_sync(true) {
                    warn!("Order {} bookkeeping: {}", order.id, e);
                }
                TradeResult::settled(order, quote, Some(slot))
            }
            ConfirmationResult::Failed { reason, .. } => {
                if let Err(e) = order.settle_sync(false) {
                    warn!("Order {} bookkeeping: {}", order.id, e);
                }
                TradeResult::unsuccessful(
                    order,
                    quote,
                    TradeFailure::OnChainFailure {
                        signature: signature.to_string(),
                        reason,
                    },
                )
            }
            ConfirmationResult::TimedOut { attempts, last_level } => TradeResult::unsuccessful(
                order,
                quote,
                TradeFailure::PostSubmissionUnknown {
                    signature: signature.to_string(),
                    last_status: last_level.map(|l| l.to_string()).unwrap_or_else(|| "not found".to_string()),
                    attempts,
                },
            ),
        }
    }

    async fn settle_async(
        &self,
        order: &mut Order,
        quote: &QuoteResponse,
        signature: &str,
        schedule: PollSchedule,
    ) -> TradeResult {
        let order_id = order.id;
        let state = self
            .intents
            .monitor_order(order, signature, schedule, |snapshot| {
                debug!(
                    "Order {} poll {}: {} fills={} in={} out={}",
                    order_id, snapshot.attempt, snapshot.status, snapshot.fills, snapshot.total_in, snapshot.total_out
                );
            })
            .await;

        if state.timed_out {
            return TradeResult::unsuccessful(
                order,
                quote,
                TradeFailure::PostSubmissionUnknown {
                    signature: signature.to_string(),
                    last_status: state.status.to_string(),
                    attempts: state.attempts,
                },
            );
        }
        if state.status.is_failure() {
            return TradeResult::unsuccessful(
                order,
                quote,
                TradeFailure::OnChainFailure {
                    signature: signature.to_string(),
                    reason: format!("intent {}", state.status),
                },
            );
        }
        TradeResult::settled(order, quote, None)
    }
}

fn submission_failure(err: SubmissionError, local_signature: &str) -> TradeFailure {
    match err {
        SubmissionError::Transport(reason) => TradeFailure::Submission {
            reason,
            signature: Some(local_signature.to_string()),
        },
        SubmissionError::Rejected(reason) => TradeFailure::OnChainFailure {
            signature: local_signature.to_string(),
            reason,
        },
    }
}
