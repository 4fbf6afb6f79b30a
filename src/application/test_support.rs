//! Scripted port implementations for tests

use async_trait::async_trait;
use chrono::Utc;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::clock::Sleeper;
use crate::domain::execution::{Fill, IntentStatus};
use crate::domain::quote::{ExecutionMode, QuoteRequest, QuoteResponse, RouteLeg};
use crate::domain::redemption::MarketSnapshot;
use crate::exchanges::{MarketDataApi, OrderStatusSnapshot, QuoteApiClient};
use crate::infrastructure::blockchain::{ChainRpc, ConfirmationLevel, SignatureStatus, TransactionBuilder};
use crate::shared::errors::{ApiError, QuoteError, RpcError, SubmissionError};
use crate::shared::types::{Amount, TokenHolding};

/// Pops scripted responses; the last one repeats
fn next_scripted<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Unsigned SOL transfer paid by `payer`, base64 encoded
pub fn unsigned_payload(payer: &Pubkey) -> String {
    let tx = TransactionBuilder::build_sol_transfer(payer, &Pubkey::new_unique(), 5_000, Hash::new_unique()).unwrap();
    TransactionBuilder::encode(&tx).unwrap()
}

pub fn quote_for(request: &QuoteRequest, out_amount: u64, mode: ExecutionMode, payload: Option<String>) -> QuoteResponse {
    QuoteResponse {
        input_mint: request.input_mint,
        output_mint: request.output_mint,
        in_amount: request.amount,
        out_amount,
        min_out_amount: out_amount * 98 / 100,
        slippage_bps: Some(200),
        price_impact_pct: None,
        route: vec![RouteLeg {
            venue: "Kalshi".to_string(),
            market_key: None,
            input_mint: request.input_mint,
            output_mint: request.output_mint,
            in_amount: request.amount,
            out_amount,
        }],
        execution_mode: mode,
        transaction: payload,
        last_valid_block_height: Some(1_000),
        context_slot: Some(10),
        received_at: Utc::now(),
        raw: serde_json::json!({ "inAmount": request.amount.to_string() }),
    }
}

pub fn intent_status(status: IntentStatus, fills: Vec<Fill>) -> Result<OrderStatusSnapshot, ApiError> {
    Ok(OrderStatusSnapshot {
        status: Some(status),
        raw_status: status.as_str().to_string(),
        fills,
    })
}

/// Trade API double. Quotes are produced from the request so amounts echo back.
pub struct MockTradeApi {
    pub out_amount: u64,
    pub mode: ExecutionMode,
    pub payload: Option<String>,
    pub quote_error: Mutex<Option<QuoteError>>,
    pub submit_result: Mutex<Result<String, SubmissionError>>,
    pub statuses: Mutex<VecDeque<Result<OrderStatusSnapshot, ApiError>>>,
    pub requests: Mutex<Vec<QuoteRequest>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl MockTradeApi {
    pub fn new(out_amount: u64, mode: ExecutionMode, payload: Option<String>) -> Self {
        Self {
            out_amount,
            mode,
            payload,
            quote_error: Mutex::new(None),
            submit_result: Mutex::new(Ok("intent-sig".to_string())),
            statuses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script_statuses(&self, statuses: Vec<Result<OrderStatusSnapshot, ApiError>>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn quote(&self, call: &'static str, request: &QuoteRequest, mode: ExecutionMode) -> Result<QuoteResponse, QuoteError> {
        self.calls.lock().unwrap().push(call);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.quote_error.lock().unwrap().clone() {
            return Err(err);
        }
        quote_for(request, self.out_amount, mode, self.payload.clone()).ensure_valid()
    }
}

#[async_trait]
impl QuoteApiClient for MockTradeApi {
    async fn get_order(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        self.quote("order", request, self.mode)
    }

    async fn get_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let mut quote = self.quote("quote", request, ExecutionMode::Sync)?;
        quote.transaction = None;
        Ok(quote)
    }

    async fn build_swap(&self, _quote: &QuoteResponse, _user: &Pubkey) -> Result<String, QuoteError> {
        self.calls.lock().unwrap().push("swap");
        self.payload
            .clone()
            .ok_or_else(|| QuoteError::InvalidQuote("no payload scripted".to_string()))
    }

    async fn get_intent(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        self.quote("intent", request, ExecutionMode::Async)
    }

    async fn submit_intent(&self, _quote: &QuoteResponse, _signed: &str) -> Result<String, SubmissionError> {
        self.calls.lock().unwrap().push("submit-intent");
        self.submit_result.lock().unwrap().clone()
    }

    async fn order_status(&self, _signature: &str) -> Result<OrderStatusSnapshot, ApiError> {
        self.calls.lock().unwrap().push("order-status");
        next_scripted(&self.statuses).unwrap_or_else(|| Err(ApiError::Transport("nothing scripted".to_string())))
    }
}

/// Chain double. An `Ok("")` send result echoes the transaction's first signature.
pub struct MockChainRpc {
    pub send_result: Mutex<Result<String, SubmissionError>>,
    pub statuses: Mutex<VecDeque<Result<Option<SignatureStatus>, RpcError>>>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
    pub lamports: Mutex<HashMap<Pubkey, u64>>,
    pub token_balances: Mutex<HashMap<Pubkey, Amount>>,
    pub holdings: Mutex<HashMap<Pubkey, Vec<TokenHolding>>>,
    pub failing_programs: Mutex<HashSet<Pubkey>>,
}

impl Default for MockChainRpc {
    fn default() -> Self {
        Self {
            send_result: Mutex::new(Ok(String::new())),
            statuses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            lamports: Mutex::new(HashMap::new()),
            token_balances: Mutex::new(HashMap::new()),
            holdings: Mutex::new(HashMap::new()),
            failing_programs: Mutex::new(HashSet::new()),
        }
    }
}

impl MockChainRpc {
    pub fn script_statuses(&self, statuses: Vec<Result<Option<SignatureStatus>, RpcError>>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

pub fn landed(slot: u64, confirmation: ConfirmationLevel) -> Result<Option<SignatureStatus>, RpcError> {
    Ok(Some(SignatureStatus {
        slot,
        confirmation,
        err: None,
    }))
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        Ok(Hash::new_unique())
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<String, SubmissionError> {
        self.sent.lock().unwrap().push(transaction.clone());
        match self.send_result.lock().unwrap().clone() {
            Ok(sig) if sig.is_empty() => Ok(transaction.signatures[0].to_string()),
            other => other,
        }
    }

    async fn signature_status(&self, _signature: &str) -> Result<Option<SignatureStatus>, RpcError> {
        next_scripted(&self.statuses).unwrap_or(Ok(None))
    }

    async fn balance(&self, owner: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.lamports.lock().unwrap().get(owner).copied().unwrap_or(0))
    }

    async fn token_account_balance(&self, token_account: &Pubkey) -> Result<Amount, RpcError> {
        self.token_balances
            .lock()
            .unwrap()
            .get(token_account)
            .copied()
            .ok_or_else(|| RpcError::Request(format!("could not find account {}", token_account)))
    }

    async fn token_accounts_by_owner(
        &self,
        _owner: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<Vec<TokenHolding>, RpcError> {
        if self.failing_programs.lock().unwrap().contains(token_program) {
            return Err(RpcError::Request("node unavailable".to_string()));
        }
        Ok(self.holdings.lock().unwrap().get(token_program).cloned().unwrap_or_default())
    }
}

/// Metadata double keyed by outcome mint
#[derive(Default)]
pub struct MockMarketData {
    pub markets: Mutex<HashMap<Pubkey, MarketSnapshot>>,
    pub failing: Mutex<HashSet<Pubkey>>,
}

impl MockMarketData {
    pub fn insert(&self, market: MarketSnapshot) {
        let mut markets = self.markets.lock().unwrap();
        for account in &market.accounts {
            markets.insert(account.yes_mint, market.clone());
            markets.insert(account.no_mint, market.clone());
        }
    }
}

#[async_trait]
impl MarketDataApi for MockMarketData {
    async fn market_by_mint(&self, mint: &Pubkey) -> Result<MarketSnapshot, ApiError> {
        if self.failing.lock().unwrap().contains(mint) {
            return Err(ApiError::Transport("connection reset".to_string()));
        }
        self.markets.lock().unwrap().get(mint).cloned().ok_or(ApiError::Upstream {
            status: 404,
            body: "market not found".to_string(),
        })
    }

    async fn filter_outcome_mints(&self, mints: &[Pubkey]) -> Result<Vec<Pubkey>, ApiError> {
        let markets = self.markets.lock().unwrap();
        Ok(mints.iter().filter(|m| markets.contains_key(m)).copied().collect())
    }
}
