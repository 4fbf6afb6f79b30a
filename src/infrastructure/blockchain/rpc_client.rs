//! Solana JSON-RPC port and its nonblocking client implementation

use async_trait::async_trait;
use serde::Serialize;
use solana_account_decoder::UiAccountData;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::{RpcError as RpcRequestError, TokenAccountsFilter};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::str::FromStr;
use tracing::debug;

use crate::shared::errors::{RpcError, SubmissionError};
use crate::shared::types::{Amount, TokenHolding};

/// Commitment reached by a transaction, ordered weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "processed" => Some(ConfirmationLevel::Processed),
            "confirmed" => Some(ConfirmationLevel::Confirmed),
            "finalized" => Some(ConfirmationLevel::Finalized),
            _ => None,
        }
    }

    pub fn commitment(&self) -> CommitmentConfig {
        match self {
            ConfirmationLevel::Processed => CommitmentConfig::processed(),
            ConfirmationLevel::Confirmed => CommitmentConfig::confirmed(),
            ConfirmationLevel::Finalized => CommitmentConfig::finalized(),
        }
    }
}

impl Default for ConfirmationLevel {
    fn default() -> Self {
        ConfirmationLevel::Confirmed
    }
}

impl std::fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationLevel::Processed => f.write_str("processed"),
            ConfirmationLevel::Confirmed => f.write_str("confirmed"),
            ConfirmationLevel::Finalized => f.write_str("finalized"),
        }
    }
}

impl From<&TransactionConfirmationStatus> for ConfirmationLevel {
    fn from(status: &TransactionConfirmationStatus) -> Self {
        match status {
            TransactionConfirmationStatus::Processed => ConfirmationLevel::Processed,
            TransactionConfirmationStatus::Confirmed => ConfirmationLevel::Confirmed,
            TransactionConfirmationStatus::Finalized => ConfirmationLevel::Finalized,
        }
    }
}

/// One `getSignatureStatuses` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation: ConfirmationLevel,
    /// Execution error, when the transaction landed and failed
    pub err: Option<String>,
}

/// Chain access used by the engine
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Send once with preflight; never retried here
    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<String, SubmissionError>;

    /// `None` while the cluster has not seen the signature
    async fn signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, RpcError>;

    /// Lamports held by `owner`
    async fn balance(&self, owner: &Pubkey) -> Result<u64, RpcError>;

    async fn token_account_balance(&self, token_account: &Pubkey) -> Result<Amount, RpcError>;

    async fn token_accounts_by_owner(&self, owner: &Pubkey, token_program: &Pubkey)
        -> Result<Vec<TokenHolding>, RpcError>;
}

/// Solana RPC client wrapper
pub struct SolanaRpcClient {
    client: RpcClient,
    preflight: CommitmentLevel,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: String, commitment: ConfirmationLevel) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url, commitment.commitment()),
            preflight: commitment.commitment().commitment,
        }
    }

    /// Create default client (mainnet)
    pub fn new_mainnet() -> Self {
        Self::new("https://api.mainnet-beta.solana.com".to_string(), ConfirmationLevel::Confirmed)
    }
}

fn request_error(context: &str, err: ClientError) -> RpcError {
    RpcError::Request(format!("{}: {}", context, err))
}

/// Preflight and node rejections are explicit; everything else is transport
fn classify_send_error(err: ClientError) -> SubmissionError {
    match err.kind() {
        ClientErrorKind::RpcError(RpcRequestError::RpcResponseError { message, .. }) => {
            SubmissionError::Rejected(message.clone())
        }
        ClientErrorKind::TransactionError(tx_err) => SubmissionError::Rejected(tx_err.to_string()),
        ClientErrorKind::SigningError(e) => SubmissionError::Rejected(e.to_string()),
        _ => SubmissionError::Transport(err.to_string()),
    }
}

fn amount_from_parts(amount: &str, decimals: u8) -> Result<Amount, RpcError> {
    amount
        .parse::<u64>()
        .map(|value| Amount::new(value, decimals))
        .map_err(|e| RpcError::Decode(format!("token amount '{}': {}", amount, e)))
}

/// Read `(mint, amount)` out of a `jsonParsed` token account
pub fn parse_token_account_info(parsed: &serde_json::Value) -> Result<(Pubkey, Amount), RpcError> {
    let info = parsed
        .get("info")
        .ok_or_else(|| RpcError::Decode("token account without info".to_string()))?;
    let mint = info
        .get("mint")
        .and_then(|m| m.as_str())
        .ok_or_else(|| RpcError::Decode("token account without mint".to_string()))?;
    let mint = Pubkey::from_str(mint).map_err(|e| RpcError::Decode(format!("mint '{}': {}", mint, e)))?;

    let token_amount = info
        .get("tokenAmount")
        .ok_or_else(|| RpcError::Decode("token account without tokenAmount".to_string()))?;
    let raw = token_amount
        .get("amount")
        .and_then(|a| a.as_str())
        .ok_or_else(|| RpcError::Decode("tokenAmount without amount".to_string()))?;
    let decimals = token_amount
        .get("decimals")
        .and_then(|d| d.as_u64())
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| RpcError::Decode("tokenAmount without decimals".to_string()))?;

    Ok((mint, amount_from_parts(raw, decimals)?))
}

#[async_trait]
impl ChainRpc for SolanaRpcClient {
    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| request_error("Failed to get latest blockhash", e))
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<String, SubmissionError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.preflight),
            ..RpcSendTransactionConfig::default()
        };
        let signature = self
            .client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(classify_send_error)?;
        Ok(signature.to_string())
    }

    async fn signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, RpcError> {
        let parsed = Signature::from_str(signature)
            .map_err(|e| RpcError::Request(format!("invalid signature '{}': {}", signature, e)))?;
        let response = self
            .client
            .get_signature_statuses(&[parsed])
            .await
            .map_err(|e| request_error("Failed to get signature status", e))?;

        let Some(status) = response.value.into_iter().next().flatten() else {
            return Ok(None);
        };
        let confirmation = match (&status.confirmation_status, status.confirmations) {
            (Some(level), _) => ConfirmationLevel::from(level),
            (None, None) => ConfirmationLevel::Finalized,
            (None, Some(_)) => ConfirmationLevel::Processed,
        };
        debug!("Signature {} at slot {} ({})", signature, status.slot, confirmation);
        Ok(Some(SignatureStatus {
            slot: status.slot,
            confirmation,
            err: status.err.map(|e| e.to_string()),
        }))
    }

    async fn balance(&self, owner: &Pubkey) -> Result<u64, RpcError> {
        self.client
            .get_balance(owner)
            .await
            .map_err(|e| request_error("Failed to get balance", e))
    }

    async fn token_account_balance(&self, token_account: &Pubkey) -> Result<Amount, RpcError> {
        let balance = self
            .client
            .get_token_account_balance(token_account)
            .await
            .map_err(|e| request_error("Failed to get token account balance", e))?;
        amount_from_parts(&balance.amount, balance.decimals)
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<Vec<TokenHolding>, RpcError> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(*token_program))
            .await
            .map_err(|e| request_error("Failed to get token accounts", e))?;

        let mut holdings = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            let token_account = Pubkey::from_str(&keyed.pubkey)
                .map_err(|e| RpcError::Decode(format!("token account '{}': {}", keyed.pubkey, e)))?;
            let UiAccountData::Json(parsed) = &keyed.account.data else {
                return Err(RpcError::Decode(format!("token account {} is not jsonParsed", token_account)));
            };
            let (mint, amount) = parse_token_account_info(&parsed.parsed)?;
            holdings.push(TokenHolding {
                token_account,
                mint,
                token_program: *token_program,
                amount,
            });
        }
        Ok(holdings)
    }
}
