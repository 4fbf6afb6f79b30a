//! Balances and direct transfers for the configured wallet

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::clock::{PollSchedule, Sleeper};
use super::sync_monitor::{ConfirmationResult, SubmissionMonitor};
use crate::infrastructure::blockchain::{
    ChainRpc, ConfirmationLevel, SignedTransaction, TokenTransfer, TransactionBuilder, WalletSigner,
};
use crate::shared::errors::{RpcError, SignerError, SubmissionError, TransferError};
use crate::shared::types::{Amount, TokenHolding, TOKEN_2022_PROGRAM_ID};
use crate::shared::utils::short_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub signature: String,
    pub confirmation: ConfirmationResult,
}

pub struct WalletService {
    rpc: Arc<dyn ChainRpc>,
    monitor: SubmissionMonitor,
}

impl WalletService {
    pub fn new(rpc: Arc<dyn ChainRpc>, sleeper: Arc<dyn Sleeper>) -> Self {
        let monitor = SubmissionMonitor::new(rpc.clone(), sleeper);
        Self { rpc, monitor }
    }

    pub fn with_confirmation_level(mut self, level: ConfirmationLevel) -> Self {
        self.monitor = self.monitor.with_target(level);
        self
    }

    fn token_programs() -> Result<[Pubkey; 2], RpcError> {
        let token_2022 = Pubkey::from_str(TOKEN_2022_PROGRAM_ID)
            .map_err(|e| RpcError::Decode(format!("token-2022 program id: {}", e)))?;
        Ok([spl_token::id(), token_2022])
    }

    pub async fn sol_balance(&self, owner: &Pubkey) -> Result<Amount, RpcError> {
        Ok(Amount::from_lamports(self.rpc.balance(owner).await?))
    }

    /// Every token account of `owner` under both token programs
    pub async fn token_holdings(&self, owner: &Pubkey) -> Result<Vec<TokenHolding>, RpcError> {
        let mut holdings = Vec::new();
        for program in Self::token_programs()? {
            holdings.extend(self.rpc.token_accounts_by_owner(owner, &program).await?);
        }
        Ok(holdings)
    }

    /// Balance of the owner's associated token account for `mint`
    pub async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Result<Amount, RpcError> {
        let ata = get_associated_token_address_with_program_id(owner, mint, token_program);
        self.rpc.token_account_balance(&ata).await
    }

    pub async fn transfer_sol(
        &self,
        signer: &dyn WalletSigner,
        recipient: &Pubkey,
        lamports: u64,
        schedule: PollSchedule,
    ) -> Result<TransferReceipt, TransferError> {
        Self::require_signer(signer)?;
        let available = self.rpc.balance(&signer.address()).await?;
        if available < lamports {
            return Err(TransferError::Invalid(format!(
                "insufficient SOL: {} lamports available, {} requested",
                available, lamports
            )));
        }
        let blockhash = self.rpc.latest_blockhash().await?;
        let transaction = TransactionBuilder::build_sol_transfer(&signer.address(), recipient, lamports, blockhash)?;
        let signed = TransactionBuilder::sign_transaction(transaction, signer)?;
        self.send_and_confirm(&signed, schedule).await
    }

    /// Transfer `ui_amount` of `mint` from the signer's holding of that mint.
    /// Decimals and token program come from the holding itself.
    pub async fn transfer_token(
        &self,
        signer: &dyn WalletSigner,
        recipient: &Pubkey,
        mint: &Pubkey,
        ui_amount: &str,
        schedule: PollSchedule,
    ) -> Result<TransferReceipt, TransferError> {
        Self::require_signer(signer)?;
        let owner = signer.address();
        let holding = self
            .token_holdings(&owner)
            .await?
            .into_iter()
            .filter(|h| h.mint == *mint)
            .max_by_key(|h| h.amount.value)
            .ok_or_else(|| TransferError::Invalid(format!("no token account for mint {}", mint)))?;

        let amount = Amount::parse_ui(ui_amount, holding.amount.decimals)
            .map_err(|e| TransferError::Invalid(format!("amount '{}': {}", ui_amount, e)))?;
        if amount.value > holding.amount.value {
            return Err(TransferError::Invalid(format!(
                "insufficient balance: {} available, {} requested",
                holding.amount, amount
            )));
        }

        let transfer = TokenTransfer {
            owner,
            source: holding.token_account,
            recipient: *recipient,
            mint: *mint,
            token_program: holding.token_program,
            amount,
        };
        let blockhash = self.rpc.latest_blockhash().await?;
        let transaction = TransactionBuilder::build_token_transfer(&transfer, blockhash)?;
        let signed = TransactionBuilder::sign_transaction(transaction, signer)?;
        self.send_and_confirm(&signed, schedule).await
    }

    fn require_signer(signer: &dyn WalletSigner) -> Result<(), TransferError> {
        if signer.can_sign() {
            Ok(())
        } else {
            Err(SignerError::SignerUnavailable {
                address: signer.address().to_string(),
            }
            .into())
        }
    }

    async fn send_and_confirm(
        &self,
        signed: &SignedTransaction,
        schedule: PollSchedule,
    ) -> Result<TransferReceipt, TransferError> {
        let signature = self.monitor.submit(signed).await.map_err(|e| match e {
            SubmissionError::Transport(reason) => TransferError::Transport {
                signature: signed.signature.clone(),
                reason,
            },
            rejected => TransferError::Submission(rejected),
        })?;
        let confirmation = self.monitor.monitor_sync(&signature, schedule).await;
        info!("Transfer {} finished: {:?}", short_id(&signature), confirmation);
        Ok(TransferReceipt {
            signature,
            confirmation,
        })
    }
}
