//! Transaction decoding, signing and transfer construction

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::str::FromStr;
use tracing::{debug, info};

use super::signer::WalletSigner;
use crate::shared::errors::{SignerError, TransferError};
use crate::shared::types::{Amount, TOKEN_2022_PROGRAM_ID};

/// Solana packet size limit for a serialized transaction
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// A signed transaction ready for submission
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: VersionedTransaction,
    /// First signature; the transaction id on chain
    pub signature: String,
    /// Base64 of the bincode encoding
    pub encoded: String,
}

/// SPL token transfer, classic or Token-2022
#[derive(Debug, Clone)]
pub struct TokenTransfer {
    pub owner: Pubkey,
    /// Token account debited; any account the owner controls, not only the ATA
    pub source: Pubkey,
    pub recipient: Pubkey,
    pub mint: Pubkey,
    pub token_program: Pubkey,
    pub amount: Amount,
}

pub struct TransactionBuilder;

impl TransactionBuilder {
    pub fn decode(payload: &str) -> Result<VersionedTransaction, SignerError> {
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| SignerError::InvalidPayload(format!("not base64: {}", e)))?;
        bincode::deserialize(&bytes).map_err(|e| SignerError::InvalidPayload(format!("not a transaction: {}", e)))
    }

    pub fn encode(transaction: &VersionedTransaction) -> Result<String, SignerError> {
        let bytes = bincode::serialize(transaction).map_err(|e| SignerError::InvalidPayload(e.to_string()))?;
        Ok(BASE64.encode(bytes))
    }

    /// Sign an opaque base64 payload returned by the trade API
    pub fn sign(payload: &str, signer: &dyn WalletSigner) -> Result<SignedTransaction, SignerError> {
        if !signer.can_sign() {
            return Err(SignerError::SignerUnavailable {
                address: signer.address().to_string(),
            });
        }
        let transaction = Self::decode(payload)?;
        Self::sign_transaction(transaction, signer)
    }

    /// Place the wallet's signature at its index among the required signers.
    /// Signatures already present for other signers are kept.
    pub fn sign_transaction(
        mut transaction: VersionedTransaction,
        signer: &dyn WalletSigner,
    ) -> Result<SignedTransaction, SignerError> {
        let address = signer.address();
        let required = transaction.message.header().num_required_signatures as usize;
        let index = transaction
            .message
            .static_account_keys()
            .iter()
            .take(required)
            .position(|key| *key == address)
            .ok_or_else(|| SignerError::NotARequiredSigner {
                address: address.to_string(),
            })?;

        if transaction.signatures.len() < required {
            transaction.signatures.resize(required, Signature::default());
        }
        let signature = signer.sign_bytes(&transaction.message.serialize())?;
        transaction.signatures[index] = signature;

        let encoded = Self::encode(&transaction)?;
        let signature = transaction
            .signatures
            .first()
            .map(|s| s.to_string())
            .unwrap_or_else(|| signature.to_string());
        debug!("Signed transaction {} at signer index {}", signature, index);

        Ok(SignedTransaction {
            transaction,
            signature,
            encoded,
        })
    }

    /// Idempotent destination ATA creation followed by `TransferChecked`
    pub fn token_transfer_instructions(transfer: &TokenTransfer) -> Result<Vec<Instruction>, TransferError> {
        let token_2022 = Pubkey::from_str(TOKEN_2022_PROGRAM_ID)
            .map_err(|e| TransferError::Build(format!("token-2022 program id: {}", e)))?;
        if transfer.token_program != spl_token::id() && transfer.token_program != token_2022 {
            return Err(TransferError::Invalid(format!(
                "{} is not a token program",
                transfer.token_program
            )));
        }
        if transfer.amount.is_zero() {
            return Err(TransferError::Invalid("amount must be greater than zero".to_string()));
        }
        if transfer.owner == transfer.recipient {
            return Err(TransferError::Invalid("recipient is the sender".to_string()));
        }

        let destination =
            get_associated_token_address_with_program_id(&transfer.recipient, &transfer.mint, &transfer.token_program);

        let create_destination = create_associated_token_account_idempotent(
            &transfer.owner,
            &transfer.recipient,
            &transfer.mint,
            &transfer.token_program,
        );
        // Token-2022 shares the TransferChecked layout
        let mut transfer_checked = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &transfer.source,
            &transfer.mint,
            &destination,
            &transfer.owner,
            &[],
            transfer.amount.value,
            transfer.amount.decimals,
        )
        .map_err(|e| TransferError::Build(e.to_string()))?;
        transfer_checked.program_id = transfer.token_program;

        Ok(vec![create_destination, transfer_checked])
    }

    pub fn build_token_transfer(transfer: &TokenTransfer, recent_blockhash: Hash) -> Result<VersionedTransaction, TransferError> {
        let instructions = Self::token_transfer_instructions(transfer)?;
        let transaction = Self::unsigned(&instructions, &transfer.owner, recent_blockhash);
        Self::validate_transaction(&transaction)?;
        info!(
            "🔨 Built token transfer: {} of {} to {}",
            transfer.amount, transfer.mint, transfer.recipient
        );
        Ok(transaction)
    }

    pub fn build_sol_transfer(
        from: &Pubkey,
        to: &Pubkey,
        lamports: u64,
        recent_blockhash: Hash,
    ) -> Result<VersionedTransaction, TransferError> {
        if lamports == 0 {
            return Err(TransferError::Invalid("amount must be greater than zero".to_string()));
        }
        if from == to {
            return Err(TransferError::Invalid("recipient is the sender".to_string()));
        }
        let instruction = system_instruction::transfer(from, to, lamports);
        let transaction = Self::unsigned(&[instruction], from, recent_blockhash);
        Self::validate_transaction(&transaction)?;
        info!("🔨 Built SOL transfer: {} lamports to {}", lamports, to);
        Ok(transaction)
    }

    fn unsigned(instructions: &[Instruction], payer: &Pubkey, recent_blockhash: Hash) -> VersionedTransaction {
        let message = Message::new_with_blockhash(instructions, Some(payer), &recent_blockhash);
        let required = message.header.num_required_signatures as usize;
        VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message: VersionedMessage::Legacy(message),
        }
    }

    /// Validate transaction before submission
    pub fn validate_transaction(transaction: &VersionedTransaction) -> Result<(), TransferError> {
        if transaction.message.instructions().is_empty() {
            return Err(TransferError::Build("transaction has no instructions".to_string()));
        }
        let size = bincode::serialized_size(transaction).map_err(|e| TransferError::Build(e.to_string()))? as usize;
        if size > MAX_TRANSACTION_SIZE {
            return Err(TransferError::Build(format!("transaction too large: {} bytes", size)));
        }
        Ok(())
    }
}
