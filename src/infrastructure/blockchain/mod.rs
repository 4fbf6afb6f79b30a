//! Solana access: RPC, signing and transaction construction

pub mod rpc_client;
pub mod signer;
pub mod transaction_builder;

pub use rpc_client::{ChainRpc, ConfirmationLevel, SignatureStatus, SolanaRpcClient};
pub use signer::{load_wallet, KeypairSigner, ReadOnlyWallet, WalletSigner, WalletSource};
pub use transaction_builder::{SignedTransaction, TokenTransfer, TransactionBuilder};
