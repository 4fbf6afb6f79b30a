//! Wallet signers

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature, Signer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::shared::errors::SignerError;

/// Anything that can sign transaction messages for one address
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Pubkey;

    /// `false` for watch-only wallets
    fn can_sign(&self) -> bool;

    fn sign_bytes(&self, message: &[u8]) -> Result<Signature, SignerError>;
}

/// Hot wallet backed by an ed25519 keypair
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Solana CLI JSON keypair file (array of 64 bytes)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SignerError> {
        let keypair = read_keypair_file(path.as_ref()).map_err(|e| {
            SignerError::InvalidKey(format!("failed to read keypair {}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::new(keypair))
    }

    /// Base58-encoded 64-byte secret key
    pub fn from_base58(secret: &str) -> Result<Self, SignerError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| SignerError::InvalidKey(format!("invalid base58 secret: {}", e)))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| SignerError::InvalidKey(format!("invalid secret key: {}", e)))?;
        Ok(Self::new(keypair))
    }
}

impl WalletSigner for KeypairSigner {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn can_sign(&self) -> bool {
        true
    }

    fn sign_bytes(&self, message: &[u8]) -> Result<Signature, SignerError> {
        self.keypair
            .try_sign_message(message)
            .map_err(|e| SignerError::Signing(e.to_string()))
    }
}

/// Watch-only wallet: balances and eligibility, no trading
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyWallet {
    address: Pubkey,
}

impl ReadOnlyWallet {
    pub fn new(address: Pubkey) -> Self {
        Self { address }
    }
}

impl WalletSigner for ReadOnlyWallet {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn can_sign(&self) -> bool {
        false
    }

    fn sign_bytes(&self, _message: &[u8]) -> Result<Signature, SignerError> {
        Err(SignerError::SignerUnavailable {
            address: self.address.to_string(),
        })
    }
}

/// Where wallet material comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletSource {
    KeypairFile(PathBuf),
    Base58Secret(String),
    Address(Pubkey),
}

impl WalletSource {
    /// Existing file path, then bare address, then base58 secret
    pub fn detect(value: &str) -> Self {
        let value = value.trim();
        if Path::new(value).is_file() {
            return WalletSource::KeypairFile(PathBuf::from(value));
        }
        if let Ok(address) = Pubkey::from_str(value) {
            return WalletSource::Address(address);
        }
        WalletSource::Base58Secret(value.to_string())
    }
}

pub fn load_wallet(source: &WalletSource) -> Result<Arc<dyn WalletSigner>, SignerError> {
    let wallet: Arc<dyn WalletSigner> = match source {
        WalletSource::KeypairFile(path) => Arc::new(KeypairSigner::from_file(path)?),
        WalletSource::Base58Secret(secret) => Arc::new(KeypairSigner::from_base58(secret)?),
        WalletSource::Address(address) => Arc::new(ReadOnlyWallet::new(*address)),
    };
    info!(
        "✅ Wallet loaded: {} ({})",
        wallet.address(),
        if wallet.can_sign() { "signing" } else { "read-only" }
    );
    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base58_secret_round_trip() {
        let keypair = Keypair::new();
        let secret = bs58::encode(keypair.to_bytes()).into_string();
        let signer = KeypairSigner::from_base58(&secret).unwrap();
        assert_eq!(signer.address(), keypair.pubkey());

        let signature = signer.sign_bytes(b"hello").unwrap();
        assert!(signature.verify(keypair.pubkey().as_ref(), b"hello"));
    }

    #[test]
    fn test_read_only_wallet_refuses_to_sign() {
        let address = Pubkey::new_unique();
        let wallet = ReadOnlyWallet::new(address);
        assert!(!wallet.can_sign());
        assert_eq!(
            wallet.sign_bytes(b"msg"),
            Err(SignerError::SignerUnavailable { address: address.to_string() })
        );
    }

    #[test]
    fn test_detect_wallet_source() {
        let address = Pubkey::new_unique();
        assert_eq!(WalletSource::detect(&address.to_string()), WalletSource::Address(address));
        assert!(matches!(WalletSource::detect("4Zw1"), WalletSource::Base58Secret(_)));
        assert!(KeypairSigner::from_base58("4Zw1").is_err());
    }
}
