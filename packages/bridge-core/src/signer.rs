//! Validator signing over the canonical withdrawal digest.

use alloy::primitives::{Address, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use eyre::{Result, WrapErr};

use crate::message::WithdrawalMessage;

/// Holds the validator's secp256k1 key and produces 65-byte recoverable
/// signatures over the prefixed withdrawal digest.
///
/// Immutable after construction and safe to share across watcher tasks.
pub struct ValidatorSigner {
    signer: PrivateKeySigner,
    address: Address,
}

impl ValidatorSigner {
    /// Parse a `0x…` hex private key.
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .wrap_err("Invalid validator private key")?;
        let address = signer.address();
        Ok(Self { signer, address })
    }

    pub fn from_bytes(key_bytes: &[u8; 32]) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(&(*key_bytes).into())
            .wrap_err("Invalid validator private key bytes")?;
        let address = signer.address();
        Ok(Self { signer, address })
    }

    /// The validator address signatures recover to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign the withdrawal tuple. Returns `r ‖ s ‖ v` with v normalized
    /// to {27, 28}.
    pub fn sign_withdrawal(&self, message: &WithdrawalMessage) -> Result<[u8; 65]> {
        self.sign_digest(&message.signing_digest())
    }

    /// Sign a precomputed prefixed digest.
    pub fn sign_digest(&self, digest: &B256) -> Result<[u8; 65]> {
        let sig = self
            .signer
            .sign_hash_sync(digest)
            .wrap_err("Signing failed")?;

        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&sig.r().to_be_bytes::<32>());
        out[32..64].copy_from_slice(&sig.s().to_be_bytes::<32>());
        out[64] = 27 + sig.v() as u8;
        Ok(out)
    }
}

/// Check that `signature` recovers to `expected` over `digest`.
///
/// Accepts 65-byte signatures with v in {0, 1} or {27, 28}; anything else
/// is simply not a valid signature.
pub fn verify(digest: &B256, signature: &[u8], expected: Address) -> bool {
    let Ok(sig) = Signature::try_from(signature) else {
        return false;
    };
    sig.recover_address_from_prehash(digest)
        .map(|addr| addr == expected)
        .unwrap_or(false)
}
