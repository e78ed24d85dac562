//! Shared cross-chain plumbing for the bridge relayer and indexer.
//!
//! Both services consume the same chain-event pipeline: an EVM client
//! adaptor, decoded bridge events, the canonical withdrawal message
//! encoding, validator signing, parameter validation, and retry/error
//! classification. This crate holds all of it so the two binaries cannot
//! drift apart on wire formats.

pub mod evm;
pub mod message;
pub mod redact;
pub mod retry;
pub mod signer;
pub mod types;
pub mod validate;

pub use message::{eth_signed_digest, withdrawal_message_hash, WithdrawalMessage};
pub use redact::Redacted;
pub use retry::{classify_error, with_retry, ErrorClass, RetryConfig};
pub use signer::ValidatorSigner;
pub use types::{EventKind, TransferStatus, TxStatus};
