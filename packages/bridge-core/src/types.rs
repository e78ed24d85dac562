use std::fmt;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Lifecycle of a relayer-owned bridge transaction.
///
/// Transitions are monotone: pending → relaying → (completed | failed).
/// The database layer enforces this with guarded UPDATEs; nothing ever
/// moves a row out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Relaying,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Relaying => "relaying",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Completed | TxStatus::Failed)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an indexer transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of raw on-chain event the indexer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Deposit,
    Withdraw,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lowercase `0x…` rendering used for all persisted addresses.
pub fn format_address(addr: Address) -> String {
    format!("0x{}", hex::encode(addr.as_slice()))
}

/// Lowercase `0x…` rendering used for all persisted hashes.
pub fn format_hash(hash: B256) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// The all-zero token address denotes the chain's native currency.
pub fn is_native_token(token: Address) -> bool {
    token == Address::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_tx_status_as_str() {
        assert_eq!(TxStatus::Pending.as_str(), "pending");
        assert_eq!(TxStatus::Relaying.as_str(), "relaying");
        assert_eq!(TxStatus::Completed.as_str(), "completed");
        assert_eq!(TxStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_tx_status_terminal() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Relaying.is_terminal());
        assert!(TxStatus::Completed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", TxStatus::Relaying), "relaying");
        assert_eq!(format!("{}", TransferStatus::Completed), "completed");
        assert_eq!(format!("{}", EventKind::Withdraw), "withdraw");
    }

    #[test]
    fn test_format_address_lowercase() {
        let addr = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(
            format_address(addr),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_format_hash_shape() {
        let hash = B256::repeat_byte(0xab);
        let s = format_hash(hash);
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 66);
    }

    #[test]
    fn test_native_token_sentinel() {
        assert!(is_native_token(Address::ZERO));
        assert!(!is_native_token(address!(
            "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        )));
    }
}
