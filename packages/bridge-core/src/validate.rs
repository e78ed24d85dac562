//! Stateless well-formedness checks for bridge parameters.
//!
//! These run over the string representations used at the API boundary and
//! in persisted rows. The accumulating validators collect every problem
//! instead of short-circuiting so callers can surface a complete report.

use alloy::primitives::{Address, U256};

/// 20-byte hex address: either all-lowercase or a valid EIP-55 checksum.
pub fn is_address(s: &str) -> bool {
    let Some(body) = s.strip_prefix("0x") else {
        return false;
    };
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    if !body.chars().any(|c| c.is_ascii_uppercase()) {
        return true;
    }
    Address::parse_checksummed(s, None).is_ok()
}

/// `0x` followed by exactly 64 hex characters.
pub fn is_tx_hash(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// A 65-byte recoverable signature: `0x` followed by 130 hex characters
/// (132 characters in total).
pub fn is_signature(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() == 130 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Decimal big integer strictly greater than zero. Fits uint256.
pub fn is_positive_amount(s: &str) -> bool {
    parse_amount(s).map(|v| v > U256::ZERO).unwrap_or(false)
}

/// Decimal big integer, zero allowed.
pub fn is_valid_nonce(s: &str) -> bool {
    parse_amount(s).is_some()
}

/// Parse a non-negative decimal integer into U256, rejecting anything that
/// is empty, non-numeric, or out of range.
pub fn parse_amount(s: &str) -> Option<U256> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}

/// Outcome of an accumulating validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn check(&mut self, cond: bool, message: &str) {
        if !cond {
            self.errors.push(message.to_string());
        }
    }
}

/// Parameters for an end-to-end transfer request.
pub struct TransferParams<'a> {
    pub token: &'a str,
    pub sender: &'a str,
    pub recipient: &'a str,
    pub amount: &'a str,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
}

pub fn validate_transfer_params(p: &TransferParams<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.check(is_address(p.token), "token is not a valid address");
    report.check(is_address(p.sender), "sender is not a valid address");
    report.check(is_address(p.recipient), "recipient is not a valid address");
    report.check(is_positive_amount(p.amount), "amount must be a positive integer");
    report.check(
        p.source_chain_id != p.target_chain_id,
        "source and target chain must differ",
    );
    report
}

/// Parameters decoded from a Deposit event.
pub struct DepositParams<'a> {
    pub token: &'a str,
    pub sender: &'a str,
    pub recipient: &'a str,
    pub amount: &'a str,
    pub nonce: &'a str,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub tx_hash: &'a str,
    pub block_number: u64,
}

pub fn validate_deposit_params(p: &DepositParams<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.check(is_address(p.token), "token is not a valid address");
    report.check(is_address(p.sender), "sender is not a valid address");
    report.check(is_address(p.recipient), "recipient is not a valid address");
    report.check(is_positive_amount(p.amount), "amount must be a positive integer");
    report.check(is_valid_nonce(p.nonce), "nonce must be a non-negative integer");
    report.check(
        p.source_chain_id != p.target_chain_id,
        "source and target chain must differ",
    );
    report.check(is_tx_hash(p.tx_hash), "transaction hash is malformed");
    report.check(p.block_number > 0, "block number must be positive");
    report
}

/// Parameters for a withdrawal claim.
pub struct WithdrawParams<'a> {
    pub token: &'a str,
    pub recipient: &'a str,
    pub amount: &'a str,
    pub nonce: &'a str,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub signatures: &'a [String],
}

pub fn validate_withdraw_params(p: &WithdrawParams<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.check(is_address(p.token), "token is not a valid address");
    report.check(is_address(p.recipient), "recipient is not a valid address");
    report.check(is_positive_amount(p.amount), "amount must be a positive integer");
    report.check(is_valid_nonce(p.nonce), "nonce must be a non-negative integer");
    report.check(
        p.source_chain_id != p.target_chain_id,
        "source and target chain must differ",
    );
    report.check(!p.signatures.is_empty(), "at least one signature is required");
    for sig in p.signatures {
        report.check(is_signature(sig), "signature is malformed");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_address_lowercase() {
        assert!(is_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
        assert!(is_address("0x0000000000000000000000000000000000000000"));
    }

    #[test]
    fn test_is_address_checksummed() {
        assert!(is_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(is_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"));
        // Broken checksum: first letter flipped.
        assert!(!is_address("0xF39fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }

    #[test]
    fn test_is_address_rejects_malformed() {
        assert!(!is_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
        assert!(!is_address("0xdead"));
        assert!(!is_address("0xzz97970c51812dc3a010c7d01b50e0d17dc79c8aa"));
        assert!(!is_address(""));
    }

    #[test]
    fn test_is_tx_hash() {
        assert!(is_tx_hash(&format!("0x{}", "ab".repeat(32))));
        assert!(!is_tx_hash(&format!("0x{}", "ab".repeat(31))));
        assert!(!is_tx_hash(&"ab".repeat(33)));
        assert!(!is_tx_hash("0xgg"));
    }

    #[test]
    fn test_is_signature() {
        assert!(is_signature(&format!("0x{}", "1c".repeat(65))));
        assert!(!is_signature(&format!("0x{}", "1c".repeat(64))));
        assert!(!is_signature(&format!("0x{}", "1c".repeat(66))));
        assert!(!is_signature("1c1c"));
    }

    #[test]
    fn test_amount_boundaries() {
        assert!(!is_positive_amount("0"));
        assert!(is_positive_amount("1"));
        // 2^256 - 1 is the largest representable amount.
        let max = U256::MAX.to_string();
        assert!(is_positive_amount(&max));
        // 2^256 overflows.
        assert!(!is_positive_amount(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        ));
        assert!(!is_positive_amount("-1"));
        assert!(!is_positive_amount("1.5"));
        assert!(!is_positive_amount(""));
    }

    #[test]
    fn test_nonce_boundaries() {
        assert!(is_valid_nonce("0"));
        assert!(is_valid_nonce("42"));
        assert!(!is_valid_nonce("-1"));
        assert!(!is_valid_nonce("abc"));
    }

    #[test]
    fn test_deposit_params_accumulate_all_errors() {
        let p = DepositParams {
            token: "bad",
            sender: "bad",
            recipient: "bad",
            amount: "0",
            nonce: "-1",
            source_chain_id: 1,
            target_chain_id: 1,
            tx_hash: "0x123",
            block_number: 0,
        };
        let report = validate_deposit_params(&p);
        assert!(!report.ok());
        assert_eq!(report.errors.len(), 8, "all failures reported: {:?}", report.errors);
    }

    #[test]
    fn test_deposit_params_valid() {
        let tx = format!("0x{}", "cd".repeat(32));
        let p = DepositParams {
            token: "0x0000000000000000000000000000000000000000",
            sender: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            recipient: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            amount: "1000000000000000000",
            nonce: "0",
            source_chain_id: 1,
            target_chain_id: 137,
            tx_hash: &tx,
            block_number: 100,
        };
        assert!(validate_deposit_params(&p).ok());
    }

    #[test]
    fn test_withdraw_params_require_signature() {
        let p = WithdrawParams {
            token: "0x0000000000000000000000000000000000000000",
            recipient: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            amount: "5",
            nonce: "1",
            source_chain_id: 1,
            target_chain_id: 137,
            signatures: &[],
        };
        let report = validate_withdraw_params(&p);
        assert_eq!(report.errors, vec!["at least one signature is required"]);
    }

    #[test]
    fn test_transfer_params_same_chain_rejected() {
        let p = TransferParams {
            token: "0x0000000000000000000000000000000000000000",
            sender: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            recipient: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            amount: "1",
            source_chain_id: 137,
            target_chain_id: 137,
        };
        let report = validate_transfer_params(&p);
        assert_eq!(report.errors, vec!["source and target chain must differ"]);
    }
}
