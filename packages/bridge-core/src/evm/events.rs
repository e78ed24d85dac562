//! Decoded bridge events with the log metadata the pipeline keys on.

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use eyre::{eyre, Result};

use crate::evm::contracts::Bridge;

/// A decoded Deposit observed on a source chain.
#[derive(Debug, Clone)]
pub struct DepositEvent {
    pub token: Address,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
    pub nonce: U256,
    pub target_chain_id: u64,
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub log_index: u64,
}

/// A decoded Withdraw observed on a target chain.
#[derive(Debug, Clone)]
pub struct WithdrawEvent {
    pub token: Address,
    pub recipient: Address,
    pub amount: U256,
    pub nonce: U256,
    pub source_chain_id: u64,
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub log_index: u64,
}

/// Either bridge event, tagged for merged per-window dispatch.
#[derive(Debug, Clone)]
pub enum BridgeLog {
    Deposit(DepositEvent),
    Withdraw(WithdrawEvent),
}

impl BridgeLog {
    pub fn block_number(&self) -> u64 {
        match self {
            BridgeLog::Deposit(e) => e.block_number,
            BridgeLog::Withdraw(e) => e.block_number,
        }
    }

    pub fn log_index(&self) -> u64 {
        match self {
            BridgeLog::Deposit(e) => e.log_index,
            BridgeLog::Withdraw(e) => e.log_index,
        }
    }
}

/// Log metadata every decoded event must carry. Pending logs (no block
/// placement yet) are rejected; the watcher only scans finalized ranges.
fn log_meta(log: &Log) -> Result<(u64, B256, B256, u64)> {
    let block_number = log
        .block_number
        .ok_or_else(|| eyre!("log missing block number"))?;
    let block_hash = log.block_hash.ok_or_else(|| eyre!("log missing block hash"))?;
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| eyre!("log missing transaction hash"))?;
    let log_index = log.log_index.ok_or_else(|| eyre!("log missing log index"))?;
    Ok((block_number, block_hash, tx_hash, log_index))
}

/// Decode a raw log as a Deposit event.
pub fn parse_deposit_log(log: &Log) -> Result<DepositEvent> {
    let decoded = Bridge::Deposit::decode_log(&log.inner)
        .map_err(|e| eyre!("failed to decode Deposit log: {e}"))?;
    let (block_number, block_hash, tx_hash, log_index) = log_meta(log)?;

    Ok(DepositEvent {
        token: decoded.token,
        sender: decoded.sender,
        recipient: decoded.recipient,
        amount: decoded.amount,
        nonce: decoded.nonce,
        target_chain_id: chain_id_u64(decoded.targetChainId),
        block_number,
        block_hash,
        tx_hash,
        log_index,
    })
}

/// Decode a raw log as a Withdraw event.
pub fn parse_withdraw_log(log: &Log) -> Result<WithdrawEvent> {
    let decoded = Bridge::Withdraw::decode_log(&log.inner)
        .map_err(|e| eyre!("failed to decode Withdraw log: {e}"))?;
    let (block_number, block_hash, tx_hash, log_index) = log_meta(log)?;

    Ok(WithdrawEvent {
        token: decoded.token,
        recipient: decoded.recipient,
        amount: decoded.amount,
        nonce: decoded.nonce,
        source_chain_id: chain_id_u64(decoded.sourceChainId),
        block_number,
        block_hash,
        tx_hash,
        log_index,
    })
}

/// Chain ids ride the wire as uint256 but are EIP-155 sized in practice.
fn chain_id_u64(raw: U256) -> u64 {
    raw.try_into().unwrap_or(u64::MAX)
}

/// Sort events into the dispatch order the processors rely on: strictly
/// ascending `(block_number, log_index)` within a window.
pub fn sort_events(events: &mut [BridgeLog]) {
    events.sort_by_key(|e| (e.block_number(), e.log_index()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes, LogData};

    fn topic_address(addr: Address) -> B256 {
        B256::left_padding_from(addr.as_slice())
    }

    fn deposit_log(
        token: Address,
        sender: Address,
        recipient: Address,
        amount: U256,
        nonce: u64,
        target_chain_id: u64,
        block_number: u64,
        log_index: u64,
    ) -> Log {
        let mut data = Vec::with_capacity(96);
        data.extend_from_slice(&amount.to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(nonce).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(target_chain_id).to_be_bytes::<32>());

        let inner = alloy::primitives::Log {
            address: address!("0000000000000000000000000000000000000b1d"),
            data: LogData::new_unchecked(
                vec![
                    Bridge::Deposit::SIGNATURE_HASH,
                    topic_address(token),
                    topic_address(sender),
                    topic_address(recipient),
                ],
                Bytes::from(data),
            ),
        };

        Log {
            inner,
            block_number: Some(block_number),
            block_hash: Some(B256::repeat_byte(0x11)),
            transaction_hash: Some(B256::repeat_byte(0x22)),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_deposit_log() {
        let token = Address::ZERO;
        let who = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let log = deposit_log(
            token,
            who,
            who,
            U256::from(1_000_000_000_000_000_000u64),
            0,
            137,
            42,
            3,
        );

        let event = parse_deposit_log(&log).unwrap();
        assert_eq!(event.token, token);
        assert_eq!(event.sender, who);
        assert_eq!(event.recipient, who);
        assert_eq!(event.amount, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(event.nonce, U256::ZERO);
        assert_eq!(event.target_chain_id, 137);
        assert_eq!(event.block_number, 42);
        assert_eq!(event.log_index, 3);
    }

    #[test]
    fn test_parse_rejects_wrong_topic() {
        let who = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let log = deposit_log(Address::ZERO, who, who, U256::from(1u64), 0, 137, 42, 3);
        assert!(parse_withdraw_log(&log).is_err());
    }

    #[test]
    fn test_parse_rejects_pending_log() {
        let who = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let mut log = deposit_log(Address::ZERO, who, who, U256::from(1u64), 0, 137, 42, 3);
        log.block_number = None;
        assert!(parse_deposit_log(&log).is_err());
    }

    #[test]
    fn test_sort_events_by_block_then_log_index() {
        let who = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let make = |block, idx| {
            BridgeLog::Deposit(
                parse_deposit_log(&deposit_log(
                    Address::ZERO,
                    who,
                    who,
                    U256::from(1u64),
                    0,
                    137,
                    block,
                    idx,
                ))
                .unwrap(),
            )
        };

        let mut events = vec![make(10, 5), make(9, 7), make(10, 1), make(8, 0)];
        sort_events(&mut events);

        let order: Vec<(u64, u64)> = events
            .iter()
            .map(|e| (e.block_number(), e.log_index()))
            .collect();
        assert_eq!(order, vec![(8, 0), (9, 7), (10, 1), (10, 5)]);
    }
}
