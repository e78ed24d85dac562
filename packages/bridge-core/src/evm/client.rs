//! EVM RPC client adaptor.
//!
//! One instance wraps one endpoint. All calls carry a per-call deadline and
//! surface failures unclassified; retry policy lives with the caller
//! (see [`crate::retry`]). [`ChainClient`] covers the read-side operations
//! used by watchers and processors, [`SubmitClient`] adds the wallet-backed
//! withdrawal submission path.

use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, TransactionReceipt};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};

use crate::evm::contracts::{Bridge, ERC20};
use crate::evm::events::{
    parse_deposit_log, parse_withdraw_log, sort_events, BridgeLog, DepositEvent, WithdrawEvent,
};

/// Provider stack for read-only operations.
type ReadProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    RootProvider,
>;

/// Provider stack with the wallet filler for transaction submission.
type WalletProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::fillers::JoinFill<
            alloy::providers::Identity,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::GasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::BlobGasFiller,
                    alloy::providers::fillers::JoinFill<
                        alloy::providers::fillers::NonceFiller,
                        alloy::providers::fillers::ChainIdFiller,
                    >,
                >,
            >,
        >,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Hash and timestamp of a specific block.
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
}

/// Read-side view of one EVM chain's bridge.
pub struct ChainClient {
    provider: ReadProvider,
    pub chain_id: u64,
    bridge_address: Address,
    call_timeout: Duration,
}

impl ChainClient {
    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        bridge_address: Address,
        call_timeout: Duration,
    ) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.parse().wrap_err("Invalid RPC URL")?);

        debug!(chain_id, bridge = %bridge_address, "Chain client created");

        Ok(Self {
            provider,
            chain_id,
            bridge_address,
            call_timeout,
        })
    }

    pub fn bridge_address(&self) -> Address {
        self.bridge_address
    }

    async fn deadline<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| eyre!("{what} timed out after {:?}", self.call_timeout))?
    }

    /// Current head block number.
    pub async fn head(&self) -> Result<u64> {
        self.deadline("eth_blockNumber", async {
            self.provider
                .get_block_number()
                .await
                .wrap_err("Failed to get block number")
        })
        .await
    }

    /// Hash and timestamp of block `number`. Fails when the node no longer
    /// serves the block.
    pub async fn block(&self, number: u64) -> Result<BlockInfo> {
        let block = self
            .deadline("eth_getBlockByNumber", async {
                self.provider
                    .get_block_by_number(number.into())
                    .await
                    .wrap_err("Failed to get block")
            })
            .await?
            .ok_or_else(|| eyre!("block {number} not found on chain {}", self.chain_id))?;

        Ok(BlockInfo {
            number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
        })
    }

    /// Deposit events emitted by the bridge in `from ..= to`, in ascending
    /// `(block_number, log_index)` order.
    pub async fn deposit_logs(&self, from: u64, to: u64) -> Result<Vec<DepositEvent>> {
        let filter = Filter::new()
            .address(self.bridge_address)
            .event_signature(Bridge::Deposit::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);

        let logs = self
            .deadline("eth_getLogs", async {
                self.provider
                    .get_logs(&filter)
                    .await
                    .wrap_err_with(|| format!("Failed to get deposit logs {from}..={to}"))
            })
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            events.push(parse_deposit_log(log)?);
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    /// Withdraw events emitted by the bridge in `from ..= to`, ordered.
    pub async fn withdraw_logs(&self, from: u64, to: u64) -> Result<Vec<WithdrawEvent>> {
        let filter = Filter::new()
            .address(self.bridge_address)
            .event_signature(Bridge::Withdraw::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);

        let logs = self
            .deadline("eth_getLogs", async {
                self.provider
                    .get_logs(&filter)
                    .await
                    .wrap_err_with(|| format!("Failed to get withdraw logs {from}..={to}"))
            })
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            events.push(parse_withdraw_log(log)?);
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    /// Both bridge event kinds in one window, merged and ordered. Logs with
    /// an unrecognized topic0 (other bridge events) are skipped.
    pub async fn bridge_logs(&self, from: u64, to: u64) -> Result<Vec<BridgeLog>> {
        let filter = Filter::new()
            .address(self.bridge_address)
            .from_block(from)
            .to_block(to);

        let logs = self
            .deadline("eth_getLogs", async {
                self.provider
                    .get_logs(&filter)
                    .await
                    .wrap_err_with(|| format!("Failed to get bridge logs {from}..={to}"))
            })
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            let Some(topic0) = log.topics().first().copied() else {
                continue;
            };
            if topic0 == Bridge::Deposit::SIGNATURE_HASH {
                events.push(BridgeLog::Deposit(parse_deposit_log(log)?));
            } else if topic0 == Bridge::Withdraw::SIGNATURE_HASH {
                events.push(BridgeLog::Withdraw(parse_withdraw_log(log)?));
            }
        }
        sort_events(&mut events);
        Ok(events)
    }

    /// On-chain replay map lookup for a canonical message hash.
    pub async fn is_processed(&self, message_hash: B256) -> Result<bool> {
        let bridge = Bridge::new(self.bridge_address, &self.provider);
        self.deadline("isProcessed", async {
            bridge
                .isProcessed(message_hash)
                .call()
                .await
                .wrap_err("isProcessed call failed")
        })
        .await
    }

    /// Native currency balance of `account`.
    pub async fn native_balance(&self, account: Address) -> Result<U256> {
        self.deadline("eth_getBalance", async {
            self.provider
                .get_balance(account)
                .await
                .wrap_err("Failed to get balance")
        })
        .await
    }

    /// ERC20 balance of `holder` for `token`.
    pub async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256> {
        let erc20 = ERC20::new(token, &self.provider);
        self.deadline("balanceOf", async {
            erc20
                .balanceOf(holder)
                .call()
                .await
                .wrap_err("balanceOf call failed")
        })
        .await
    }

    /// Current gas price (legacy fee data).
    pub async fn gas_price(&self) -> Result<u128> {
        self.deadline("eth_gasPrice", async {
            self.provider
                .get_gas_price()
                .await
                .wrap_err("Failed to get gas price")
        })
        .await
    }
}

/// Arguments for a `withdraw` submission on the target chain.
#[derive(Debug, Clone)]
pub struct WithdrawArgs {
    pub token: Address,
    pub recipient: Address,
    pub amount: U256,
    pub nonce: U256,
    pub source_chain_id: u64,
    pub signatures: Vec<Bytes>,
}

/// Wallet-backed client for driving `withdraw` on a target chain.
pub struct SubmitClient {
    provider: WalletProvider,
    pub chain_id: u64,
    bridge_address: Address,
    operator: Address,
}

impl SubmitClient {
    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        bridge_address: Address,
        signer: PrivateKeySigner,
    ) -> Result<Self> {
        let operator = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url.parse().wrap_err("Invalid RPC URL")?);

        info!(chain_id, operator = %operator, bridge = %bridge_address, "Submit client created");

        Ok(Self {
            provider,
            chain_id,
            bridge_address,
            operator,
        })
    }

    pub fn operator_address(&self) -> Address {
        self.operator
    }

    /// Gas units the node estimates for this withdrawal.
    pub async fn estimate_withdraw_gas(&self, args: &WithdrawArgs) -> Result<u64> {
        let bridge = Bridge::new(self.bridge_address, &self.provider);
        bridge
            .withdraw(
                args.token,
                args.recipient,
                args.amount,
                args.nonce,
                U256::from(args.source_chain_id),
                args.signatures.clone(),
            )
            .estimate_gas()
            .await
            .wrap_err("Failed to estimate withdraw gas")
    }

    /// Submit `withdraw` with explicit gas settings, then wait for the
    /// receipt at the requested confirmation depth. Returns the transaction
    /// hash together with the receipt; a reverted receipt is an error.
    pub async fn submit_withdraw(
        &self,
        args: &WithdrawArgs,
        gas_limit: u64,
        gas_price: u128,
        min_confirmations: u64,
        receipt_timeout: Duration,
    ) -> Result<(B256, TransactionReceipt)> {
        let bridge = Bridge::new(self.bridge_address, &self.provider);
        let call = bridge
            .withdraw(
                args.token,
                args.recipient,
                args.amount,
                args.nonce,
                U256::from(args.source_chain_id),
                args.signatures.clone(),
            )
            .gas(gas_limit)
            .gas_price(gas_price);

        let pending = call.send().await.wrap_err("Failed to send withdraw")?;
        let tx_hash = *pending.tx_hash();
        debug!(chain_id = self.chain_id, tx_hash = %tx_hash, gas_limit, gas_price, "Withdraw sent");

        let receipt = pending
            .with_required_confirmations(min_confirmations)
            .with_timeout(Some(receipt_timeout))
            .get_receipt()
            .await
            .wrap_err("Failed to get withdraw receipt")?;

        if !receipt.status() {
            return Err(eyre!("withdraw transaction reverted: {tx_hash}"));
        }

        Ok((tx_hash, receipt))
    }
}
