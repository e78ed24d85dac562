use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use bridge_core::evm::{ChainClient, SubmitClient};
use eyre::{Result, WrapErr};
use tracing::info;

use crate::config::Config;

/// One configured chain with both client roles attached. Every chain is a
/// potential deposit source and a potential withdrawal target.
pub struct ChainRuntime {
    pub name: String,
    pub chain_id: u64,
    pub bridge_address: Address,
    pub start_block: u64,
    pub client: ChainClient,
    pub submitter: SubmitClient,
}

/// Build the per-chain runtimes from config. The same operator key signs
/// submissions on every target chain.
pub fn build_chains(config: &Config) -> Result<HashMap<u64, Arc<ChainRuntime>>> {
    let signer: PrivateKeySigner = config
        .validator_private_key
        .expose()
        .parse()
        .wrap_err("Invalid validator private key")?;

    // RPC calls should not outlive a watcher tick.
    let call_timeout = Duration::from_millis(config.poll_interval_ms);

    let mut chains = HashMap::with_capacity(config.chains.len());
    for chain in &config.chains {
        let bridge_address = Address::from_str(&chain.bridge_address)
            .wrap_err_with(|| format!("{}: invalid bridge address", chain.name))?;

        let client = ChainClient::new(&chain.rpc_url, chain.chain_id, bridge_address, call_timeout)?;
        let submitter =
            SubmitClient::new(&chain.rpc_url, chain.chain_id, bridge_address, signer.clone())?;

        info!(
            chain = %chain.name,
            chain_id = chain.chain_id,
            bridge = %bridge_address,
            start_block = chain.start_block,
            "Chain runtime initialized"
        );

        chains.insert(
            chain.chain_id,
            Arc::new(ChainRuntime {
                name: chain.name.clone(),
                chain_id: chain.chain_id,
                bridge_address,
                start_block: chain.start_block,
                client,
                submitter,
            }),
        );
    }

    Ok(chains)
}
