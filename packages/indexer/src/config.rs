use std::env;
use std::fmt;
use std::path::Path;

use eyre::{eyre, Result, WrapErr};

/// Binding for one watched chain.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub bridge_address: String,
    pub start_block: u64,
}

/// Indexer configuration, loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub chains: Vec<ChainConfig>,
    pub poll_interval_ms: u64,
    pub min_confirmations: u64,
    pub batch_size: u64,
    pub api_port: u16,
}

/// Custom Debug that redacts the database URL (may embed credentials).
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("chains", &self.chains)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("min_confirmations", &self.min_confirmations)
            .field("batch_size", &self.batch_size)
            .field("api_port", &self.api_port)
            .finish()
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration, reading `.env` first when present.
    pub fn load() -> Result<Self> {
        if Path::new(".env").exists() {
            dotenvy::from_filename(".env").wrap_err("Failed to load .env file")?;
        }
        Self::from_env()
    }

    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| eyre!("DATABASE_URL environment variable is required"))?;

        let count: usize = env::var("CHAINS_COUNT")
            .map_err(|_| eyre!("CHAINS_COUNT environment variable is required"))?
            .parse()
            .wrap_err("CHAINS_COUNT must be a number")?;

        let mut chains = Vec::with_capacity(count);
        for i in 1..=count {
            let prefix = format!("CHAIN_{i}");
            chains.push(ChainConfig {
                name: env::var(format!("{prefix}_NAME")).unwrap_or_else(|_| format!("chain_{i}")),
                chain_id: env::var(format!("{prefix}_CHAIN_ID"))
                    .map_err(|_| eyre!("Missing {prefix}_CHAIN_ID"))?
                    .parse()
                    .map_err(|_| eyre!("Invalid {prefix}_CHAIN_ID"))?,
                rpc_url: env::var(format!("{prefix}_RPC_URL"))
                    .map_err(|_| eyre!("Missing {prefix}_RPC_URL"))?,
                bridge_address: env::var(format!("{prefix}_BRIDGE_ADDRESS"))
                    .map_err(|_| eyre!("Missing {prefix}_BRIDGE_ADDRESS"))?,
                start_block: env::var(format!("{prefix}_START_BLOCK"))
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
            });
        }

        let config = Config {
            database_url,
            chains,
            poll_interval_ms: env_parsed("POLL_INTERVAL_MS", 12_000),
            min_confirmations: env_parsed("MIN_CONFIRMATIONS", 12),
            batch_size: env_parsed("BATCH_SIZE", 1_000),
            api_port: env_parsed("API_PORT", 8080),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(eyre!("DATABASE_URL cannot be empty"));
        }
        if self.chains.is_empty() {
            return Err(eyre!("indexer requires at least one configured chain"));
        }

        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(eyre!("chain id {} configured more than once", chain.chain_id));
            }
            if chain.rpc_url.is_empty() {
                return Err(eyre!("{}: rpc_url cannot be empty", chain.name));
            }
            if chain.bridge_address.len() != 42 || !chain.bridge_address.starts_with("0x") {
                return Err(eyre!(
                    "{}: bridge_address must be a 0x-prefixed 20-byte hex address",
                    chain.name
                ));
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(eyre!("POLL_INTERVAL_MS must be positive"));
        }
        if self.batch_size == 0 {
            return Err(eyre!("BATCH_SIZE must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            database_url: "postgres://localhost/indexer".to_string(),
            chains: vec![ChainConfig {
                name: "ethereum".to_string(),
                chain_id: 1,
                rpc_url: "http://localhost:8545".to_string(),
                bridge_address: "0x0000000000000000000000000000000000000001".to_string(),
                start_block: 0,
            }],
            poll_interval_ms: 12_000,
            min_confirmations: 12,
            batch_size: 1_000,
            api_port: 8080,
        }
    }

    #[test]
    fn test_single_chain_is_enough() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_no_chains_rejected() {
        let mut config = valid_config();
        config.chains.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_chain_rejected() {
        let mut config = valid_config();
        let dup = config.chains[0].clone();
        config.chains.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bridge_address_rejected() {
        let mut config = valid_config();
        config.chains[0].bridge_address = "0x123".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("postgres://"));
    }
}
