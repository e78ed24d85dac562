use std::env;
use std::fmt;
use std::path::Path;

use bridge_core::Redacted;
use eyre::{eyre, Result, WrapErr};

/// How the relayer hands withdrawals to the target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Send the `withdraw` transaction directly (single-validator or
    /// minValidators = 1 deployments).
    Submit,
    /// Only persist the validator signature; a withdrawal-claiming UI
    /// picks it up and submits out-of-band.
    Store,
}

/// Binding for one configured chain.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub bridge_address: String,
    pub start_block: u64,
}

/// Main relayer configuration, loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub chains: Vec<ChainConfig>,
    pub validator_private_key: Redacted<String>,
    pub submission_mode: SubmissionMode,
    pub poll_interval_ms: u64,
    pub min_confirmations: u64,
    pub batch_size: u64,
    pub max_gas_price_gwei: u64,
    pub gas_limit_multiplier: f64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub api_port: u16,
}

/// Custom Debug that redacts credentials (database URL may embed a
/// password; the key is wrapped already).
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("chains", &self.chains)
            .field("validator_private_key", &self.validator_private_key)
            .field("submission_mode", &self.submission_mode)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("min_confirmations", &self.min_confirmations)
            .field("batch_size", &self.batch_size)
            .field("max_gas_price_gwei", &self.max_gas_price_gwei)
            .field("gas_limit_multiplier", &self.gas_limit_multiplier)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("api_port", &self.api_port)
            .finish()
    }
}

fn default_poll_interval() -> u64 {
    12_000
}

fn default_min_confirmations() -> u64 {
    12
}

fn default_batch_size() -> u64 {
    1_000
}

fn default_max_gas_price_gwei() -> u64 {
    100
}

fn default_gas_limit_multiplier() -> f64 {
    1.2
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1_000
}

fn default_api_port() -> u16 {
    9090
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Load the `CHAIN_<i>_*` block of variables.
pub fn load_chains_from_env() -> Result<Vec<ChainConfig>> {
    let count: usize = env::var("CHAINS_COUNT")
        .map_err(|_| eyre!("CHAINS_COUNT environment variable is required"))?
        .parse()
        .wrap_err("CHAINS_COUNT must be a number")?;

    let mut chains = Vec::with_capacity(count);
    for i in 1..=count {
        let prefix = format!("CHAIN_{i}");

        let name = env::var(format!("{prefix}_NAME")).unwrap_or_else(|_| format!("chain_{i}"));
        let chain_id: u64 = env::var(format!("{prefix}_CHAIN_ID"))
            .map_err(|_| eyre!("Missing {prefix}_CHAIN_ID"))?
            .parse()
            .map_err(|_| eyre!("Invalid {prefix}_CHAIN_ID"))?;
        let rpc_url = env::var(format!("{prefix}_RPC_URL"))
            .map_err(|_| eyre!("Missing {prefix}_RPC_URL"))?;
        let bridge_address = env::var(format!("{prefix}_BRIDGE_ADDRESS"))
            .map_err(|_| eyre!("Missing {prefix}_BRIDGE_ADDRESS"))?;
        let start_block: u64 = env::var(format!("{prefix}_START_BLOCK"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        chains.push(ChainConfig {
            name,
            chain_id,
            rpc_url,
            bridge_address,
            start_block,
        });
    }

    Ok(chains)
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

        let chains = load_chains_from_env()?;

        let validator_private_key = env::var("VALIDATOR_PRIVATE_KEY")
            .map_err(|_| eyre!("VALIDATOR_PRIVATE_KEY environment variable is required"))?;

        let submission_mode = match env::var("SUBMISSION_MODE").as_deref() {
            Ok("store") => SubmissionMode::Store,
            Ok("submit") | Err(_) => SubmissionMode::Submit,
            Ok(other) => {
                return Err(eyre!(
                    "SUBMISSION_MODE must be 'submit' or 'store', got '{other}'"
                ))
            }
        };

        let config = Config {
            database_url,
            chains,
            validator_private_key: Redacted::new(validator_private_key),
            submission_mode,
            poll_interval_ms: env_parsed("POLL_INTERVAL_MS", default_poll_interval()),
            min_confirmations: env_parsed("MIN_CONFIRMATIONS", default_min_confirmations()),
            batch_size: env_parsed("BATCH_SIZE", default_batch_size()),
            max_gas_price_gwei: env_parsed("MAX_GAS_PRICE_GWEI", default_max_gas_price_gwei()),
            gas_limit_multiplier: env_parsed(
                "GAS_LIMIT_MULTIPLIER",
                default_gas_limit_multiplier(),
            ),
            retry_attempts: env_parsed("RETRY_ATTEMPTS", default_retry_attempts()),
            retry_delay_ms: env_parsed("RETRY_DELAY_MS", default_retry_delay()),
            api_port: env_parsed("API_PORT", default_api_port()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(eyre!("DATABASE_URL cannot be empty"));
        }

        // Relaying needs a source and a distinct target.
        if self.chains.len() < 2 {
            return Err(eyre!(
                "relayer requires at least two configured chains, got {}",
                self.chains.len()
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(eyre!(
                    "chain id {} configured more than once; duplicate watchers \
                     would race on cursor writes",
                    chain.chain_id
                ));
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

        let key = self.validator_private_key.expose();
        if key.len() != 66 || !key.starts_with("0x") {
            return Err(eyre!(
                "VALIDATOR_PRIVATE_KEY must be 66 chars (0x + 64 hex chars)"
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(eyre!("POLL_INTERVAL_MS must be positive"));
        }
        if self.batch_size == 0 {
            return Err(eyre!("BATCH_SIZE must be positive"));
        }
        if self.gas_limit_multiplier < 1.0 {
            return Err(eyre!("GAS_LIMIT_MULTIPLIER must be at least 1.0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            database_url: "postgres://localhost/bridge".to_string(),
            chains: vec![
                ChainConfig {
                    name: "ethereum".to_string(),
                    chain_id: 1,
                    rpc_url: "http://localhost:8545".to_string(),
                    bridge_address: "0x0000000000000000000000000000000000000001".to_string(),
                    start_block: 0,
                },
                ChainConfig {
                    name: "polygon".to_string(),
                    chain_id: 137,
                    rpc_url: "http://localhost:8546".to_string(),
                    bridge_address: "0x0000000000000000000000000000000000000002".to_string(),
                    start_block: 0,
                },
            ],
            validator_private_key: Redacted::new(
                "0x0000000000000000000000000000000000000000000000000000000000000001".to_string(),
            ),
            submission_mode: SubmissionMode::Submit,
            poll_interval_ms: 12_000,
            min_confirmations: 12,
            batch_size: 1_000,
            max_gas_price_gwei: 100,
            gas_limit_multiplier: 1.2,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            api_port: 9090,
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_poll_interval(), 12_000);
        assert_eq!(default_min_confirmations(), 12);
        assert_eq!(default_batch_size(), 1_000);
        assert_eq!(default_max_gas_price_gwei(), 100);
        assert!((default_gas_limit_multiplier() - 1.2).abs() < f64::EPSILON);
        assert_eq!(default_retry_attempts(), 3);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_requires_two_chains() {
        let mut config = valid_config();
        config.chains.truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_chain_id_rejected() {
        let mut config = valid_config();
        config.chains[1].chain_id = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chain id 1"), "{err}");
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let mut config = valid_config();
        config.validator_private_key = Redacted::new("0x123".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bridge_address_rejected() {
        let mut config = valid_config();
        config.chains[0].bridge_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiplier_below_one_rejected() {
        let mut config = valid_config();
        config.gas_limit_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("postgres://"));
        assert!(!rendered.contains("0x00000000000000000000000000000000000000000000000000000000000000"));
        assert!(rendered.contains("<redacted>"));
    }
}
