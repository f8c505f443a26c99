//! Configuration management for the LeaveChain coordinator

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::Address;
use crate::error::{LeaveChainError, Result};

/// Main configuration structure for the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application identity and environment
    pub app: AppConfig,

    /// Leave contract deployment
    pub contract: ContractConfig,

    /// Wallet session configuration
    pub wallet: WalletConfig,

    /// Network configuration handed to the external transport
    pub network: NetworkConfig,

    /// Monitoring and logging configuration
    pub monitoring: MonitoringConfig,

    /// Simulated backend settings, used in the development environment
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Instance name
    pub name: String,

    /// Environment (development, staging, production)
    pub environment: String,

    /// Enable/disable coordinator execution
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Deployed leave contract address
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Connected account address; when absent the coordinator runs read-only
    pub account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// RPC endpoint of the chain node
    pub rpc_url: String,

    /// RPC request timeout in milliseconds
    pub rpc_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Owner address of the simulated contract
    pub owner: String,

    /// Delay before a simulated receipt confirms, in milliseconds
    pub confirm_delay_ms: u64,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| LeaveChainError::Config(config::ConfigError::Message(e.to_string())))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables and files
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder();

        // Start with default configuration
        settings = settings.add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific configuration
        if let Ok(env) = std::env::var("LEAVECHAIN_ENV") {
            settings = settings
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local configuration (not committed to git)
        settings = settings.add_source(config::File::with_name("config/local").required(false));

        // Override with environment variables
        settings = settings.add_source(
            config::Environment::with_prefix("LEAVECHAIN")
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Config = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.contract_address()?;
        self.wallet_account()?;
        self.simulation_owner()?;

        if self.network.rpc_url.is_empty() {
            return Err(LeaveChainError::Config(config::ConfigError::Message(
                "An RPC endpoint must be configured".to_string(),
            )));
        }

        if self.network.rpc_timeout_ms == 0 {
            return Err(LeaveChainError::Config(config::ConfigError::Message(
                "RPC timeout must be positive".to_string(),
            )));
        }

        Ok(())
    }

    /// Parsed leave contract address
    pub fn contract_address(&self) -> Result<Address> {
        self.contract
            .address
            .parse()
            .map_err(|e| LeaveChainError::Config(config::ConfigError::Message(format!("{}", e))))
    }

    /// Parsed connected account, if one is configured
    pub fn wallet_account(&self) -> Result<Option<Address>> {
        match &self.wallet.account {
            Some(account) => account
                .parse()
                .map(Some)
                .map_err(|e| LeaveChainError::Config(config::ConfigError::Message(format!("{}", e)))),
            None => Ok(None),
        }
    }

    /// Parsed owner of the simulated contract
    pub fn simulation_owner(&self) -> Result<Address> {
        self.simulation
            .owner
            .parse()
            .map_err(|e| LeaveChainError::Config(config::ConfigError::Message(format!("{}", e))))
    }

    /// Get RPC timeout as Duration
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.network.rpc_timeout_ms)
    }

    /// Get simulated confirmation delay as Duration
    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.simulation.confirm_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                name: crate::NAME.to_string(),
                environment: "development".to_string(),
                enabled: true,
            },
            contract: ContractConfig {
                // Well-known first deployment address of a local dev node
                address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
            },
            wallet: WalletConfig {
                account: Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string()),
            },
            network: NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                rpc_timeout_ms: crate::defaults::RPC_TIMEOUT.as_millis() as u64,
            },
            monitoring: MonitoringConfig {
                log_level: "info".to_string(),
                json_logging: false,
            },
            simulation: SimulationConfig {
                owner: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
                confirm_delay_ms: crate::defaults::SIM_CONFIRM_DELAY.as_millis() as u64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.wallet_account().unwrap().is_some());
        assert_eq!(config.rpc_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_malformed_contract_address_rejected() {
        let mut config = Config::default();
        config.contract.address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absent_account_is_valid() {
        let mut config = Config::default();
        config.wallet.account = None;
        assert!(config.validate().is_ok());
        assert!(config.wallet_account().unwrap().is_none());
    }
}
