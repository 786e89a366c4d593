//! Donation workflow configuration.
//!
//! One preset per deployment environment, with environment-variable
//! overrides applied on top. The resulting struct is passed to every
//! component explicitly.

use crate::domain::{Address, Amount, DonationError, DonationLimits, DonationResult, Token, TxHash};
use primitive_types::H160;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const LOCALHOST_LEDGER: Address = H160([
    0x46, 0x57, 0x93, 0x94, 0x80, 0x2b, 0x5e, 0x4d, 0x2c, 0x06, 0x47, 0x43, 0x6b, 0xfc, 0xc7, 0x1a,
    0x2d, 0x9e, 0x84, 0x78,
]);
const RSK_TESTNET_LEDGER: Address = H160([
    0xea, 0x72, 0x17, 0xd8, 0x4f, 0x0f, 0x6e, 0xa4, 0x72, 0xef, 0x50, 0x50, 0x85, 0x39, 0xac, 0x7a,
    0xee, 0xe9, 0x1c, 0x50,
]);
const DEVELOP_LEDGER: Address = H160([
    0xf0, 0xe0, 0xf5, 0xa7, 0x52, 0xf6, 0x9e, 0xe6, 0xdc, 0xfe, 0xed, 0x13, 0x85, 0x20, 0xf6, 0x82,
    0x13, 0x57, 0xdc, 0x32,
]);
const RELEASE_LEDGER: Address = H160([
    0x8e, 0x17, 0xd4, 0xf6, 0xbd, 0x5f, 0xc3, 0x26, 0x26, 0xb4, 0x22, 0x4d, 0x0e, 0x37, 0x2e, 0x38,
    0x0c, 0xfa, 0x10, 0x82,
]);
const BETA_LEDGER: Address = H160([
    0x8e, 0xb0, 0x47, 0x58, 0x5a, 0xbe, 0xd9, 0x35, 0xa7, 0x3b, 0xa4, 0xb9, 0x52, 0x52, 0x13, 0xf1,
    0x26, 0xa0, 0xc9, 0x79,
]);

/// Default balance poll interval (ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default gas price (gwei).
pub const DEFAULT_GAS_PRICE_GWEI: u64 = 10;

/// Decimals of tokens configured without explicit decimals.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `GD_ENVIRONMENT` names no preset.
    #[error("There is no configuration for environment: {name}. Expected one of: {expected}")]
    UnknownEnvironment {
        /// Requested name.
        name: String,
        /// Valid names.
        expected: String,
    },

    /// An address variable does not hold a 20-byte hex address.
    #[error("{var} is not a valid address: {value}")]
    InvalidAddress {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A variable could not be parsed.
    #[error("{var} has an invalid value: {value}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Deployment environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local ganache node.
    #[default]
    Localhost,
    /// RSK testnet.
    RskTestnet,
    /// Develop deployment.
    Develop,
    /// Release candidate deployment.
    Release,
    /// Beta (mainnet) deployment.
    Beta,
}

impl Environment {
    /// All environments.
    pub const ALL: [Environment; 5] = [
        Environment::Localhost,
        Environment::RskTestnet,
        Environment::Develop,
        Environment::Release,
        Environment::Beta,
    ];

    /// Name used in `GD_ENVIRONMENT`.
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Localhost => "localhost",
            Environment::RskTestnet => "rsk_testnet",
            Environment::Develop => "develop",
            Environment::Release => "release",
            Environment::Beta => "beta",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|env| env.name() == s)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: s.to_string(),
                expected: Self::ALL.map(|env| env.name()).join(","),
            })
    }
}

/// A whitelisted contract token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token contract.
    pub address: Address,
    /// Token decimals.
    #[serde(default = "default_token_decimals")]
    pub decimals: u8,
}

fn default_token_decimals() -> u8 {
    DEFAULT_TOKEN_DECIMALS
}

/// Donation workflow configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DonationConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Network display name.
    pub network_name: String,
    /// Ledger contract; spender of token allowances.
    pub ledger_address: Address,
    /// Block explorer base URL, with trailing slash.
    pub block_explorer_url: String,
    /// Record store base URL.
    pub record_store_url: String,
    /// Chain node URL.
    pub node_url: String,
    /// Symbol of the native token.
    pub native_token_name: String,
    /// Balance poll interval (ms).
    pub token_poll_interval_ms: u64,
    /// Gas price used when the provider gives none (gwei).
    pub default_gas_price_gwei: u64,
    /// Gas added on top of estimates.
    pub extra_gas: u64,
    /// Smallest accepted donation, in token units.
    pub min_donation: Decimal,
    /// Whitelisted contract tokens by symbol.
    pub tokens: BTreeMap<String, TokenConfig>,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self::preset(Environment::Localhost)
    }
}

impl DonationConfig {
    /// Built-in configuration of an environment.
    pub fn preset(environment: Environment) -> Self {
        let (network_name, ledger_address, block_explorer_url, record_store_url, node_url) =
            match environment {
                Environment::Localhost => (
                    "RSK Ganache",
                    LOCALHOST_LEDGER,
                    "https://etherscan.io/",
                    "http://localhost:3030",
                    "http://localhost:8548",
                ),
                Environment::RskTestnet => (
                    "rsk_testnet",
                    RSK_TESTNET_LEDGER,
                    "https://etherscan.io/",
                    "http://68.183.77.54:3030",
                    "http://68.183.77.54:4343",
                ),
                Environment::Develop => (
                    "Ropsten",
                    DEVELOP_LEDGER,
                    "https://rinkeby.etherscan.io/",
                    "https://feathers.develop.giveth.io",
                    "https://rinkeby.giveth.io",
                ),
                Environment::Release => (
                    "Ropsten",
                    RELEASE_LEDGER,
                    "https://rinkeby.etherscan.io/",
                    "https://feathers.release.giveth.io",
                    "https://rinkeby.giveth.io",
                ),
                Environment::Beta => (
                    "Mainnet",
                    BETA_LEDGER,
                    "https://rinkeby.etherscan.io/",
                    "https://feathers.beta.giveth.io",
                    "https://rinkeby.giveth.io",
                ),
            };

        let native_token_name = match environment {
            Environment::RskTestnet => "RBTC",
            _ => "ETH",
        };

        Self {
            environment,
            network_name: network_name.to_string(),
            ledger_address,
            block_explorer_url: block_explorer_url.to_string(),
            record_store_url: record_store_url.to_string(),
            node_url: node_url.to_string(),
            native_token_name: native_token_name.to_string(),
            token_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_gas_price_gwei: DEFAULT_GAS_PRICE_GWEI,
            extra_gas: 0,
            min_donation: Decimal::new(1, 2),
            tokens: BTreeMap::new(),
        }
    }

    /// Load from process environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GD_ENVIRONMENT`: preset name (default: localhost)
    /// - `GD_LEDGER_ADDRESS`: ledger contract
    /// - `GD_BLOCK_EXPLORER`: block explorer base URL
    /// - `GD_RECORD_STORE_URL`: record store base URL
    /// - `GD_NODE_URL`: chain node URL
    /// - `GD_NETWORK_NAME`: network display name
    /// - `GD_NATIVE_TOKEN_NAME`: native token symbol
    /// - `GD_DEFAULT_GASPRICE`: default gas price in gwei
    /// - `GD_TOKEN_ADDRESSES`: JSON object of symbol to token address
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let environment = match var("GD_ENVIRONMENT") {
            Some(name) => name.parse()?,
            None => Environment::default(),
        };
        let mut config = Self::preset(environment);

        if let Some(value) = var("GD_LEDGER_ADDRESS") {
            config.ledger_address = parse_address("GD_LEDGER_ADDRESS", &value)?;
        }
        if let Some(value) = var("GD_BLOCK_EXPLORER") {
            config.block_explorer_url = value;
        }
        if let Some(value) = var("GD_RECORD_STORE_URL") {
            config.record_store_url = value;
        }
        if let Some(value) = var("GD_NODE_URL") {
            config.node_url = value;
        }
        if let Some(value) = var("GD_NETWORK_NAME") {
            config.network_name = value;
        }
        if let Some(value) = var("GD_NATIVE_TOKEN_NAME") {
            config.native_token_name = value;
        }
        if let Some(value) = var("GD_DEFAULT_GASPRICE") {
            config.default_gas_price_gwei =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    var: "GD_DEFAULT_GASPRICE",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = var("GD_TOKEN_ADDRESSES") {
            config.tokens = parse_tokens(&value)?;
        }

        Ok(config)
    }

    /// Explorer URL of a transaction.
    pub fn transaction_url(&self, tx_hash: TxHash) -> String {
        format!("{}tx/{:#x}", self.block_explorer_url, tx_hash)
    }

    /// The native token.
    pub fn native_token(&self) -> Token {
        Token::native(self.native_token_name.clone())
    }

    /// Token by symbol: the native token or a whitelisted contract token.
    pub fn token(&self, symbol: &str) -> DonationResult<Token> {
        if symbol == self.native_token_name {
            return Ok(self.native_token());
        }
        self.tokens
            .get(symbol)
            .map(|t| Token::contract(symbol, t.address, t.decimals))
            .ok_or_else(|| DonationError::UnsupportedToken(symbol.to_string()))
    }

    /// Balance poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.token_poll_interval_ms)
    }

    /// Default gas price in wei.
    pub fn default_gas_price(&self) -> Amount {
        Amount::from(self.default_gas_price_gwei) * Amount::exp10(9)
    }

    /// Donation limits without a campaign cap.
    pub fn limits(&self) -> DonationLimits {
        DonationLimits::new(self.min_donation)
    }
}

fn parse_address(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    let hex = if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{}", value)
    };
    serde_json::from_value(serde_json::Value::String(hex)).map_err(|_| {
        ConfigError::InvalidAddress {
            var,
            value: value.to_string(),
        }
    })
}

fn parse_tokens(value: &str) -> Result<BTreeMap<String, TokenConfig>, ConfigError> {
    let raw: BTreeMap<String, String> =
        serde_json::from_str(value).map_err(|_| ConfigError::InvalidValue {
            var: "GD_TOKEN_ADDRESSES",
            value: value.to_string(),
        })?;

    raw.into_iter()
        .map(|(symbol, address)| {
            let address = parse_address("GD_TOKEN_ADDRESSES", &address)?;
            Ok((
                symbol,
                TokenConfig {
                    address,
                    decimals: DEFAULT_TOKEN_DECIMALS,
                },
            ))
        })
        .collect()
}
