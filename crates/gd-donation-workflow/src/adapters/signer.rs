//! Static Signer Adapter
//!
//! Signs for a fixed account with gas defaults taken from the configuration.

use crate::config::DonationConfig;
use crate::domain::{Address, Amount};
use crate::ports::outbound::{Signer, SignerOptions};

/// Signer for one fixed account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticSigner {
    address: Address,
    gas_price: Option<Amount>,
    extra_gas: u64,
}

impl StaticSigner {
    /// Signer leaving gas pricing to the provider.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            gas_price: None,
            extra_gas: 0,
        }
    }

    /// Signer using the configured default gas price and extra gas.
    pub fn from_config(address: Address, config: &DonationConfig) -> Self {
        Self {
            address,
            gas_price: Some(config.default_gas_price()),
            extra_gas: config.extra_gas,
        }
    }
}

impl Signer for StaticSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn options(&self) -> SignerOptions {
        SignerOptions {
            from: self.address,
            gas_price: self.gas_price,
            extra_gas: self.extra_gas,
        }
    }
}
