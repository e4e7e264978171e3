//! Application configuration loaded from environment variables.

use deposit_pool::{
    native_deposit_amount, token_deposit_amount, Address, Amount, EngineConfig, FundingAsset,
};

use crate::errors::{Result, ServiceError};

/// Decimal amount, or hex with a `0x` prefix. Empty digits are rejected.
pub fn parse_amount(raw: &str) -> Option<Amount> {
    let (digits, radix) = match raw.strip_prefix("0x") {
        Some(digits) => (digits, 16),
        None => (raw, 10),
    };
    if digits.is_empty() {
        return None;
    }
    Amount::from_str_radix(digits, radix).ok()
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Identity allowed to sweep residual balances
    pub admin: Address,
    /// Token contract whose transfer callbacks fund pools; native value when unset
    pub funding_token: Option<Address>,
    /// Overrides the per-asset default deposit size
    pub target_amount: Option<Amount>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let admin: Address = lookup("ADMIN_ADDRESS")
            .ok_or_else(|| {
                ServiceError::Config("ADMIN_ADDRESS environment variable is required".to_string())
            })?
            .parse()
            .map_err(|_| ServiceError::Config("Invalid ADMIN_ADDRESS".to_string()))?;

        let funding_token: Option<Address> = lookup("FUNDING_TOKEN")
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| ServiceError::Config("Invalid FUNDING_TOKEN".to_string()))?;

        let target_amount = lookup("TARGET_AMOUNT")
            .map(|v| parse_amount(&v).ok_or(()))
            .transpose()
            .map_err(|_| ServiceError::Config("Invalid TARGET_AMOUNT".to_string()))?;

        Ok(Config {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./deposit_pool_events.db".to_string()),
            api_port: lookup("API_PORT")
                .unwrap_or_else(|| "3001".to_string())
                .parse()
                .map_err(|_| ServiceError::Config("Invalid API_PORT".to_string()))?,
            admin,
            funding_token,
            target_amount,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        let (funding, default_target) = match self.funding_token {
            Some(token) => (FundingAsset::Token(token), token_deposit_amount()),
            None => (FundingAsset::Native, native_deposit_amount()),
        };
        EngineConfig {
            admin: self.admin,
            target_amount: self.target_amount.unwrap_or(default_target),
            funding,
        }
    }
}
