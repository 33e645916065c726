use std::env;

use dotenvy::dotenv;

use crate::error::ConfigError;

/// Runtime settings for the market store.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub items_table: String,
    pub orders_table: String,
    pub store_buffer: usize,
    pub seed_demo: bool,
}

impl MarketConfig {
    /// Config with the given operator credentials and default table names.
    pub fn new(admin_username: impl Into<String>, admin_password: impl Into<String>) -> Self {
        Self {
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            items_table: "nft_items".to_string(),
            orders_table: "nft_orders".to_string(),
            store_buffer: 100,
            seed_demo: false,
        }
    }

    /// Loads `.env` if present, then reads `MARKET_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &str| match lookup(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(name.to_string())),
        };

        let mut config = Self::new(
            required("MARKET_ADMIN_USERNAME")?,
            required("MARKET_ADMIN_PASSWORD")?,
        );
        if let Some(items_table) = lookup("MARKET_ITEMS_TABLE") {
            config.items_table = items_table;
        }
        if let Some(orders_table) = lookup("MARKET_ORDERS_TABLE") {
            config.orders_table = orders_table;
        }

        config.store_buffer = lookup("MARKET_STORE_BUFFER")
            .unwrap_or_else(|| "100".to_string())
            .parse::<usize>()
            .map_err(|e| ConfigError::Invalid {
                name: "MARKET_STORE_BUFFER".to_string(),
                reason: e.to_string(),
            })?;
        if config.store_buffer == 0 {
            return Err(ConfigError::Invalid {
                name: "MARKET_STORE_BUFFER".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        config.seed_demo = lookup("MARKET_SEED_DEMO")
            .unwrap_or_else(|| "true".to_string())
            .parse::<bool>()
            .map_err(|e| ConfigError::Invalid {
                name: "MARKET_SEED_DEMO".to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            items_table = %config.items_table,
            orders_table = %config.orders_table,
            "Market configuration loaded"
        );
        Ok(config)
    }
}
