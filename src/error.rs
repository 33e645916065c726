use thiserror::Error;

use crate::remote::RemoteError;

/// Errors returned by store operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("Item sold out: {id} ({sold_count}/{mint_count} sold)")]
    SoldOut {
        id: String,
        sold_count: u32,
        mint_count: u32,
    },
    #[error("Store validation error: {0}")]
    ValidationError(String),
    #[error("Remote table error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

/// Errors returned by the purchase flow.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckoutError {
    #[error("{0}")]
    InvalidWallet(String),
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("This item is sold out: {0}")]
    SoldOut(String),
    #[error("Checkout failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    Missing(String),
    #[error("Invalid value for '{name}': {reason}")]
    Invalid { name: String, reason: String },
}
