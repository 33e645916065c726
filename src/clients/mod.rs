//! Handles used by callers to talk to the store actor.

mod macros;

mod checkout_client;
mod store_client;

pub use checkout_client::CheckoutClient;
pub use store_client::StoreClient;
