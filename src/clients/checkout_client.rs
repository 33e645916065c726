use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::clients::StoreClient;
use crate::domain::{Order, OrderCreate, WalletAddress};
use crate::error::{CheckoutError, StoreError};

/// Client for the buyer-facing purchase flow.
///
/// Orchestrates the store: validates the wallet, checks availability, records
/// the order and then advances the item's sold count.
#[derive(Clone)]
pub struct CheckoutClient {
    store: StoreClient,
}

impl CheckoutClient {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Records a purchase of `item_id` for `wallet_address`.
    ///
    /// Validation and the sold-out check happen before anything is written.
    /// The availability check and the sold-count increment are two separate
    /// store calls, so two buyers racing for the last unit can both get an
    /// order recorded; the loser then sees `SoldOut` from the increment.
    #[instrument(fields(item_id = %item_id), skip(self, item_id, wallet_address, customer))]
    pub async fn purchase(
        &self,
        item_id: String,
        wallet_address: String,
        customer: String,
    ) -> Result<Order, CheckoutError> {
        info!("Processing purchase request");

        // Step 1: Validate wallet
        let wallet = match WalletAddress::parse(&wallet_address) {
            Ok(wallet) => wallet,
            Err(reason) => {
                warn!(reason = %reason, "Wallet validation failed");
                return Err(CheckoutError::InvalidWallet(reason));
            }
        };

        // Step 2: Check availability
        let item = match self.store.get_item(item_id.clone()).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                error!("Item not found");
                return Err(CheckoutError::ItemNotFound(item_id));
            }
            Err(e) => {
                error!(error = %e, "Item lookup failed");
                return Err(e.into());
            }
        };
        if item.is_sold_out() {
            warn!(sold_count = item.sold_count, mint_count = item.mint_count, "Item sold out");
            return Err(CheckoutError::SoldOut(item.title));
        }
        info!(title = %item.title, remaining = item.remaining(), "Item available");

        // Step 3: Record the order
        let payload = OrderCreate::pending(&item, &wallet, customer, Utc::now());
        let order_id = self.store.add_order(payload).await.map_err(|e| {
            error!(error = %e, "Order could not be recorded");
            CheckoutError::from(e)
        })?;
        info!(order_id = %order_id, "Order recorded");

        // Step 4: Advance the sold count
        match self.store.increment_sold_count(item_id.clone()).await {
            Ok(Some(updated)) => info!(sold_count = updated.sold_count, "Sold count advanced"),
            Ok(None) => warn!("Item disappeared before its sold count could be advanced"),
            Err(StoreError::SoldOut { .. }) => {
                error!(order_id = %order_id, "Last unit sold concurrently, order recorded against a sold-out item");
                return Err(CheckoutError::SoldOut(item.title));
            }
            Err(e) => {
                error!(error = %e, "Sold count update failed");
                return Err(e.into());
            }
        }

        match self.store.get_order(order_id.clone()).await? {
            Some(order) => Ok(order),
            // Removed by a reconciliation between the two calls
            None => Err(StoreError::OrderNotFound(order_id).into()),
        }
    }
}
