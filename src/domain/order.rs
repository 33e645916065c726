use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Item, WalletAddress};

/// Status given to every order recorded by the checkout flow.
pub const PENDING_PAYMENT: &str = "pending payment";

/// Represents a buyer's purchase record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_id: Option<String>,
    pub nft_title: String,
    pub customer: String,
    pub wallet_address: String,
    pub purchase_date: DateTime<Utc>,
    pub status: String,
}

/// Payload for recording a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreate {
    pub nft_id: Option<String>,
    pub nft_title: String,
    pub customer: String,
    pub wallet_address: String,
    pub purchase_date: DateTime<Utc>,
    pub status: String,
}

/// Partial update for an order, typically a status change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl OrderCreate {
    /// Builds the order recorded when a buyer confirms a purchase of `item`.
    pub fn pending(
        item: &Item,
        wallet: &WalletAddress,
        customer: impl Into<String>,
        purchase_date: DateTime<Utc>,
    ) -> Self {
        Self {
            nft_id: Some(item.id.clone()),
            nft_title: item.title.clone(),
            customer: customer.into(),
            wallet_address: wallet.as_str().to_string(),
            purchase_date,
            status: PENDING_PAYMENT.to_string(),
        }
    }
}

impl OrderPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

impl Order {
    pub fn from_create(id: String, payload: OrderCreate) -> Self {
        Self {
            id,
            nft_id: payload.nft_id,
            nft_title: payload.nft_title,
            customer: payload.customer,
            wallet_address: payload.wallet_address,
            purchase_date: payload.purchase_date,
            status: payload.status,
        }
    }

    pub fn apply_patch(&mut self, patch: OrderPatch) {
        if let Some(customer) = patch.customer {
            self.customer = customer;
        }
        if let Some(wallet_address) = patch.wallet_address {
            self.wallet_address = wallet_address;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}
