//! # Mock Framework
//!
//! Utilities for testing clients in isolation.
//!
//! Use [`create_mock_client`] to get a client and a receiver.
//! Then use helpers like [`expect_get_item`] or [`expect_add_order`] to assert behavior.

use tokio::sync::mpsc;

use crate::clients::StoreClient;
use crate::domain::{Item, Order, OrderCreate};
use crate::messages::{StoreRequest, StoreResponse};

/// Creates a mock store client and a receiver for asserting requests.
///
/// Tests that only exercise client-side orchestration (the checkout flow) use
/// this instead of a running `StoreService`. The test plays the actor: it
/// reads each request off `receiver` and answers through the responder, which
/// makes success, failure and ordering fully deterministic.
pub fn create_mock_client(buffer_size: usize) -> (StoreClient, mpsc::Receiver<StoreRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (StoreClient::new(sender), receiver)
}

/// Helper to verify that the next message is a GetItem request
pub async fn expect_get_item(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(String, StoreResponse<Option<Item>>)> {
    match receiver.recv().await {
        Some(StoreRequest::GetItem { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is an AddOrder request
pub async fn expect_add_order(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(OrderCreate, StoreResponse<String>)> {
    match receiver.recv().await {
        Some(StoreRequest::AddOrder { payload, respond_to }) => Some((payload, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is an IncrementSoldCount request
pub async fn expect_increment_sold_count(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(String, StoreResponse<Option<Item>>)> {
    match receiver.recv().await {
        Some(StoreRequest::IncrementSoldCount { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a GetOrder request
pub async fn expect_get_order(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(String, StoreResponse<Option<Order>>)> {
    match receiver.recv().await {
        Some(StoreRequest::GetOrder { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemCreate;
    use crate::mirror::Record;

    #[tokio::test]
    async fn test_mock_client() {
        let (client, mut receiver) = create_mock_client(10);

        let get_task = tokio::spawn(async move { client.get_item("nft_1".to_string()).await });

        let (id, responder) = expect_get_item(&mut receiver).await.expect("Expected GetItem request");
        assert_eq!(id, "nft_1");
        let item = Item::from_create("nft_1".to_string(), ItemCreate::new("Comet", 5.0, 3));
        responder.send(Ok(Some(item.clone()))).unwrap();

        let result = get_task.await.unwrap();
        assert_eq!(result, Ok(Some(item)));
    }

    #[tokio::test]
    async fn test_dropped_responder_surfaces_as_communication_error() {
        let (client, mut receiver) = create_mock_client(10);

        let task = tokio::spawn(async move { client.list_items().await });
        let request = receiver.recv().await.expect("Expected a request");
        drop(request);

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(crate::error::StoreError::ActorCommunicationError(_))
        ));
    }
}
