use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::domain::{Item, ItemCreate, ItemPatch, Order, OrderCreate, OrderPatch};
use crate::error::StoreError;
use crate::messages::{Counters, LoadSummary, StoreRequest, UnsyncedRecord};
use crate::mirror::ReconcileOutcome;
use crate::remote::ChangeEvent;
use crate::{client_method, impl_record_methods};

/// Handle to the store actor. Cheap to clone; every view or task that needs
/// the store holds its own copy.
#[derive(Clone)]
pub struct StoreClient {
    sender: mpsc::Sender<StoreRequest>,
}

impl StoreClient {
    pub fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    /// Written by hand so the password stays out of the span.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: String, password: String) -> Result<bool, StoreError> {
        debug!("Sending request");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Login {
                username,
                password,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::ActorCommunicationError("Actor closed".to_string()))?;
        response
            .await
            .map_err(|_| StoreError::ActorCommunicationError("Actor dropped".to_string()))?
    }

    /// Manual methods for special cases (no response needed)
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        debug!("Sending shutdown request");
        self.sender
            .send(StoreRequest::Shutdown)
            .await
            .map_err(|_| StoreError::ActorCommunicationError("Actor closed".to_string()))
    }
}

impl_record_methods!(StoreClient, Item, ItemCreate, ItemPatch, item);
impl_record_methods!(StoreClient, Order, OrderCreate, OrderPatch, order);

client_method!(StoreClient => fn logout() -> () as StoreRequest::Logout, Error = StoreError);
client_method!(StoreClient => fn is_authenticated() -> bool as StoreRequest::IsAuthenticated, Error = StoreError);
client_method!(StoreClient => fn list_items() -> Vec<Item> as StoreRequest::ListItems, Error = StoreError);
client_method!(StoreClient => fn list_orders() -> Vec<Order> as StoreRequest::ListOrders, Error = StoreError);
client_method!(StoreClient => fn increment_sold_count(id: String) -> Option<Item> as StoreRequest::IncrementSoldCount, Error = StoreError);
client_method!(StoreClient => fn update_pending_burn(amount: f64) -> f64 as StoreRequest::UpdatePendingBurn, Error = StoreError);
client_method!(StoreClient => fn update_burned_amount(amount: f64) -> f64 as StoreRequest::UpdateBurnedAmount, Error = StoreError);
client_method!(StoreClient => fn counters() -> Counters as StoreRequest::GetCounters, Error = StoreError);
client_method!(StoreClient => fn unsynced() -> Vec<UnsyncedRecord> as StoreRequest::Unsynced, Error = StoreError);
client_method!(StoreClient => fn load_initial_data() -> LoadSummary as StoreRequest::LoadInitialData, Error = StoreError);
client_method!(StoreClient => fn reconcile(event: ChangeEvent) -> ReconcileOutcome as StoreRequest::Reconcile, Error = StoreError);
