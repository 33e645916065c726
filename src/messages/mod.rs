use tokio::sync::oneshot;

use crate::domain::{Item, ItemCreate, ItemPatch, Order, OrderCreate, OrderPatch};
use crate::error::StoreError;
use crate::mirror::ReconcileOutcome;
use crate::remote::{ChangeEvent, RemoteError};

/// Generic type aliases for service communication
pub type ServiceResult<T, E> = std::result::Result<T, E>;
pub type ServiceResponse<T, E> = oneshot::Sender<ServiceResult<T, E>>;
pub type StoreResponse<T> = ServiceResponse<T, StoreError>;

/// Delivers the caller's answer once a background remote write settles.
pub type WriteReply = Box<dyn FnOnce(Result<(), StoreError>) + Send>;

/// Which mirrored table a request or event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Items,
    Orders,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Counters {
    pub pending_burn: f64,
    pub burned_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub items: usize,
    pub orders: usize,
}

/// A record whose last remote write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsyncedRecord {
    pub table: Table,
    pub id: String,
    pub reason: String,
}

/// Typed messages for the store actor. Each variant carries its parameters and
/// a oneshot channel for the response.
pub enum StoreRequest {
    Login {
        username: String,
        password: String,
        respond_to: StoreResponse<bool>,
    },
    Logout {
        respond_to: StoreResponse<()>,
    },
    IsAuthenticated {
        respond_to: StoreResponse<bool>,
    },
    AddItem {
        payload: ItemCreate,
        respond_to: StoreResponse<String>,
    },
    UpdateItem {
        id: String,
        patch: ItemPatch,
        respond_to: StoreResponse<Item>,
    },
    DeleteItem {
        id: String,
        respond_to: StoreResponse<()>,
    },
    GetItem {
        id: String,
        respond_to: StoreResponse<Option<Item>>,
    },
    ListItems {
        respond_to: StoreResponse<Vec<Item>>,
    },
    IncrementSoldCount {
        id: String,
        respond_to: StoreResponse<Option<Item>>,
    },
    AddOrder {
        payload: OrderCreate,
        respond_to: StoreResponse<String>,
    },
    UpdateOrder {
        id: String,
        patch: OrderPatch,
        respond_to: StoreResponse<Order>,
    },
    DeleteOrder {
        id: String,
        respond_to: StoreResponse<()>,
    },
    GetOrder {
        id: String,
        respond_to: StoreResponse<Option<Order>>,
    },
    ListOrders {
        respond_to: StoreResponse<Vec<Order>>,
    },
    UpdatePendingBurn {
        amount: f64,
        respond_to: StoreResponse<f64>,
    },
    UpdateBurnedAmount {
        amount: f64,
        respond_to: StoreResponse<f64>,
    },
    GetCounters {
        respond_to: StoreResponse<Counters>,
    },
    Unsynced {
        respond_to: StoreResponse<Vec<UnsyncedRecord>>,
    },
    LoadInitialData {
        respond_to: StoreResponse<LoadSummary>,
    },
    Reconcile {
        event: ChangeEvent,
        respond_to: StoreResponse<ReconcileOutcome>,
    },
    // Posted back by background tasks, never by clients
    WriteCompleted {
        table: Table,
        id: String,
        // None when the mirror has no record to track
        write: Option<u64>,
        outcome: Result<(), RemoteError>,
        reply: WriteReply,
    },
    InitialDataLoaded {
        result: Result<(Vec<Item>, Vec<Order>), RemoteError>,
        respond_to: StoreResponse<LoadSummary>,
    },
    Shutdown,
}

impl std::fmt::Debug for StoreRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreRequest::Login { .. } => "Login",
            StoreRequest::Logout { .. } => "Logout",
            StoreRequest::IsAuthenticated { .. } => "IsAuthenticated",
            StoreRequest::AddItem { .. } => "AddItem",
            StoreRequest::UpdateItem { .. } => "UpdateItem",
            StoreRequest::DeleteItem { .. } => "DeleteItem",
            StoreRequest::GetItem { .. } => "GetItem",
            StoreRequest::ListItems { .. } => "ListItems",
            StoreRequest::IncrementSoldCount { .. } => "IncrementSoldCount",
            StoreRequest::AddOrder { .. } => "AddOrder",
            StoreRequest::UpdateOrder { .. } => "UpdateOrder",
            StoreRequest::DeleteOrder { .. } => "DeleteOrder",
            StoreRequest::GetOrder { .. } => "GetOrder",
            StoreRequest::ListOrders { .. } => "ListOrders",
            StoreRequest::UpdatePendingBurn { .. } => "UpdatePendingBurn",
            StoreRequest::UpdateBurnedAmount { .. } => "UpdateBurnedAmount",
            StoreRequest::GetCounters { .. } => "GetCounters",
            StoreRequest::Unsynced { .. } => "Unsynced",
            StoreRequest::LoadInitialData { .. } => "LoadInitialData",
            StoreRequest::Reconcile { .. } => "Reconcile",
            StoreRequest::WriteCompleted { .. } => "WriteCompleted",
            StoreRequest::InitialDataLoaded { .. } => "InitialDataLoaded",
            StoreRequest::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}
