use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use super::TableNames;
use crate::auth::AuthPolicy;
use crate::clients::StoreClient;
use crate::domain::{Item, ItemCreate, ItemPatch, Order, OrderCreate, OrderPatch, WalletAddress};
use crate::error::StoreError;
use crate::messages::{
    Counters, LoadSummary, StoreRequest, StoreResponse, Table, UnsyncedRecord, WriteReply,
};
use crate::mirror::{Mirror, MirrorError, ReconcileOutcome, Record};
use crate::remote::{
    from_row, to_row, ChangeEvent, Filter, OrderBy, RemoteError, Row, TableClient,
};

/// Macro for clean error response handling
macro_rules! send_error {
    ($respond_to:expr, $error:expr) => {{
        let _ = $respond_to.send(Err($error));
        return;
    }};
}

enum RemoteWrite {
    Insert(Row),
    Update(Row),
    Delete,
}

/// Store actor. Owns the mirror of both tables, the burn counters and the
/// operator session flag.
///
/// Every mutation is applied to the mirror before its remote write starts,
/// so reads served by the actor are optimistic. The write itself runs in a
/// spawned task that holds the caller's responder; the caller's future
/// resolves once the backend has answered, while the actor keeps serving
/// other requests. Failed writes leave the mirror as it is and mark the
/// record unsynced.
pub struct StoreService {
    receiver: mpsc::Receiver<StoreRequest>,
    loopback: mpsc::WeakSender<StoreRequest>,
    remote: Arc<dyn TableClient>,
    auth: Arc<dyn AuthPolicy>,
    tables: TableNames,
    items: Mirror<Item>,
    orders: Mirror<Order>,
    pending_burn: f64,
    burned_amount: f64,
    authenticated: bool,
}

impl StoreService {
    pub fn new(
        buffer_size: usize,
        remote: Arc<dyn TableClient>,
        auth: Arc<dyn AuthPolicy>,
        tables: TableNames,
    ) -> (Self, StoreClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let service = Self {
            receiver,
            loopback: sender.downgrade(),
            remote,
            auth,
            tables,
            items: Mirror::new(),
            orders: Mirror::new(),
            pending_burn: 0.0,
            burned_amount: 0.0,
            authenticated: false,
        };
        let client = StoreClient::new(sender);
        (service, client)
    }

    #[instrument(name = "store_service", skip(self))]
    pub async fn run(mut self) {
        info!("StoreService starting");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Login {
                    username,
                    password,
                    respond_to,
                } => self.handle_login(username, password, respond_to),
                StoreRequest::Logout { respond_to } => self.handle_logout(respond_to),
                StoreRequest::IsAuthenticated { respond_to } => {
                    let _ = respond_to.send(Ok(self.authenticated));
                }
                StoreRequest::AddItem { payload, respond_to } => {
                    self.handle_add_item(payload, respond_to)
                }
                StoreRequest::UpdateItem {
                    id,
                    patch,
                    respond_to,
                } => self.handle_update_item(id, patch, respond_to),
                StoreRequest::DeleteItem { id, respond_to } => {
                    self.handle_delete_item(id, respond_to)
                }
                StoreRequest::GetItem { id, respond_to } => {
                    let _ = respond_to.send(Ok(self.items.get(&id).cloned()));
                }
                StoreRequest::ListItems { respond_to } => {
                    let _ = respond_to.send(Ok(self.items.list()));
                }
                StoreRequest::IncrementSoldCount { id, respond_to } => {
                    self.handle_increment_sold_count(id, respond_to)
                }
                StoreRequest::AddOrder { payload, respond_to } => {
                    self.handle_add_order(payload, respond_to)
                }
                StoreRequest::UpdateOrder {
                    id,
                    patch,
                    respond_to,
                } => self.handle_update_order(id, patch, respond_to),
                StoreRequest::DeleteOrder { id, respond_to } => {
                    self.handle_delete_order(id, respond_to)
                }
                StoreRequest::GetOrder { id, respond_to } => {
                    let _ = respond_to.send(Ok(self.orders.get(&id).cloned()));
                }
                StoreRequest::ListOrders { respond_to } => {
                    let _ = respond_to.send(Ok(self.orders.list()));
                }
                StoreRequest::UpdatePendingBurn { amount, respond_to } => {
                    self.handle_update_pending_burn(amount, respond_to)
                }
                StoreRequest::UpdateBurnedAmount { amount, respond_to } => {
                    self.handle_update_burned_amount(amount, respond_to)
                }
                StoreRequest::GetCounters { respond_to } => {
                    let _ = respond_to.send(Ok(Counters {
                        pending_burn: self.pending_burn,
                        burned_amount: self.burned_amount,
                    }));
                }
                StoreRequest::Unsynced { respond_to } => self.handle_unsynced(respond_to),
                StoreRequest::LoadInitialData { respond_to } => {
                    self.handle_load_initial_data(respond_to)
                }
                StoreRequest::InitialDataLoaded { result, respond_to } => {
                    self.handle_initial_data_loaded(result, respond_to)
                }
                StoreRequest::Reconcile { event, respond_to } => {
                    self.handle_reconcile(event, respond_to)
                }
                StoreRequest::WriteCompleted {
                    table,
                    id,
                    write,
                    outcome,
                    reply,
                } => self.handle_write_completed(table, id, write, outcome, reply),
                StoreRequest::Shutdown => {
                    info!("StoreService shutting down");
                    break;
                }
            }
        }

        info!("StoreService stopped");
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    #[instrument(skip(self, password, respond_to))]
    fn handle_login(&mut self, username: String, password: String, respond_to: StoreResponse<bool>) {
        debug!("Processing login request");

        let accepted = self.auth.verify(&username, &password);
        if accepted {
            self.authenticated = true;
            info!("Operator authenticated");
        } else {
            warn!("Login rejected");
        }

        let _ = respond_to.send(Ok(accepted));
    }

    #[instrument(skip(self, respond_to))]
    fn handle_logout(&mut self, respond_to: StoreResponse<()>) {
        self.authenticated = false;
        info!("Operator logged out");
        let _ = respond_to.send(Ok(()));
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    #[instrument(fields(title = %payload.title), skip(self, payload, respond_to))]
    fn handle_add_item(&mut self, payload: ItemCreate, respond_to: StoreResponse<String>) {
        debug!("Processing add_item request");

        if let Err(reason) = payload.validate() {
            warn!(reason = %reason, "Item rejected");
            send_error!(respond_to, StoreError::ValidationError(reason));
        }

        let id = Uuid::new_v4().to_string();
        let item = Item::from_create(id.clone(), payload);
        let row = match to_row(&item) {
            Ok(row) => row,
            Err(e) => send_error!(respond_to, e.into()),
        };

        self.items.insert(item);
        let write = self.items.begin_write(&id);
        info!(item_id = %id, "Item added to mirror");

        self.write_through(Table::Items, id.clone(), Some(write), RemoteWrite::Insert(row), id, respond_to);
    }

    #[instrument(fields(item_id = %id), skip(self, patch, respond_to))]
    fn handle_update_item(&mut self, id: String, patch: ItemPatch, respond_to: StoreResponse<Item>) {
        debug!("Processing update_item request");

        let row = match to_row(&patch) {
            Ok(row) => row,
            Err(e) => send_error!(respond_to, e.into()),
        };

        let updated = match self.items.update(&id, patch) {
            Ok(item) => item,
            Err(MirrorError::NotFound(_)) => {
                warn!("Item not found for update");
                send_error!(respond_to, StoreError::ItemNotFound(id));
            }
            Err(MirrorError::Rejected(reason)) => {
                warn!(reason = %reason, "Item update rejected");
                send_error!(respond_to, StoreError::ValidationError(reason));
            }
        };
        info!(sold_count = updated.sold_count, mint_count = updated.mint_count, "Item updated in mirror");

        if row.is_empty() {
            let _ = respond_to.send(Ok(updated));
            return;
        }
        let write = self.items.begin_write(&id);
        self.write_through(Table::Items, id, Some(write), RemoteWrite::Update(row), updated, respond_to);
    }

    #[instrument(fields(item_id = %id), skip(self, respond_to))]
    fn handle_delete_item(&mut self, id: String, respond_to: StoreResponse<()>) {
        debug!("Processing delete_item request");

        let write = match self.items.remove(&id) {
            Some(item) => {
                info!(title = %item.title, "Item removed from mirror");
                Some(self.items.begin_write(&id))
            }
            None => {
                debug!("Item not in mirror, deleting upstream only");
                None
            }
        };

        self.write_through(Table::Items, id, write, RemoteWrite::Delete, (), respond_to);
    }

    /// Advances `sold_count` by one. Absent ids are a no-op; a sold-out item is rejected.
    #[instrument(fields(item_id = %id), skip(self, respond_to))]
    fn handle_increment_sold_count(&mut self, id: String, respond_to: StoreResponse<Option<Item>>) {
        debug!("Processing increment_sold_count request");

        let Some(item) = self.items.get(&id) else {
            debug!("Item not in mirror, nothing to increment");
            let _ = respond_to.send(Ok(None));
            return;
        };

        if item.is_sold_out() {
            warn!(sold_count = item.sold_count, mint_count = item.mint_count, "Item already sold out");
            let error = StoreError::SoldOut {
                id,
                sold_count: item.sold_count,
                mint_count: item.mint_count,
            };
            send_error!(respond_to, error);
        }

        let patch = ItemPatch::sold_count(item.sold_count + 1);
        let row = match to_row(&patch) {
            Ok(row) => row,
            Err(e) => send_error!(respond_to, e.into()),
        };
        let updated = match self.items.update(&id, patch) {
            Ok(item) => item,
            Err(e) => send_error!(respond_to, StoreError::ValidationError(e.to_string())),
        };
        info!(sold_count = updated.sold_count, "Sold count incremented");

        let write = self.items.begin_write(&id);
        self.write_through(Table::Items, id, Some(write), RemoteWrite::Update(row), Some(updated), respond_to);
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    #[instrument(fields(nft_title = %payload.nft_title), skip(self, payload, respond_to))]
    fn handle_add_order(&mut self, payload: OrderCreate, respond_to: StoreResponse<String>) {
        debug!("Processing add_order request");

        if let Err(reason) = WalletAddress::parse(&payload.wallet_address) {
            warn!(reason = %reason, "Order rejected");
            send_error!(respond_to, StoreError::ValidationError(reason));
        }

        let id = Uuid::new_v4().to_string();
        let order = <Order as Record>::from_create(id.clone(), payload);
        let row = match to_row(&order) {
            Ok(row) => row,
            Err(e) => send_error!(respond_to, e.into()),
        };

        self.orders.insert(order);
        let write = self.orders.begin_write(&id);
        info!(order_id = %id, "Order added to mirror");

        self.write_through(Table::Orders, id.clone(), Some(write), RemoteWrite::Insert(row), id, respond_to);
    }

    #[instrument(fields(order_id = %id), skip(self, patch, respond_to))]
    fn handle_update_order(&mut self, id: String, patch: OrderPatch, respond_to: StoreResponse<Order>) {
        debug!("Processing update_order request");

        if let Some(wallet) = &patch.wallet_address {
            if let Err(reason) = WalletAddress::parse(wallet) {
                warn!(reason = %reason, "Order update rejected");
                send_error!(respond_to, StoreError::ValidationError(reason));
            }
        }

        let row = match to_row(&patch) {
            Ok(row) => row,
            Err(e) => send_error!(respond_to, e.into()),
        };

        let updated = match self.orders.update(&id, patch) {
            Ok(order) => order,
            Err(MirrorError::NotFound(_)) => {
                warn!("Order not found for update");
                send_error!(respond_to, StoreError::OrderNotFound(id));
            }
            Err(MirrorError::Rejected(reason)) => {
                send_error!(respond_to, StoreError::ValidationError(reason));
            }
        };
        info!(status = %updated.status, "Order updated in mirror");

        if row.is_empty() {
            let _ = respond_to.send(Ok(updated));
            return;
        }
        let write = self.orders.begin_write(&id);
        self.write_through(Table::Orders, id, Some(write), RemoteWrite::Update(row), updated, respond_to);
    }

    #[instrument(fields(order_id = %id), skip(self, respond_to))]
    fn handle_delete_order(&mut self, id: String, respond_to: StoreResponse<()>) {
        debug!("Processing delete_order request");

        let write = match self.orders.remove(&id) {
            Some(order) => {
                info!(status = %order.status, "Order removed from mirror");
                Some(self.orders.begin_write(&id))
            }
            None => {
                debug!("Order not in mirror, deleting upstream only");
                None
            }
        };

        self.write_through(Table::Orders, id, write, RemoteWrite::Delete, (), respond_to);
    }

    // -------------------------------------------------------------------------
    // Local counters
    // -------------------------------------------------------------------------

    #[instrument(skip(self, respond_to))]
    fn handle_update_pending_burn(&mut self, amount: f64, respond_to: StoreResponse<f64>) {
        if !amount.is_finite() {
            send_error!(respond_to, StoreError::ValidationError(format!("invalid burn amount {}", amount)));
        }
        self.pending_burn += amount;
        debug!(pending_burn = self.pending_burn, "Pending burn updated");
        let _ = respond_to.send(Ok(self.pending_burn));
    }

    #[instrument(skip(self, respond_to))]
    fn handle_update_burned_amount(&mut self, amount: f64, respond_to: StoreResponse<f64>) {
        if !amount.is_finite() {
            send_error!(respond_to, StoreError::ValidationError(format!("invalid burn amount {}", amount)));
        }
        self.burned_amount = amount;
        debug!(burned_amount = self.burned_amount, "Burned amount set");
        let _ = respond_to.send(Ok(self.burned_amount));
    }

    fn handle_unsynced(&self, respond_to: StoreResponse<Vec<UnsyncedRecord>>) {
        let items = self.items.unsynced().into_iter().map(|(id, reason)| UnsyncedRecord {
            table: Table::Items,
            id,
            reason,
        });
        let orders = self.orders.unsynced().into_iter().map(|(id, reason)| UnsyncedRecord {
            table: Table::Orders,
            id,
            reason,
        });
        let _ = respond_to.send(Ok(items.chain(orders).collect()));
    }

    // -------------------------------------------------------------------------
    // Remote reads and reconciliation
    // -------------------------------------------------------------------------

    /// **Background read** - the fetch runs off the actor and posts its
    /// result back, so the mirror is replaced in one step.
    #[instrument(skip(self, respond_to))]
    fn handle_load_initial_data(&self, respond_to: StoreResponse<LoadSummary>) {
        debug!("Processing load_initial_data request");

        let remote = Arc::clone(&self.remote);
        let items_table = self.tables.items.clone();
        let orders_table = self.tables.orders.clone();
        let loopback = self.loopback.clone();

        tokio::spawn(
            async move {
                let result = fetch_tables(remote.as_ref(), &items_table, &orders_table).await;
                post_back(&loopback, StoreRequest::InitialDataLoaded { result, respond_to }).await;
            }
            .in_current_span(),
        );
    }

    #[instrument(skip(self, result, respond_to))]
    fn handle_initial_data_loaded(
        &mut self,
        result: Result<(Vec<Item>, Vec<Order>), RemoteError>,
        respond_to: StoreResponse<LoadSummary>,
    ) {
        match result {
            Ok((items, orders)) => {
                let summary = LoadSummary {
                    items: items.len(),
                    orders: orders.len(),
                };
                self.items.replace_all(items);
                self.orders.replace_all(orders);
                self.pending_burn = 0.0;
                self.burned_amount = 0.0;
                info!(items = summary.items, orders = summary.orders, "Mirror loaded from backend");
                let _ = respond_to.send(Ok(summary));
            }
            Err(e) => {
                error!(error = %e, "Initial load failed, keeping current mirror");
                let _ = respond_to.send(Err(e.into()));
            }
        }
    }

    #[instrument(
        fields(table = %event.table, kind = ?event.event_type, record_id = ?event.record_id()),
        skip(self, event, respond_to)
    )]
    fn handle_reconcile(&mut self, event: ChangeEvent, respond_to: StoreResponse<ReconcileOutcome>) {
        debug!("Processing change event");

        let outcome = match self.tables.resolve(&event.table) {
            Some(Table::Items) => self.items.apply_change(&event),
            Some(Table::Orders) => self.orders.apply_change(&event),
            None => {
                warn!("Change event for unknown table ignored");
                Ok(ReconcileOutcome::Ignored)
            }
        };

        match &outcome {
            Ok(ReconcileOutcome::Ignored) => debug!("Change event carried nothing to apply"),
            Ok(applied) => info!(outcome = ?applied, "Change reconciled"),
            Err(e) => warn!(error = %e, "Change event could not be applied"),
        }

        let _ = respond_to.send(outcome.map_err(StoreError::from));
    }

    #[instrument(skip(self, outcome, reply))]
    fn handle_write_completed(
        &mut self,
        table: Table,
        id: String,
        write: Option<u64>,
        outcome: Result<(), RemoteError>,
        reply: WriteReply,
    ) {
        if let Some(write) = write {
            let status = outcome.clone().map_err(|e| e.to_string());
            let status = match table {
                Table::Items => {
                    self.items.finish_write(&id, write, status);
                    self.items.status(&id)
                }
                Table::Orders => {
                    self.orders.finish_write(&id, write, status);
                    self.orders.status(&id)
                }
            };
            debug!(?status, "Sync status updated");
        }

        match (&outcome, write) {
            (Ok(()), _) => debug!("Remote write acknowledged"),
            (Err(e), Some(_)) => error!(error = %e, "Remote write failed, record marked unsynced"),
            (Err(e), None) => error!(error = %e, "Remote write failed for a record not in the mirror"),
        }

        reply(outcome.map_err(StoreError::from));
    }

    /// Spawns the remote half of a mutation. The caller receives `value` once
    /// the backend acknowledges, or the backend's error.
    fn write_through<T: Send + 'static>(
        &self,
        table: Table,
        id: String,
        write: Option<u64>,
        op: RemoteWrite,
        value: T,
        respond_to: StoreResponse<T>,
    ) {
        let remote = Arc::clone(&self.remote);
        let table_name = self.tables.name(table).to_string();
        let loopback = self.loopback.clone();
        let reply: WriteReply = Box::new(move |result| {
            let _ = respond_to.send(result.map(|()| value));
        });

        tokio::spawn(
            async move {
                let filter = Filter::eq("id", id.clone());
                let outcome = match op {
                    RemoteWrite::Insert(row) => remote.insert(&table_name, vec![row]).await,
                    RemoteWrite::Update(patch) => remote.update(&table_name, patch, filter).await,
                    RemoteWrite::Delete => remote.delete(&table_name, filter).await,
                };
                let completed = StoreRequest::WriteCompleted {
                    table,
                    id,
                    write,
                    outcome,
                    reply,
                };
                post_back(&loopback, completed).await;
            }
            .in_current_span(),
        );
    }
}

async fn fetch_tables(
    remote: &dyn TableClient,
    items_table: &str,
    orders_table: &str,
) -> Result<(Vec<Item>, Vec<Order>), RemoteError> {
    let item_rows = remote.select(items_table, Some(OrderBy::asc("title"))).await?;
    let order_rows = remote
        .select(orders_table, Some(OrderBy::desc("purchaseDate")))
        .await?;
    Ok((decode_rows(item_rows), decode_rows(order_rows)))
}

fn decode_rows<T: Record>(rows: Vec<Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match from_row::<T>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(kind = T::KIND, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect()
}

/// Hands a background result back to the actor. If the actor is gone the
/// waiting caller is answered directly.
async fn post_back(loopback: &mpsc::WeakSender<StoreRequest>, msg: StoreRequest) {
    let undelivered = match loopback.upgrade() {
        Some(sender) => match sender.send(msg).await {
            Ok(()) => return,
            Err(mpsc::error::SendError(msg)) => msg,
        },
        None => msg,
    };

    warn!("Store stopped before a background result was applied");
    match undelivered {
        StoreRequest::WriteCompleted { outcome, reply, .. } => {
            reply(outcome.map_err(StoreError::from))
        }
        StoreRequest::InitialDataLoaded { respond_to, .. } => {
            let _ = respond_to.send(Err(StoreError::ActorCommunicationError(
                "Store stopped".to_string(),
            )));
        }
        _ => {}
    }
}
