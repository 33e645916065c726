//! In-process copy of one remote table, keyed by record id.
//!
//! A [`Mirror`] holds the rows plus a per-record sync status so the store can
//! report which optimistic writes never reached the backend.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Item, ItemCreate, ItemPatch, Order, OrderCreate, OrderPatch};
use crate::remote::{from_row, to_row, ChangeEvent, ChangeKind, RemoteError};

/// A record type that can live in a [`Mirror`].
pub trait Record: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type CreatePayload: Send + Debug;
    type Patch: Serialize + Send + Debug;

    /// Lowercase noun used in logs and sync reports.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Construct the full record from a freshly generated id and the payload.
    fn from_create(id: String, payload: Self::CreatePayload) -> Self;

    /// Merge a partial update. Must leave the record untouched on error.
    fn on_update(&mut self, patch: Self::Patch) -> Result<(), String>;

    /// Display ordering for list views.
    fn display_cmp(a: &Self, b: &Self) -> Ordering;
}

impl Record for Item {
    type CreatePayload = ItemCreate;
    type Patch = ItemPatch;

    const KIND: &'static str = "item";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_create(id: String, payload: ItemCreate) -> Self {
        Self {
            id,
            title: payload.title,
            description: payload.description,
            image: payload.image,
            price: payload.price,
            price_xep: payload.price_xep,
            mint_count: payload.mint_count,
            sold_count: 0,
            creator: payload.creator,
        }
    }

    fn on_update(&mut self, patch: ItemPatch) -> Result<(), String> {
        self.apply_patch(patch)
    }

    fn display_cmp(a: &Self, b: &Self) -> Ordering {
        a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id))
    }
}

impl Record for Order {
    type CreatePayload = OrderCreate;
    type Patch = OrderPatch;

    const KIND: &'static str = "order";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_create(id: String, payload: OrderCreate) -> Self {
        Order::from_create(id, payload)
    }

    fn on_update(&mut self, patch: OrderPatch) -> Result<(), String> {
        self.apply_patch(patch);
        Ok(())
    }

    /// Newest purchase first.
    fn display_cmp(a: &Self, b: &Self) -> Ordering {
        b.purchase_date
            .cmp(&a.purchase_date)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Whether the backend has acknowledged the mirror's latest write for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Pending { write: u64 },
    Unsynced { reason: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MirrorError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Rejected(String),
}

/// What a reconciliation did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Upserted,
    Removed,
    Ignored,
}

pub struct Mirror<T: Record> {
    records: HashMap<String, T>,
    sync: HashMap<String, SyncStatus>,
    next_write: u64,
}

impl<T: Record> Default for Mirror<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            sync: HashMap::new(),
            next_write: 1,
        }
    }
}

impl<T: Record> Mirror<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    /// All records in display order.
    pub fn list(&self) -> Vec<T> {
        let mut records: Vec<T> = self.records.values().cloned().collect();
        records.sort_by(T::display_cmp);
        records
    }

    pub fn insert(&mut self, record: T) {
        self.records.insert(record.id().to_string(), record);
    }

    /// Merges `patch` into the record and returns the updated copy.
    pub fn update(&mut self, id: &str, patch: T::Patch) -> Result<T, MirrorError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| MirrorError::NotFound(id.to_string()))?;
        record.on_update(patch).map_err(MirrorError::Rejected)?;
        Ok(record.clone())
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.records.remove(id)
    }

    /// Replaces every record with a fresh read. Sync state is discarded.
    pub fn replace_all(&mut self, records: Vec<T>) {
        self.records = records
            .into_iter()
            .map(|r| (r.id().to_string(), r))
            .collect();
        self.sync.clear();
    }

    /// Marks a remote write for `id` as in flight and returns its ticket.
    pub fn begin_write(&mut self, id: &str) -> u64 {
        let write = self.next_write;
        self.next_write += 1;
        self.sync.insert(id.to_string(), SyncStatus::Pending { write });
        write
    }

    /// Records the backend's answer to write `write`.
    ///
    /// Success only clears the status if no newer write has started since. A
    /// failure marks the record unsynced unless a newer write has superseded it.
    pub fn finish_write(&mut self, id: &str, write: u64, outcome: Result<(), String>) {
        let superseded = matches!(
            self.sync.get(id),
            Some(SyncStatus::Pending { write: latest }) if *latest > write
        );
        match outcome {
            Ok(()) => {
                if self.sync.get(id) == Some(&SyncStatus::Pending { write }) {
                    self.sync.remove(id);
                }
            }
            Err(reason) if !superseded => {
                self.sync.insert(id.to_string(), SyncStatus::Unsynced { reason });
            }
            Err(_) => {}
        }
    }

    pub fn status(&self, id: &str) -> SyncStatus {
        self.sync.get(id).cloned().unwrap_or(SyncStatus::Synced)
    }

    /// `(id, reason)` for every record whose last write failed.
    pub fn unsynced(&self) -> Vec<(String, String)> {
        let mut failed: Vec<(String, String)> = self
            .sync
            .iter()
            .filter_map(|(id, status)| match status {
                SyncStatus::Unsynced { reason } => Some((id.clone(), reason.clone())),
                _ => None,
            })
            .collect();
        failed.sort();
        failed
    }

    /// Applies an inbound change event. The remote row wins: whatever the
    /// mirror held for the id is overwritten or removed, and its sync status
    /// is cleared.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> Result<ReconcileOutcome, RemoteError> {
        let Some(id) = event.record_id() else {
            return Ok(ReconcileOutcome::Ignored);
        };

        let outcome = match (event.event_type, &event.new) {
            (ChangeKind::Delete, _) => {
                self.records.remove(&id);
                ReconcileOutcome::Removed
            }
            (ChangeKind::Insert | ChangeKind::Update, Some(new)) => {
                let mut row = match self.records.get(&id) {
                    Some(existing) => to_row(existing)?,
                    None => Default::default(),
                };
                row.extend(new.clone());
                let record: T = from_row(row)?;
                self.records.insert(id.clone(), record);
                ReconcileOutcome::Upserted
            }
            (ChangeKind::Insert | ChangeKind::Update, None) => return Ok(ReconcileOutcome::Ignored),
        };

        self.sync.remove(&id);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn row(value: Value) -> crate::remote::Row {
        match value {
            Value::Object(row) => row,
            _ => panic!("not an object"),
        }
    }

    fn item(id: &str, title: &str) -> Item {
        Item::from_create(id.to_string(), ItemCreate::new(title, 5.0, 3))
    }

    #[test]
    fn test_list_items_by_title() {
        let mut mirror = Mirror::new();
        mirror.insert(item("1", "Zeta"));
        mirror.insert(item("2", "Alpha"));
        mirror.insert(item("3", "Mid"));

        let titles: Vec<_> = mirror.list().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn test_list_orders_newest_first() {
        let mut mirror = Mirror::new();
        for (id, day) in [("a", 1), ("b", 3), ("c", 2)] {
            mirror.insert(Order::from_create(
                id.to_string(),
                OrderCreate {
                    nft_id: None,
                    nft_title: "Genesis".to_string(),
                    customer: "Alice".to_string(),
                    wallet_address: "xA".to_string(),
                    purchase_date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
                    status: "pending payment".to_string(),
                },
            ));
        }
        let ids: Vec<_> = mirror.list().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_update_missing_and_rejected() {
        let mut mirror = Mirror::new();
        mirror.insert(item("1", "Genesis"));

        assert_eq!(
            mirror.update("nope", ItemPatch::default()).err(),
            Some(MirrorError::NotFound("nope".to_string()))
        );
        assert!(matches!(
            mirror.update("1", ItemPatch::sold_count(4)),
            Err(MirrorError::Rejected(_))
        ));
        assert_eq!(mirror.get("1").unwrap().sold_count, 0);
    }

    #[test]
    fn test_write_tickets() {
        let mut mirror: Mirror<Item> = Mirror::new();
        mirror.insert(item("1", "Genesis"));

        let first = mirror.begin_write("1");
        let second = mirror.begin_write("1");

        // An older acknowledgement does not clear a newer pending write
        mirror.finish_write("1", first, Ok(()));
        assert_eq!(mirror.status("1"), SyncStatus::Pending { write: second });

        // Nor does an older failure
        mirror.finish_write("1", first, Err("offline".to_string()));
        assert_eq!(mirror.status("1"), SyncStatus::Pending { write: second });

        mirror.finish_write("1", second, Err("offline".to_string()));
        assert_eq!(mirror.unsynced(), vec![("1".to_string(), "offline".to_string())]);

        let third = mirror.begin_write("1");
        mirror.finish_write("1", third, Ok(()));
        assert_eq!(mirror.status("1"), SyncStatus::Synced);
    }

    #[test]
    fn test_apply_change_merges_partial_rows() {
        let mut mirror = Mirror::new();
        mirror.insert(item("1", "Genesis"));
        mirror.begin_write("1");

        let event = ChangeEvent::update("nft_items", None, row(json!({"id": "1", "soldCount": 2})));
        assert_eq!(mirror.apply_change(&event), Ok(ReconcileOutcome::Upserted));

        let updated = mirror.get("1").unwrap();
        assert_eq!(updated.sold_count, 2);
        assert_eq!(updated.title, "Genesis");
        assert_eq!(mirror.status("1"), SyncStatus::Synced);
    }

    #[test]
    fn test_apply_change_rejects_undecodable_insert() {
        let mut mirror: Mirror<Item> = Mirror::new();
        let event = ChangeEvent::insert("nft_items", row(json!({"id": "9"})));
        assert!(matches!(mirror.apply_change(&event), Err(RemoteError::Decode(_))));
        assert!(mirror.is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut mirror = Mirror::new();
        mirror.insert(item("1", "Genesis"));
        let event = ChangeEvent::delete("nft_items", row(json!({"id": "1"})));

        assert_eq!(mirror.apply_change(&event), Ok(ReconcileOutcome::Removed));
        assert_eq!(mirror.apply_change(&event), Ok(ReconcileOutcome::Removed));
        assert!(mirror.get("1").is_none());
    }
}
