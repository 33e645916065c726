//! The hosted table backend as seen by the store.
//!
//! The backend is a row-oriented table store reached over request/response
//! calls plus a change-notification feed. [`TableClient`] is the seam; rows are
//! plain JSON objects keyed by column name.

pub mod memory;

pub use memory::MemoryTables;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// One table row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Errors reported by the table backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Write rejected: {0}")]
    Rejected(String),
    #[error("Row decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change on a watched table, with before/after snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: String,
    pub event_type: ChangeKind,
    #[serde(default)]
    pub old: Option<Row>,
    #[serde(default)]
    pub new: Option<Row>,
}

impl ChangeEvent {
    pub fn insert(table: impl Into<String>, new: Row) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeKind::Insert,
            old: None,
            new: Some(new),
        }
    }

    pub fn update(table: impl Into<String>, old: Option<Row>, new: Row) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeKind::Update,
            old,
            new: Some(new),
        }
    }

    pub fn delete(table: impl Into<String>, old: Row) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeKind::Delete,
            old: Some(old),
            new: None,
        }
    }

    /// The id of the affected row, taken from the after-image when present.
    pub fn record_id(&self) -> Option<String> {
        self.new
            .as_ref()
            .and_then(row_id)
            .or_else(|| self.old.as_ref().and_then(row_id))
    }
}

/// Which change kinds a subscription wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventMask {
    pub const ALL: EventMask = EventMask {
        insert: true,
        update: true,
        delete: true,
    };

    #[cfg(test)]
    pub fn only(kind: ChangeKind) -> Self {
        Self {
            insert: kind == ChangeKind::Insert,
            update: kind == ChangeKind::Update,
            delete: kind == ChangeKind::Delete,
        }
    }

    pub fn matches(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Equality filter scoping an update or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

/// A live change feed for one table. Dropping it or calling
/// [`Subscription::unsubscribe`] stops delivery.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self { events }
    }

    /// Next change event, or `None` once the backend closes the feed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.events.close();
    }
}

/// Request/response surface of the table backend plus its change feed.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn select(&self, table: &str, order: Option<OrderBy>) -> Result<Vec<Row>, RemoteError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), RemoteError>;

    async fn update(&self, table: &str, patch: Row, filter: Filter) -> Result<(), RemoteError>;

    async fn delete(&self, table: &str, filter: Filter) -> Result<(), RemoteError>;

    async fn subscribe(&self, table: &str, events: EventMask) -> Result<Subscription, RemoteError>;
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, RemoteError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(RemoteError::Decode(format!("expected an object, got {}", other))),
        Err(e) => Err(RemoteError::Decode(e.to_string())),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, RemoteError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Reads the `id` column, accepting string or numeric ids.
pub fn row_id(row: &Row) -> Option<String> {
    match row.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(row) => row,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_record_id_prefers_after_image() {
        let event = ChangeEvent::update("nft_items", Some(row(json!({"id": "a"}))), row(json!({"id": "b"})));
        assert_eq!(event.record_id(), Some("b".to_string()));

        let event = ChangeEvent::delete("nft_items", row(json!({"id": 7})));
        assert_eq!(event.record_id(), Some("7".to_string()));

        let event = ChangeEvent::delete("nft_items", row(json!({"title": "no id"})));
        assert_eq!(event.record_id(), None);
    }

    #[test]
    fn test_change_event_wire_format() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "table": "nft_orders",
            "eventType": "DELETE",
            "old": {"id": "order_1"}
        }))
        .unwrap();
        assert_eq!(event.event_type, ChangeKind::Delete);
        assert!(event.new.is_none());
        assert_eq!(event.record_id(), Some("order_1".to_string()));
    }

    #[test]
    fn test_event_mask() {
        assert!(EventMask::ALL.matches(ChangeKind::Delete));
        let inserts = EventMask::only(ChangeKind::Insert);
        assert!(inserts.matches(ChangeKind::Insert));
        assert!(!inserts.matches(ChangeKind::Update));
    }
}
