//! In-process table backend.
//!
//! Behaves like the hosted backend as far as the store can observe: ordered
//! selects, id-scoped writes, and a change feed fanned out to every
//! subscriber of a table. Failure and latency can be injected for tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::{
    row_id, ChangeEvent, EventMask, Filter, OrderBy, RemoteError, Row, Subscription, TableClient,
};

struct Subscriber {
    mask: EventMask,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    read_failure: Option<String>,
    write_failure: Option<String>,
    latency: Option<Duration>,
}

impl State {
    fn table_mut(&mut self, table: &str) -> Result<&mut Vec<Row>, RemoteError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::UnknownTable(table.to_string()))
    }

    fn check_writable(&self) -> Result<(), RemoteError> {
        match &self.write_failure {
            Some(reason) => Err(RemoteError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn publish(&mut self, event: ChangeEvent) {
        let Some(subscribers) = self.subscribers.get_mut(&event.table) else {
            return;
        };
        subscribers.retain(|subscriber| {
            if subscriber.mask.matches(event.event_type) {
                subscriber.sender.send(event.clone()).is_ok()
            } else {
                !subscriber.sender.is_closed()
            }
        });
    }
}

/// Shared handle to an in-memory set of tables. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryTables {
    state: Arc<Mutex<State>>,
}

impl MemoryTables {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = State {
            tables: tables.into_iter().map(|t| (t.into(), Vec::new())).collect(),
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Loads rows without emitting change events.
    pub fn seed(&self, table: &str, rows: Vec<Row>) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.table_mut(table)?.extend(rows);
        Ok(())
    }

    #[cfg(test)]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every subsequent select fail with `reason`, or clears the failure.
    #[cfg(test)]
    pub fn fail_reads(&self, reason: Option<&str>) {
        self.state.lock().read_failure = reason.map(str::to_string);
    }

    /// Makes every subsequent insert, update and delete fail with `reason`, or clears the failure.
    #[cfg(test)]
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.state.lock().write_failure = reason.map(str::to_string);
    }

    #[cfg(test)]
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    /// Delivers `event` to the table's subscribers as if another client had written it.
    #[cfg(test)]
    pub fn push_event(&self, event: ChangeEvent) {
        self.state.lock().publish(event);
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .get(table)
            .map(|subs| subs.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        // Timestamps carry a variable number of fractional digits
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // nulls sort last
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl TableClient for MemoryTables {
    #[instrument(skip(self))]
    async fn select(&self, table: &str, order: Option<OrderBy>) -> Result<Vec<Row>, RemoteError> {
        self.delay().await;
        let state = self.state.lock();
        if let Some(reason) = &state.read_failure {
            warn!(reason = %reason, "Injected read failure");
            return Err(RemoteError::Unavailable(reason.clone()));
        }
        let mut rows = state
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| RemoteError::UnknownTable(table.to_string()))?;

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        debug!(row_count = rows.len(), "Rows selected");
        Ok(rows)
    }

    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), RemoteError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.check_writable()?;
        let existing = state.table_mut(table)?;

        for row in &rows {
            if let Some(id) = row_id(row) {
                if existing.iter().any(|r| row_id(r).as_deref() == Some(id.as_str())) {
                    return Err(RemoteError::Rejected(format!("duplicate key value for id {}", id)));
                }
            }
        }
        existing.extend(rows.iter().cloned());

        for row in rows {
            state.publish(ChangeEvent::insert(table, row));
        }
        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, table: &str, patch: Row, filter: Filter) -> Result<(), RemoteError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.check_writable()?;

        let mut events = Vec::new();
        for row in state.table_mut(table)?.iter_mut().filter(|r| filter.matches(r)) {
            let old = row.clone();
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            events.push(ChangeEvent::update(table, Some(old), row.clone()));
        }

        debug!(updated = events.len(), "Rows updated");
        for event in events {
            state.publish(event);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, filter: Filter) -> Result<(), RemoteError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.check_writable()?;

        let rows = state.table_mut(table)?;
        let (removed, kept): (Vec<Row>, Vec<Row>) =
            rows.drain(..).partition(|r| filter.matches(r));
        *rows = kept;

        debug!(deleted = removed.len(), "Rows deleted");
        for row in removed {
            state.publish(ChangeEvent::delete(table, row));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, table: &str, events: EventMask) -> Result<Subscription, RemoteError> {
        let mut state = self.state.lock();
        if !state.tables.contains_key(table) {
            return Err(RemoteError::UnknownTable(table.to_string()));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        state
            .subscribers
            .entry(table.to_string())
            .or_default()
            .push(Subscriber { mask: events, sender });
        debug!("Subscriber registered");
        Ok(Subscription::new(receiver))
    }
}
