//! The synchronized store: one actor owning the mirror of both tables.

mod service;

pub use service::*;

use crate::config::MarketConfig;
use crate::messages::Table;

/// Backend names of the two mirrored tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub items: String,
    pub orders: String,
}

impl TableNames {
    pub fn new(items: impl Into<String>, orders: impl Into<String>) -> Self {
        Self {
            items: items.into(),
            orders: orders.into(),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Table> {
        if name == self.items {
            Some(Table::Items)
        } else if name == self.orders {
            Some(Table::Orders)
        } else {
            None
        }
    }

    pub fn name(&self, table: Table) -> &str {
        match table {
            Table::Items => &self.items,
            Table::Orders => &self.orders,
        }
    }
}

impl From<&MarketConfig> for TableNames {
    fn from(config: &MarketConfig) -> Self {
        Self::new(config.items_table.clone(), config.orders_table.clone())
    }
}
