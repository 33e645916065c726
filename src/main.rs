mod auth;
mod clients;
mod config;
mod domain;
mod error;
mod messages;
mod mirror;
mod remote;
mod store_actor;

mod app_system;

#[cfg(test)]
mod mock_framework;

use std::sync::Arc;

use tracing::{error, info, Instrument};

use crate::app_system::{setup_tracing, MarketSystem};
use crate::config::MarketConfig;
use crate::domain::{format_price, Item, ItemCreate};
use crate::remote::{to_row, MemoryTables, RemoteError, Row};

/// A small catalog so the in-memory backend has something to sell.
fn demo_catalog() -> Result<Vec<Row>, RemoteError> {
    let items = [
        ("nft_comet", "Comet Trail", "A streak across the night sky.", 12.5, 3, 1),
        ("nft_harbor", "Harbor Lights", "Dusk over the old port.", 1250.0, 10, 4),
        ("nft_origin", "Origin", "The first of its series.", 40.0, 1, 1),
    ];
    items
        .into_iter()
        .map(|(id, title, description, price, mint_count, sold_count)| {
            to_row(&Item {
                id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                image: format!("https://cdn.example.com/{}.png", id),
                price,
                price_xep: None,
                mint_count,
                sold_count,
                creator: Some("studio".to_string()),
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), String> {
    // Setup tracing once for the entire application
    setup_tracing();

    let config = MarketConfig::from_env().map_err(|e| e.to_string())?;
    info!(
        items_table = %config.items_table,
        orders_table = %config.orders_table,
        "Starting market store"
    );

    let backend = MemoryTables::new([config.items_table.as_str(), config.orders_table.as_str()]);
    if config.seed_demo {
        let rows = demo_catalog().map_err(|e| e.to_string())?;
        backend
            .seed(&config.items_table, rows)
            .map_err(|e| e.to_string())?;
    }

    let system = MarketSystem::start(&config, Arc::new(backend))
        .await
        .map_err(|e| e.to_string())?;

    let summary = system
        .store_client
        .load_initial_data()
        .await
        .map_err(|e| e.to_string())?;
    info!(items = summary.items, orders = summary.orders, "Catalog loaded");

    let authenticated = system
        .store_client
        .login(config.admin_username.clone(), config.admin_password.clone())
        .await
        .map_err(|e| e.to_string())?;
    info!(authenticated, "Admin session");

    if authenticated {
        let listing = ItemCreate::new("Night Market", 75.0, 5)
            .with_price_xep(1500.0)
            .with_creator("studio");
        let id = system
            .store_client
            .add_item(listing)
            .await
            .map_err(|e| e.to_string())?;
        info!(item_id = %id, "Listing added");
    }

    // Buy one unit of the first item that still has stock
    let items = system.store_client.list_items().await.map_err(|e| e.to_string())?;
    for item in &items {
        info!(
            id = %item.id,
            title = %item.title,
            price = %format_price(item.price),
            sold = item.sold_count,
            minted = item.mint_count,
            "Listed"
        );
    }

    if let Some(item) = items.iter().find(|item| !item.is_sold_out()) {
        let span = tracing::info_span!("checkout");
        let result = async {
            info!(title = %item.title, "Purchasing");
            system
                .checkout_client
                .purchase(item.id.clone(), "xDEMO0001".to_string(), "demo buyer".to_string())
                .await
        }
        .instrument(span)
        .await;

        match result {
            Ok(order) => info!(order_id = %order.id, status = %order.status, "Purchase recorded"),
            Err(e) => error!(error = %e, "Purchase failed"),
        }
    }

    let orders = system.store_client.list_orders().await.map_err(|e| e.to_string())?;
    info!(orders = orders.len(), "Orders on record");

    let counters = system.store_client.counters().await.map_err(|e| e.to_string())?;
    info!(
        pending_burn = counters.pending_burn,
        burned_amount = counters.burned_amount,
        "Burn counters"
    );
    for record in system.store_client.unsynced().await.map_err(|e| e.to_string())? {
        error!(table = ?record.table, id = %record.id, reason = %record.reason, "Record not synced");
    }

    system.store_client.logout().await.map_err(|e| e.to_string())?;

    // Shutdown system gracefully
    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}
