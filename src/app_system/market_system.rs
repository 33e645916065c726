use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::auth::{AuthPolicy, StaticCredentials};
use crate::clients::{CheckoutClient, StoreClient};
use crate::config::MarketConfig;
use crate::error::StoreError;
use crate::remote::{EventMask, Subscription, TableClient};
use crate::store_actor::{StoreService, TableNames};

/// A running change feed: the stop signal and the forwarding task.
struct Feed {
    table: String,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// The assembled market: the store actor, its clients and one change-feed
/// forwarder per mirrored table.
pub struct MarketSystem {
    pub store_client: StoreClient,
    pub checkout_client: CheckoutClient,
    feeds: Vec<Feed>,
    handle: JoinHandle<()>,
}

impl MarketSystem {
    /// Starts the market with the configured admin credentials.
    pub async fn start(
        config: &MarketConfig,
        remote: Arc<dyn TableClient>,
    ) -> Result<Self, StoreError> {
        let auth = Arc::new(StaticCredentials::new(
            config.admin_username.clone(),
            config.admin_password.clone(),
        ));
        Self::start_with_policy(config, remote, auth).await
    }

    #[instrument(name = "market_system", skip_all)]
    pub async fn start_with_policy(
        config: &MarketConfig,
        remote: Arc<dyn TableClient>,
        auth: Arc<dyn AuthPolicy>,
    ) -> Result<Self, StoreError> {
        let tables = TableNames::from(config);

        // 1. Setup Store Service
        let (service, store_client) =
            StoreService::new(config.store_buffer, remote.clone(), auth, tables.clone());
        let handle = tokio::spawn(service.run());

        // 2. Setup Checkout Client
        let checkout_client = CheckoutClient::new(store_client.clone());

        // 3. Subscribe to both tables
        let mut feeds = Vec::with_capacity(2);
        for table in [tables.items.as_str(), tables.orders.as_str()] {
            let subscription = match remote.subscribe(table, EventMask::ALL).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!(table = %table, error = %e, "Subscription failed");
                    stop_feeds(feeds).await;
                    let _ = store_client.shutdown().await;
                    let _ = handle.await;
                    return Err(e.into());
                }
            };
            let (stop, stopped) = oneshot::channel();
            let span = tracing::info_span!("change_feed", table = %table);
            let feed = tokio::spawn(
                forward_changes(subscription, store_client.clone(), stopped).instrument(span),
            );
            feeds.push(Feed {
                table: table.to_string(),
                stop,
                handle: feed,
            });
        }

        info!(items = %tables.items, orders = %tables.orders, "Market system started");
        Ok(Self {
            store_client,
            checkout_client,
            feeds,
            handle,
        })
    }

    /// Stops the change feeds (unsubscribing from the backend), then the store.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");

        stop_feeds(self.feeds).await;

        if let Err(e) = self.store_client.shutdown().await {
            warn!(error = %e, "Store already stopped");
        }
        drop(self.checkout_client);
        drop(self.store_client);

        if let Err(e) = self.handle.await {
            error!("Store task failed: {:?}", e);
            return Err(format!("Store task failed: {:?}", e));
        }

        info!("System shutdown complete.");
        Ok(())
    }
}

async fn stop_feeds(feeds: Vec<Feed>) {
    for feed in feeds {
        let _ = feed.stop.send(());
        if let Err(e) = feed.handle.await {
            error!(table = %feed.table, "Change feed task failed: {:?}", e);
        }
    }
}

/// Pushes every event from the backend feed into the store until stopped.
async fn forward_changes(
    mut subscription: Subscription,
    store: StoreClient,
    mut stopped: oneshot::Receiver<()>,
) {
    debug!("Change feed running");
    loop {
        tokio::select! {
            _ = &mut stopped => break,
            event = subscription.recv() => match event {
                Some(event) => match store.reconcile(event).await {
                    Ok(outcome) => debug!(?outcome, "Change applied"),
                    Err(StoreError::ActorCommunicationError(_)) => {
                        warn!("Store stopped, dropping change feed");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Change rejected"),
                },
                None => {
                    warn!("Backend closed the change feed");
                    break;
                }
            },
        }
    }
    subscription.unsubscribe();
    debug!("Change feed stopped");
}
