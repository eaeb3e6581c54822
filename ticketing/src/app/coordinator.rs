//! Application coordinator - wires the services to one environment.

use super::{EntryValidator, InventoryService, OrderService, TransferService, WaitlistService};
use crate::config::Config;
use crate::environment::TicketingEnvironment;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use turnstile_core::StoreError;
use turnstile_core::store::CatalogStore;
use turnstile_postgres::PostgresCatalogStore;
use turnstile_runtime::retry_with_backoff;

/// Application errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Storage could not be reached or migrated
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Main ticketing application.
///
/// Coordinates all components:
/// - Catalog store (`PostgreSQL` or in-memory)
/// - Inventory, entry, transfer, waitlist and order services
/// - Background maintenance (cooldown purge, transfer expiry sweep)
#[derive(Clone, Debug)]
pub struct TicketingApp {
    /// Purchases, price previews and ticket reads
    pub inventory: Arc<InventoryService>,
    /// Gate scanning
    pub entry: Arc<EntryValidator>,
    /// Ticket transfers
    pub transfers: Arc<TransferService>,
    /// Event waitlists
    pub waitlist: Arc<WaitlistService>,
    /// Payment hooks
    pub orders: Arc<OrderService>,
    /// Shared environment
    env: TicketingEnvironment,
    /// Configuration
    config: Config,
}

impl TicketingApp {
    /// Build the services over an existing environment.
    #[must_use]
    pub fn new(config: Config, env: TicketingEnvironment) -> Self {
        Self {
            inventory: Arc::new(InventoryService::new(env.clone(), &config.inventory)),
            entry: Arc::new(EntryValidator::new(env.clone(), &config.entry)),
            transfers: Arc::new(TransferService::new(env.clone(), &config.transfer)),
            waitlist: Arc::new(WaitlistService::new(env.clone())),
            orders: Arc::new(OrderService::new(env.clone())),
            env,
            config,
        }
    }

    /// Connect to `PostgreSQL`, run migrations if configured, and build the
    /// application with the system clock and log notifier.
    ///
    /// Every connection failure is retried with the backoff from
    /// [`PostgresConfig::connect_policy`](crate::config::PostgresConfig::connect_policy).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the database cannot be reached or migrated.
    pub async fn connect(config: Config) -> Result<Self, AppError> {
        tracing::info!("Initializing Ticketing Application...");

        let store = retry_with_backoff(&config.postgres.connect_policy(), || {
            PostgresCatalogStore::connect(&config.postgres.url, config.postgres.max_connections)
        })
        .await?;
        tracing::info!("✓ Connected to PostgreSQL");

        if config.postgres.run_migrations {
            store.migrate().await?;
            tracing::info!("✓ Migrations applied");
        }

        let env = TicketingEnvironment::production(
            Arc::new(store) as Arc<dyn CatalogStore>,
            config.retry.policy(),
        );
        Ok(Self::new(config, env))
    }

    /// Spawn the background maintenance tasks.
    ///
    /// - Cooldown purge: drops stale duplicate-scan entries
    /// - Transfer sweep: marks overdue pending transfers expired
    ///
    /// The tasks run until aborted.
    #[must_use]
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let purge_every =
            Duration::from_secs(self.config.entry.cooldown_purge_interval_secs.max(1));
        let entry = Arc::clone(&self.entry);
        let purge = tokio::spawn(async move {
            let mut interval = tokio::time::interval(purge_every);
            loop {
                interval.tick().await;
                entry.purge_cooldown();
            }
        });

        let sweep_every = Duration::from_secs(self.config.transfer.sweep_interval_secs.max(1));
        let transfers = Arc::clone(&self.transfers);
        let sweep = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            loop {
                interval.tick().await;
                if let Err(error) = transfers.expire_stale().await {
                    tracing::error!(error = %error, "Transfer expiry sweep failed");
                }
            }
        });

        tracing::info!(
            purge_interval_secs = purge_every.as_secs(),
            sweep_interval_secs = sweep_every.as_secs(),
            "✓ Background maintenance started"
        );
        vec![purge, sweep]
    }

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the ping fails.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.env.store.ping().await
    }

    /// Get the application configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}
