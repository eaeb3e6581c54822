//! `PostgreSQL` catalog store for the Turnstile ticketing core.
//!
//! [`PostgresCatalogStore`] implements [`CatalogStore`] on top of a sqlx
//! connection pool. Every operation that can race runs in one transaction:
//!
//! - Purchases lock the affected ticket type rows (`SELECT ... FOR UPDATE`,
//!   in id order) and apply `sold` increments guarded by the expected value
//! - Status transitions are conditional `UPDATE ... WHERE status = $expected`
//! - Waitlist batches are claimed with `FOR UPDATE SKIP LOCKED` so concurrent
//!   notifiers never pick the same entry
//!
//! The schema lives in `migrations/` and is applied with
//! [`PostgresCatalogStore::migrate`].
//!
//! # Example
//!
//! ```no_run
//! use turnstile_postgres::PostgresCatalogStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresCatalogStore::connect("postgres://localhost/turnstile", 10).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`CatalogStore`]: turnstile_core::store::CatalogStore

mod rows;
mod store;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use turnstile_core::StoreError;

/// `PostgreSQL`-backed [`CatalogStore`](turnstile_core::store::CatalogStore).
#[derive(Clone, Debug)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `PostgreSQL` connection string
    /// * `max_connections` - Upper bound of pooled connections
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

/// Serialization failures and deadlocks are retryable.
const TRANSIENT_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Classify a sqlx error. Connectivity problems and retryable SQL states
/// become [`StoreError::Unavailable`]; everything else is a
/// [`StoreError::Database`] failure.
pub(crate) fn map_sqlx_error(context: &str, error: &sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{context}: {error}"))
        }
        sqlx::Error::Database(db)
            if db
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref())) =>
        {
            StoreError::Unavailable(format!("{context}: {error}"))
        }
        _ => StoreError::Database(format!("{context}: {error}")),
    }
}
