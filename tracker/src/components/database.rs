//! Storage ownership and connectivity.

use crate::store::{InMemoryTrackerStore, SqlTrackerStore, TrackerStore};
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::component::{Component, ComponentBase, ComponentError};
use tally_core::event_bus::EventBus;
use tally_core::query::{QueryError, QueryExecutor};
use tally_postgres::{PostgresConfig, PostgresExecutor};
use tally_runtime::{RetryPolicy, retry_with_backoff};
use tracing::info;

use super::names;

/// Owns the [`TrackerStore`] every other component reads through.
///
/// `on_init` pings the store, retrying with exponential backoff; `on_shutdown`
/// closes the executor's connections.
pub struct DatabaseComponent {
    base: ComponentBase,
    store: Arc<dyn TrackerStore>,
    executor: Option<Arc<dyn QueryExecutor>>,
    retry: RetryPolicy,
}

impl DatabaseComponent {
    /// Wraps an arbitrary store. `executor`, if given, is closed on shutdown.
    pub fn new(
        bus: EventBus,
        store: Arc<dyn TrackerStore>,
        executor: Option<Arc<dyn QueryExecutor>>,
    ) -> Self {
        Self {
            base: ComponentBase::new(names::DATABASE, bus),
            store,
            executor,
            retry: RetryPolicy::default(),
        }
    }

    /// Backed by an [`InMemoryTrackerStore`].
    #[must_use]
    pub fn in_memory(bus: EventBus) -> Self {
        Self::new(bus, Arc::new(InMemoryTrackerStore::new()), None)
    }

    /// Backed by Postgres. The pool connects on first use, so connection
    /// failures surface during `init`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Connection`] when the URL is malformed.
    pub fn postgres(bus: EventBus, config: &PostgresConfig) -> Result<Self, QueryError> {
        let executor: Arc<dyn QueryExecutor> = Arc::new(PostgresExecutor::connect_lazy(config)?);
        let store = Arc::new(SqlTrackerStore::new(Arc::clone(&executor)));
        Ok(Self::new(bus, store, Some(executor)))
    }

    /// Replaces the connectivity retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The shared store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn TrackerStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl Component for DatabaseComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    async fn on_init(&self) -> Result<(), ComponentError> {
        retry_with_backoff(&self.retry, "database_ping", || self.store.ping())
            .await
            .map_err(|e| ComponentError::other(format!("Database unreachable: {e}")))?;
        info!(component = self.base.name(), "Database reachable");
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        if let Some(executor) = &self.executor {
            executor.close().await;
        }
        Ok(())
    }
}
