//! The client handle.

use crate::delegate::Delegate;
use crate::models::{Panel, ServerInfo, ServerSession, Timeline, User, UserInfo, UserSetting};
use deckdb_core::{StoreError, StoreResult};
use deckdb_schema::{deck_schema, SchemaRegistry};
use deckdb_store::Store;
use deckdb_transaction::{BatchOp, Transaction, TransactionCoordinator, TxnOptions};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// A connected client over one in-memory datasource.
///
/// Delegates share the client's store behind a reader/writer lock: reads
/// run concurrently, writes serialize. Inside a transaction body, operate
/// through the transaction handle, not through delegates; the lock is
/// already held.
pub struct Client {
    registry: Arc<SchemaRegistry>,
    store: Arc<RwLock<Store>>,
    connected: AtomicBool,
}

impl Client {
    /// Connect to a datasource. Only the `memory:` scheme is supported.
    pub fn connect(url: &str) -> StoreResult<Self> {
        if url != "memory:" && !url.starts_with("memory://") {
            return Err(StoreError::validation(format!(
                "unsupported datasource url: {}",
                url
            )));
        }
        let registry =
            deck_schema().map_err(|err| StoreError::validation(err.to_string()))?;
        let store = Store::new(&registry);
        info!(url, entities = registry.entity_count(), "client connected");
        Ok(Self {
            registry: Arc::new(registry),
            store: Arc::new(RwLock::new(store)),
            connected: AtomicBool::new(true),
        })
    }

    /// Disconnect. Every subsequent operation fails with `Disconnected`.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("client disconnected");
        }
    }

    pub(crate) fn ensure_connected(&self) -> StoreResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    pub(crate) fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub(crate) fn store(&self) -> &RwLock<Store> {
        &self.store
    }

    pub fn user(&self) -> Delegate<'_, User> {
        Delegate::new(self)
    }

    pub fn user_setting(&self) -> Delegate<'_, UserSetting> {
        Delegate::new(self)
    }

    pub fn server_session(&self) -> Delegate<'_, ServerSession> {
        Delegate::new(self)
    }

    pub fn server_info(&self) -> Delegate<'_, ServerInfo> {
        Delegate::new(self)
    }

    pub fn user_info(&self) -> Delegate<'_, UserInfo> {
        Delegate::new(self)
    }

    pub fn panel(&self) -> Delegate<'_, Panel> {
        Delegate::new(self)
    }

    pub fn timeline(&self) -> Delegate<'_, Timeline> {
        Delegate::new(self)
    }

    /// Run an interactive transaction over the shared store.
    pub fn transaction<T>(
        &self,
        options: TxnOptions,
        body: impl FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.ensure_connected()?;
        TransactionCoordinator::new(&self.registry, &self.store).transaction(options, body)
    }

    /// Run an ordered batch of operations as one transaction.
    pub fn batch<T>(&self, options: TxnOptions, ops: Vec<BatchOp<'_, T>>) -> StoreResult<Vec<T>> {
        self.ensure_connected()?;
        TransactionCoordinator::new(&self.registry, &self.store).batch(options, ops)
    }
}
