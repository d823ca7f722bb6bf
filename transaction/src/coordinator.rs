//! Transaction execution.

use crate::options::TxnOptions;
use deckdb_core::{StoreError, StoreResult};
use deckdb_schema::SchemaRegistry;
use deckdb_store::Store;
use parking_lot::RwLock;
use std::time::Instant;
use tracing::debug;

/// One operation of a batch transaction.
pub type BatchOp<'a, T> = Box<dyn FnOnce(&SchemaRegistry, &mut Store) -> StoreResult<T> + 'a>;

/// Serializes transactions over one shared store.
pub struct TransactionCoordinator<'a> {
    registry: &'a SchemaRegistry,
    store: &'a RwLock<Store>,
}

impl<'a> TransactionCoordinator<'a> {
    /// Create a coordinator over the shared store.
    pub fn new(registry: &'a SchemaRegistry, store: &'a RwLock<Store>) -> Self {
        Self { registry, store }
    }

    /// Run an interactive transaction. The body receives a [`Transaction`]
    /// handle whose store access enforces the timeout per operation; any
    /// error from the body, and a timeout detected at commit, roll every
    /// write back.
    pub fn transaction<T>(
        &self,
        options: TxnOptions,
        body: impl FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self
            .store
            .try_write_for(options.max_wait)
            .ok_or(StoreError::TxnMaxWait(options.max_wait))?;

        debug!(
            isolation = options.isolation_level.as_str(),
            timeout_ms = options.timeout.as_millis() as u64,
            "transaction started"
        );
        let snapshot = guard.clone();
        let deadline = Instant::now() + options.timeout;
        let result = {
            let mut tx = Transaction {
                registry: self.registry,
                store: &mut *guard,
                deadline,
                options,
            };
            body(&mut tx)
        };

        match result {
            Ok(value) if Instant::now() <= deadline => {
                debug!("transaction committed");
                Ok(value)
            }
            Ok(_) => {
                *guard = snapshot;
                debug!("transaction timed out at commit");
                Err(StoreError::TxnTimeout(options.timeout))
            }
            Err(err) => {
                *guard = snapshot;
                debug!(error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }

    /// Run an ordered batch of operations as one transaction. Results come
    /// back in operation order; the first error rolls back the whole batch.
    pub fn batch<T>(&self, options: TxnOptions, ops: Vec<BatchOp<'_, T>>) -> StoreResult<Vec<T>> {
        self.transaction(options, |tx| {
            let mut results = Vec::with_capacity(ops.len());
            for op in ops {
                let (registry, store) = tx.parts()?;
                results.push(op(registry, store)?);
            }
            Ok(results)
        })
    }
}

/// Handle to an open transaction. Every store access re-checks the
/// deadline, so long bodies fail at the next operation rather than holding
/// the lock indefinitely.
pub struct Transaction<'g> {
    registry: &'g SchemaRegistry,
    store: &'g mut Store,
    deadline: Instant,
    options: TxnOptions,
}

impl Transaction<'_> {
    /// The schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    /// The schema and the locked store, for running one operation.
    pub fn parts(&mut self) -> StoreResult<(&SchemaRegistry, &mut Store)> {
        if Instant::now() > self.deadline {
            return Err(StoreError::TxnTimeout(self.options.timeout));
        }
        Ok((self.registry, self.store))
    }

    /// The locked store.
    pub fn store(&mut self) -> StoreResult<&mut Store> {
        Ok(self.parts()?.1)
    }
}
