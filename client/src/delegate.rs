//! The per-entity operation family.

use crate::client::Client;
use crate::model::Model;
use deckdb_aggregate::{AggregateEngine, AggregateResult, AggregateSelect, GroupByArgs, GroupRow};
use deckdb_core::{Record, StoreResult};
use deckdb_filter::Filter;
use deckdb_mutation::{CreateInput, MutationEngine, UpdateInput};
use deckdb_query::{FindManyArgs, QueryExecutor, QueryRow, Selection, UniqueKey};
use std::marker::PhantomData;
use tracing::debug;

/// Typed operations over one entity.
///
/// Typed methods return models built from full rows. The `_row`/`_rows`
/// variants return shaped [`QueryRow`]s instead and are the entry point
/// for select/omit projection and relation includes, which have no typed
/// representation.
pub struct Delegate<'c, M: Model> {
    client: &'c Client,
    _model: PhantomData<M>,
}

impl<'c, M: Model> Delegate<'c, M> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self {
            client,
            _model: PhantomData,
        }
    }

    // ==================== Reads ====================

    pub fn find_unique(&self, key: &UniqueKey) -> StoreResult<Option<M>> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        QueryExecutor::new(self.client.registry(), &store)
            .find_unique(M::ENTITY, key, &Selection::default())?
            .map(|row| M::from_record(&row.record))
            .transpose()
    }

    pub fn find_unique_or_throw(&self, key: &UniqueKey) -> StoreResult<M> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        let row = QueryExecutor::new(self.client.registry(), &store).find_unique_or_throw(
            M::ENTITY,
            key,
            &Selection::default(),
        )?;
        M::from_record(&row.record)
    }

    /// Shaped unique lookup, for select/omit/include.
    pub fn find_unique_row(
        &self,
        key: &UniqueKey,
        selection: &Selection,
    ) -> StoreResult<Option<QueryRow>> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        QueryExecutor::new(self.client.registry(), &store).find_unique(M::ENTITY, key, selection)
    }

    pub fn find_first(&self, args: &FindManyArgs) -> StoreResult<Option<M>> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        QueryExecutor::new(self.client.registry(), &store)
            .find_first(M::ENTITY, args)?
            .map(|row| M::from_record(&row.record))
            .transpose()
    }

    pub fn find_first_or_throw(&self, args: &FindManyArgs) -> StoreResult<M> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        let row =
            QueryExecutor::new(self.client.registry(), &store).find_first_or_throw(M::ENTITY, args)?;
        M::from_record(&row.record)
    }

    pub fn find_many(&self, args: &FindManyArgs) -> StoreResult<Vec<M>> {
        self.find_many_rows(args)?
            .iter()
            .map(|row| M::from_record(&row.record))
            .collect()
    }

    /// Shaped list query, for select/omit/include.
    pub fn find_many_rows(&self, args: &FindManyArgs) -> StoreResult<Vec<QueryRow>> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        QueryExecutor::new(self.client.registry(), &store).find_many(M::ENTITY, args)
    }

    // ==================== Writes ====================

    pub fn create(&self, input: CreateInput) -> StoreResult<M> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        let record =
            MutationEngine::new(self.client.registry()).create(&mut store, M::ENTITY, input)?;
        debug!(entity = M::ENTITY, "created row");
        M::from_record(&record)
    }

    pub fn create_many(&self, inputs: Vec<Record>, skip_duplicates: bool) -> StoreResult<usize> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        MutationEngine::new(self.client.registry()).create_many(
            &mut store,
            M::ENTITY,
            inputs,
            skip_duplicates,
        )
    }

    pub fn create_many_and_return(
        &self,
        inputs: Vec<Record>,
        skip_duplicates: bool,
    ) -> StoreResult<Vec<M>> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        MutationEngine::new(self.client.registry())
            .create_many_and_return(&mut store, M::ENTITY, inputs, skip_duplicates)?
            .iter()
            .map(M::from_record)
            .collect()
    }

    pub fn update(&self, key: &UniqueKey, input: UpdateInput) -> StoreResult<M> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        let record = MutationEngine::new(self.client.registry())
            .update(&mut store, M::ENTITY, key, input)?;
        debug!(entity = M::ENTITY, "updated row");
        M::from_record(&record)
    }

    pub fn update_many(
        &self,
        filter: Option<&Filter>,
        data: &Record,
        limit: Option<usize>,
    ) -> StoreResult<usize> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        MutationEngine::new(self.client.registry()).update_many(
            &mut store,
            M::ENTITY,
            filter,
            data,
            limit,
        )
    }

    pub fn update_many_and_return(
        &self,
        filter: Option<&Filter>,
        data: &Record,
        limit: Option<usize>,
    ) -> StoreResult<Vec<M>> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        MutationEngine::new(self.client.registry())
            .update_many_and_return(&mut store, M::ENTITY, filter, data, limit)?
            .iter()
            .map(M::from_record)
            .collect()
    }

    pub fn upsert(
        &self,
        key: &UniqueKey,
        create: CreateInput,
        update: UpdateInput,
    ) -> StoreResult<M> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        let record = MutationEngine::new(self.client.registry()).upsert(
            &mut store,
            M::ENTITY,
            key,
            create,
            update,
        )?;
        M::from_record(&record)
    }

    pub fn delete(&self, key: &UniqueKey) -> StoreResult<M> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        let record =
            MutationEngine::new(self.client.registry()).delete(&mut store, M::ENTITY, key)?;
        debug!(entity = M::ENTITY, "deleted row");
        M::from_record(&record)
    }

    pub fn delete_many(
        &self,
        filter: Option<&Filter>,
        limit: Option<usize>,
    ) -> StoreResult<usize> {
        self.client.ensure_connected()?;
        let mut store = self.client.store().write();
        MutationEngine::new(self.client.registry()).delete_many(
            &mut store,
            M::ENTITY,
            filter,
            limit,
        )
    }

    // ==================== Aggregates ====================

    pub fn count(&self, filter: Option<&Filter>) -> StoreResult<usize> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        AggregateEngine::new(self.client.registry(), &store).count(M::ENTITY, filter)
    }

    pub fn aggregate(
        &self,
        filter: Option<&Filter>,
        selects: &[AggregateSelect],
    ) -> StoreResult<AggregateResult> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        AggregateEngine::new(self.client.registry(), &store).aggregate(M::ENTITY, filter, selects)
    }

    pub fn group_by(&self, args: &GroupByArgs) -> StoreResult<Vec<GroupRow>> {
        self.client.ensure_connected()?;
        let store = self.client.store().read();
        AggregateEngine::new(self.client.registry(), &store).group_by(M::ENTITY, args)
    }
}
