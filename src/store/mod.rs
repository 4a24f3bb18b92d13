//! Data-store seam: the query shape the core issues and the async trait backends implement.

mod criteria;
mod memory;
pub mod populate;
mod postgres;

pub use criteria::*;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::ResourceType;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// A materialized row keyed by attribute name; to-one associations appear under their alias.
pub type Record = serde_json::Map<String, Value>;

#[derive(Clone, Debug, Default)]
pub struct FindQuery {
    pub criteria: Criteria,
    /// Attributes to return. `None` returns all. The primary key and to-one keys are always kept.
    pub select: Option<Vec<String>>,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub populate: Vec<Populate>,
}

impl FindQuery {
    pub fn new(criteria: Criteria) -> Self {
        FindQuery {
            criteria,
            ..FindQuery::default()
        }
    }

    pub fn by_id(resource: &ResourceType, id: Value) -> Self {
        FindQuery::new(Criteria::eq(resource.primary_key.clone(), id))
    }

    pub fn select(mut self, select: Option<Vec<String>>) -> Self {
        self.select = select;
        self
    }

    pub fn sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }
}

/// Populate directive for one association of the queried type.
///
/// To-one associations replace the key under `alias` with the related row (or null).
/// To-many associations set `alias` to an array of related rows, with criteria,
/// sort, skip and limit applied per owner.
#[derive(Clone, Debug, Default)]
pub struct Populate {
    pub alias: String,
    pub select: Option<Vec<String>>,
    pub criteria: Criteria,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Populate {
    /// Full related rows, optionally projected.
    pub fn records(alias: impl Into<String>, select: Option<Vec<String>>) -> Self {
        Populate {
            alias: alias.into(),
            select,
            ..Populate::default()
        }
    }

    /// Related primary keys only.
    pub fn keys(alias: impl Into<String>) -> Self {
        Populate {
            alias: alias.into(),
            select: Some(Vec::new()),
            ..Populate::default()
        }
    }

    pub fn is_keys_only(&self) -> bool {
        matches!(&self.select, Some(fields) if fields.is_empty())
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Rows of `resource` (identity) matching the query.
    async fn find(&self, resource: &str, query: &FindQuery) -> Result<Vec<Record>, StoreError>;

    async fn count(&self, resource: &str, criteria: &Criteria) -> Result<u64, StoreError>;

    /// Inserts one row and returns it as stored.
    async fn create(&self, resource: &str, values: Record) -> Result<Record, StoreError>;

    /// Sets `values` on every matching row; returns the updated rows.
    async fn update(
        &self,
        resource: &str,
        criteria: &Criteria,
        values: Record,
    ) -> Result<Vec<Record>, StoreError>;

    /// Deletes every matching row; returns the deleted rows.
    async fn destroy(&self, resource: &str, criteria: &Criteria) -> Result<Vec<Record>, StoreError>;

    async fn find_one(&self, resource: &str, query: &FindQuery) -> Result<Option<Record>, StoreError> {
        let query = FindQuery {
            limit: Some(1),
            ..query.clone()
        };
        Ok(self.find(resource, &query).await?.into_iter().next())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Keeps the primary key, to-one keys, and the selected attributes of a row.
pub fn project(resource: &ResourceType, record: &mut Record, select: Option<&[String]>) {
    let Some(fields) = select else { return };
    record.retain(|key, _| {
        key == &resource.primary_key
            || fields.iter().any(|f| f == key)
            || resource.association(key).is_some_and(|a| a.is_singular())
    });
}
