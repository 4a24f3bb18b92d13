//! PostgreSQL-backed store. Statements come from `crate::sql`; rows arrive as JSON objects.

use super::{populate, Criteria, DataStore, FindQuery, Record};
use crate::config::{Registry, ResourceType};
use crate::error::StoreError;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PgStore {
    pool: PgPool,
    registry: Arc<Registry>,
}

impl PgStore {
    pub fn new(pool: PgPool, registry: Arc<Registry>) -> Self {
        PgStore { pool, registry }
    }

    fn resource(&self, identity: &str) -> Result<&ResourceType, StoreError> {
        self.registry
            .get(identity)
            .ok_or_else(|| StoreError::UnknownResource(identity.to_string()))
    }

    async fn fetch_rows(&self, q: QueryBuf) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = q.params.len(), "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| match row {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::InvalidValue(format!("expected a row object, got {}", other))),
            })
            .collect()
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn find(&self, resource: &str, query: &FindQuery) -> Result<Vec<Record>, StoreError> {
        let rt = self.resource(resource)?;
        let q = sql::select(rt, query)?;
        let mut rows = self.fetch_rows(q).await?;
        populate::attach(self, &self.registry, rt, &mut rows, &query.populate).await?;
        Ok(rows)
    }

    async fn count(&self, resource: &str, criteria: &Criteria) -> Result<u64, StoreError> {
        let rt = self.resource(resource)?;
        let q = sql::count(rt, criteria)?;
        tracing::debug!(sql = %q.sql, params = q.params.len(), "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn create(&self, resource: &str, values: Record) -> Result<Record, StoreError> {
        let rt = self.resource(resource)?;
        let q = sql::insert(rt, &values)?;
        self.fetch_rows(q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidValue(format!("insert into {} returned no row", rt.table)))
    }

    async fn update(
        &self,
        resource: &str,
        criteria: &Criteria,
        values: Record,
    ) -> Result<Vec<Record>, StoreError> {
        let rt = self.resource(resource)?;
        let q = sql::update(rt, criteria, &values)?;
        self.fetch_rows(q).await
    }

    async fn destroy(&self, resource: &str, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        let rt = self.resource(resource)?;
        let q = sql::delete(rt, criteria)?;
        self.fetch_rows(q).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
