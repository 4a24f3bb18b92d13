//! In-process store backed by the registry's schema. Used by tests and the demo server.
//! Rows are returned as clones, so callers never see stored state.

use super::{compare_records, populate, project, Criteria, DataStore, FindQuery, Record, SortKey};
use crate::config::{PkType, Registry, ResourceType};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Table {
    rows: Vec<Record>,
    next_id: i64,
}

pub struct MemoryStore {
    registry: Arc<Registry>,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(registry: Arc<Registry>) -> Self {
        MemoryStore {
            registry,
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn resource(&self, identity: &str) -> Result<&ResourceType, StoreError> {
        self.registry
            .get(identity)
            .ok_or_else(|| StoreError::UnknownResource(identity.to_string()))
    }

    /// Inserts rows as given, keeping their ids. Timestamps are filled in when missing.
    pub fn seed(&self, resource: &str, rows: Vec<Record>) -> Result<(), StoreError> {
        let rt = self.resource(resource)?;
        let now = now();
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let table = tables.entry(rt.identity.clone()).or_default();
        for mut row in rows {
            if rt.timestamps {
                for name in ["createdAt", "updatedAt"] {
                    row.entry(name).or_insert_with(|| Value::String(now.clone()));
                }
            }
            if let Some(id) = row.get(&rt.primary_key).and_then(Value::as_i64) {
                table.next_id = table.next_id.max(id);
            }
            table.rows.push(row);
        }
        Ok(())
    }

    /// Seeds from `{"<identity>": [ {..row..}, ... ], ...}`.
    pub fn seed_from_value(&self, value: Value) -> Result<(), StoreError> {
        let Value::Object(by_type) = value else {
            return Err(StoreError::InvalidValue("seed must be an object keyed by identity".into()));
        };
        for (identity, rows) in by_type {
            let Value::Array(rows) = rows else {
                return Err(StoreError::InvalidValue(format!("seed for {} must be an array", identity)));
            };
            let rows = rows
                .into_iter()
                .map(|r| match r {
                    Value::Object(map) => Ok(map),
                    other => Err(StoreError::InvalidValue(format!("seed row for {}: {}", identity, other))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.seed(&identity, rows)?;
        }
        Ok(())
    }

    fn select_rows(&self, rt: &ResourceType, query: &FindQuery) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        let mut rows: Vec<Record> = tables
            .get(&rt.identity)
            .map(|t| t.rows.iter().filter(|r| query.criteria.matches(r)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        let sort = effective_sort(rt, &query.sort);
        rows.sort_by(|a, b| compare_records(a, b, &sort));
        let rows = rows.into_iter().skip(query.skip as usize);
        let mut rows: Vec<Record> = match query.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        };
        for row in &mut rows {
            project(rt, row, query.select.as_deref());
        }
        Ok(rows)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn find(&self, resource: &str, query: &FindQuery) -> Result<Vec<Record>, StoreError> {
        let rt = self.resource(resource)?;
        tracing::debug!(resource, criteria = ?query.criteria, "memory find");
        let mut rows = self.select_rows(rt, query)?;
        populate::attach(self, &self.registry, rt, &mut rows, &query.populate).await?;
        Ok(rows)
    }

    async fn count(&self, resource: &str, criteria: &Criteria) -> Result<u64, StoreError> {
        let rt = self.resource(resource)?;
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .get(&rt.identity)
            .map(|t| t.rows.iter().filter(|r| criteria.matches(r)).count() as u64)
            .unwrap_or(0))
    }

    async fn create(&self, resource: &str, mut values: Record) -> Result<Record, StoreError> {
        let rt = self.resource(resource)?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let table = tables.entry(rt.identity.clone()).or_default();
        if values.get(&rt.primary_key).map_or(true, Value::is_null) {
            let id = match rt.pk_type {
                PkType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
                PkType::Int => {
                    table.next_id += 1;
                    Value::from(table.next_id)
                }
                PkType::Text => {
                    table.next_id += 1;
                    Value::String(table.next_id.to_string())
                }
            };
            values.insert(rt.primary_key.clone(), id);
        } else if let Some(id) = values.get(&rt.primary_key).and_then(Value::as_i64) {
            table.next_id = table.next_id.max(id);
        }
        let pk = values.get(&rt.primary_key).cloned().unwrap_or(Value::Null);
        if table
            .rows
            .iter()
            .any(|r| Criteria::eq(rt.primary_key.clone(), pk.clone()).matches(r))
        {
            return Err(StoreError::InvalidValue(format!("duplicate {} {}", rt.primary_key, pk)));
        }
        for attr in &rt.attributes {
            if attr.name == rt.primary_key {
                continue;
            }
            if rt.timestamps && (attr.name == "createdAt" || attr.name == "updatedAt") {
                values.insert(attr.name.clone(), Value::String(now()));
            } else if !values.contains_key(&attr.name) && !attr.has_default {
                values.insert(attr.name.clone(), Value::Null);
            }
        }
        for assoc in rt.associations.iter().filter(|a| a.is_singular()) {
            values.entry(assoc.alias.clone()).or_insert(Value::Null);
        }
        table.rows.push(values.clone());
        tracing::debug!(resource, id = %pk, "memory create");
        Ok(values)
    }

    async fn update(
        &self,
        resource: &str,
        criteria: &Criteria,
        values: Record,
    ) -> Result<Vec<Record>, StoreError> {
        let rt = self.resource(resource)?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let Some(table) = tables.get_mut(&rt.identity) else {
            return Ok(Vec::new());
        };
        let stamp = rt.updated_at().map(|a| a.name.clone());
        let mut updated = Vec::new();
        for row in table.rows.iter_mut().filter(|r| criteria.matches(r)) {
            for (k, v) in &values {
                if k != &rt.primary_key {
                    row.insert(k.clone(), v.clone());
                }
            }
            if let Some(stamp) = &stamp {
                row.insert(stamp.clone(), Value::String(now()));
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn destroy(&self, resource: &str, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        let rt = self.resource(resource)?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let Some(table) = tables.get_mut(&rt.identity) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Record>, Vec<Record>) =
            std::mem::take(&mut table.rows).into_iter().partition(|r| criteria.matches(r));
        table.rows = kept;
        Ok(removed)
    }
}

/// Requested sort, with the primary key appended as the final tiebreak.
fn effective_sort(rt: &ResourceType, sort: &[SortKey]) -> Vec<SortKey> {
    let mut keys = sort.to_vec();
    if keys.iter().all(|k| k.field != rt.primary_key) {
        keys.push(SortKey::asc(rt.primary_key.clone()));
    }
    keys
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Criterion, FilterOp, Populate};
    use crate::testing::{sample_registry, seeded_store};
    use serde_json::json;

    #[tokio::test]
    async fn find_sorts_pages_and_projects() {
        let store = seeded_store();
        let query = FindQuery::new(Criteria::eq("article", json!(1)))
            .sort(vec![SortKey::asc("text")])
            .skip(1)
            .limit(Some(1))
            .select(Some(vec![]));
        let rows = store.find("comment", &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert!(rows[0].get("text").is_none());
        assert!(rows[0].contains_key("author"));
    }

    #[tokio::test]
    async fn populates_to_many_and_through() {
        let store = seeded_store();
        let query = FindQuery::new(Criteria::eq("id", json!(3)))
            .populate(Populate::records("comments", None))
            .populate(Populate::keys("publishers"));
        let rows = store.find("author", &query).await.unwrap();
        assert_eq!(rows[0]["comments"].as_array().unwrap().len(), 2);
        let publishers: Vec<_> = rows[0]["publishers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].clone())
            .collect();
        assert_eq!(publishers, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn populates_to_one_with_null_for_missing_target() {
        let store = seeded_store();
        let query = FindQuery::new(Criteria::new()).populate(Populate::records("outlet", None));
        let rows = store.find("publisher", &query).await.unwrap();
        assert_eq!(rows[0]["outlet"]["id"], json!(1));
        assert_eq!(rows[2]["outlet"], Value::Null);
    }

    #[tokio::test]
    async fn create_assigns_ids_and_update_stamps() {
        let store = MemoryStore::new(Arc::new(sample_registry()));
        let mut values = Record::new();
        values.insert("name".into(), json!("Dee"));
        let created = store.create("author", values).await.unwrap();
        assert_eq!(created["id"], json!(1));
        assert!(created["createdAt"].is_string());

        let mut patch = Record::new();
        patch.insert("age".into(), json!(40));
        let updated = store
            .update("author", &Criteria::eq("id", json!(1)), patch)
            .await
            .unwrap();
        assert_eq!(updated[0]["age"], json!(40));

        let gone = store
            .destroy("author", &Criteria::new().and(Criterion::new("age", FilterOp::Gte, json!(40))))
            .await
            .unwrap();
        assert_eq!(gone.len(), 1);
        assert_eq!(store.count("author", &Criteria::new()).await.unwrap(), 0);
    }
}
