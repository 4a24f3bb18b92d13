//! Batched association population shared by every backend.
//!
//! Each directive costs one `IN (...)` lookup (two for junction-backed associations)
//! regardless of how many owner rows were returned.

use super::{value_key, Criteria, Criterion, DataStore, FilterOp, FindQuery, Populate, Record, SortKey};
use crate::config::{AssociationKind, Registry, ResourceType};
use crate::error::StoreError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub async fn attach<S: DataStore + ?Sized>(
    store: &S,
    registry: &Registry,
    resource: &ResourceType,
    rows: &mut [Record],
    populate: &[Populate],
) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }
    for p in populate {
        let assoc = resource
            .association(&p.alias)
            .ok_or_else(|| StoreError::UnknownAssociation {
                resource: resource.identity.clone(),
                alias: p.alias.clone(),
            })?;
        let target = registry
            .get(&assoc.target)
            .ok_or_else(|| StoreError::UnknownResource(assoc.target.clone()))?;
        match &assoc.kind {
            AssociationKind::ToOne { .. } => {
                if p.is_keys_only() {
                    continue;
                }
                attach_to_one(store, target, rows, p).await?;
            }
            AssociationKind::ToMany { via } => {
                attach_to_many(store, resource, target, via, rows, p).await?;
            }
            AssociationKind::ManyToMany {
                through,
                owner_key,
                target_key,
            } => {
                let junction = registry
                    .get(through)
                    .ok_or_else(|| StoreError::UnknownResource(through.clone()))?;
                attach_through(store, resource, target, junction, (owner_key, target_key), rows, p).await?;
            }
        }
    }
    Ok(())
}

async fn attach_to_one<S: DataStore + ?Sized>(
    store: &S,
    target: &ResourceType,
    rows: &mut [Record],
    p: &Populate,
) -> Result<(), StoreError> {
    let keys = distinct(rows.iter().filter_map(|r| r.get(&p.alias)));
    let related = fetch_in(store, target, &target.primary_key, keys, p, &[]).await?;
    let by_id: HashMap<String, Record> = related
        .into_iter()
        .map(|r| (key_of(&r, &target.primary_key), r))
        .collect();
    for row in rows.iter_mut() {
        let found = row
            .get(&p.alias)
            .filter(|v| !v.is_null())
            .and_then(|v| by_id.get(&value_key(v)))
            .cloned()
            .map(Value::Object)
            .unwrap_or(Value::Null);
        row.insert(p.alias.clone(), found);
    }
    Ok(())
}

async fn attach_to_many<S: DataStore + ?Sized>(
    store: &S,
    owner: &ResourceType,
    target: &ResourceType,
    via: &str,
    rows: &mut [Record],
    p: &Populate,
) -> Result<(), StoreError> {
    let owner_ids = distinct(rows.iter().filter_map(|r| r.get(&owner.primary_key)));
    let children = fetch_in(store, target, via, owner_ids, p, &p.sort).await?;
    let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
    for child in children {
        let owner_key = key_of(&child, via);
        grouped.entry(owner_key).or_default().push(Value::Object(child));
    }
    for row in rows.iter_mut() {
        let key = key_of(row, &owner.primary_key);
        let page = paginate(grouped.remove(&key).unwrap_or_default(), p);
        row.insert(p.alias.clone(), Value::Array(page));
    }
    Ok(())
}

async fn attach_through<S: DataStore + ?Sized>(
    store: &S,
    owner: &ResourceType,
    target: &ResourceType,
    junction: &ResourceType,
    (owner_key, target_key): (&str, &str),
    rows: &mut [Record],
    p: &Populate,
) -> Result<(), StoreError> {
    let owner_ids = distinct(rows.iter().filter_map(|r| r.get(&owner.primary_key)));
    let links = store
        .find(
            &junction.identity,
            &FindQuery::new(Criteria::new().and(Criterion::new(owner_key, FilterOp::In, Value::Array(owner_ids))))
                .select(Some(Vec::new())),
        )
        .await?;
    let mut linked: HashMap<String, HashSet<String>> = HashMap::new();
    let mut target_ids = Vec::new();
    for link in &links {
        let Some(t) = link.get(target_key).filter(|v| !v.is_null()) else { continue };
        linked.entry(key_of(link, owner_key)).or_default().insert(value_key(t));
        target_ids.push(t.clone());
    }
    let targets = fetch_in(store, target, &target.primary_key, distinct(target_ids.iter()), p, &p.sort).await?;
    for row in rows.iter_mut() {
        let key = key_of(row, &owner.primary_key);
        let members = linked.get(&key);
        let related: Vec<Value> = targets
            .iter()
            .filter(|t| members.is_some_and(|m| m.contains(&key_of(t, &target.primary_key))))
            .cloned()
            .map(Value::Object)
            .collect();
        row.insert(p.alias.clone(), Value::Array(paginate(related, p)));
    }
    Ok(())
}

/// `field IN keys` plus the directive's criteria, projected and sorted, without pagination.
async fn fetch_in<S: DataStore + ?Sized>(
    store: &S,
    target: &ResourceType,
    field: &str,
    keys: Vec<Value>,
    p: &Populate,
    sort: &[SortKey],
) -> Result<Vec<Record>, StoreError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut criteria = p.criteria.clone();
    criteria.push(Criterion::new(field, FilterOp::In, Value::Array(keys)));
    store
        .find(
            &target.identity,
            &FindQuery::new(criteria).select(p.select.clone()).sort(sort.to_vec()),
        )
        .await
}

fn paginate(items: Vec<Value>, p: &Populate) -> Vec<Value> {
    let skipped = items.into_iter().skip(p.skip as usize);
    match p.limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    }
}

/// Non-null values, first occurrence of each key only.
pub(crate) fn distinct<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .filter(|v| !v.is_null())
        .filter(|v| seen.insert(value_key(v)))
        .cloned()
        .collect()
}

fn key_of(record: &Record, field: &str) -> String {
    record.get(field).map(value_key).unwrap_or_default()
}
