//! Relationship cardinality for `links.related.meta.count`, independent of any page being returned.

use super::record::ResolvedRecord;
use crate::config::{Association, AssociationKind, Registry, ResourceType};
use crate::error::ApiError;
use crate::store::populate::distinct;
use crate::store::{value_key, Criteria, Criterion, DataStore, FilterOp, FindQuery};
use futures_util::future::try_join_all;
use serde_json::Value;
use std::collections::HashMap;

/// Counts keyed by (resource identity, id, alias).
#[derive(Clone, Debug, Default)]
pub struct RelationshipCounts(HashMap<(String, String, String), u64>);

impl RelationshipCounts {
    pub fn get(&self, resource: &str, id: &Value, alias: &str) -> u64 {
        self.0
            .get(&(resource.to_string(), value_key(id), alias.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

pub struct RelationshipCounter<'a> {
    store: &'a dyn DataStore,
    registry: &'a Registry,
}

impl<'a> RelationshipCounter<'a> {
    pub fn new(store: &'a dyn DataStore, registry: &'a Registry) -> Self {
        RelationshipCounter { store, registry }
    }

    fn target(&self, identity: &str) -> Result<&'a ResourceType, ApiError> {
        self.registry
            .get(identity)
            .ok_or_else(|| ApiError::Internal(format!("unknown resource type {}", identity)))
    }

    /// Unfiltered number of records related to `owner` #`id` through `assoc`.
    pub async fn count(&self, owner: &ResourceType, id: &Value, assoc: &Association) -> Result<u64, ApiError> {
        match &assoc.kind {
            AssociationKind::ToOne { .. } => {
                let row = self
                    .store
                    .find_one(
                        &owner.identity,
                        &FindQuery::by_id(owner, id.clone()).select(Some(Vec::new())),
                    )
                    .await?;
                let key = row.and_then(|r| r.get(&assoc.alias).cloned());
                self.count_with_key(assoc, id, key).await
            }
            _ => self.count_with_key(assoc, id, None).await,
        }
    }

    /// `key` is the owner's to-one key when already known; ignored for to-many.
    async fn count_with_key(&self, assoc: &Association, id: &Value, key: Option<Value>) -> Result<u64, ApiError> {
        let n = match &assoc.kind {
            AssociationKind::ToOne { .. } => {
                let Some(key) = key.filter(|k| !k.is_null()) else {
                    return Ok(0);
                };
                let target = self.target(&assoc.target)?;
                self.store
                    .count(&target.identity, &Criteria::eq(target.primary_key.clone(), key))
                    .await?
            }
            AssociationKind::ToMany { via } => {
                self.store
                    .count(&assoc.target, &Criteria::eq(via.clone(), id.clone()))
                    .await?
            }
            AssociationKind::ManyToMany {
                through,
                owner_key,
                target_key,
            } => {
                // Junction rows may outlive their target; only existing targets count.
                let links = self
                    .store
                    .find(
                        through,
                        &FindQuery::new(Criteria::eq(owner_key.clone(), id.clone())).select(Some(Vec::new())),
                    )
                    .await?;
                let keys = distinct(links.iter().filter_map(|link| link.get(target_key)));
                if keys.is_empty() {
                    return Ok(0);
                }
                let target = self.target(&assoc.target)?;
                self.store
                    .count(
                        &target.identity,
                        &Criteria::new().and(Criterion::new(
                            target.primary_key.clone(),
                            FilterOp::In,
                            Value::Array(keys),
                        )),
                    )
                    .await?
            }
        };
        Ok(n)
    }

    /// Counts every relationship of every given record, each distinct one once, concurrently.
    pub async fn count_records(&self, records: &[&ResolvedRecord]) -> Result<RelationshipCounts, ApiError> {
        let mut requests: HashMap<(String, String, String), (&Association, &Value, Option<Value>)> = HashMap::new();
        for record in records {
            let resource = self.target(&record.resource)?;
            for assoc in &resource.associations {
                let cache_key = (record.resource.clone(), value_key(&record.id), assoc.alias.clone());
                let known = record.to_one_key(&assoc.alias).cloned();
                requests.entry(cache_key).or_insert((assoc, &record.id, known));
            }
        }
        let (keys, futures): (Vec<_>, Vec<_>) = requests
            .into_iter()
            .map(|(cache_key, (assoc, id, known))| (cache_key, self.count_with_key(assoc, id, known)))
            .unzip();
        let counts = try_join_all(futures).await?;
        Ok(RelationshipCounts(keys.into_iter().zip(counts).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_registry, seeded_store};
    use serde_json::json;

    #[tokio::test]
    async fn counts_each_association_kind() {
        let registry = sample_registry();
        let store = seeded_store();
        let counter = RelationshipCounter::new(&store, &registry);
        let author = registry.get("author").unwrap();
        let comment = registry.get("comment").unwrap();
        let publisher = registry.get("publisher").unwrap();

        let comments = author.association("comments").unwrap();
        assert_eq!(counter.count(author, &json!(3), comments).await.unwrap(), 2);
        let publishers = author.association("publishers").unwrap();
        assert_eq!(counter.count(author, &json!(3), publishers).await.unwrap(), 2);
        let comment_author = comment.association("author").unwrap();
        assert_eq!(counter.count(comment, &json!(2), comment_author).await.unwrap(), 1);
        let outlet = publisher.association("outlet").unwrap();
        assert_eq!(counter.count(publisher, &json!(3), outlet).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn junction_counts_skip_destroyed_targets() {
        let registry = sample_registry();
        let store = seeded_store();
        store
            .destroy("publisher", &Criteria::eq("id", json!(2)))
            .await
            .unwrap();
        let counter = RelationshipCounter::new(&store, &registry);
        let author = registry.get("author").unwrap();
        let publishers = author.association("publishers").unwrap();
        assert_eq!(counter.count(author, &json!(3), publishers).await.unwrap(), 1);
    }
}
