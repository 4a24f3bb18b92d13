//! JsonApiService: the find / findOne / populate / create / update / destroy actions.
//!
//! Every action resolves its query plan before touching the store, runs the
//! independent store calls together, and hands back the resolved records with
//! the rendered document so hooks can inspect both before anything is written.

use super::count::RelationshipCounter;
use super::payload::{parse_payload, Payload, PayloadMode};
use super::populate::PopulationPlanner;
use super::record::ResolvedRecord;
use super::validation::RequestValidator;
use crate::config::{AssociationKind, Registry, ResourceType};
use crate::document::Document;
use crate::error::ApiError;
use crate::query::{parse_id, QueryPlan, RawQuery, FIND_ONE_PATH_KEYS, POPULATE_PATH_KEYS};
use crate::serializer::{rendered_records, DocumentSerializer, RenderContext};
use crate::store::{value_key, Criteria, Criterion, DataStore, FilterOp, FindQuery, Populate, Record};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of an action: the records it resolved and, unless it was a destroy, the document to send.
#[derive(Debug)]
pub struct Outcome {
    pub records: Vec<ResolvedRecord>,
    pub document: Option<Document>,
}

#[derive(Clone)]
pub struct JsonApiService {
    store: Arc<dyn DataStore>,
    registry: Arc<Registry>,
}

impl JsonApiService {
    pub fn new(store: Arc<dyn DataStore>, registry: Arc<Registry>) -> Self {
        JsonApiService { store, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn resource(&self, identity: &str) -> Result<&ResourceType, ApiError> {
        self.registry
            .get(identity)
            .ok_or_else(|| ApiError::Internal(format!("unknown resource type {}", identity)))
    }

    fn planner(&self) -> PopulationPlanner<'_> {
        PopulationPlanner::new(self.store.as_ref(), &self.registry)
    }

    /// GET collection. `meta.total` counts every record matching the criteria, ignoring skip/limit.
    pub async fn find(&self, resource: &ResourceType, raw: &RawQuery) -> Result<Outcome, ApiError> {
        let plan = QueryPlan::build(&self.registry, resource, resource, raw, &[])?;
        let planner = self.planner();
        let (total, rows) = tokio::try_join!(
            async {
                self.store
                    .count(&resource.identity, &plan.criteria)
                    .await
                    .map_err(ApiError::from)
            },
            planner.execute(&plan, plan.base_query()),
        )?;
        tracing::debug!(resource = %resource.identity, rows = rows.len(), total, "find");
        let records = self.resolve(&plan, &rows)?;
        let document = self.render(&plan, &records, false, Some(total)).await?;
        Ok(Outcome {
            records,
            document: Some(document),
        })
    }

    /// GET single. Filter criteria in the query string further constrain the lookup.
    pub async fn find_one(&self, resource: &ResourceType, id: &str, raw: &RawQuery) -> Result<Outcome, ApiError> {
        let plan = QueryPlan::build(&self.registry, resource, resource, raw, FIND_ONE_PATH_KEYS)?;
        let id = parse_id(id, &resource.pk_type)?;
        let query = FindQuery {
            criteria: plan.criteria.clone().and(Criterion::new(
                resource.primary_key.clone(),
                FilterOp::Eq,
                id,
            )),
            limit: Some(1),
            ..plan.base_query()
        };
        let rows = self.planner().execute(&plan, query).await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(resource.primary_key.clone()));
        }
        let records = self.resolve(&plan, &rows)?;
        let document = self.render(&plan, &records, true, None).await?;
        Ok(Outcome {
            records,
            document: Some(document),
        })
    }

    /// GET the records related to `parent` #`id` through `relation`.
    ///
    /// The parent is loaded with the relation's keys only, filtered and paged by the
    /// query string (or pinned to `child_id`). The children are then re-read by key
    /// with the requested sort, projection and includes. `meta.total` is the
    /// unfiltered relationship count, counted alongside the parent lookup.
    pub async fn populate(
        &self,
        parent: &ResourceType,
        id: &str,
        relation: &str,
        child_id: Option<&str>,
        raw: &RawQuery,
    ) -> Result<Outcome, ApiError> {
        let assoc = parent
            .resolve_association(relation)
            .ok_or_else(|| ApiError::UnknownRelationship {
                resource: parent.type_name.clone(),
                alias: relation.to_string(),
            })?;
        let related = self.resource(&assoc.target)?;
        let parent_id = parse_id(id, &parent.pk_type)?;
        let child_id = child_id.map(|c| parse_id(c, &related.pk_type)).transpose()?;
        let plan = QueryPlan::build(&self.registry, parent, related, raw, POPULATE_PATH_KEYS)?;

        let directive = match &child_id {
            Some(child) => Populate {
                criteria: Criteria::eq(related.primary_key.clone(), child.clone()),
                ..Populate::keys(assoc.alias.clone())
            },
            None => Populate {
                criteria: plan.criteria.clone(),
                sort: plan.sort.clone(),
                skip: plan.skip,
                limit: plan.limit,
                ..Populate::keys(assoc.alias.clone())
            },
        };
        let parent_query = FindQuery::by_id(parent, parent_id.clone())
            .select(Some(Vec::new()))
            .populate(directive);

        let counter = RelationshipCounter::new(self.store.as_ref(), &self.registry);
        let (total, row) = tokio::try_join!(counter.count(parent, &parent_id, assoc), async {
            self.store
                .find_one(&parent.identity, &parent_query)
                .await
                .map_err(ApiError::from)
        })?;
        let row = row.ok_or_else(|| ApiError::NotFound(parent.primary_key.clone()))?;

        let child_ids: Vec<Value> = if assoc.is_singular() {
            row.get(&assoc.alias)
                .filter(|key| !key.is_null())
                .filter(|key| child_id.as_ref().map_or(true, |c| value_key(c) == value_key(key)))
                .cloned()
                .into_iter()
                .collect()
        } else {
            match row.get(&assoc.alias) {
                Some(Value::Array(children)) => children
                    .iter()
                    .filter_map(|child| child.get(&related.primary_key))
                    .cloned()
                    .collect(),
                _ => {
                    return Err(ApiError::Internal(format!(
                        "{} {} is missing relation {}",
                        parent.identity, id, assoc.alias
                    )))
                }
            }
        };

        let rows = if child_ids.is_empty() {
            Vec::new()
        } else {
            // Sort is reapplied; skip and limit already shaped the key list.
            let query = FindQuery::new(Criteria::new().and(Criterion::new(
                related.primary_key.clone(),
                FilterOp::In,
                Value::Array(child_ids),
            )))
            .select(plan.select())
            .sort(plan.sort.clone());
            self.planner().execute(&plan, query).await?
        };
        tracing::debug!(
            parent = %parent.identity,
            relation = %assoc.alias,
            rows = rows.len(),
            total,
            "populate"
        );

        let records = self.resolve(&plan, &rows)?;
        let document = self.render(&plan, &records, assoc.is_singular(), Some(total)).await?;
        Ok(Outcome {
            records,
            document: Some(document),
        })
    }

    /// POST. Responds with the created record as re-read from the store.
    pub async fn create(&self, resource: &ResourceType, body: Value, raw: &RawQuery) -> Result<Outcome, ApiError> {
        let plan = QueryPlan::build(&self.registry, resource, resource, raw, FIND_ONE_PATH_KEYS)?;
        let Payload { values, to_many } = parse_payload(&self.registry, resource, body, PayloadMode::Create)?;
        RequestValidator::validate(&values, &resource.validation)?;

        let row = self.store.create(&resource.identity, values).await?;
        let id = row
            .get(&resource.primary_key)
            .cloned()
            .ok_or_else(|| ApiError::Internal(format!("created {} has no primary key", resource.identity)))?;
        for (alias, ids) in to_many {
            self.link_many(resource, &id, &alias, ids, false).await?;
        }
        tracing::info!(resource = %resource.identity, id = %value_key(&id), "created");
        self.reread(&plan, id).await
    }

    /// PATCH / PUT. Attributes are merged; to-many linkage in the body replaces the existing links.
    pub async fn update(
        &self,
        resource: &ResourceType,
        id: &str,
        body: Value,
        raw: &RawQuery,
    ) -> Result<Outcome, ApiError> {
        let plan = QueryPlan::build(&self.registry, resource, resource, raw, FIND_ONE_PATH_KEYS)?;
        let id = parse_id(id, &resource.pk_type)?;
        let Payload { values, to_many } = parse_payload(&self.registry, resource, body, PayloadMode::Update(&id))?;
        RequestValidator::validate_partial(&values, &resource.validation)?;

        let criteria = Criteria::eq(resource.primary_key.clone(), id.clone());
        let found = if values.is_empty() {
            self.store.count(&resource.identity, &criteria).await? > 0
        } else {
            !self.store.update(&resource.identity, &criteria, values).await?.is_empty()
        };
        if !found {
            return Err(ApiError::NotFound(resource.primary_key.clone()));
        }
        for (alias, ids) in to_many {
            self.link_many(resource, &id, &alias, ids, true).await?;
        }
        tracing::info!(resource = %resource.identity, id = %value_key(&id), "updated");
        self.reread(&plan, id).await
    }

    /// DELETE by primary key. The outcome carries the deleted records and no document.
    pub async fn destroy(&self, resource: &ResourceType, id: &str) -> Result<Outcome, ApiError> {
        let id = parse_id(id, &resource.pk_type)?;
        let rows = self
            .store
            .destroy(&resource.identity, &Criteria::eq(resource.primary_key.clone(), id.clone()))
            .await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(resource.primary_key.clone()));
        }
        tracing::info!(resource = %resource.identity, id = %value_key(&id), "destroyed");
        let records = rows
            .iter()
            .map(|row| ResolvedRecord::from_record(&self.registry, resource, row, None))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Outcome {
            records,
            document: None,
        })
    }

    /// Links `owner` #`id` to `ids` through the to-many `alias`. With `replace`, existing links go first.
    async fn link_many(
        &self,
        owner: &ResourceType,
        id: &Value,
        alias: &str,
        ids: Vec<Value>,
        replace: bool,
    ) -> Result<(), ApiError> {
        let assoc = owner.association(alias).ok_or_else(|| ApiError::UnknownRelationship {
            resource: owner.type_name.clone(),
            alias: alias.to_string(),
        })?;
        let target = self.resource(&assoc.target)?;
        let mut seen = HashSet::new();
        let ids: Vec<Value> = ids.into_iter().filter(|v| seen.insert(value_key(v))).collect();
        let wanted = Criteria::new().and(Criterion::new(
            target.primary_key.clone(),
            FilterOp::In,
            Value::Array(ids.clone()),
        ));
        if !ids.is_empty() && self.store.count(&target.identity, &wanted).await? != ids.len() as u64 {
            return Err(ApiError::NotFound(target.primary_key.clone()));
        }

        match &assoc.kind {
            AssociationKind::ToMany { via } => {
                if replace {
                    let mut unset = Record::new();
                    unset.insert(via.clone(), Value::Null);
                    self.store
                        .update(&target.identity, &Criteria::eq(via.clone(), id.clone()), unset)
                        .await?;
                }
                if !ids.is_empty() {
                    let mut set = Record::new();
                    set.insert(via.clone(), id.clone());
                    self.store.update(&target.identity, &wanted, set).await?;
                }
            }
            AssociationKind::ManyToMany {
                through,
                owner_key,
                target_key,
            } => {
                if replace {
                    self.store
                        .destroy(through, &Criteria::eq(owner_key.clone(), id.clone()))
                        .await?;
                }
                for target_id in ids {
                    let mut link = Record::new();
                    link.insert(owner_key.clone(), id.clone());
                    link.insert(target_key.clone(), target_id);
                    self.store.create(through, link).await?;
                }
            }
            AssociationKind::ToOne { .. } => {
                return Err(ApiError::BadRequest(format!("relationship '{}' is to-one", alias)));
            }
        }
        Ok(())
    }

    async fn reread(&self, plan: &QueryPlan<'_>, id: Value) -> Result<Outcome, ApiError> {
        let resource = plan.resource;
        let query = FindQuery::by_id(resource, id).select(plan.select()).limit(Some(1));
        let rows = self.planner().execute(plan, query).await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(resource.primary_key.clone()));
        }
        let records = self.resolve(plan, &rows)?;
        let document = self.render(plan, &records, true, None).await?;
        Ok(Outcome {
            records,
            document: Some(document),
        })
    }

    fn resolve(&self, plan: &QueryPlan<'_>, rows: &[Record]) -> Result<Vec<ResolvedRecord>, ApiError> {
        rows.iter()
            .map(|row| ResolvedRecord::from_record(&self.registry, plan.resource, row, Some(&plan.includes)))
            .collect()
    }

    /// Counts every rendered relationship, then serializes.
    async fn render(
        &self,
        plan: &QueryPlan<'_>,
        records: &[ResolvedRecord],
        single: bool,
        total: Option<u64>,
    ) -> Result<Document, ApiError> {
        let counts = RelationshipCounter::new(self.store.as_ref(), &self.registry)
            .count_records(&rendered_records(records, &plan.includes))
            .await?;
        let ctx = RenderContext {
            projection: &plan.projection,
            includes: &plan.includes,
            counts: &counts,
        };
        let serializer = DocumentSerializer::new(&self.registry);
        if single {
            serializer.single(records.first(), &ctx, total)
        } else {
            serializer.collection(records, &ctx, total)
        }
    }
}
