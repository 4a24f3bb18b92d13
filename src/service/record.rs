//! Serialization-ready view of a fetched row. Built from the store's row without mutating it.

use crate::config::{AssociationKind, InclusionMode, Registry, ResourceType};
use crate::error::ApiError;
use crate::query::ResolvedIncludes;
use crate::store::Record;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Related {
    /// To-one key held by the owner.
    Key(Option<Value>),
    /// Related identifiers of a to-many association.
    Keys(Vec<Value>),
    One(Option<Box<ResolvedRecord>>),
    Many(Vec<ResolvedRecord>),
    /// Nothing fetched; rendered as link and count only.
    Unloaded,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRecord {
    /// Identity of the record's resource type.
    pub resource: String,
    pub id: Value,
    /// Declared attributes present on the row, primary key excluded.
    pub attributes: Record,
    pub relations: BTreeMap<String, Related>,
}

impl ResolvedRecord {
    /// With `includes`, every association must carry what its mode asked the store for.
    /// Without, only to-one keys are read (side-loaded records are one level deep).
    pub fn from_record(
        registry: &Registry,
        resource: &ResourceType,
        record: &Record,
        includes: Option<&ResolvedIncludes>,
    ) -> Result<Self, ApiError> {
        let id = record
            .get(&resource.primary_key)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| ApiError::Internal(format!("{} row without {}", resource.identity, resource.primary_key)))?;

        let attributes = resource
            .attributes
            .iter()
            .filter(|a| a.name != resource.primary_key)
            .filter_map(|a| record.get(&a.name).map(|v| (a.name.clone(), v.clone())))
            .collect();

        let mut relations = BTreeMap::new();
        for assoc in &resource.associations {
            let mode = includes.and_then(|i| i.mode(&assoc.alias));
            let value = record.get(&assoc.alias);
            let related = match (&assoc.kind, mode) {
                (AssociationKind::ToOne { .. }, Some(InclusionMode::Record)) => match value {
                    Some(Value::Object(row)) => {
                        let target = target_of(registry, &assoc.target)?;
                        Related::One(Some(Box::new(Self::from_record(registry, target, row, None)?)))
                    }
                    Some(Value::Null) | None => Related::One(None),
                    Some(key) => Related::Key(Some(key.clone())),
                },
                (AssociationKind::ToOne { .. }, _) => match value {
                    Some(Value::Object(row)) => {
                        let target = target_of(registry, &assoc.target)?;
                        Related::Key(row.get(&target.primary_key).cloned())
                    }
                    Some(Value::Null) | None => Related::Key(None),
                    Some(key) => Related::Key(Some(key.clone())),
                },
                (_, None) | (_, Some(InclusionMode::Link)) => Related::Unloaded,
                (_, Some(mode)) => {
                    let Some(Value::Array(items)) = value else {
                        return Err(ApiError::Internal(format!(
                            "{} {} is missing populated relation {}",
                            resource.identity, id, assoc.alias
                        )));
                    };
                    let target = target_of(registry, &assoc.target)?;
                    if mode == InclusionMode::Record {
                        let children = items
                            .iter()
                            .filter_map(Value::as_object)
                            .map(|row| Self::from_record(registry, target, row, None))
                            .collect::<Result<Vec<_>, _>>()?;
                        Related::Many(children)
                    } else {
                        Related::Keys(
                            items
                                .iter()
                                .filter_map(|item| match item {
                                    Value::Object(row) => row.get(&target.primary_key).cloned(),
                                    scalar => Some(scalar.clone()),
                                })
                                .collect(),
                        )
                    }
                }
            };
            relations.insert(assoc.alias.clone(), related);
        }

        Ok(ResolvedRecord {
            resource: resource.identity.clone(),
            id,
            attributes,
            relations,
        })
    }

    pub fn related(&self, alias: &str) -> Option<&Related> {
        self.relations.get(alias)
    }

    /// The key of a to-one association, whether or not the target was loaded.
    pub fn to_one_key(&self, alias: &str) -> Option<&Value> {
        match self.relations.get(alias)? {
            Related::Key(key) => key.as_ref(),
            Related::One(Some(child)) => Some(&child.id),
            _ => None,
        }
    }
}

fn target_of<'a>(registry: &'a Registry, identity: &str) -> Result<&'a ResourceType, ApiError> {
    registry
        .get(identity)
        .ok_or_else(|| ApiError::Internal(format!("unknown resource type {}", identity)))
}
