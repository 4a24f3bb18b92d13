//! Builds JSON:API documents from resolved records, relationship counts and include state.

use crate::case::to_kebab_case;
use crate::config::{Registry, ResourceType};
use crate::document::{
    Document, DocumentMeta, LinkMeta, Linkage, PrimaryData, RelatedLink, RelationshipLinks, RelationshipObject,
    ResourceIdentifier, ResourceObject,
};
use crate::error::ApiError;
use crate::query::{Projection, ResolvedIncludes};
use crate::service::{Related, RelationshipCounts, ResolvedRecord};
use crate::store::{value_key, Record};
use std::collections::{BTreeMap, HashSet};

/// Everything besides the records that shapes a document.
pub struct RenderContext<'r> {
    pub projection: &'r Projection,
    pub includes: &'r ResolvedIncludes<'r>,
    pub counts: &'r RelationshipCounts,
}

pub struct DocumentSerializer<'a> {
    registry: &'a Registry,
    link_base: String,
}

impl<'a> DocumentSerializer<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        DocumentSerializer {
            registry,
            link_base: registry.api.link_base(),
        }
    }

    pub fn collection(
        &self,
        records: &[ResolvedRecord],
        ctx: &RenderContext,
        total: Option<u64>,
    ) -> Result<Document, ApiError> {
        let data = records
            .iter()
            .map(|r| self.resource_object(r, ctx, true))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Document {
            data: PrimaryData::Collection(data),
            included: self.side_load(records, ctx)?,
            meta: total.map(|total| DocumentMeta { total }),
        })
    }

    pub fn single(
        &self,
        record: Option<&ResolvedRecord>,
        ctx: &RenderContext,
        total: Option<u64>,
    ) -> Result<Document, ApiError> {
        let data = record.map(|r| self.resource_object(r, ctx, true)).transpose()?;
        let included = match record {
            Some(r) => self.side_load(std::slice::from_ref(r), ctx)?,
            None => Vec::new(),
        };
        Ok(Document {
            data: PrimaryData::Single(data),
            included,
            meta: total.map(|total| DocumentMeta { total }),
        })
    }

    fn resource(&self, identity: &str) -> Result<&'a ResourceType, ApiError> {
        self.registry
            .get(identity)
            .ok_or_else(|| ApiError::Internal(format!("unknown resource type {}", identity)))
    }

    fn identifier(&self, record: &ResolvedRecord) -> Result<ResourceIdentifier, ApiError> {
        Ok(ResourceIdentifier {
            type_: self.resource(&record.resource)?.type_name.clone(),
            id: value_key(&record.id),
        })
    }

    /// `primary` resources carry linkage for included relationships; side-loaded ones do not.
    pub fn resource_object(
        &self,
        record: &ResolvedRecord,
        ctx: &RenderContext,
        primary: bool,
    ) -> Result<ResourceObject, ApiError> {
        let rt = self.resource(&record.resource)?;
        let id = value_key(&record.id);
        let allowed = ctx.projection.for_type(&rt.identity);

        let attributes: Record = record
            .attributes
            .iter()
            .filter(|(name, _)| allowed.map_or(true, |fields| fields.iter().any(|f| f == *name)))
            .map(|(name, value)| (to_kebab_case(name), value.clone()))
            .collect();

        let mut relationships = BTreeMap::new();
        for assoc in &rt.associations {
            let data = if primary && ctx.includes.is_included(&assoc.alias) {
                match record.related(&assoc.alias) {
                    Some(Related::One(child)) => Some(Linkage::ToOne(
                        child.as_deref().map(|c| self.identifier(c)).transpose()?,
                    )),
                    Some(Related::Many(children)) => Some(Linkage::ToMany(
                        children.iter().map(|c| self.identifier(c)).collect::<Result<_, _>>()?,
                    )),
                    _ => None,
                }
            } else {
                None
            };
            relationships.insert(
                to_kebab_case(&assoc.alias),
                RelationshipObject {
                    links: RelationshipLinks {
                        related: RelatedLink {
                            href: format!("{}/{}/{}/{}", self.link_base, rt.path_segment, id, assoc.alias),
                            meta: LinkMeta {
                                count: ctx.counts.get(&rt.identity, &record.id, &assoc.alias),
                            },
                        },
                    },
                    data,
                },
            );
        }

        Ok(ResourceObject {
            type_: rt.type_name.clone(),
            id,
            attributes: if attributes.is_empty() { None } else { Some(attributes) },
            relationships,
        })
    }

    /// Included records of every primary resource, unique by (type, id) and never repeating a primary.
    fn side_load(&self, records: &[ResolvedRecord], ctx: &RenderContext) -> Result<Vec<ResourceObject>, ApiError> {
        let mut seen: HashSet<ResourceIdentifier> = records
            .iter()
            .map(|r| self.identifier(r))
            .collect::<Result<_, _>>()?;
        let mut included = Vec::new();
        for record in records {
            for alias in &ctx.includes.included {
                let children: Vec<&ResolvedRecord> = match record.related(alias) {
                    Some(Related::One(Some(child))) => vec![child.as_ref()],
                    Some(Related::Many(children)) => children.iter().collect(),
                    _ => Vec::new(),
                };
                for child in children {
                    if seen.insert(self.identifier(child)?) {
                        included.push(self.resource_object(child, ctx, false)?);
                    }
                }
            }
        }
        Ok(included)
    }
}

/// All records a document renders: the primaries and their included children.
pub fn rendered_records<'r>(records: &'r [ResolvedRecord], includes: &ResolvedIncludes) -> Vec<&'r ResolvedRecord> {
    let mut out: Vec<&ResolvedRecord> = records.iter().collect();
    for record in records {
        for alias in &includes.included {
            match record.related(alias) {
                Some(Related::One(Some(child))) => out.push(child),
                Some(Related::Many(children)) => out.extend(children.iter()),
                _ => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::resolve_includes;
    use crate::testing::sample_registry;
    use serde_json::json;

    fn record(registry: &Registry, identity: &str, includes: &ResolvedIncludes, row: serde_json::Value) -> ResolvedRecord {
        let rt = registry.get(identity).unwrap();
        ResolvedRecord::from_record(registry, rt, row.as_object().unwrap(), Some(includes)).unwrap()
    }

    #[test]
    fn dedupes_included_and_kebabs_attributes() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        let includes = resolve_includes(comment, Some("author")).unwrap();
        let author = json!({"id": 3, "name": "Cob", "age": 45});
        let records = vec![
            record(&registry, "comment", &includes, json!({"id": 2, "text": "A", "createdAt": "t", "author": author, "article": 1})),
            record(&registry, "comment", &includes, json!({"id": 3, "text": "B", "createdAt": "t", "author": author, "article": 1})),
        ];
        let projection = Projection::default();
        let counts = RelationshipCounts::default();
        let ctx = RenderContext {
            projection: &projection,
            includes: &includes,
            counts: &counts,
        };
        let doc = DocumentSerializer::new(&registry).collection(&records, &ctx, Some(3)).unwrap();
        assert_eq!(doc.included.len(), 1);
        assert_eq!(doc.included[0].type_, "authors");
        assert!(doc.included[0].relationships["articles"].data.is_none());

        let json = serde_json::to_value(&doc).unwrap();
        let first = &json["data"][0];
        assert_eq!(first["type"], "comments");
        assert_eq!(first["id"], "2");
        assert_eq!(first["attributes"]["created-at"], "t");
        assert!(first["attributes"].get("createdAt").is_none());
        assert_eq!(first["relationships"]["author"]["data"], json!({"type": "authors", "id": "3"}));
        assert!(first["relationships"]["article"].get("data").is_none());
        assert_eq!(
            first["relationships"]["article"]["links"]["related"]["href"],
            "http://localhost:1337/comments/2/article"
        );
        assert_eq!(json["meta"]["total"], 3);
    }

    #[test]
    fn empty_projection_omits_attributes() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        let includes = resolve_includes(author, None).unwrap();
        let rec = record(
            &registry,
            "author",
            &includes,
            json!({"id": 1, "name": "Abe", "articles": [], "comments": [], "publishers": []}),
        );
        let mut projection = Projection::default();
        projection.insert("author", Vec::new());
        let counts = RelationshipCounts::default();
        let ctx = RenderContext {
            projection: &projection,
            includes: &includes,
            counts: &counts,
        };
        let doc = DocumentSerializer::new(&registry).single(Some(&rec), &ctx, None).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["data"].get("attributes").is_none());
        assert!(json.get("meta").is_none());
        assert!(json.get("included").is_none());
    }
}
