//! Request-scoped query plan: resolved includes plus parsed parameters.

use super::include::{resolve_includes, ResolvedIncludes};
use super::params::{parse_query, raw_param, Projection, QueryParams, RawQuery};
use crate::config::{Registry, ResourceType};
use crate::error::ApiError;
use crate::store::{Criteria, FindQuery, SortKey};

#[derive(Clone, Debug)]
pub struct QueryPlan<'a> {
    pub resource: &'a ResourceType,
    pub includes: ResolvedIncludes<'a>,
    pub criteria: Criteria,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl<'a> QueryPlan<'a> {
    /// Includes are resolved before anything else so an unknown relationship
    /// fails before any parameter parsing or data access.
    pub fn build(
        registry: &'a Registry,
        owner: &'a ResourceType,
        resource: &'a ResourceType,
        raw: &RawQuery,
        path_keys: &[&str],
    ) -> Result<Self, ApiError> {
        let includes = resolve_includes(resource, raw_param(raw, "include"))?;
        let QueryParams {
            criteria,
            projection,
            sort,
            skip,
            limit,
        } = parse_query(registry, owner, resource, raw, path_keys)?;
        Ok(QueryPlan {
            resource,
            includes,
            criteria,
            projection,
            sort,
            skip,
            limit,
        })
    }

    /// Projection for the primary resource type.
    pub fn select(&self) -> Option<Vec<String>> {
        self.projection.select_for(&self.resource.identity)
    }

    /// Criteria, projection, sort and pagination for the primary query, without populates.
    pub fn base_query(&self) -> FindQuery {
        FindQuery::new(self.criteria.clone())
            .select(self.select())
            .sort(self.sort.clone())
            .skip(self.skip)
            .limit(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InclusionMode;
    use crate::testing::sample_registry;

    fn raw(pairs: &[(&str, &str)]) -> RawQuery {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn builds_base_query() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        let plan = QueryPlan::build(
            &registry,
            comment,
            comment,
            &raw(&[("include", "author"), ("sort", "text DESC"), ("limit", "1"), ("fields[comments]", "text")]),
            &[],
        )
        .unwrap();
        assert_eq!(plan.includes.mode("author"), Some(InclusionMode::Record));
        let q = plan.base_query();
        assert_eq!(q.limit, Some(1));
        assert_eq!(q.select, Some(vec!["text".to_string()]));
        assert_eq!(q.sort, vec![SortKey::desc("text")]);
    }

    #[test]
    fn unknown_include_fails_before_params() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        let err = QueryPlan::build(&registry, comment, comment, &raw(&[("include", "nope"), ("sort", "[{")]), &[])
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownRelationship { .. }));
    }
}
