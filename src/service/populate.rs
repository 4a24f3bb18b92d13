//! Population planning: turns a query plan into store populate directives and runs it.

use crate::config::{InclusionMode, Registry};
use crate::error::ApiError;
use crate::query::QueryPlan;
use crate::store::{DataStore, FindQuery, Populate, Record};

pub struct PopulationPlanner<'a> {
    store: &'a dyn DataStore,
    registry: &'a Registry,
}

impl<'a> PopulationPlanner<'a> {
    pub fn new(store: &'a dyn DataStore, registry: &'a Registry) -> Self {
        PopulationPlanner { store, registry }
    }

    /// One directive per association that needs data: full rows for `record`,
    /// primary keys for `index`, nothing for `link`.
    pub fn plan(&self, plan: &QueryPlan) -> Result<Vec<Populate>, ApiError> {
        let mut directives = Vec::new();
        for resolved in &plan.includes.associations {
            let assoc = resolved.association;
            match resolved.mode {
                InclusionMode::Record => {
                    let target = self
                        .registry
                        .get(&assoc.target)
                        .ok_or_else(|| ApiError::Internal(format!("unknown resource type {}", assoc.target)))?;
                    let select = plan.projection.select_for(&target.identity);
                    if assoc.is_singular() && select.is_some() {
                        return Err(ApiError::UnsupportedSubCriteria(assoc.alias.clone()));
                    }
                    directives.push(Populate::records(assoc.alias.clone(), select));
                }
                InclusionMode::Index => directives.push(Populate::keys(assoc.alias.clone())),
                InclusionMode::Link => {}
            }
        }
        Ok(directives)
    }

    /// Runs `query` with the plan's populate directives attached.
    pub async fn execute(&self, plan: &QueryPlan<'_>, query: FindQuery) -> Result<Vec<Record>, ApiError> {
        let query = FindQuery {
            populate: self.plan(plan)?,
            ..query
        };
        tracing::debug!(
            resource = %plan.resource.identity,
            populate = query.populate.len(),
            "populate"
        );
        Ok(self.store.find(&plan.resource.identity, &query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RawQuery;
    use crate::testing::{sample_registry, seeded_store};

    fn raw(pairs: &[(&str, &str)]) -> RawQuery {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn record_mode_gets_full_rows_and_index_gets_keys() {
        let registry = sample_registry();
        let store = seeded_store();
        let author = registry.get("author").unwrap();
        let plan = QueryPlan::build(&registry, author, author, &raw(&[("include", "articles"), ("fields[articles]", "title")]), &[]).unwrap();
        let directives = PopulationPlanner::new(&store, &registry).plan(&plan).unwrap();
        let articles = directives.iter().find(|p| p.alias == "articles").unwrap();
        assert_eq!(articles.select, Some(vec!["title".to_string()]));
        let comments = directives.iter().find(|p| p.alias == "comments").unwrap();
        assert!(comments.is_keys_only());
    }

    #[test]
    fn projection_on_included_to_one_is_rejected() {
        let registry = sample_registry();
        let store = seeded_store();
        let comment = registry.get("comment").unwrap();
        let plan = QueryPlan::build(&registry, comment, comment, &raw(&[("include", "author"), ("fields[authors]", "name")]), &[]).unwrap();
        assert!(matches!(
            PopulationPlanner::new(&store, &registry).plan(&plan),
            Err(ApiError::UnsupportedSubCriteria(_))
        ));
    }

    #[tokio::test]
    async fn execute_populates_rows() {
        let registry = sample_registry();
        let store = seeded_store();
        let article = registry.get("article").unwrap();
        let plan = QueryPlan::build(&registry, article, article, &raw(&[("include", "comments")]), &[]).unwrap();
        let rows = PopulationPlanner::new(&store, &registry)
            .execute(&plan, plan.base_query())
            .await
            .unwrap();
        assert_eq!(rows[0]["comments"].as_array().unwrap().len(), 3);
    }
}
