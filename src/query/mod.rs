//! Request query parsing and planning.

pub mod include;
pub mod params;
pub mod plan;

pub use include::{resolve_includes, ResolvedAssociation, ResolvedIncludes};
pub use params::{
    parse_id, parse_query, Projection, QueryParams, RawQuery, FIND_ONE_PATH_KEYS, POPULATE_PATH_KEYS, RESERVED_PARAMS,
};
pub use plan::QueryPlan;
