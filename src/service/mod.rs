//! Resolution and action services: records, population, counting, payloads, validation.

mod count;
mod payload;
mod populate;
mod record;
mod resource;
mod validation;

pub use count::{RelationshipCounter, RelationshipCounts};
pub use payload::{parse_payload, Payload, PayloadMode};
pub use populate::PopulationPlanner;
pub use record::{Related, ResolvedRecord};
pub use resource::{JsonApiService, Outcome};
pub use validation::RequestValidator;
