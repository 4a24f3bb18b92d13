//! HTTP handlers for the resource actions.

pub mod resource;
pub use resource::*;
