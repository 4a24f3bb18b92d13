//! JSON:API resource resolution and serialization over a pluggable data store.
//!
//! A [`Registry`] built from JSON model configuration describes resource types and
//! their associations. [`JsonApiService`] turns query strings into plans, populates
//! relationships through a [`DataStore`], counts them, and renders JSON:API documents.
//! [`routes::app`] exposes the actions over axum.

pub mod case;
pub mod config;
pub mod document;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod query;
pub mod response;
pub mod routes;
pub mod serializer;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{load_from_dir, resolve, ApiConfig, FullConfig, Registry, ResourceType};
pub use document::Document;
pub use error::{ApiError, ConfigError, StoreError};
pub use hooks::{ActionContext, ActionHook, Hooks, Interrupt};
pub use routes::{app, common_routes, resource_routes};
pub use service::{JsonApiService, Outcome};
pub use state::AppState;
pub use store::{DataStore, MemoryStore, PgStore};
