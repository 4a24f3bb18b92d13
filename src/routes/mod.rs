//! Router assembly.

pub mod common;
pub mod resource;

pub use common::common_routes;
pub use resource::resource_routes;

use crate::state::AppState;
use axum::Router;

/// Health routes at the root plus resource routes under the configured prefix.
pub fn app(state: AppState) -> Router {
    let prefix = state.registry.api.prefix.trim_end_matches('/').to_string();
    let resources = resource_routes(state.clone());
    let resources = if prefix.is_empty() {
        resources
    } else {
        Router::new().nest(&prefix, resources)
    };
    common_routes(state).merge(resources)
}
