//! Resource routes. Handlers resolve the resource type from the first path segment.

use crate::extractors::negotiate_accept;
use crate::handlers::{create, destroy, find, find_one, populate, populate_child, update};
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub fn resource_routes(state: AppState) -> Router {
    let max_body_bytes = state.registry.api.max_body_bytes;
    Router::new()
        .route("/:path_segment", get(find).post(create))
        .route(
            "/:path_segment/:id",
            get(find_one).patch(update).put(update).delete(destroy),
        )
        .route("/:path_segment/:id/:relation", get(populate))
        .route("/:path_segment/:id/:relation/:child_id", get(populate_child))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(negotiate_accept))
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}
