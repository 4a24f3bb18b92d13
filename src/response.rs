//! Response negotiation: JSON:API success envelopes with the required media type.

use crate::document::Document;
use crate::error::ApiError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Serializes `T` as the body with `Content-Type: application/vnd.api+json`.
pub struct JsonApi<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for JsonApi<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(bytes) => (self.0, [(header::CONTENT_TYPE, JSONAPI_MEDIA_TYPE)], bytes).into_response(),
            Err(e) => ApiError::Internal(format!("serialize document: {}", e)).into_response(),
        }
    }
}

pub fn success_ok(document: Document) -> Response {
    JsonApi(StatusCode::OK, document).into_response()
}

pub fn success_created(document: Document) -> Response {
    JsonApi(StatusCode::CREATED, document).into_response()
}

/// 204 with an empty body and no Content-Type header.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
