//! JSON:API media type negotiation: request body extractor (415) and Accept middleware (406).

use crate::error::ApiError;
use crate::response::JSONAPI_MEDIA_TYPE;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// A JSON body sent as `application/vnd.api+json` without media type parameters.
#[derive(Clone, Debug)]
pub struct JsonApiBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonApiBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_jsonapi_content_type(req.headers()) {
            return Err(ApiError::UnsupportedMediaType.into_response());
        }
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("request body is not valid JSON: {}", e)).into_response())?;
        Ok(JsonApiBody(value))
    }
}

fn media_type(range: &str) -> &str {
    range.split(';').next().unwrap_or_default().trim()
}

fn is_jsonapi_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| !ct.contains(';') && media_type(ct).eq_ignore_ascii_case(JSONAPI_MEDIA_TYPE))
}

/// True when Accept names the JSON:API media type only with parameters.
fn accept_rejects(headers: &HeaderMap) -> bool {
    let mut ranges = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|range| media_type(range).eq_ignore_ascii_case(JSONAPI_MEDIA_TYPE))
        .peekable();
    ranges.peek().is_some() && ranges.all(|range| range.contains(';'))
}

pub async fn negotiate_accept(req: Request, next: Next) -> Response {
    if accept_rejects(req.headers()) {
        tracing::debug!(uri = %req.uri(), "accept rejected");
        return ApiError::NotAcceptable.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: header::HeaderName, values: &[&'static str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(name.clone(), HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn content_type_must_be_bare_jsonapi() {
        assert!(is_jsonapi_content_type(&headers(header::CONTENT_TYPE, &["application/vnd.api+json"])));
        assert!(!is_jsonapi_content_type(&headers(header::CONTENT_TYPE, &["application/json"])));
        assert!(!is_jsonapi_content_type(&headers(
            header::CONTENT_TYPE,
            &["application/vnd.api+json; version=1"]
        )));
        assert!(!is_jsonapi_content_type(&HeaderMap::new()));
    }

    #[test]
    fn accept_rejects_only_when_every_jsonapi_range_has_params() {
        assert!(!accept_rejects(&HeaderMap::new()));
        assert!(!accept_rejects(&headers(header::ACCEPT, &["*/*"])));
        assert!(!accept_rejects(&headers(
            header::ACCEPT,
            &["application/vnd.api+json; ext=x, application/vnd.api+json"]
        )));
        assert!(accept_rejects(&headers(header::ACCEPT, &["application/vnd.api+json; ext=x"])));
        assert!(accept_rejects(&headers(
            header::ACCEPT,
            &["text/html", "application/vnd.api+json;q=0.5"]
        )));
    }
}
