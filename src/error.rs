//! Typed errors and their JSON:API error document mapping.

use crate::response::JSONAPI_MEDIA_TYPE;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: model {model} attribute {attribute}")]
    InvalidPrimaryKey { model: String, attribute: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid association {model}.{alias}: {reason}")]
    InvalidAssociation {
        model: String,
        alias: String,
        reason: String,
    },
    #[error("config load: {0}")]
    Load(String),
}

/// Failures raised by a data store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown resource type '{0}'")]
    UnknownResource(String),
    #[error("unknown association '{alias}' on {resource}")]
    UnknownAssociation { resource: String, alias: String },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unknown relationship '{alias}' on {resource}")]
    UnknownRelationship { resource: String, alias: String },
    #[error("sub-criteria (fields) is not supported on the singular relationship '{0}'")]
    UnsupportedSubCriteria(String),
    #[error("No record found with the specified {0}.")]
    NotFound(String),
    #[error("no resource type is routed at '{0}'")]
    UnknownResource(String),
    #[error("{0} is not enabled for this resource")]
    OperationNotAllowed(&'static str),
    #[error("validation: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("request Content-Type must be application/vnd.api+json without media type parameters")]
    UnsupportedMediaType,
    #[error("Accept header only lists application/vnd.api+json with media type parameters")]
    NotAcceptable,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::UnknownRelationship { .. }
            | ApiError::UnsupportedSubCriteria(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::UnknownResource(_) => StatusCode::NOT_FOUND,
            ApiError::OperationNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(_) | ApiError::Config(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON:API error document: `{"errors": [...]}`.
#[derive(Serialize, Debug)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

#[derive(Serialize, Debug)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "An unexpected error occurred.".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorDocument {
            errors: vec![ErrorObject {
                status: status.as_u16().to_string(),
                title: status.canonical_reason().unwrap_or("Error").to_string(),
                detail,
            }],
        };
        (status, [(header::CONTENT_TYPE, JSONAPI_MEDIA_TYPE)], Json(body)).into_response()
    }
}
