//! Resource handlers: find, findOne, populate, create, update, destroy.

use crate::config::{Operation, ResourceType};
use crate::error::ApiError;
use crate::extractors::JsonApiBody;
use crate::hooks::{ActionContext, Interrupt};
use crate::query::RawQuery;
use crate::response::{no_content, success_created, success_ok};
use crate::service::Outcome;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};

fn resource_for<'r>(state: &'r AppState, path_segment: &str, op: Operation) -> Result<&'r ResourceType, ApiError> {
    let resource = state
        .registry
        .by_path(path_segment)
        .ok_or_else(|| ApiError::UnknownResource(path_segment.to_string()))?;
    if !resource.allows(op) {
        return Err(ApiError::OperationNotAllowed(op.as_str()));
    }
    Ok(resource)
}

/// Runs the action's hooks, then writes the document with `respond` (204 when there is none).
async fn finish(
    state: &AppState,
    action: Operation,
    resource: &ResourceType,
    outcome: Outcome,
    respond: fn(crate::document::Document) -> Response,
) -> Result<Response, ApiError> {
    let Outcome { records, mut document } = outcome;
    let mut ctx = ActionContext {
        action,
        resource,
        records: &records,
        document: document.as_mut(),
    };
    if let Interrupt::Respond(response) = state.hooks.run(&mut ctx).await? {
        return Ok(response);
    }
    Ok(match document {
        Some(document) => respond(document),
        None => no_content(),
    })
}

pub async fn find(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::Find)?;
    let outcome = state.service().find(resource, &raw).await?;
    finish(&state, Operation::Find, resource, outcome, success_ok).await
}

pub async fn find_one(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::FindOne)?;
    let outcome = state.service().find_one(resource, &id, &raw).await?;
    finish(&state, Operation::FindOne, resource, outcome, success_ok).await
}

pub async fn populate(
    State(state): State<AppState>,
    Path((path_segment, id, relation)): Path<(String, String, String)>,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::Populate)?;
    let outcome = state.service().populate(resource, &id, &relation, None, &raw).await?;
    finish(&state, Operation::Populate, resource, outcome, success_ok).await
}

pub async fn populate_child(
    State(state): State<AppState>,
    Path((path_segment, id, relation, child_id)): Path<(String, String, String, String)>,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::Populate)?;
    let outcome = state
        .service()
        .populate(resource, &id, &relation, Some(&child_id), &raw)
        .await?;
    finish(&state, Operation::Populate, resource, outcome, success_ok).await
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(raw): Query<RawQuery>,
    JsonApiBody(body): JsonApiBody,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::Create)?;
    let outcome = state.service().create(resource, body, &raw).await?;
    finish(&state, Operation::Create, resource, outcome, success_created).await
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    Query(raw): Query<RawQuery>,
    JsonApiBody(body): JsonApiBody,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::Update)?;
    let outcome = state.service().update(resource, &id, body, &raw).await?;
    finish(&state, Operation::Update, resource, outcome, success_ok).await
}

pub async fn destroy(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let resource = resource_for(&state, &path_segment, Operation::Destroy)?;
    let outcome = state.service().destroy(resource, &id).await?;
    finish(&state, Operation::Destroy, resource, outcome, success_ok).await
}
