//! Decodes create/update request documents into store values.

use crate::config::{Registry, ResourceType};
use crate::error::ApiError;
use crate::query::parse_id;
use crate::store::{value_key, Record};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug)]
pub enum PayloadMode<'a> {
    Create,
    /// Update of the record with this primary key.
    Update(&'a Value),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    /// Attributes and to-one keys, by declared name.
    pub values: Record,
    /// To-many linkage to replace, by alias.
    pub to_many: Vec<(String, Vec<Value>)>,
}

pub fn parse_payload(
    registry: &Registry,
    resource: &ResourceType,
    body: Value,
    mode: PayloadMode,
) -> Result<Payload, ApiError> {
    let Value::Object(mut top) = body else {
        return Err(ApiError::BadRequest("request document must be an object".into()));
    };
    let Some(Value::Object(data)) = top.remove("data") else {
        return Err(ApiError::BadRequest("request document must contain a data object".into()));
    };

    let type_name = data
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("data.type is required".into()))?;
    if !names_type(registry, resource, type_name) {
        return Err(ApiError::Conflict(format!(
            "type '{}' does not match endpoint type '{}'",
            type_name, resource.type_name
        )));
    }

    let mut payload = Payload::default();
    match (mode, data.get("id")) {
        (_, None) | (_, Some(Value::Null)) => {}
        (PayloadMode::Create, Some(id)) => {
            let id = parse_id(&id_text(id)?, &resource.pk_type)?;
            payload.values.insert(resource.primary_key.clone(), id);
        }
        (PayloadMode::Update(url_id), Some(id)) => {
            if id_text(id)? != value_key(url_id) {
                return Err(ApiError::Conflict(format!(
                    "data.id '{}' does not match the URL id '{}'",
                    id_text(id)?,
                    value_key(url_id)
                )));
            }
        }
    }

    if let Some(attributes) = data.get("attributes") {
        let attributes = as_object(attributes, "data.attributes")?;
        for (key, value) in attributes {
            let attr = resource
                .resolve_attribute(key)
                .filter(|a| a.name != resource.primary_key)
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("{} has no writable attribute '{}'", resource.type_name, key))
                })?;
            if !attr.ty.accepts(value) {
                return Err(ApiError::Validation(format!("{} must be of type {:?}", attr.name, attr.ty)));
            }
            payload.values.insert(attr.name.clone(), value.clone());
        }
    }

    if let Some(relationships) = data.get("relationships") {
        let relationships = as_object(relationships, "data.relationships")?;
        for (key, rel) in relationships {
            let assoc = resource.resolve_association(key).ok_or_else(|| ApiError::UnknownRelationship {
                resource: resource.type_name.clone(),
                alias: key.clone(),
            })?;
            let target = registry
                .get(&assoc.target)
                .ok_or_else(|| ApiError::Internal(format!("unknown resource type {}", assoc.target)))?;
            let linkage = as_object(rel, key)?
                .get("data")
                .ok_or_else(|| ApiError::BadRequest(format!("relationship '{}' must contain data", key)))?;
            if assoc.is_singular() {
                let id = match linkage {
                    Value::Null => Value::Null,
                    Value::Object(_) => identifier(registry, target, linkage)?,
                    _ => return Err(ApiError::BadRequest(format!("relationship '{}' takes one identifier or null", key))),
                };
                payload.values.insert(assoc.alias.clone(), id);
            } else {
                let Value::Array(items) = linkage else {
                    return Err(ApiError::BadRequest(format!("relationship '{}' takes an array of identifiers", key)));
                };
                let ids = items
                    .iter()
                    .map(|item| identifier(registry, target, item))
                    .collect::<Result<Vec<_>, _>>()?;
                payload.to_many.push((assoc.alias.clone(), ids));
            }
        }
    }

    Ok(payload)
}

fn names_type(registry: &Registry, resource: &ResourceType, name: &str) -> bool {
    registry
        .lookup(name)
        .is_some_and(|rt| rt.identity == resource.identity)
}

fn as_object<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>, ApiError> {
    value
        .as_object()
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be an object", what)))
}

fn id_text(id: &Value) -> Result<String, ApiError> {
    match id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ApiError::BadRequest("id must be a string".into())),
    }
}

/// Primary key from a `{type, id}` resource identifier of `target`.
fn identifier(registry: &Registry, target: &ResourceType, value: &Value) -> Result<Value, ApiError> {
    let obj = as_object(value, "resource identifier")?;
    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("resource identifier needs a type".into()))?;
    if !names_type(registry, target, type_name) {
        return Err(ApiError::Conflict(format!(
            "identifier type '{}' does not match '{}'",
            type_name, target.type_name
        )));
    }
    let id = obj
        .get("id")
        .ok_or_else(|| ApiError::BadRequest("resource identifier needs an id".into()))?;
    parse_id(&id_text(id)?, &target.pk_type)
}
