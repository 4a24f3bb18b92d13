//! Query-string decomposition: criteria, sparse fieldsets, sort, and pagination.

use crate::config::{AttributeType, PkType, Registry, ResourceType};
use crate::error::ApiError;
use crate::store::{Criteria, Criterion, FilterOp, SortDirection, SortKey};
use serde_json::Value;
use std::collections::HashMap;

/// Keys never forwarded as filter criteria.
pub const RESERVED_PARAMS: &[&str] = &["fields", "include", "sort", "skip", "limit"];

/// Query keys naming the identifiers a route already takes from its path.
pub const FIND_ONE_PATH_KEYS: &[&str] = &["id"];
pub const POPULATE_PATH_KEYS: &[&str] = &["parentid", "id"];

/// Raw query string pairs in request order.
pub type RawQuery = Vec<(String, String)>;

pub fn raw_param<'a>(raw: &'a RawQuery, name: &str) -> Option<&'a str> {
    raw.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// Sparse fieldsets keyed by resource identity. Absent type means all attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection {
    by_type: HashMap<String, Vec<String>>,
}

impl Projection {
    pub fn for_type(&self, identity: &str) -> Option<&[String]> {
        self.by_type.get(identity).map(Vec::as_slice)
    }

    /// Store-level select for a type: `None` fetches every attribute.
    pub fn select_for(&self, identity: &str) -> Option<Vec<String>> {
        self.by_type.get(identity).cloned()
    }

    pub fn insert(&mut self, identity: impl Into<String>, fields: Vec<String>) {
        self.by_type.insert(identity.into(), fields);
    }
}

#[derive(Clone, Debug, Default)]
pub struct QueryParams {
    pub criteria: Criteria,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Parses the query string for requests whose primary data is of type `resource`.
/// `owner` is the resource whose aliases `fields[...]` may name (the parent on nested routes).
/// `path_keys` are dropped from the criteria along with [`RESERVED_PARAMS`].
pub fn parse_query(
    registry: &Registry,
    owner: &ResourceType,
    resource: &ResourceType,
    raw: &RawQuery,
    path_keys: &[&str],
) -> Result<QueryParams, ApiError> {
    let mut params = QueryParams::default();
    for (key, value) in raw {
        if let Some(type_key) = key.strip_prefix("fields[").and_then(|k| k.strip_suffix(']')) {
            let (identity, fields) = parse_fields(registry, owner, type_key, value)?;
            params.projection.insert(identity, fields);
        }
    }
    if let Some(sort) = raw_param(raw, "sort") {
        params.sort = parse_sort(resource, sort)?;
    }
    if let Some(skip) = raw_param(raw, "skip") {
        params.skip = parse_count("skip", skip)?;
    }
    if let Some(limit) = raw_param(raw, "limit") {
        params.limit = Some(parse_count("limit", limit)?);
    }
    params.criteria = parse_criteria(resource, raw, path_keys)?;
    Ok(params)
}

/// `fields[<key>]=a,b`. Key is a type name, path segment, identity, or a to-many alias of `owner`.
pub fn parse_fields(
    registry: &Registry,
    owner: &ResourceType,
    key: &str,
    value: &str,
) -> Result<(String, Vec<String>), ApiError> {
    let target = match owner.resolve_association(key) {
        Some(assoc) if assoc.is_singular() => {
            return Err(ApiError::UnsupportedSubCriteria(assoc.alias.clone()));
        }
        Some(assoc) => registry.get(&assoc.target),
        None => registry.lookup(key),
    }
    .ok_or_else(|| ApiError::BadRequest(format!("fields[{}] names an unknown resource type", key)))?;

    let mut fields = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let attr = target.resolve_attribute(name).ok_or_else(|| {
            ApiError::BadRequest(format!("fields[{}]: {} has no attribute '{}'", key, target.type_name, name))
        })?;
        if !fields.contains(&attr.name) {
            fields.push(attr.name.clone());
        }
    }
    Ok((target.identity.clone(), fields))
}

/// Accepts `text`, `text DESC`, `-text`, `author ASC, text ASC`,
/// `{"text":"DESC"}`, and `[{"author":"ASC"},{"text":"ASC"}]`.
pub fn parse_sort(resource: &ResourceType, raw: &str) -> Result<Vec<SortKey>, ApiError> {
    let raw = raw.trim();
    let pairs: Vec<(String, SortDirection)> = if raw.starts_with('[') || raw.starts_with('{') {
        let json: Value = serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("malformed sort: {}", e)))?;
        let objects = match json {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            _ => return Err(ApiError::BadRequest("malformed sort".into())),
        };
        let mut pairs = Vec::new();
        for item in objects {
            let Value::Object(map) = item else {
                return Err(ApiError::BadRequest("sort array entries must be objects".into()));
            };
            for (field, dir) in map {
                pairs.push((field, json_direction(&dir)?));
            }
        }
        pairs
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(string_sort_entry)
            .collect::<Result<_, _>>()?
    };

    pairs
        .into_iter()
        .map(|(field, direction)| {
            let name = resource
                .resolve_field(&field)
                .ok_or_else(|| ApiError::BadRequest(format!("cannot sort {} by '{}'", resource.type_name, field)))?;
            Ok(SortKey {
                field: name.to_string(),
                direction,
            })
        })
        .collect()
}

fn string_sort_entry(entry: &str) -> Result<(String, SortDirection), ApiError> {
    let mut parts = entry.split_whitespace();
    let field = parts.next().unwrap_or_default();
    let direction = match parts.next() {
        Some(d) => text_direction(d)?,
        None => SortDirection::Asc,
    };
    if parts.next().is_some() {
        return Err(ApiError::BadRequest(format!("malformed sort entry '{}'", entry)));
    }
    match field.strip_prefix('-') {
        Some(f) => Ok((f.to_string(), SortDirection::Desc)),
        None => Ok((field.to_string(), direction)),
    }
}

fn text_direction(s: &str) -> Result<SortDirection, ApiError> {
    if s.eq_ignore_ascii_case("asc") {
        Ok(SortDirection::Asc)
    } else if s.eq_ignore_ascii_case("desc") {
        Ok(SortDirection::Desc)
    } else {
        Err(ApiError::BadRequest(format!("sort direction must be ASC or DESC, got '{}'", s)))
    }
}

fn json_direction(v: &Value) -> Result<SortDirection, ApiError> {
    match v {
        Value::String(s) => text_direction(s),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Asc),
        Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Desc),
        other => Err(ApiError::BadRequest(format!("invalid sort direction {}", other))),
    }
}

fn parse_count(name: &str, raw: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a non-negative integer", name)))
}

/// Non-reserved keys become criteria: `attr=v`, `attr[op]=v`, or `attr={"op":v}`.
pub fn parse_criteria(resource: &ResourceType, raw: &RawQuery, path_keys: &[&str]) -> Result<Criteria, ApiError> {
    let mut criteria = Criteria::new();
    for (key, value) in raw {
        let (name, modifier) = match key.split_once('[') {
            Some((name, rest)) => (name, rest.strip_suffix(']')),
            None => (key.as_str(), None),
        };
        if RESERVED_PARAMS.contains(&name) || path_keys.contains(&name) {
            continue;
        }
        let Some(field) = resource.resolve_field(name) else {
            tracing::debug!(resource = %resource.identity, key = %key, "ignoring unknown filter key");
            continue;
        };
        let ty = resource.field_type(field).unwrap_or(AttributeType::String);
        match modifier {
            Some(m) => {
                let op = FilterOp::from_modifier(m)
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown filter modifier '{}'", m)))?;
                criteria.push(Criterion::new(field, op, coerce_for(op, ty, value)));
            }
            None => match serde_json::from_str::<Value>(value) {
                Ok(Value::Object(mods)) => {
                    for (m, v) in mods {
                        let op = FilterOp::from_modifier(&m)
                            .ok_or_else(|| ApiError::BadRequest(format!("unknown filter modifier '{}'", m)))?;
                        criteria.push(Criterion::new(field, op, coerce_json(ty, v)));
                    }
                }
                Ok(Value::Array(items)) => {
                    let items = items.into_iter().map(|v| coerce_json(ty, v)).collect();
                    criteria.push(Criterion::new(field, FilterOp::In, Value::Array(items)));
                }
                _ => criteria.push(Criterion::new(field, FilterOp::Eq, coerce_value(ty, value))),
            },
        }
    }
    Ok(criteria)
}

fn coerce_for(op: FilterOp, ty: AttributeType, raw: &str) -> Value {
    match op {
        FilterOp::In | FilterOp::NotIn => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Value::Array(items.into_iter().map(|v| coerce_json(ty, v)).collect()),
            _ => Value::Array(raw.split(',').map(|s| coerce_value(ty, s.trim())).collect()),
        },
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => Value::String(raw.to_string()),
        _ => coerce_value(ty, raw),
    }
}

fn coerce_json(ty: AttributeType, v: Value) -> Value {
    match v {
        Value::String(s) => coerce_value(ty, &s),
        other => other,
    }
}

/// Typed value for a query-string value; falls back to the raw string.
pub fn coerce_value(ty: AttributeType, s: &str) -> Value {
    if s == "null" {
        return Value::Null;
    }
    match ty {
        AttributeType::Integer => {
            if let Ok(n) = s.parse::<i64>() {
                return Value::Number(n.into());
            }
        }
        AttributeType::Number => {
            if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                return Value::Number(n);
            }
        }
        AttributeType::Boolean => {
            if s.eq_ignore_ascii_case("true") {
                return Value::Bool(true);
            }
            if s.eq_ignore_ascii_case("false") {
                return Value::Bool(false);
            }
        }
        AttributeType::Uuid => {
            if let Ok(u) = uuid::Uuid::parse_str(s) {
                return Value::String(u.to_string());
            }
        }
        _ => {}
    }
    Value::String(s.to_string())
}

pub fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, ApiError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| ApiError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        PkType::Int => {
            let n: i64 = id_str.parse().map_err(|_| ApiError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_registry;
    use serde_json::json;

    fn raw(pairs: &[(&str, &str)]) -> RawQuery {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn sort_forms_normalize_to_keys() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        assert_eq!(parse_sort(comment, "text ASC").unwrap(), vec![SortKey::asc("text")]);
        assert_eq!(parse_sort(comment, "-text").unwrap(), vec![SortKey::desc("text")]);
        assert_eq!(parse_sort(comment, r#"[{"text":"DESC"}]"#).unwrap(), vec![SortKey::desc("text")]);
        assert_eq!(
            parse_sort(comment, r#"[{"author":"ASC"},{"text":"ASC"}]"#).unwrap(),
            vec![SortKey::asc("author"), SortKey::asc("text")]
        );
        assert_eq!(
            parse_sort(comment, "author DESC, text").unwrap(),
            vec![SortKey::desc("author"), SortKey::asc("text")]
        );
    }

    #[test]
    fn malformed_sort_is_bad_request() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        assert!(matches!(parse_sort(comment, "[{text"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_sort(comment, "text SIDEWAYS"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_sort(comment, "nope"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn fields_resolve_by_type_and_alias() {
        let registry = sample_registry();
        let article = registry.get("article").unwrap();
        let (identity, fields) = parse_fields(&registry, article, "comments", "text").unwrap();
        assert_eq!((identity.as_str(), fields), ("comment", vec!["text".to_string()]));
        let (identity, fields) = parse_fields(&registry, article, "articles", "").unwrap();
        assert_eq!((identity.as_str(), fields.len()), ("article", 0));
        assert!(matches!(
            parse_fields(&registry, article, "author", "name"),
            Err(ApiError::UnsupportedSubCriteria(_))
        ));
        assert!(matches!(
            parse_fields(&registry, article, "widgets", "a"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn criteria_skip_reserved_and_coerce_types() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        let q = raw(&[
            ("age[lt]", "30"),
            ("name", "Bea"),
            ("include", "articles"),
            ("parentid", "1"),
            ("unknown", "x"),
        ]);
        let criteria = parse_criteria(author, &q, POPULATE_PATH_KEYS).unwrap();
        assert_eq!(
            criteria,
            Criteria(vec![
                Criterion::new("age", FilterOp::Lt, json!(30)),
                Criterion::new("name", FilterOp::Eq, json!("Bea")),
            ])
        );
    }

    #[test]
    fn id_is_a_criterion_unless_the_route_owns_it() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        let q = raw(&[("id[in]", "1,2")]);
        assert_eq!(
            parse_criteria(comment, &q, &[]).unwrap(),
            Criteria(vec![Criterion::new("id", FilterOp::In, json!([1, 2]))])
        );
        assert!(parse_criteria(comment, &q, FIND_ONE_PATH_KEYS).unwrap().is_empty());
    }

    #[test]
    fn json_modifier_values() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        let criteria = parse_criteria(author, &raw(&[("age", r#"{">=":"30"}"#), ("name", r#"["Abe","Bea"]"#)]), &[]).unwrap();
        assert_eq!(
            criteria,
            Criteria(vec![
                Criterion::new("age", FilterOp::Gte, json!(30)),
                Criterion::new("name", FilterOp::In, json!(["Abe", "Bea"])),
            ])
        );
    }

    #[test]
    fn pagination_must_be_non_negative_integers() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        let params = parse_query(&registry, author, author, &raw(&[("skip", "1"), ("limit", "2")]), &[]).unwrap();
        assert_eq!((params.skip, params.limit), (1, Some(2)));
        assert!(parse_query(&registry, author, author, &raw(&[("limit", "-1")]), &[]).is_err());
    }
}
