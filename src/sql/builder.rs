//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved resource type.
//! Every statement yields rows as a single `row_to_json` column keyed by attribute name.

use crate::config::{AssociationKind, AttributeType, ResourceType};
use crate::error::StoreError;
use crate::store::{Criteria, Criterion, FilterOp, FindQuery, Record, SortDirection};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(rt: &ResourceType) -> String {
    match &rt.schema {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&rt.table)),
        None => quoted(&rt.table),
    }
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Pushes a value and returns its cast placeholder.
    fn push_param(&mut self, v: Value, ty: AttributeType) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), ty.pg_cast().unwrap_or("text"))
    }
}

/// A selectable field: (column, public name, type).
struct Field<'a> {
    column: &'a str,
    name: &'a str,
    ty: AttributeType,
}

fn field<'a>(rt: &'a ResourceType, name: &str) -> Option<Field<'a>> {
    if let Some(attr) = rt.attribute(name) {
        return Some(Field {
            column: &attr.column,
            name: &attr.name,
            ty: attr.ty,
        });
    }
    let assoc = rt.association(name)?;
    match &assoc.kind {
        AssociationKind::ToOne { foreign_key, key_type } => Some(Field {
            column: foreign_key,
            name: &assoc.alias,
            ty: *key_type,
        }),
        _ => None,
    }
}

fn field_or_err<'a>(rt: &'a ResourceType, name: &str) -> Result<Field<'a>, StoreError> {
    field(rt, name).ok_or_else(|| StoreError::InvalidValue(format!("{} has no field '{}'", rt.identity, name)))
}

/// `"col" AS "name"` for the primary key, selected attributes and to-one keys.
fn select_column_list(rt: &ResourceType, select: Option<&[String]>) -> String {
    let attrs = rt.attributes.iter().filter(|a| {
        a.name == rt.primary_key || select.map_or(true, |fields| fields.iter().any(|f| f == &a.name))
    });
    let mut cols: Vec<String> = attrs
        .map(|a| format!("{} AS {}", quoted(&a.column), quoted(&a.name)))
        .collect();
    for assoc in &rt.associations {
        if let AssociationKind::ToOne { foreign_key, .. } = &assoc.kind {
            cols.push(format!("{} AS {}", quoted(foreign_key), quoted(&assoc.alias)));
        }
    }
    cols.join(", ")
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn condition(rt: &ResourceType, c: &Criterion, q: &mut QueryBuf) -> Result<String, StoreError> {
    let f = field_or_err(rt, &c.field)?;
    let col = quoted(f.column);
    let sql = match c.op {
        FilterOp::Eq | FilterOp::Ne if c.value.is_null() => {
            let not = if c.op == FilterOp::Ne { " NOT" } else { "" };
            format!("{} IS{} NULL", col, not)
        }
        FilterOp::Eq => format!("{} = {}", col, q.push_param(c.value.clone(), f.ty)),
        FilterOp::Ne => format!("{} IS DISTINCT FROM {}", col, q.push_param(c.value.clone(), f.ty)),
        FilterOp::Lt => format!("{} < {}", col, q.push_param(c.value.clone(), f.ty)),
        FilterOp::Lte => format!("{} <= {}", col, q.push_param(c.value.clone(), f.ty)),
        FilterOp::Gt => format!("{} > {}", col, q.push_param(c.value.clone(), f.ty)),
        FilterOp::Gte => format!("{} >= {}", col, q.push_param(c.value.clone(), f.ty)),
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
            let text = c.value.as_str().map(str::to_string).unwrap_or_else(|| c.value.to_string());
            let text = escape_like(&text);
            let pattern = match c.op {
                FilterOp::Contains => format!("%{}%", text),
                FilterOp::StartsWith => format!("{}%", text),
                _ => format!("%{}", text),
            };
            format!(
                "{}::text ILIKE {}",
                col,
                q.push_param(Value::String(pattern), AttributeType::Text)
            )
        }
        FilterOp::In | FilterOp::NotIn => {
            let items = match &c.value {
                Value::Array(items) => items.clone(),
                single => vec![single.clone()],
            };
            if items.is_empty() {
                return Ok(if c.op == FilterOp::In { "FALSE" } else { "TRUE" }.to_string());
            }
            let placeholders: Vec<String> = items.into_iter().map(|v| q.push_param(v, f.ty)).collect();
            let not = if c.op == FilterOp::NotIn { " NOT" } else { "" };
            format!("{}{} IN ({})", col, not, placeholders.join(", "))
        }
    };
    Ok(sql)
}

fn where_clause(rt: &ResourceType, criteria: &Criteria, q: &mut QueryBuf) -> Result<String, StoreError> {
    if criteria.is_empty() {
        return Ok(String::new());
    }
    let parts = criteria
        .iter()
        .map(|c| condition(rt, c, q))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

/// ORDER BY over public names of the inner select, primary key last.
fn order_clause(rt: &ResourceType, query: &FindQuery, prefix: &str) -> Result<String, StoreError> {
    let mut parts = Vec::new();
    for key in &query.sort {
        let f = field_or_err(rt, &key.field)?;
        let dir = match key.direction {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        };
        parts.push(format!("{}{} {}", prefix, quoted(f.column), dir));
    }
    if query.sort.iter().all(|k| k.field != rt.primary_key) {
        let pk = field_or_err(rt, &rt.primary_key)?;
        parts.push(format!("{}{} ASC", prefix, quoted(pk.column)));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

fn outer_order(rt: &ResourceType, query: &FindQuery) -> Result<String, StoreError> {
    let mut parts = Vec::new();
    for key in &query.sort {
        let f = field_or_err(rt, &key.field)?;
        let dir = match key.direction {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        };
        parts.push(format!("t.{} {}", quoted(f.name), dir));
    }
    if query.sort.iter().all(|k| k.field != rt.primary_key) {
        parts.push(format!("t.{} ASC", quoted(&rt.primary_key)));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

/// SELECT with criteria, projection, sort, skip and limit. Populate directives are not rendered here.
pub fn select(rt: &ResourceType, query: &FindQuery) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let cols = select_column_list(rt, query.select.as_deref());
    let where_sql = where_clause(rt, &query.criteria, &mut q)?;
    let order_sql = order_clause(rt, query, "")?;
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if query.skip > 0 {
        format!(" OFFSET {}", query.skip)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT row_to_json(t) FROM (SELECT {} FROM {}{}{}{}{}) t{}",
        cols,
        qualified_table(rt),
        where_sql,
        order_sql,
        limit_clause,
        offset_clause,
        outer_order(rt, query)?
    );
    Ok(q)
}

pub fn count(rt: &ResourceType, criteria: &Criteria) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(rt, criteria, &mut q)?;
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(rt), where_sql);
    Ok(q)
}

/// INSERT the given fields. Fields with a DB default are omitted when absent.
pub fn insert(rt: &ResourceType, values: &Record) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, value) in values {
        let f = field_or_err(rt, name)?;
        if value.is_null() && rt.attribute(name).is_some_and(|a| a.has_default) {
            continue;
        }
        cols.push(quoted(f.column));
        placeholders.push(q.push_param(value.clone(), f.ty));
    }
    let returning = select_column_list(rt, None);
    q.sql = if cols.is_empty() {
        format!(
            "WITH t AS (INSERT INTO {} DEFAULT VALUES RETURNING {}) SELECT row_to_json(t) FROM t",
            qualified_table(rt),
            returning
        )
    } else {
        format!(
            "WITH t AS (INSERT INTO {} ({}) VALUES ({}) RETURNING {}) SELECT row_to_json(t) FROM t",
            qualified_table(rt),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    Ok(q)
}

/// UPDATE matching rows: SET only the given fields, plus `updated_at` when timestamps are on.
pub fn update(rt: &ResourceType, criteria: &Criteria, values: &Record) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (name, value) in values {
        if name == &rt.primary_key {
            continue;
        }
        let f = field_or_err(rt, name)?;
        let rhs = q.push_param(value.clone(), f.ty);
        sets.push(format!("{} = {}", quoted(f.column), rhs));
    }
    if let Some(stamp) = rt.updated_at() {
        if !values.contains_key(&stamp.name) {
            sets.push(format!("{} = NOW()", quoted(&stamp.column)));
        }
    }
    if sets.is_empty() {
        let query = FindQuery::new(criteria.clone());
        return select(rt, &query);
    }
    let where_sql = where_clause(rt, criteria, &mut q)?;
    q.sql = format!(
        "WITH t AS (UPDATE {} SET {}{} RETURNING {}) SELECT row_to_json(t) FROM t",
        qualified_table(rt),
        sets.join(", "),
        where_sql,
        select_column_list(rt, None)
    );
    Ok(q)
}

pub fn delete(rt: &ResourceType, criteria: &Criteria) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(rt, criteria, &mut q)?;
    q.sql = format!(
        "WITH t AS (DELETE FROM {}{} RETURNING {}) SELECT row_to_json(t) FROM t",
        qualified_table(rt),
        where_sql,
        select_column_list(rt, None)
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortKey;
    use crate::testing::sample_registry;
    use serde_json::json;

    #[test]
    fn select_renders_criteria_sort_and_paging() {
        let registry = sample_registry();
        let comment = registry.get("comment").unwrap();
        let query = FindQuery::new(
            Criteria::eq("article", json!(1))
                .and(Criterion::new("text", FilterOp::Contains, json!("50%"))),
        )
        .sort(vec![SortKey::desc("text")])
        .skip(2)
        .limit(Some(5))
        .select(Some(vec!["text".into()]));
        let q = select(comment, &query).unwrap();
        assert!(q.sql.contains("\"article_id\" = $1::bigint"));
        assert!(q.sql.contains("\"text\"::text ILIKE $2::text"));
        assert!(q.sql.contains("ORDER BY \"text\" DESC NULLS LAST, \"id\" ASC LIMIT 5 OFFSET 2"));
        assert!(q.sql.contains("\"article_id\" AS \"article\""));
        assert!(!q.sql.contains("\"created_at\" AS"));
        assert_eq!(q.params, vec![json!(1), json!("%50\\%%")]);
    }

    #[test]
    fn in_with_no_items_is_false() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        let q = count(author, &Criteria::new().and(Criterion::new("id", FilterOp::In, json!([])))).unwrap();
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"author\" WHERE FALSE");
        assert!(q.params.is_empty());
    }

    #[test]
    fn update_stamps_updated_at() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        let mut values = Record::new();
        values.insert("name".into(), json!("Ada"));
        let q = update(author, &Criteria::eq("id", json!(7)), &values).unwrap();
        assert!(q.sql.starts_with("WITH t AS (UPDATE \"author\" SET \"name\" = $1::text, \"updated_at\" = NOW() WHERE \"id\" = $2::bigint"));
        assert_eq!(q.params, vec![json!("Ada"), json!(7)]);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let registry = sample_registry();
        let author = registry.get("author").unwrap();
        assert!(count(author, &Criteria::eq("nope", json!(1))).is_err());
    }
}
