//! Backend-neutral filter criteria and sort keys.

use serde_json::Value;
use std::cmp::Ordering;

use super::Record;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
}

impl FilterOp {
    /// Parses a criteria modifier as used in `?age[lt]=30`, `?age={"<":30}` or `?name[contains]=b`.
    pub fn from_modifier(s: &str) -> Option<Self> {
        Some(match s {
            "=" | "==" | "eq" | "equals" => FilterOp::Eq,
            "!" | "!=" | "ne" | "not" => FilterOp::Ne,
            "<" | "lt" | "lessThan" => FilterOp::Lt,
            "<=" | "lte" | "lessThanOrEqual" => FilterOp::Lte,
            ">" | "gt" | "greaterThan" => FilterOp::Gt,
            ">=" | "gte" | "greaterThanOrEqual" => FilterOp::Gte,
            "contains" | "like" => FilterOp::Contains,
            "startsWith" => FilterOp::StartsWith,
            "endsWith" => FilterOp::EndsWith,
            "in" => FilterOp::In,
            "nin" => FilterOp::NotIn,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Criterion {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Criterion {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => loose_eq(actual, &self.value),
            FilterOp::Ne => !loose_eq(actual, &self.value),
            FilterOp::Lt => ordered(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(ordered(actual, &self.value), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => ordered(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => {
                matches!(ordered(actual, &self.value), Some(Ordering::Greater | Ordering::Equal))
            }
            FilterOp::Contains => text_op(actual, &self.value, |a, b| a.contains(b)),
            FilterOp::StartsWith => text_op(actual, &self.value, |a, b| a.starts_with(b)),
            FilterOp::EndsWith => text_op(actual, &self.value, |a, b| a.ends_with(b)),
            FilterOp::In => in_list(actual, &self.value),
            FilterOp::NotIn => !in_list(actual, &self.value),
        }
    }
}

/// Conjunction of criteria. Empty matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria(pub Vec<Criterion>);

impl Criteria {
    pub fn new() -> Self {
        Criteria::default()
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Criteria(vec![Criterion::new(field, FilterOp::Eq, value)])
    }

    pub fn push(&mut self, criterion: Criterion) {
        self.0.push(criterion);
    }

    pub fn and(mut self, criterion: Criterion) -> Self {
        self.0.push(criterion);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.0.iter()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.0.iter().all(|c| c.matches(record))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Compares two records by a list of sort keys.
pub fn compare_records(a: &Record, b: &Record, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let left = a.get(&key.field).unwrap_or(&Value::Null);
        let right = b.get(&key.field).unwrap_or(&Value::Null);
        let ord = compare_values(left, right);
        let ord = match key.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values: null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Stable string key for a value, used to group and deduplicate by id.
pub fn value_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            value_key(actual) == value_key(expected)
        }
        (Value::Number(_), Value::Number(_)) => compare_values(actual, expected) == Ordering::Equal,
        _ => actual == expected,
    }
}

fn ordered(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(_), Value::String(s)) => {
            let n = s.parse::<f64>().ok()?;
            Some(compare_values(actual, &serde_json::json!(n)))
        }
        _ if std::mem::discriminant(actual) == std::mem::discriminant(expected) => {
            Some(compare_values(actual, expected))
        }
        _ => None,
    }
}

fn text_op(actual: &Value, expected: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) else {
        return false;
    };
    f(&a.to_lowercase(), &b.to_lowercase())
}

fn in_list(actual: &Value, list: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| loose_eq(actual, item)),
        single => loose_eq(actual, single),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn equality_is_loose_between_numbers_and_strings() {
        let r = record(json!({"article": 1, "text": "Nice"}));
        assert!(Criteria::eq("article", json!("1")).matches(&r));
        assert!(Criteria::eq("article", json!(1.0)).matches(&r));
        assert!(!Criteria::eq("article", json!(2)).matches(&r));
    }

    #[test]
    fn text_operators_ignore_case() {
        let r = record(json!({"text": "A great try."}));
        assert!(Criterion::new("text", FilterOp::Contains, json!("GREAT")).matches(&r));
        assert!(Criterion::new("text", FilterOp::StartsWith, json!("a ")).matches(&r));
        assert!(!Criterion::new("text", FilterOp::EndsWith, json!("try")).matches(&r));
    }

    #[test]
    fn comparison_skips_nulls() {
        let r = record(json!({"age": null}));
        assert!(!Criterion::new("age", FilterOp::Lt, json!(30)).matches(&r));
        let r = record(json!({"age": 27}));
        assert!(Criterion::new("age", FilterOp::Lt, json!(30)).matches(&r));
        assert!(Criterion::new("age", FilterOp::In, json!([1, 27])).matches(&r));
        assert!(Criterion::new("age", FilterOp::NotIn, json!([1, 2])).matches(&r));
    }

    #[test]
    fn sorts_by_multiple_keys() {
        let a = record(json!({"author": 1, "text": "b"}));
        let b = record(json!({"author": 1, "text": "a"}));
        let c = record(json!({"author": 0, "text": "z"}));
        let mut rows = vec![a, b, c];
        rows.sort_by(|x, y| compare_records(x, y, &[SortKey::asc("author"), SortKey::asc("text")]));
        let texts: Vec<_> = rows.iter().map(|r| r["text"].as_str().unwrap()).collect();
        assert_eq!(texts, ["z", "a", "b"]);
        rows.sort_by(|x, y| compare_records(x, y, &[SortKey::desc("author")]));
        assert_eq!(rows[2]["text"], "z");
    }

    #[test]
    fn value_key_normalizes_integral_numbers() {
        assert_eq!(value_key(&json!(3)), "3");
        assert_eq!(value_key(&json!(3.0)), "3");
        assert_eq!(value_key(&json!("3")), "3");
    }
}
