//! Request validation from config rules.

use crate::config::ValidationRule;
use crate::error::ApiError;
use crate::store::Record;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate values against per-attribute rules. All required attributes must be present.
    pub fn validate(values: &Record, rules: &HashMap<String, ValidationRule>) -> Result<(), ApiError> {
        for (name, rule) in rules {
            let val = values.get(name);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(ApiError::Validation(format!("{} is required", name)));
            }
            if let Some(v) = val {
                validate_field(name, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the attributes present (for PATCH). Required is not enforced for missing ones,
    /// but a required attribute cannot be cleared.
    pub fn validate_partial(values: &Record, rules: &HashMap<String, ValidationRule>) -> Result<(), ApiError> {
        for (name, v) in values {
            if let Some(rule) = rules.get(name) {
                if rule.required == Some(true) && v.is_null() {
                    return Err(ApiError::Validation(format!("{} is required", name)));
                }
                validate_field(name, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(name: &str, v: &Value, rule: &ValidationRule) -> Result<(), ApiError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(name, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(ApiError::Validation(format!("{} must be at most {} characters", name, max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(ApiError::Validation(format!("{} must be at least {} characters", name, min)));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|_| ApiError::Validation(format!("invalid pattern for {}", name)))?;
            if !re.is_match(s) {
                return Err(ApiError::Validation(format!("{} does not match required pattern", name)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(ApiError::Validation(format!(
                "{} must be one of: {:?}",
                name,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        if rule.minimum.is_some_and(|min| n < min) {
            return Err(ApiError::Validation(format!("{} must be at least {}", name, rule.minimum.unwrap_or_default())));
        }
        if rule.maximum.is_some_and(|max| n > max) {
            return Err(ApiError::Validation(format!("{} must be at most {}", name, rule.maximum.unwrap_or_default())));
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(name: &str, v: &Value, format: &str) -> Result<(), ApiError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    let ok = match format.to_lowercase().as_str() {
        "email" => s.contains('@') && s.len() >= 3,
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        "date-time" | "datetime" => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        "url" => s.starts_with("http://") || s.starts_with("https://"),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("{} must be a valid {}", name, format)))
    }
}
