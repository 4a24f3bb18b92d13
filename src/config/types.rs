//! Raw config types matching models.json and api.json.

use crate::case::{lower_first, pluralize, to_kebab_case, upper_first};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Text,
    Integer,
    Number,
    Boolean,
    Json,
    Datetime,
    Uuid,
}

impl AttributeType {
    /// PostgreSQL cast applied to bound parameters and selected columns.
    pub fn pg_cast(self) -> Option<&'static str> {
        match self {
            AttributeType::Integer => Some("bigint"),
            AttributeType::Number => Some("double precision"),
            AttributeType::Boolean => Some("boolean"),
            AttributeType::Json => Some("jsonb"),
            AttributeType::Datetime => Some("timestamptz"),
            AttributeType::Uuid => Some("uuid"),
            AttributeType::String | AttributeType::Text => None,
        }
    }

    /// True when a JSON value fits this type. Null always fits.
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (_, Value::Null) => true,
            (AttributeType::String | AttributeType::Text, Value::String(_)) => true,
            (AttributeType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (AttributeType::Number, Value::Number(_)) => true,
            (AttributeType::Boolean, Value::Bool(_)) => true,
            (AttributeType::Json, _) => true,
            (AttributeType::Datetime, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            (AttributeType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s).is_ok(),
            _ => false,
        }
    }
}

/// How a relationship is rendered for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InclusionMode {
    /// Hyperlink and count only.
    Link,
    /// Related identifiers are fetched; rendered as link and count.
    #[default]
    Index,
    /// Full related records are fetched and may be side-loaded.
    Record,
}

/// Actions a resource type may expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Find,
    FindOne,
    Populate,
    Create,
    Update,
    Destroy,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Find,
        Operation::FindOne,
        Operation::Populate,
        Operation::Create,
        Operation::Update,
        Operation::Destroy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::Populate => "populate",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: AttributeType,
    /// Column name in the backing table. Defaults to snake_case of `name`.
    #[serde(default)]
    pub column: Option<String>,
    /// Whether the backing column has a database default.
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

/// Junction for a many-to-many association: `owner` and `target` are to-one aliases on `model`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThroughConfig {
    pub model: String,
    pub owner: String,
    pub target: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    pub alias: String,
    /// Target identity of a to-one association.
    #[serde(default)]
    pub model: Option<String>,
    /// Target identity of a to-many association.
    #[serde(default)]
    pub collection: Option<String>,
    /// To-one alias on the collection target that points back at this model.
    #[serde(default)]
    pub via: Option<String>,
    #[serde(default)]
    pub through: Option<ThroughConfig>,
    /// Column holding the key of a to-one association. Defaults to snake_case of `alias`.
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub include: Option<InclusionMode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub identity: String,
    #[serde(default)]
    pub global_id: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub path_segment: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    pub attributes: Vec<AttributeConfig>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
    #[serde(default = "default_operations")]
    pub operations: Vec<Operation>,
}

impl ModelConfig {
    /// "mediaOutlet" -> "MediaOutlet" unless configured.
    pub fn global_id(&self) -> String {
        self.global_id
            .clone()
            .unwrap_or_else(|| upper_first(&self.identity))
    }

    /// JSON:API `type`: pluralized kebab-case of the global id ("media-outlets").
    pub fn type_name(&self) -> String {
        self.type_name
            .clone()
            .unwrap_or_else(|| pluralize(&to_kebab_case(&self.global_id())))
    }

    /// URL segment: pluralized lower-camel global id ("mediaOutlets").
    pub fn path_segment(&self) -> String {
        self.path_segment
            .clone()
            .unwrap_or_else(|| pluralize(&lower_first(&self.global_id())))
    }

    pub fn table(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| crate::case::to_snake_case(&self.identity))
    }
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_true() -> bool {
    true
}

fn default_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host used in relationship links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Route prefix, also part of relationship links (e.g. "/api/v1").
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            prefix: String::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ApiConfig {
    /// `base_url + prefix` without a trailing slash.
    pub fn link_base(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.prefix.trim_end_matches('/'))
    }
}

fn default_base_url() -> String {
    "http://localhost:1337".into()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// All config in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    pub api: ApiConfig,
    pub models: Vec<ModelConfig>,
}
