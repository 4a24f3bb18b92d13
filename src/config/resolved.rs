//! Resolved schema registry: config validated and flattened for runtime use.
//! Built once at startup and shared read-only.

use crate::case::to_kebab_case;
use crate::config::{ApiConfig, AttributeType, InclusionMode, Operation, ValidationRule};
use std::collections::HashMap;

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    Int,
    Text,
}

impl From<AttributeType> for PkType {
    fn from(ty: AttributeType) -> Self {
        match ty {
            AttributeType::Uuid => PkType::Uuid,
            AttributeType::Integer => PkType::Int,
            _ => PkType::Text,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
    pub column: String,
    pub has_default: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    /// We hold the target's key in `foreign_key`.
    ToOne {
        foreign_key: String,
        key_type: AttributeType,
    },
    /// The target holds our key under its to-one alias `via`.
    ToMany { via: String },
    /// Rows of `through` link us (`owner_key`) to the target (`target_key`); both are to-one aliases on `through`.
    ManyToMany {
        through: String,
        owner_key: String,
        target_key: String,
    },
}

#[derive(Clone, Debug)]
pub struct Association {
    pub alias: String,
    /// Identity of the related resource type.
    pub target: String,
    pub kind: AssociationKind,
    pub inverse: Option<String>,
    pub default_mode: InclusionMode,
}

impl Association {
    pub fn cardinality(&self) -> Cardinality {
        match self.kind {
            AssociationKind::ToOne { .. } => Cardinality::One,
            AssociationKind::ToMany { .. } | AssociationKind::ManyToMany { .. } => Cardinality::Many,
        }
    }

    pub fn is_singular(&self) -> bool {
        self.cardinality() == Cardinality::One
    }

    pub fn through(&self) -> Option<&str> {
        match &self.kind {
            AssociationKind::ManyToMany { through, .. } => Some(through),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResourceType {
    pub identity: String,
    pub global_id: String,
    /// JSON:API `type` member.
    pub type_name: String,
    pub path_segment: String,
    pub schema: Option<String>,
    pub table: String,
    pub primary_key: String,
    pub pk_type: PkType,
    pub timestamps: bool,
    pub attributes: Vec<Attribute>,
    pub associations: Vec<Association>,
    pub operations: Vec<Operation>,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResourceType {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn association(&self, alias: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.alias == alias)
    }

    /// Attribute by declared name or its kebab-case public name.
    pub fn resolve_attribute(&self, key: &str) -> Option<&Attribute> {
        self.attribute(key)
            .or_else(|| self.attributes.iter().find(|a| to_kebab_case(&a.name) == key))
    }

    /// Association by alias or its kebab-case public name.
    pub fn resolve_association(&self, key: &str) -> Option<&Association> {
        self.association(key)
            .or_else(|| self.associations.iter().find(|a| to_kebab_case(&a.alias) == key))
    }

    /// Canonical name of a filterable/sortable field: an attribute or a to-one alias.
    pub fn resolve_field(&self, key: &str) -> Option<&str> {
        if let Some(attr) = self.resolve_attribute(key) {
            return Some(&attr.name);
        }
        self.resolve_association(key)
            .filter(|a| a.is_singular())
            .map(|a| a.alias.as_str())
    }

    /// Declared type of a field, for coercing query-string values.
    pub fn field_type(&self, field: &str) -> Option<AttributeType> {
        if let Some(attr) = self.attribute(field) {
            return Some(attr.ty);
        }
        match self.association(field).map(|a| &a.kind) {
            Some(AssociationKind::ToOne { key_type, .. }) => Some(*key_type),
            _ => None,
        }
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Attribute holding the `updatedAt` timestamp, when timestamps are enabled.
    pub fn updated_at(&self) -> Option<&Attribute> {
        if !self.timestamps {
            return None;
        }
        self.attribute("updatedAt")
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    types: HashMap<String, ResourceType>,
    by_path: HashMap<String, String>,
    by_type_name: HashMap<String, String>,
    pub api: ApiConfig,
}

impl Registry {
    pub fn new(api: ApiConfig, types: Vec<ResourceType>) -> Self {
        let mut registry = Registry {
            api,
            ..Registry::default()
        };
        for t in types {
            registry.by_path.insert(t.path_segment.clone(), t.identity.clone());
            registry.by_type_name.insert(t.type_name.clone(), t.identity.clone());
            registry.types.insert(t.identity.clone(), t);
        }
        registry
    }

    pub fn get(&self, identity: &str) -> Option<&ResourceType> {
        self.types.get(identity)
    }

    pub fn by_path(&self, path_segment: &str) -> Option<&ResourceType> {
        self.by_path.get(path_segment).and_then(|id| self.types.get(id))
    }

    /// Lookup by JSON:API type name, path segment, or identity.
    pub fn lookup(&self, name: &str) -> Option<&ResourceType> {
        self.by_type_name
            .get(name)
            .and_then(|id| self.types.get(id))
            .or_else(|| self.by_path(name))
            .or_else(|| self.types.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }
}
