//! JSON:API top-level document types.

use crate::store::Record;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DocumentMeta>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PrimaryData {
    Single(Option<ResourceObject>),
    Collection(Vec<ResourceObject>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub total: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Record>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipObject>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RelationshipObject {
    pub links: RelationshipLinks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Linkage>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RelationshipLinks {
    pub related: RelatedLink,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RelatedLink {
    pub href: String,
    pub meta: LinkMeta,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinkMeta {
    pub count: u64,
}

/// Resource linkage: `null`, one identifier, or a list.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Linkage {
    ToOne(Option<ResourceIdentifier>),
    ToMany(Vec<ResourceIdentifier>),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
}
