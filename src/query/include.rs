//! Association resolution: which relationships a request renders, and how.

use crate::config::{Association, InclusionMode, ResourceType};
use crate::error::ApiError;

#[derive(Clone, Debug)]
pub struct ResolvedAssociation<'a> {
    pub association: &'a Association,
    pub mode: InclusionMode,
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedIncludes<'a> {
    /// Every declared association of the resource, in declaration order.
    pub associations: Vec<ResolvedAssociation<'a>>,
    /// Aliases named by `include`, in request order.
    pub included: Vec<String>,
}

impl<'a> ResolvedIncludes<'a> {
    pub fn mode(&self, alias: &str) -> Option<InclusionMode> {
        self.associations
            .iter()
            .find(|r| r.association.alias == alias)
            .map(|r| r.mode)
    }

    pub fn is_included(&self, alias: &str) -> bool {
        self.included.iter().any(|a| a == alias)
    }
}

/// Tags each association of `resource` with its inclusion mode for this request.
///
/// Included aliases render as `record`. Others keep their configured default,
/// except junction-backed associations which never default past `index`.
pub fn resolve_includes<'a>(
    resource: &'a ResourceType,
    include: Option<&str>,
) -> Result<ResolvedIncludes<'a>, ApiError> {
    let mut included = Vec::new();
    for raw in include.unwrap_or_default().split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if raw.contains('.') {
            return Err(ApiError::BadRequest(format!(
                "include path '{}' is not supported; only direct relationships can be included",
                raw
            )));
        }
        let assoc = resource
            .resolve_association(raw)
            .ok_or_else(|| ApiError::UnknownRelationship {
                resource: resource.type_name.clone(),
                alias: raw.to_string(),
            })?;
        if !included.contains(&assoc.alias) {
            included.push(assoc.alias.clone());
        }
    }

    let associations = resource
        .associations
        .iter()
        .map(|association| {
            let mode = if included.contains(&association.alias) {
                InclusionMode::Record
            } else if association.through().is_some() {
                match association.default_mode {
                    InclusionMode::Link => InclusionMode::Link,
                    _ => InclusionMode::Index,
                }
            } else {
                association.default_mode
            };
            ResolvedAssociation { association, mode }
        })
        .collect();

    Ok(ResolvedIncludes {
        associations,
        included,
    })
}
