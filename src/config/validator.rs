//! Config validation: referential integrity between models and their associations.

use crate::config::{AssociationConfig, FullConfig, ModelConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut models: HashMap<&str, &ModelConfig> = HashMap::new();
    for m in &config.models {
        if models.insert(m.identity.as_str(), m).is_some() {
            return Err(ConfigError::Duplicate {
                kind: "model identity",
                name: m.identity.clone(),
            });
        }
    }

    let mut path_segments = HashSet::new();
    let mut type_names = HashSet::new();
    for m in &config.models {
        let path = m.path_segment();
        if !path_segments.insert(path.clone()) {
            return Err(ConfigError::Duplicate {
                kind: "path segment",
                name: path,
            });
        }
        let type_name = m.type_name();
        if !type_names.insert(type_name.clone()) {
            return Err(ConfigError::Duplicate {
                kind: "type name",
                name: type_name,
            });
        }
        validate_model(m, &models)?;
    }
    Ok(())
}

fn validate_model(m: &ModelConfig, models: &HashMap<&str, &ModelConfig>) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for a in &m.attributes {
        if !names.insert(a.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "attribute",
                name: format!("{}.{}", m.identity, a.name),
            });
        }
    }
    if !names.contains(m.primary_key.as_str()) {
        return Err(ConfigError::InvalidPrimaryKey {
            model: m.identity.clone(),
            attribute: m.primary_key.clone(),
        });
    }

    let mut aliases = HashSet::new();
    for assoc in &m.associations {
        if names.contains(assoc.alias.as_str()) || !aliases.insert(assoc.alias.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "association alias",
                name: format!("{}.{}", m.identity, assoc.alias),
            });
        }
        validate_association(m, assoc, models)?;
    }
    Ok(())
}

fn validate_association(
    m: &ModelConfig,
    assoc: &AssociationConfig,
    models: &HashMap<&str, &ModelConfig>,
) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAssociation {
        model: m.identity.clone(),
        alias: assoc.alias.clone(),
        reason,
    };
    let missing = |id: &str| ConfigError::MissingReference {
        kind: "model",
        id: id.to_string(),
    };

    match (&assoc.model, &assoc.collection) {
        (Some(target), None) => {
            if assoc.via.is_some() || assoc.through.is_some() {
                return Err(invalid("a to-one association takes neither via nor through".into()));
            }
            if !models.contains_key(target.as_str()) {
                return Err(missing(target));
            }
        }
        (None, Some(target)) => {
            let target_model = models.get(target.as_str()).ok_or_else(|| missing(target))?;
            match (&assoc.via, &assoc.through) {
                (Some(via), None) => {
                    if !points_to(target_model, via, &m.identity) {
                        return Err(invalid(format!(
                            "via '{}' must be a to-one association on {} targeting {}",
                            via, target, m.identity
                        )));
                    }
                }
                (None, Some(through)) => {
                    let junction = models.get(through.model.as_str()).ok_or_else(|| missing(&through.model))?;
                    if !points_to(junction, &through.owner, &m.identity) {
                        return Err(invalid(format!(
                            "through owner '{}' must be a to-one association on {} targeting {}",
                            through.owner, through.model, m.identity
                        )));
                    }
                    if !points_to(junction, &through.target, target) {
                        return Err(invalid(format!(
                            "through target '{}' must be a to-one association on {} targeting {}",
                            through.target, through.model, target
                        )));
                    }
                }
                _ => return Err(invalid("a collection needs exactly one of via or through".into())),
            }
        }
        _ => return Err(invalid("exactly one of model or collection is required".into())),
    }
    Ok(())
}

/// True when `alias` on `model` is a to-one association targeting `identity`.
fn points_to(model: &ModelConfig, alias: &str, identity: &str) -> bool {
    model
        .associations
        .iter()
        .any(|a| a.alias == alias && a.model.as_deref() == Some(identity))
}
