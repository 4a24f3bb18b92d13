//! Load config from in-memory structs or from models.json / api.json on disk.

use crate::case::to_snake_case;
use crate::config::resolved::{
    Association, AssociationKind, Attribute, PkType, Registry, ResourceType,
};
use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Build the registry from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<Registry, ConfigError> {
    validate(config)?;
    let models: HashMap<&str, &ModelConfig> = config
        .models
        .iter()
        .map(|m| (m.identity.as_str(), m))
        .collect();

    let mut types = Vec::with_capacity(config.models.len());
    for m in &config.models {
        let mut attributes: Vec<Attribute> = m
            .attributes
            .iter()
            .map(|a| Attribute {
                name: a.name.clone(),
                ty: a.type_,
                column: a.column.clone().unwrap_or_else(|| to_snake_case(&a.name)),
                has_default: a.has_default || a.name == m.primary_key,
            })
            .collect();
        if m.timestamps {
            for (name, column) in [("createdAt", "created_at"), ("updatedAt", "updated_at")] {
                if m.attributes.iter().all(|a| a.name != name) {
                    attributes.push(Attribute {
                        name: name.to_string(),
                        ty: AttributeType::Datetime,
                        column: column.to_string(),
                        has_default: true,
                    });
                }
            }
        }

        let pk_type = m
            .attributes
            .iter()
            .find(|a| a.name == m.primary_key)
            .map(|a| PkType::from(a.type_))
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                model: m.identity.clone(),
                attribute: m.primary_key.clone(),
            })?;

        let associations = m
            .associations
            .iter()
            .map(|a| resolve_association(a, &models))
            .collect::<Result<Vec<_>, _>>()?;

        let validation = m
            .attributes
            .iter()
            .filter_map(|a| a.validation.clone().map(|rule| (a.name.clone(), rule)))
            .collect();

        types.push(ResourceType {
            identity: m.identity.clone(),
            global_id: m.global_id(),
            type_name: m.type_name(),
            path_segment: m.path_segment(),
            schema: m.schema.clone(),
            table: m.table(),
            primary_key: m.primary_key.clone(),
            pk_type,
            timestamps: m.timestamps,
            attributes,
            associations,
            operations: m.operations.clone(),
            validation,
        });
    }

    Ok(Registry::new(config.api.clone(), types))
}

fn resolve_association(
    a: &AssociationConfig,
    models: &HashMap<&str, &ModelConfig>,
) -> Result<Association, ConfigError> {
    let missing = |id: &str| ConfigError::MissingReference {
        kind: "model",
        id: id.to_string(),
    };
    let (target, kind) = match (&a.model, &a.collection) {
        (Some(target), _) => {
            let target_model = models.get(target.as_str()).ok_or_else(|| missing(target))?;
            let key_type = target_model
                .attributes
                .iter()
                .find(|attr| attr.name == target_model.primary_key)
                .map(|attr| attr.type_)
                .unwrap_or(AttributeType::Integer);
            (
                target.clone(),
                AssociationKind::ToOne {
                    foreign_key: a.foreign_key.clone().unwrap_or_else(|| to_snake_case(&a.alias)),
                    key_type,
                },
            )
        }
        (None, Some(target)) => {
            let kind = match (&a.via, &a.through) {
                (_, Some(through)) => AssociationKind::ManyToMany {
                    through: through.model.clone(),
                    owner_key: through.owner.clone(),
                    target_key: through.target.clone(),
                },
                (Some(via), None) => AssociationKind::ToMany { via: via.clone() },
                (None, None) => {
                    return Err(ConfigError::InvalidAssociation {
                        model: target.clone(),
                        alias: a.alias.clone(),
                        reason: "collection without via or through".into(),
                    })
                }
            };
            (target.clone(), kind)
        }
        (None, None) => {
            return Err(ConfigError::InvalidAssociation {
                model: String::new(),
                alias: a.alias.clone(),
                reason: "neither model nor collection".into(),
            })
        }
    };
    Ok(Association {
        alias: a.alias.clone(),
        target,
        kind,
        inverse: a.inverse.clone().or_else(|| a.via.clone()),
        default_mode: a.include.unwrap_or_default(),
    })
}

/// Read `models.json` (required) and `api.json` (optional) from `dir`.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    let models = read_json::<Vec<ModelConfig>>(&dir.join("models.json"))
        .await?
        .ok_or_else(|| ConfigError::Load(format!("{} not found", dir.join("models.json").display())))?;
    let api = read_json::<ApiConfig>(&dir.join("api.json"))
        .await?
        .unwrap_or_default();
    tracing::debug!(dir = %dir.display(), models = models.len(), "loaded config");
    Ok(FullConfig { api, models })
}

async fn read_json<T>(path: &Path) -> Result<Option<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config;

    #[test]
    fn derives_names_from_identity() {
        let registry = resolve(&sample_config()).unwrap();
        let outlet = registry.get("mediaOutlet").unwrap();
        assert_eq!(outlet.type_name, "media-outlets");
        assert_eq!(outlet.path_segment, "mediaOutlets");
        assert_eq!(outlet.table, "media_outlet");
        assert!(registry.lookup("media-outlets").is_some());
        assert!(registry.by_path("mediaOutlets").is_some());
    }

    #[test]
    fn adds_timestamp_attributes() {
        let registry = resolve(&sample_config()).unwrap();
        let article = registry.get("article").unwrap();
        let updated = article.attribute("updatedAt").unwrap();
        assert_eq!(updated.column, "updated_at");
        assert!(updated.has_default);
        assert_eq!(article.pk_type, PkType::Int);
    }

    #[test]
    fn resolves_association_kinds() {
        let registry = resolve(&sample_config()).unwrap();
        let author = registry.get("author").unwrap();
        assert_eq!(
            author.association("articles").unwrap().kind,
            AssociationKind::ToMany { via: "author".into() }
        );
        assert_eq!(
            author.association("publishers").unwrap().kind,
            AssociationKind::ManyToMany {
                through: "authorship".into(),
                owner_key: "author".into(),
                target_key: "publisher".into(),
            }
        );
        let article = registry.get("article").unwrap();
        assert!(matches!(
            &article.association("author").unwrap().kind,
            AssociationKind::ToOne { foreign_key, .. } if foreign_key == "author_id"
        ));
    }
}
