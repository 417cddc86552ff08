//! Registry of tenant-scoped entity types.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ConfigError, TenancyResult};
use crate::validation::UniqueConstraint;

use super::spec::EntityScopeSpec;

/// Maps entity type names to their scoping and uniqueness declarations.
#[derive(Debug, Default)]
pub(crate) struct ScopeRegistry {
    specs: RwLock<HashMap<String, Arc<EntityScopeSpec>>>,
    unique: RwLock<HashMap<String, Vec<UniqueConstraint>>>,
}

impl ScopeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores a spec, returning `false` if an identical one was already present.
    pub(crate) fn insert(&self, spec: EntityScopeSpec) -> TenancyResult<bool> {
        validate(&spec)?;

        let mut specs = self.specs.write();
        if let Some(existing) = specs.get(spec.entity_type()) {
            if existing.same_definition(&spec) {
                return Ok(false);
            }
            return Err(ConfigError::DuplicateRegistration {
                entity_type: spec.entity_type().to_string(),
            }
            .into());
        }
        specs.insert(spec.entity_type().to_string(), Arc::new(spec));
        Ok(true)
    }

    pub(crate) fn get(&self, entity_type: &str) -> Option<Arc<EntityScopeSpec>> {
        self.specs.read().get(entity_type).cloned()
    }

    /// Returns every registered spec, sorted by entity type.
    pub(crate) fn all(&self) -> Vec<Arc<EntityScopeSpec>> {
        let mut specs: Vec<_> = self.specs.read().values().cloned().collect();
        specs.sort_by(|a, b| a.entity_type().cmp(b.entity_type()));
        specs
    }

    pub(crate) fn add_unique(&self, entity_type: &str, constraint: UniqueConstraint) {
        let mut unique = self.unique.write();
        let constraints = unique.entry(entity_type.to_string()).or_default();
        if !constraints.contains(&constraint) {
            constraints.push(constraint);
        }
    }

    pub(crate) fn unique_constraints(&self, entity_type: &str) -> Vec<UniqueConstraint> {
        self.unique
            .read()
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }
}

fn validate(spec: &EntityScopeSpec) -> TenancyResult<()> {
    let dimensions = spec.dimensions();
    if dimensions.is_empty() {
        return Err(ConfigError::Invalid {
            message: format!("{} declares no tenant dimension", spec.entity_type()),
        }
        .into());
    }

    if dimensions.len() > 1 {
        let implicit = dimensions
            .iter()
            .filter(|d| !d.has_explicit_foreign_key())
            .count();
        if implicit > 1 {
            return Err(ConfigError::AmbiguousForeignKey {
                entity_type: spec.entity_type().to_string(),
                count: implicit,
            }
            .into());
        }
    }

    if spec.allows_global_records() && dimensions.iter().any(|d| !d.is_direct()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "{} allows global records but is scoped through a join entity",
                spec.entity_type()
            ),
        }
        .into());
    }

    let mut columns: Vec<&str> = spec.direct_dimensions().map(|d| d.foreign_key_column()).collect();
    columns.sort_unstable();
    if columns.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(ConfigError::Invalid {
            message: format!(
                "{} declares two tenant dimensions on the same column",
                spec.entity_type()
            ),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenancyError;
    use crate::scope::{RegisterOptions, TenantDimension, Through};
    use crate::validation::UniqueOptions;

    fn spec(entity_type: &str, dimensions: Vec<TenantDimension>) -> EntityScopeSpec {
        EntityScopeSpec::new(entity_type.to_string(), dimensions, RegisterOptions::new())
    }

    #[test]
    fn test_insert_and_get() {
        let registry = ScopeRegistry::new();
        assert!(
            registry
                .insert(spec("Project", vec![TenantDimension::belongs_to("account")]))
                .unwrap()
        );
        assert!(registry.get("Project").is_some());
        assert!(registry.get("Task").is_none());
    }

    #[test]
    fn test_empty_dimensions_rejected() {
        let registry = ScopeRegistry::new();
        let err = registry.insert(spec("Project", vec![])).unwrap_err();
        assert!(matches!(err, TenancyError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_two_implicit_foreign_keys_rejected() {
        let registry = ScopeRegistry::new();
        let err = registry
            .insert(spec(
                "Comment",
                vec![
                    TenantDimension::belongs_to("account"),
                    TenantDimension::belongs_to("project"),
                ],
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyError::Config(ConfigError::AmbiguousForeignKey { count: 2, .. })
        ));
    }

    #[test]
    fn test_one_implicit_foreign_key_allowed() {
        let registry = ScopeRegistry::new();
        registry
            .insert(spec(
                "Comment",
                vec![
                    TenantDimension::belongs_to("account"),
                    TenantDimension::belongs_to("project").foreign_key("project_id"),
                ],
            ))
            .unwrap();
    }

    #[test]
    fn test_same_column_twice_rejected() {
        let registry = ScopeRegistry::new();
        let err = registry
            .insert(spec(
                "Comment",
                vec![
                    TenantDimension::belongs_to("account"),
                    TenantDimension::belongs_to("owner").foreign_key("account_id"),
                ],
            ))
            .unwrap_err();
        assert!(matches!(err, TenancyError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_global_records_through_join_rejected() {
        let registry = ScopeRegistry::new();
        let through = Through {
            entity_type: "UsersAccount".to_string(),
            foreign_key: "user_id".to_string(),
            tenant_foreign_key: "account_id".to_string(),
        };
        let err = registry
            .insert(EntityScopeSpec::new(
                "User".to_string(),
                vec![TenantDimension::through("account", through.clone())],
                RegisterOptions::new().global_records(),
            ))
            .unwrap_err();
        assert!(matches!(err, TenancyError::Config(ConfigError::Invalid { .. })));
        assert!(registry.get("User").is_none());

        registry
            .insert(EntityScopeSpec::new(
                "User".to_string(),
                vec![TenantDimension::through("account", through)],
                RegisterOptions::new(),
            ))
            .unwrap();
    }

    #[test]
    fn test_all_sorted() {
        let registry = ScopeRegistry::new();
        for name in ["Task", "Article", "Project"] {
            registry
                .insert(spec(name, vec![TenantDimension::belongs_to("account")]))
                .unwrap();
        }
        let names: Vec<_> = registry
            .all()
            .iter()
            .map(|s| s.entity_type().to_string())
            .collect();
        assert_eq!(names, vec!["Article", "Project", "Task"]);
    }

    #[test]
    fn test_unique_constraints_deduplicated() {
        let registry = ScopeRegistry::new();
        registry.add_unique("Project", UniqueConstraint::new("name", UniqueOptions::default()));
        registry.add_unique("Project", UniqueConstraint::new("name", UniqueOptions::default()));
        assert_eq!(registry.unique_constraints("Project").len(), 1);
        assert!(registry.unique_constraints("Task").is_empty());
    }
}
