//! Foreign key integrity under tenant scoping.

use crate::error::{TenancyResult, ValidationDetail};
use crate::scope::ScopePredicateBuilder;
use crate::store::{Record, RecordStore};
use crate::tenant::{Tenancy, TenantContext, same_key};

const INVALID: &str = "is invalid";

/// Checks that the `belongs_to` foreign keys of a row resolve.
///
/// Each non-polymorphic association that is not one of the row's own tenant
/// dimensions must, when set, point at an existing row of the target type.
/// The lookup goes through the target's default scope, so a row belonging to
/// another tenant does not resolve.
pub struct AssociationIntegrityChecker<'a> {
    tenancy: &'a Tenancy,
    store: &'a dyn RecordStore,
}

impl<'a> AssociationIntegrityChecker<'a> {
    /// Creates a checker reading rows from `store`.
    pub fn new(tenancy: &'a Tenancy, store: &'a dyn RecordStore) -> Self {
        Self { tenancy, store }
    }

    /// Returns a failure for every association that does not resolve.
    pub fn check(&self, record: &Record, ctx: &TenantContext) -> TenancyResult<Vec<ValidationDetail>> {
        let Some(spec) = self.tenancy.spec(record.entity_type()) else {
            return Ok(Vec::new());
        };

        let builder = ScopePredicateBuilder::new(self.tenancy).with_store(self.store);
        let mut details = Vec::new();

        for association in spec.associations() {
            let column = association.foreign_key_column();
            if association.is_polymorphic() || spec.is_tenant_column(column) {
                continue;
            }
            let (Some(target), Some(value)) = (association.target_type(), record.value(column))
            else {
                continue;
            };

            let scope = builder.build_predicate(target, ctx)?;
            let primary_key = self.store.primary_key(target);
            let resolves = self.store.rows(target).iter().any(|row| {
                row.value(&primary_key).is_some_and(|key| same_key(key, value))
                    && scope.matches(row, self.store)
            });

            if !resolves {
                details.push(ValidationDetail::error(column, INVALID));
            }
        }

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenancyConfig;
    use crate::scope::{Association, RegisterOptions, TenantDimension};
    use crate::store::MemoryStore;
    use crate::tenant::TenantRef;
    use std::sync::Arc;

    fn setup() -> (Arc<Tenancy>, MemoryStore) {
        let tenancy = Tenancy::new(TenancyConfig::default());
        tenancy
            .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
            .unwrap();
        tenancy
            .register(
                "Task",
                vec![TenantDimension::belongs_to("account")],
                RegisterOptions::new()
                    .belongs_to(Association::belongs_to("project"))
                    .belongs_to(Association::belongs_to("project_alias").class_name("Project"))
                    .belongs_to(Association::polymorphic("subject"))
                    .belongs_to(Association::belongs_to("account")),
            )
            .unwrap();

        let store = MemoryStore::new();
        store
            .insert(Record::new("Project").with("name", "foo").with("account_id", 1))
            .unwrap();
        store
            .insert(Record::new("Project").with("name", "bar").with("account_id", 2))
            .unwrap();
        (tenancy, store)
    }

    #[test]
    fn test_association_in_current_tenant_is_valid() {
        let (tenancy, store) = setup();
        let ctx = tenancy.context();
        ctx.set_active(TenantRef::new("Account", 1));
        let task = Record::new("Task")
            .with("project_id", 1)
            .with("project_alias_id", 1)
            .with("account_id", 1);

        let details = AssociationIntegrityChecker::new(&tenancy, &store)
            .check(&task, &ctx)
            .unwrap();
        assert!(details.is_empty());
    }

    #[test]
    fn test_association_in_other_tenant_is_invalid() {
        let (tenancy, store) = setup();
        let ctx = tenancy.context();
        ctx.set_active(TenantRef::new("Account", 1));
        let task = Record::new("Task")
            .with("project_id", 2)
            .with("project_alias_id", 2)
            .with("subject_id", 99);

        let details = AssociationIntegrityChecker::new(&tenancy, &store)
            .check(&task, &ctx)
            .unwrap();
        let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["project_id", "project_alias_id"]);
        assert_eq!(details[0].message, "is invalid");
    }

    #[test]
    fn test_missing_target_is_invalid_without_tenant() {
        let (tenancy, store) = setup();
        let ctx = tenancy.context();
        let checker = AssociationIntegrityChecker::new(&tenancy, &store);

        let task = Record::new("Task").with("project_id", 2);
        assert!(checker.check(&task, &ctx).unwrap().is_empty());

        let dangling = Record::new("Task").with("project_id", 42);
        assert_eq!(checker.check(&dangling, &ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_unset_foreign_key_is_skipped() {
        let (tenancy, store) = setup();
        let ctx = tenancy.context();
        ctx.set_active(TenantRef::new("Account", 1));
        let details = AssociationIntegrityChecker::new(&tenancy, &store)
            .check(&Record::new("Task"), &ctx)
            .unwrap();
        assert!(details.is_empty());
    }
}
