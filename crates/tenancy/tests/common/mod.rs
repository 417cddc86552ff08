//! Shared fixtures for the tenancy integration tests.
//!
//! The fixture schema mirrors a small multi-tenant application: accounts own
//! projects and tasks, some reference data may be global, managers belong to
//! both an account and an organization, and comments hang off whichever
//! tenant type is active.

#![allow(dead_code)]

use std::sync::Arc;

use helios_tenancy::scope::{Association, RegisterOptions, TenantDimension, Through};
use helios_tenancy::store::{MemoryStore, Record, RecordStore, Repository};
use helios_tenancy::tenant::TenantRef;
use helios_tenancy::validation::UniqueOptions;
use helios_tenancy::{Tenancy, TenancyConfig};

/// Builds a tenancy with the fixture schema registered.
pub fn tenancy(config: TenancyConfig) -> Arc<Tenancy> {
    let tenancy = Tenancy::new(config);
    register_schema(&tenancy);
    tenancy
}

/// Registers every fixture entity type.
pub fn register_schema(tenancy: &Tenancy) {
    tenancy
        .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
        .unwrap();
    tenancy
        .register(
            "Task",
            vec![TenantDimension::belongs_to("account")],
            RegisterOptions::new().belongs_to(Association::belongs_to("project")),
        )
        .unwrap();
    tenancy
        .register(
            "UniqueThing",
            vec![TenantDimension::belongs_to("account")],
            RegisterOptions::new().global_records(),
        )
        .unwrap();
    tenancy
        .validates_uniqueness_to_tenant("UniqueThing", &["name"], UniqueOptions::new())
        .unwrap();
    tenancy
        .register(
            "Manager",
            vec![
                TenantDimension::belongs_to("account"),
                TenantDimension::belongs_to("organization").foreign_key("org_id"),
            ],
            RegisterOptions::new(),
        )
        .unwrap();
    tenancy
        .register("Comment", vec![TenantDimension::polymorphic("owner")], RegisterOptions::new())
        .unwrap();
    tenancy
        .register(
            "Article",
            vec![
                TenantDimension::belongs_to("account")
                    .foreign_key("accountID")
                    .primary_key("name"),
            ],
            RegisterOptions::new(),
        )
        .unwrap();
    tenancy
        .register(
            "User",
            vec![TenantDimension::through(
                "account",
                Through {
                    entity_type: "UsersAccount".to_string(),
                    foreign_key: "user_id".to_string(),
                    tenant_foreign_key: "account_id".to_string(),
                },
            )],
            RegisterOptions::new(),
        )
        .unwrap();
}

/// A repository over an empty in-memory store.
pub fn repository(tenancy: &Arc<Tenancy>) -> Repository<MemoryStore> {
    Repository::new(Arc::clone(tenancy), MemoryStore::new())
}

/// Inserts an account row and returns it as a tenant.
pub fn account(store: &MemoryStore, name: &str) -> TenantRef {
    let row = store
        .insert(Record::new("Account").with("name", name))
        .unwrap();
    TenantRef::new("Account", row.get("id").cloned().unwrap())
        .with_attributes(row.fields().clone())
}

/// Inserts an organization row and returns it as a tenant.
pub fn organization(store: &MemoryStore, name: &str) -> TenantRef {
    let row = store
        .insert(Record::new("Organization").with("name", name))
        .unwrap();
    TenantRef::new("Organization", row.get("id").cloned().unwrap())
}

/// Returns the `name` field of each record, sorted.
pub fn names(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("name").and_then(|v| v.as_str()).map(str::to_string))
        .collect();
    names.sort();
    names
}
