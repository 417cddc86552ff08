//! Entity registration and default scoping.
//!
//! Entity types are registered once with the [`TenantDimension`]s that tie
//! them to tenant types. The [`ScopePredicateBuilder`] turns a registration
//! and the current tenant into the [`Predicate`] every default read of that
//! type is filtered by.
//!
//! # Dimensions
//!
//! | Dimension | Columns | Matches |
//! |-----------|---------|---------|
//! | [`TenantDimension::belongs_to`] | `<name>_id` | the declared tenant type |
//! | [`TenantDimension::polymorphic`] | `<name>_id`, `<name>_type` | any tenant type |
//! | [`TenantDimension::through`] | join entity | the declared tenant type |
//!
//! An entity may carry several dimensions, e.g. both an `Account` and a
//! `Project`. The dimension accepting the current tenant's type is used; if
//! two accept it the read fails with
//! [`TenantError::MultiplePolymorphicTenants`](crate::error::TenantError::MultiplePolymorphicTenants),
//! and if none does only global records stay visible.

mod builder;
mod predicate;
mod registry;
mod spec;

pub use builder::ScopePredicateBuilder;
pub(crate) use builder::matching_dimension;
pub use predicate::{Predicate, SqlFragment};
pub(crate) use registry::ScopeRegistry;
pub use spec::{Association, EntityScopeSpec, RegisterOptions, TenantDimension, Through};
