//! Write-time tenant checks.
//!
//! - [`MutationGuard`] assigns the tenant on creation and keeps persisted
//!   tenant keys immutable
//! - [`UniquenessPolicy`] checks uniqueness within a tenant and against
//!   global records
//! - [`AssociationIntegrityChecker`] checks that foreign keys resolve to
//!   rows visible under the current tenant

mod association;
mod guard;
mod uniqueness;

pub use association::AssociationIntegrityChecker;
pub use guard::MutationGuard;
pub use uniqueness::{UniqueConstraint, UniqueOptions, UniquenessPolicy};
