//! Error types for the tenancy layer.
//!
//! Errors are grouped by category: tenant errors raised while scoping or
//! guarding rows, configuration errors raised at registration time, validation
//! errors collected before a write commits, and store errors from the
//! underlying data-access layer.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// The primary error type for all tenancy operations.
#[derive(Error, Debug)]
pub enum TenancyError {
    /// Tenant scoping and immutability errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Registration and configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Record validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Data-access layer errors
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors related to tenant scoping.
#[derive(Error, Debug)]
pub enum TenantError {
    /// A scoped read or write happened with no resolvable tenant while one is required.
    #[error("no tenant set for {entity_type}, and a tenant is required")]
    NoTenantSet { entity_type: String },

    /// An already-bound tenant key was assigned a different value.
    #[error("{entity_type}.{field} is immutable once persisted")]
    TenantIsImmutable { entity_type: String, field: String },

    /// More than one tenant dimension matched the active tenant.
    #[error("{entity_type} has more than one tenant dimension matching tenant type {tenant_type}")]
    MultiplePolymorphicTenants {
        entity_type: String,
        tenant_type: String,
    },

    /// A tenant-only operation was used on a type that was never registered.
    #[error("{entity_type} is not scoped by a tenant")]
    ModelNotScopedByTenant { entity_type: String },

    /// A captured tenant could not be located when restoring it.
    #[error("tenant not found: {tenant_type}/{key}")]
    TenantNotFound { tenant_type: String, key: String },
}

/// Errors raised while registering entity types.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The entity type was already registered with a different definition.
    #[error("{entity_type} is already registered with different tenant dimensions")]
    DuplicateRegistration { entity_type: String },

    /// More than one dimension relies on the derived foreign key.
    #[error("{entity_type} declares {count} tenant dimensions without an explicit foreign key")]
    AmbiguousForeignKey { entity_type: String, count: usize },

    /// A referenced tenant dimension does not exist on the entity type.
    #[error("{entity_type} has no tenant dimension named {dimension}")]
    UnknownDimension {
        entity_type: String,
        dimension: String,
    },

    /// Any other invalid configuration.
    #[error("invalid tenancy configuration: {message}")]
    Invalid { message: String },
}

/// Errors collected by validation callbacks before a write commits.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The record failed one or more validations.
    #[error("invalid {entity_type}: {}", format_details(details))]
    InvalidRecord {
        entity_type: String,
        details: Vec<ValidationDetail>,
    },
}

impl ValidationError {
    /// Returns the individual validation failures.
    pub fn details(&self) -> &[ValidationDetail] {
        match self {
            ValidationError::InvalidRecord { details, .. } => details,
        }
    }
}

fn format_details(details: &[ValidationDetail]) -> String {
    details
        .iter()
        .map(|d| format!("{} {}", d.field, d.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Detailed validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetail {
    /// The field the failure is attached to.
    pub field: String,
    /// A human-readable error message.
    pub message: String,
    /// The severity of the failure.
    pub severity: ValidationSeverity,
}

impl ValidationDetail {
    /// Creates an error-severity detail.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }
}

/// Severity level for validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Fatal error - the write cannot proceed.
    Error,
    /// Warning - the write can proceed.
    Warning,
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationSeverity::Error => write!(f, "error"),
            ValidationSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// Errors originating from the data-access layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested row was not found.
    #[error("record not found: {entity_type}/{key}")]
    NotFound { entity_type: String, key: String },

    /// A row with the same primary key already exists.
    #[error("duplicate key: {entity_type}/{key}")]
    DuplicateKey { entity_type: String, key: String },

    /// Attempted to insert a record that is already persisted.
    #[error("record already persisted: {entity_type}")]
    AlreadyPersisted { entity_type: String },

    /// Attempted to update a record that was never persisted.
    #[error("record not persisted: {entity_type}")]
    NotPersisted { entity_type: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

/// Result type alias for tenancy operations.
pub type TenancyResult<T> = Result<T, TenancyError>;

impl From<serde_json::Error> for TenancyError {
    fn from(err: serde_json::Error) -> Self {
        TenancyError::Store(StoreError::Serialization {
            message: err.to_string(),
        })
    }
}

impl TenancyError {
    /// Returns `true` if this is a [`TenantError::NoTenantSet`].
    pub fn is_no_tenant_set(&self) -> bool {
        matches!(self, TenancyError::Tenant(TenantError::NoTenantSet { .. }))
    }

    /// Returns `true` if this is a [`TenantError::TenantIsImmutable`].
    pub fn is_tenant_immutable(&self) -> bool {
        matches!(
            self,
            TenancyError::Tenant(TenantError::TenantIsImmutable { .. })
        )
    }

    /// Returns `true` if this is a validation failure.
    pub fn is_invalid_record(&self) -> bool {
        matches!(self, TenancyError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_error_display() {
        let err = TenantError::TenantIsImmutable {
            entity_type: "Project".to_string(),
            field: "account_id".to_string(),
        };
        assert_eq!(err.to_string(), "Project.account_id is immutable once persisted");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidRecord {
            entity_type: "Project".to_string(),
            details: vec![
                ValidationDetail::error("name", "has already been taken"),
                ValidationDetail::error("project_id", "is invalid"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid Project: name has already been taken, project_id is invalid"
        );
        assert_eq!(err.details().len(), 2);
    }

    #[test]
    fn test_validation_severity_display() {
        assert_eq!(ValidationSeverity::Error.to_string(), "error");
        assert_eq!(ValidationSeverity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_tenancy_error_from_categories() {
        let err: TenancyError = TenantError::NoTenantSet {
            entity_type: "Project".to_string(),
        }
        .into();
        assert!(err.is_no_tenant_set());
        assert!(!err.is_tenant_immutable());

        let err: TenancyError = ConfigError::Invalid {
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, TenancyError::Config(_)));
    }

    #[test]
    fn test_from_serde_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TenancyError = parse.into();
        assert!(matches!(
            err,
            TenancyError::Store(StoreError::Serialization { .. })
        ));
    }
}
