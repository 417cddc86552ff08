//! Per-entity scoping declarations.
//!
//! An [`EntityScopeSpec`] describes how one entity type relates to its tenant
//! types. It is built once at registration time and never changes afterward.

use crate::config::RequireTenant;

use super::Predicate;

/// One relationship from an entity type to a tenant type.
///
/// # Examples
///
/// ```
/// use helios_tenancy::scope::TenantDimension;
///
/// // `account_id` referencing `Account`
/// let account = TenantDimension::belongs_to("account");
/// assert_eq!(account.tenant_type(), Some("Account"));
/// assert_eq!(account.foreign_key_column(), "account_id");
///
/// // `accountID` referencing `Account.name`
/// let custom = TenantDimension::belongs_to("account")
///     .foreign_key("accountID")
///     .primary_key("name");
/// assert_eq!(custom.foreign_key_column(), "accountID");
///
/// // `commentable_id` + `commentable_type` referencing any tenant type
/// let any = TenantDimension::polymorphic("commentable");
/// assert_eq!(any.type_column(), Some("commentable_type"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantDimension {
    name: String,
    tenant_type: Option<String>,
    foreign_key: String,
    explicit_foreign_key: bool,
    primary_key: Option<String>,
    type_column: Option<String>,
    through: Option<Through>,
}

/// Scoping through a join entity.
///
/// A row is visible when some `entity_type` row joins it (`foreign_key`
/// equals the row's primary key) to the current tenant (`tenant_foreign_key`
/// equals the tenant key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Through {
    /// The join entity type, e.g. `UsersAccount`.
    pub entity_type: String,
    /// Join column referencing the scoped row, e.g. `user_id`.
    pub foreign_key: String,
    /// Join column referencing the tenant, e.g. `account_id`.
    pub tenant_foreign_key: String,
}

impl TenantDimension {
    /// A dimension stored in `<name>_id`, referencing the tenant type named
    /// after the association (`account` becomes `Account`).
    pub fn belongs_to(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tenant_type: Some(camelize(&name)),
            foreign_key: format!("{name}_id"),
            explicit_foreign_key: false,
            primary_key: None,
            type_column: None,
            through: None,
            name,
        }
    }

    /// A polymorphic dimension stored in `<name>_id` and `<name>_type`,
    /// matching whichever tenant type is active.
    pub fn polymorphic(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tenant_type: None,
            foreign_key: format!("{name}_id"),
            explicit_foreign_key: false,
            primary_key: None,
            type_column: Some(format!("{name}_type")),
            through: None,
            name,
        }
    }

    /// A dimension resolved through a join entity rather than a column on the row.
    pub fn through(name: impl Into<String>, through: Through) -> Self {
        let mut dimension = Self::belongs_to(name);
        dimension.foreign_key = through.tenant_foreign_key.clone();
        dimension.explicit_foreign_key = true;
        dimension.through = Some(through);
        dimension
    }

    /// Overrides the tenant type name.
    pub fn class_name(mut self, tenant_type: impl Into<String>) -> Self {
        self.tenant_type = Some(tenant_type.into());
        self
    }

    /// Overrides the foreign key column.
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = column.into();
        self.explicit_foreign_key = true;
        self
    }

    /// References a tenant column other than its primary key.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Returns the association name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tenant type, `None` for polymorphic dimensions.
    pub fn tenant_type(&self) -> Option<&str> {
        self.tenant_type.as_deref()
    }

    /// Returns the foreign key column (on the join entity for `through` dimensions).
    pub fn foreign_key_column(&self) -> &str {
        &self.foreign_key
    }

    /// Returns the referenced tenant column, `None` for the tenant's primary key.
    pub fn referenced_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Returns the polymorphic type column.
    pub fn type_column(&self) -> Option<&str> {
        self.type_column.as_deref()
    }

    /// Returns the join definition for `through` dimensions.
    pub fn through_relation(&self) -> Option<&Through> {
        self.through.as_ref()
    }

    /// Returns `true` if the dimension is polymorphic.
    pub fn is_polymorphic(&self) -> bool {
        self.type_column.is_some()
    }

    /// Returns `true` if the tenant key is a column of the row itself.
    pub fn is_direct(&self) -> bool {
        self.through.is_none()
    }

    /// Returns `true` if the foreign key was given explicitly.
    pub fn has_explicit_foreign_key(&self) -> bool {
        self.explicit_foreign_key
    }

    /// Returns `true` if a tenant of the given type can be matched by this dimension.
    pub fn accepts(&self, tenant_type: &str) -> bool {
        match &self.tenant_type {
            Some(declared) if !self.is_polymorphic() => declared == tenant_type,
            _ => true,
        }
    }
}

/// A non-tenant `belongs_to` association declared on an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    name: String,
    target_type: Option<String>,
    foreign_key: String,
    polymorphic: bool,
}

impl Association {
    /// An association stored in `<name>_id` referencing the type named after it.
    pub fn belongs_to(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target_type: Some(camelize(&name)),
            foreign_key: format!("{name}_id"),
            polymorphic: false,
            name,
        }
    }

    /// A polymorphic association; these cannot be checked statically.
    pub fn polymorphic(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target_type: None,
            foreign_key: format!("{name}_id"),
            polymorphic: true,
            name,
        }
    }

    /// Overrides the target type name.
    pub fn class_name(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Overrides the foreign key column.
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = column.into();
        self
    }

    /// Returns the association name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target type, `None` when polymorphic.
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    /// Returns the foreign key column.
    pub fn foreign_key_column(&self) -> &str {
        &self.foreign_key
    }

    /// Returns `true` if the association is polymorphic.
    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic
    }
}

/// Options accepted by [`Tenancy::register`](crate::Tenancy::register).
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Rows with a null tenant key are visible under every tenant.
    pub allows_global_records: bool,
    /// Overrides the global tenant requirement for this type.
    pub require_tenant: Option<RequireTenant>,
    /// Rows matching this filter are always visible.
    pub unscoped_escape: Option<Predicate>,
    /// Primary key of the entity type, when not the configured default.
    pub primary_key: Option<String>,
    /// Other `belongs_to` associations, checked for integrity on save.
    pub associations: Vec<Association>,
}

impl RegisterOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows global (tenant-less) records.
    ///
    /// Registration fails if any dimension is a `through` dimension.
    pub fn global_records(mut self) -> Self {
        self.allows_global_records = true;
        self
    }

    /// Overrides the tenant requirement.
    pub fn require_tenant(mut self, require: impl Into<RequireTenant>) -> Self {
        self.require_tenant = Some(require.into());
        self
    }

    /// Sets the always-visible escape filter.
    pub fn unscoped_escape(mut self, escape: Predicate) -> Self {
        self.unscoped_escape = Some(escape);
        self
    }

    /// Sets the entity's primary key.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Declares a `belongs_to` association.
    pub fn belongs_to(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }
}

/// The registered scoping definition of an entity type.
#[derive(Debug, Clone)]
pub struct EntityScopeSpec {
    entity_type: String,
    dimensions: Vec<TenantDimension>,
    options: RegisterOptions,
}

impl EntityScopeSpec {
    pub(crate) fn new(
        entity_type: String,
        dimensions: Vec<TenantDimension>,
        options: RegisterOptions,
    ) -> Self {
        Self {
            entity_type,
            dimensions,
            options,
        }
    }

    /// Returns the entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the tenant dimensions in declaration order.
    pub fn dimensions(&self) -> &[TenantDimension] {
        &self.dimensions
    }

    /// Returns the dimension with the given association name.
    pub fn dimension(&self, name: &str) -> Option<&TenantDimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }

    /// Returns the dimensions whose tenant key is a column of the row.
    pub fn direct_dimensions(&self) -> impl Iterator<Item = &TenantDimension> {
        self.dimensions.iter().filter(|d| d.is_direct())
    }

    /// Returns `true` if global records are allowed.
    pub fn allows_global_records(&self) -> bool {
        self.options.allows_global_records
    }

    /// Returns the per-entity tenant requirement override.
    pub fn require_tenant_override(&self) -> Option<&RequireTenant> {
        self.options.require_tenant.as_ref()
    }

    /// Returns the always-visible escape filter.
    pub fn unscoped_escape(&self) -> Option<&Predicate> {
        self.options.unscoped_escape.as_ref()
    }

    /// Returns the entity's own primary key override.
    pub fn primary_key(&self) -> Option<&str> {
        self.options.primary_key.as_deref()
    }

    /// Returns the declared `belongs_to` associations.
    pub fn associations(&self) -> &[Association] {
        &self.options.associations
    }

    /// Returns `true` if `column` holds a tenant key or tenant type.
    pub fn is_tenant_column(&self, column: &str) -> bool {
        self.direct_dimensions()
            .any(|d| d.foreign_key_column() == column || d.type_column() == Some(column))
    }

    /// Returns `true` if both specs describe the same scoping.
    pub(crate) fn same_definition(&self, other: &EntityScopeSpec) -> bool {
        self.dimensions == other.dimensions
            && self.options.allows_global_records == other.options.allows_global_records
            && self.options.unscoped_escape == other.options.unscoped_escape
            && self.options.primary_key == other.options.primary_key
            && self.options.associations == other.options.associations
    }
}

/// Converts `project_alias` into `ProjectAlias`.
pub(crate) fn camelize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
