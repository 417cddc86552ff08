//! Tenant reference type.
//!
//! This module defines [`TenantRef`], the identity of a tenant row (its type
//! name and primary key value), and the key comparison rules shared by the
//! whole crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A reference to a tenant row: its runtime type name and primary key value.
///
/// A tenant that has not been persisted yet has no key. Such a tenant still
/// scopes reads (to nothing but global records), it just cannot own rows.
///
/// Equality compares key values loosely, so `Account#5` keyed by the integer
/// `5` equals one keyed by the string `"5"`. Attributes are carried along for
/// dimensions that reference a column other than the primary key, and do not
/// take part in equality.
///
/// # Examples
///
/// ```
/// use helios_tenancy::tenant::TenantRef;
///
/// let a = TenantRef::new("Account", 5);
/// let b = TenantRef::new("Account", "5");
/// assert_eq!(a, b);
/// assert_ne!(a, TenantRef::new("Project", 5));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct TenantRef {
    type_name: String,
    key: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    attributes: Map<String, Value>,
}

impl TenantRef {
    /// Creates a reference to a persisted tenant.
    pub fn new(type_name: impl Into<String>, key: impl Into<Value>) -> Self {
        let key = key.into();
        Self {
            type_name: type_name.into(),
            key: if key.is_null() { None } else { Some(key) },
            attributes: Map::new(),
        }
    }

    /// Creates a reference to a tenant that has not been persisted yet.
    pub fn unsaved(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: None,
            attributes: Map::new(),
        }
    }

    /// Attaches a column value of the tenant row.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attaches all column values of the tenant row.
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Returns a column value of the tenant row.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    /// Returns the value a foreign key should hold to reference this tenant.
    ///
    /// `primary_key` names the referenced column when it is not the tenant's
    /// own primary key.
    pub fn key_for(&self, primary_key: Option<&str>) -> Option<Value> {
        match primary_key {
            Some(column) => self.attribute(column).cloned(),
            None => self.key.clone(),
        }
    }

    /// Returns the runtime type name of the tenant.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the primary key value, if the tenant is persisted.
    pub fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    /// Returns the key as a JSON value, `null` when unsaved.
    pub fn key_value(&self) -> Value {
        self.key.clone().unwrap_or(Value::Null)
    }

    /// Returns `true` if the tenant has a primary key.
    pub fn is_persisted(&self) -> bool {
        self.key.is_some()
    }
}

impl PartialEq for TenantRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && match (&self.key, &other.key) {
                (Some(a), Some(b)) => same_key(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for TenantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}#{}", self.type_name, key_to_string(key)),
            None => write!(f, "{}#new", self.type_name),
        }
    }
}

impl fmt::Debug for TenantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantRef({self})")
    }
}

/// A row type that can act as a tenant.
///
/// Implement this for the concrete model types of an application so they can
/// be handed to [`TenantContext::with_tenant`](super::TenantContext::with_tenant)
/// through [`as_tenant`](Self::as_tenant).
pub trait TenantModel {
    /// The runtime type name, e.g. `"Account"`.
    fn tenant_type(&self) -> &str;

    /// The value of the tenant's primary key, `None` if unsaved.
    fn tenant_key(&self) -> Option<Value>;

    /// Builds the tenant reference.
    fn as_tenant(&self) -> TenantRef {
        match self.tenant_key() {
            Some(key) => TenantRef::new(self.tenant_type(), key),
            None => TenantRef::unsaved(self.tenant_type()),
        }
    }
}

impl TenantModel for TenantRef {
    fn tenant_type(&self) -> &str {
        &self.type_name
    }

    fn tenant_key(&self) -> Option<Value> {
        self.key.clone()
    }
}

/// Compares two key values, treating numbers and numeric strings as equal.
///
/// `null` only equals `null`.
pub fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            numeric_string_eq(s, n)
        }
        _ => a == b,
    }
}

fn numeric_string_eq(s: &str, n: &serde_json::Number) -> bool {
    let s = s.trim();
    if let (Ok(parsed), Some(n)) = (s.parse::<i64>(), n.as_i64()) {
        return parsed == n;
    }
    match (s.parse::<f64>(), n.as_f64()) {
        (Ok(parsed), Some(n)) => parsed == n,
        _ => false,
    }
}

/// Renders a key for messages and logs without JSON quoting.
pub(crate) fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_ref_creation() {
        let tenant = TenantRef::new("Account", 1);
        assert_eq!(tenant.type_name(), "Account");
        assert_eq!(tenant.key(), Some(&json!(1)));
        assert!(tenant.is_persisted());
    }

    #[test]
    fn test_null_key_is_unsaved() {
        let tenant = TenantRef::new("Account", Value::Null);
        assert!(!tenant.is_persisted());
        assert_eq!(tenant, TenantRef::unsaved("Account"));
        assert_eq!(tenant.key_value(), Value::Null);
    }

    #[test]
    fn test_loose_key_equality() {
        assert!(same_key(&json!(5), &json!("5")));
        assert!(same_key(&json!("5"), &json!(5)));
        assert!(same_key(&json!(5), &json!(5.0)));
        assert!(!same_key(&json!(5), &json!("6")));
        assert!(!same_key(&json!(5), &json!("five")));
        assert!(!same_key(&json!(null), &json!(0)));
        assert!(same_key(&json!("acme"), &json!("acme")));
    }

    #[test]
    fn test_type_participates_in_equality() {
        assert_ne!(TenantRef::new("Account", 1), TenantRef::new("Project", 1));
        assert_ne!(TenantRef::new("Account", 1), TenantRef::unsaved("Account"));
    }

    #[test]
    fn test_key_for_custom_primary_key() {
        let tenant = TenantRef::new("Account", 1).with_attribute("name", "foo");
        assert_eq!(tenant.key_for(None), Some(json!(1)));
        assert_eq!(tenant.key_for(Some("name")), Some(json!("foo")));
        assert_eq!(tenant.key_for(Some("subdomain")), None);
        assert_eq!(tenant, TenantRef::new("Account", 1));
    }

    #[test]
    fn test_serde_omits_empty_attributes() {
        let json = serde_json::to_value(TenantRef::new("Account", 1)).unwrap();
        assert_eq!(json, json!({"type_name": "Account", "key": 1}));
    }

    #[test]
    fn test_display() {
        assert_eq!(TenantRef::new("Account", 7).to_string(), "Account#7");
        assert_eq!(TenantRef::new("Account", "foo").to_string(), "Account#foo");
        assert_eq!(TenantRef::unsaved("Account").to_string(), "Account#new");
    }

    #[test]
    fn test_tenant_model_as_tenant() {
        struct Account {
            id: Option<i64>,
        }

        impl TenantModel for Account {
            fn tenant_type(&self) -> &str {
                "Account"
            }

            fn tenant_key(&self) -> Option<Value> {
                self.id.map(Value::from)
            }
        }

        assert_eq!(Account { id: Some(3) }.as_tenant(), TenantRef::new("Account", 3));
        assert_eq!(Account { id: None }.as_tenant(), TenantRef::unsaved("Account"));
    }
}
