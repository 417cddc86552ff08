//! Row filter predicates.
//!
//! A [`Predicate`] is the filter injected into every default read of a
//! registered entity type. It can be evaluated against in-memory
//! [`Record`]s, or rendered into a parameterized SQL `WHERE` fragment for a
//! backend that executes queries itself.

use serde_json::Value;

use crate::store::{Record, RecordStore};
use crate::tenant::same_key;

/// A row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row.
    All,
    /// Matches no row.
    Nothing,
    /// `field = value`; a `null` value matches null or missing fields.
    #[allow(missing_docs)]
    Eq { field: String, value: Value },
    /// `field IN (values)`; a `null` entry matches null or missing fields.
    #[allow(missing_docs)]
    In { field: String, values: Vec<Value> },
    /// Negation.
    Not(Box<Predicate>),
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
    /// `field IN (SELECT select FROM entity_type WHERE filter)`.
    InSubquery {
        /// Column of the filtered row.
        field: String,
        /// Entity type queried by the subquery.
        entity_type: String,
        /// Column selected by the subquery.
        select: String,
        /// Filter applied inside the subquery.
        filter: Box<Predicate>,
    },
}

impl Predicate {
    /// Builds an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Builds a membership filter.
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    /// Builds a null check.
    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::eq(field, Value::Null)
    }

    /// Combines two predicates with AND, folding trivial operands.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::Nothing, _) | (_, Predicate::Nothing) => Predicate::Nothing,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, q) => Predicate::And(vec![p, q]),
        }
    }

    /// Combines two predicates with OR, folding trivial operands.
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Nothing, p) | (p, Predicate::Nothing) => p,
            (Predicate::All, _) | (_, Predicate::All) => Predicate::All,
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (p, q) => Predicate::Or(vec![p, q]),
        }
    }

    /// Negates a predicate.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        match self {
            Predicate::All => Predicate::Nothing,
            Predicate::Nothing => Predicate::All,
            Predicate::Not(inner) => *inner,
            p => Predicate::Not(Box::new(p)),
        }
    }

    /// Returns `true` if this predicate places no restriction on rows.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Predicate::All)
    }

    /// Evaluates the predicate against a record.
    ///
    /// `store` is consulted for subquery predicates.
    pub fn matches(&self, record: &Record, store: &dyn RecordStore) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Nothing => false,
            Predicate::Eq { field, value } => value_matches(record.get(field), value),
            Predicate::In { field, values } => {
                let actual = record.get(field);
                values.iter().any(|v| value_matches(actual, v))
            }
            Predicate::Not(inner) => !inner.matches(record, store),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record, store)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record, store)),
            Predicate::InSubquery {
                field,
                entity_type,
                select,
                filter,
            } => {
                let Some(actual) = record.get(field).filter(|v| !v.is_null()) else {
                    return false;
                };
                store
                    .rows(entity_type)
                    .iter()
                    .filter(|row| filter.matches(row, store))
                    .filter_map(|row| row.get(select))
                    .any(|selected| same_key(selected, actual))
            }
        }
    }

    /// Renders the predicate as a SQL `WHERE` fragment with `$n` placeholders.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_tenancy::scope::Predicate;
    /// use serde_json::json;
    ///
    /// let predicate = Predicate::is_in("account_id", vec![json!(1), json!(null)]);
    /// let sql = predicate.to_sql();
    /// assert_eq!(sql.sql, "(account_id IN ($1) OR account_id IS NULL)");
    /// assert_eq!(sql.params, vec![json!(1)]);
    /// ```
    pub fn to_sql(&self) -> SqlFragment {
        let mut params = Vec::new();
        let sql = self.render(&mut params);
        SqlFragment { sql, params }
    }

    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Predicate::All => "1 = 1".to_string(),
            Predicate::Nothing => "1 = 0".to_string(),
            Predicate::Eq { field, value } if value.is_null() => format!("{field} IS NULL"),
            Predicate::Eq { field, value } => {
                params.push(value.clone());
                format!("{field} = ${}", params.len())
            }
            Predicate::In { field, values } => {
                let has_null = values.iter().any(Value::is_null);
                let placeholders: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| {
                        params.push(v.clone());
                        format!("${}", params.len())
                    })
                    .collect();
                match (placeholders.is_empty(), has_null) {
                    (true, true) => format!("{field} IS NULL"),
                    (true, false) => "1 = 0".to_string(),
                    (false, true) => {
                        format!("({field} IN ({}) OR {field} IS NULL)", placeholders.join(", "))
                    }
                    (false, false) => format!("{field} IN ({})", placeholders.join(", ")),
                }
            }
            Predicate::Not(inner) => format!("NOT ({})", inner.render(params)),
            Predicate::And(parts) => join_parts(parts, " AND ", params),
            Predicate::Or(parts) => join_parts(parts, " OR ", params),
            Predicate::InSubquery {
                field,
                entity_type,
                select,
                filter,
            } => format!(
                "{field} IN (SELECT {select} FROM {entity_type} WHERE {})",
                filter.render(params)
            ),
        }
    }
}

fn join_parts(parts: &[Predicate], separator: &str, params: &mut Vec<Value>) -> String {
    let rendered: Vec<String> = parts.iter().map(|p| p.render(params)).collect();
    format!("({})", rendered.join(separator))
}

fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None | Some(Value::Null) => expected.is_null(),
        Some(actual) => !expected.is_null() && same_key(actual, expected),
    }
}

/// A rendered SQL fragment and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// SQL text using `$1`, `$2`, ... placeholders.
    pub sql: String,
    /// Parameter values in placeholder order.
    pub params: Vec<Value>,
}
