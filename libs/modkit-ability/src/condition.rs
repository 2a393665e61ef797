//! Data-only scoping predicates and the matcher that evaluates them.
//!
//! A [`Condition`] uses the familiar document-query shape:
//!
//! ```json
//! {
//!   "tenantId": "t1",
//!   "status": { "$in": ["open", "pending"] },
//!   "$or": [{ "ownerId": "u1" }, { "shared": true }]
//! }
//! ```
//!
//! Keys are ANDed. `$or` holds alternatives of which one must hold. Matching
//! fails closed: a missing attribute or a type mismatch is a non-match, never
//! an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const OP_EQ: &str = "$eq";
const OP_NE: &str = "$ne";
const OP_IN: &str = "$in";
const OP_OR: &str = "$or";

/// Attribute lookup on a candidate object.
pub trait Attributes {
    /// Value stored under `key`, if the candidate carries it.
    fn attribute(&self, key: &str) -> Option<&Value>;
}

impl Attributes for Map<String, Value> {
    fn attribute(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl Attributes for Value {
    fn attribute(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(key))
    }
}

/// A single comparison applied to one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
}

impl Operator {
    fn test(&self, actual: &Value) -> bool {
        match self {
            Operator::Eq(expected) => actual == expected,
            Operator::Ne(unexpected) => actual != unexpected,
            Operator::In(allowed) => allowed.iter().any(|candidate| candidate == actual),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("condition must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("unknown operator `{operator}`")]
    UnknownOperator { operator: String },

    #[error("field `{field}` mixes operators with plain keys")]
    MixedOperators { field: String },

    #[error("`$in` operand for field `{field}` must be an array")]
    InOperandNotArray { field: String },

    #[error("`$or` must be an array of objects")]
    InvalidOr,
}

/// Scoping predicate attached to a rule.
///
/// The empty condition matches every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Condition {
    fields: BTreeMap<String, Vec<Operator>>,
    any_of: Option<Vec<Condition>>,
}

impl Condition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single-key equality condition.
    #[must_use]
    pub fn field_eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().eq(key, value)
    }

    #[must_use]
    pub fn eq(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key.into(), Operator::Eq(value.into()))
    }

    #[must_use]
    pub fn ne(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key.into(), Operator::Ne(value.into()))
    }

    #[must_use]
    pub fn is_in<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(key.into(), Operator::In(values))
    }

    /// Add alternatives to the `$or` clause.
    #[must_use]
    pub fn or(mut self, alternatives: impl IntoIterator<Item = Condition>) -> Self {
        self.any_of
            .get_or_insert_with(Vec::new)
            .extend(alternatives);
        self
    }

    fn push(mut self, key: String, operator: Operator) -> Self {
        self.fields.entry(key).or_default().push(operator);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.any_of.is_none()
    }

    /// Operators registered for `key`.
    #[must_use]
    pub fn operators(&self, key: &str) -> Option<&[Operator]> {
        self.fields.get(key).map(Vec::as_slice)
    }

    /// Evaluate the condition against `candidate`.
    #[must_use]
    pub fn matches<A>(&self, candidate: &A) -> bool
    where
        A: Attributes + ?Sized,
    {
        let fields_hold = self.fields.iter().all(|(key, operators)| {
            candidate
                .attribute(key)
                .is_some_and(|actual| operators.iter().all(|op| op.test(actual)))
        });
        if !fields_hold {
            return false;
        }

        match &self.any_of {
            None => true,
            Some(alternatives) => alternatives.iter().any(|alt| alt.matches(candidate)),
        }
    }
}

/// Evaluate an optional condition; an absent condition matches unconditionally.
#[must_use]
pub fn matches<A>(condition: Option<&Condition>, candidate: &A) -> bool
where
    A: Attributes + ?Sized,
{
    condition.is_none_or(|condition| condition.matches(candidate))
}

fn parse_field(field: &str, value: Value) -> Result<Vec<Operator>, ConditionError> {
    let Value::Object(object) = value else {
        return Ok(vec![Operator::Eq(value)]);
    };

    let operator_keys = object.keys().filter(|k| k.starts_with('$')).count();
    if operator_keys == 0 {
        return Ok(vec![Operator::Eq(Value::Object(object))]);
    }
    if operator_keys != object.len() {
        return Err(ConditionError::MixedOperators {
            field: field.to_owned(),
        });
    }

    object
        .into_iter()
        .map(|(operator, operand)| match operator.as_str() {
            OP_EQ => Ok(Operator::Eq(operand)),
            OP_NE => Ok(Operator::Ne(operand)),
            OP_IN => match operand {
                Value::Array(values) => Ok(Operator::In(values)),
                _ => Err(ConditionError::InOperandNotArray {
                    field: field.to_owned(),
                }),
            },
            _ => Err(ConditionError::UnknownOperator { operator }),
        })
        .collect()
}

impl TryFrom<Value> for Condition {
    type Error = ConditionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(object) = value else {
            return Err(ConditionError::NotAnObject(value.to_string()));
        };

        let mut condition = Condition::new();
        for (key, value) in object {
            if key == OP_OR {
                let Value::Array(items) = value else {
                    return Err(ConditionError::InvalidOr);
                };
                let alternatives = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(_) => Condition::try_from(item),
                        _ => Err(ConditionError::InvalidOr),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                condition.any_of = Some(alternatives);
            } else if key.starts_with('$') {
                return Err(ConditionError::UnknownOperator { operator: key });
            } else {
                let operators = parse_field(&key, value)?;
                condition.fields.insert(key, operators);
            }
        }
        Ok(condition)
    }
}

fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.keys().any(|k| k.starts_with('$')))
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        let mut object = Map::new();

        for (key, mut operators) in condition.fields {
            let plain = operators.len() == 1
                && matches!(&operators[0], Operator::Eq(v) if !is_operator_object(v));
            let rendered = if plain {
                match operators.pop() {
                    Some(Operator::Eq(value)) => value,
                    _ => Value::Null,
                }
            } else {
                let mut ops = Map::new();
                for operator in operators {
                    match operator {
                        Operator::Eq(value) => ops.insert(OP_EQ.to_owned(), value),
                        Operator::Ne(value) => ops.insert(OP_NE.to_owned(), value),
                        Operator::In(values) => ops.insert(OP_IN.to_owned(), Value::Array(values)),
                    };
                }
                Value::Object(ops)
            };
            object.insert(key, rendered);
        }

        if let Some(alternatives) = condition.any_of {
            object.insert(
                OP_OR.to_owned(),
                Value::Array(alternatives.into_iter().map(Value::from).collect()),
            );
        }

        Value::Object(object)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Condition {
        Condition::try_from(value).unwrap()
    }

    #[test]
    fn empty_condition_matches_anything() {
        assert!(Condition::new().matches(&json!({})));
        assert!(Condition::new().matches(&json!({"tenantId": "t1"})));
        assert!(matches(None, &json!({"anything": 1})));
    }

    #[test]
    fn plain_value_is_strict_equality() {
        let condition = parse(json!({"tenantId": "t1"}));
        assert!(condition.matches(&json!({"tenantId": "t1"})));
        assert!(!condition.matches(&json!({"tenantId": "t2"})));
        assert!(!condition.matches(&json!({"tenantId": 1})));
    }

    #[test]
    fn missing_key_fails_even_for_ne() {
        let condition = parse(json!({"status": {"$ne": "closed"}}));
        assert!(!condition.matches(&json!({})));
        assert!(condition.matches(&json!({"status": "open"})));
        assert!(!condition.matches(&json!({"status": "closed"})));
    }

    #[test]
    fn in_checks_membership() {
        let condition = parse(json!({"status": {"$in": ["open", "pending"]}}));
        assert!(condition.matches(&json!({"status": "pending"})));
        assert!(!condition.matches(&json!({"status": "closed"})));
    }

    #[test]
    fn keys_are_anded() {
        let condition = Condition::new().eq("tenantId", "t1").eq("ownerId", "u1");
        assert!(condition.matches(&json!({"tenantId": "t1", "ownerId": "u1"})));
        assert!(!condition.matches(&json!({"tenantId": "t1", "ownerId": "u2"})));
    }

    #[test]
    fn operators_on_one_key_are_anded() {
        let condition = parse(json!({"priority": {"$in": [1, 2, 3], "$ne": 2}}));
        assert!(condition.matches(&json!({"priority": 1})));
        assert!(!condition.matches(&json!({"priority": 2})));
    }

    #[test]
    fn or_needs_one_alternative() {
        let condition = parse(json!({
            "tenantId": "t1",
            "$or": [{"ownerId": "u1"}, {"shared": true}]
        }));
        assert!(condition.matches(&json!({"tenantId": "t1", "ownerId": "u1"})));
        assert!(condition.matches(&json!({"tenantId": "t1", "shared": true})));
        assert!(!condition.matches(&json!({"tenantId": "t1", "ownerId": "u2"})));
        assert!(!condition.matches(&json!({"tenantId": "t2", "shared": true})));
    }

    #[test]
    fn empty_or_matches_nothing() {
        let condition = parse(json!({"$or": []}));
        assert!(!condition.matches(&json!({"a": 1})));
    }

    #[test]
    fn non_object_candidates_fail_closed() {
        let condition = Condition::field_eq("tenantId", "t1");
        assert!(!condition.matches(&json!("t1")));
        assert!(!condition.matches(&json!(["tenantId", "t1"])));
    }

    #[test]
    fn parse_errors_are_typed() {
        assert!(matches!(
            Condition::try_from(json!(["x"])),
            Err(ConditionError::NotAnObject(_))
        ));
        assert_eq!(
            Condition::try_from(json!({"a": {"$gt": 1}})),
            Err(ConditionError::UnknownOperator {
                operator: "$gt".to_owned()
            })
        );
        assert_eq!(
            Condition::try_from(json!({"a": {"$ne": 1, "b": 2}})),
            Err(ConditionError::MixedOperators {
                field: "a".to_owned()
            })
        );
        assert_eq!(
            Condition::try_from(json!({"a": {"$in": "x"}})),
            Err(ConditionError::InOperandNotArray {
                field: "a".to_owned()
            })
        );
        assert_eq!(
            Condition::try_from(json!({"$or": {"a": 1}})),
            Err(ConditionError::InvalidOr)
        );
        assert_eq!(
            Condition::try_from(json!({"$and": []})),
            Err(ConditionError::UnknownOperator {
                operator: "$and".to_owned()
            })
        );
    }

    #[test]
    fn nested_object_without_operators_is_equality() {
        let condition = parse(json!({"owner": {"id": "u1"}}));
        assert!(condition.matches(&json!({"owner": {"id": "u1"}})));
        assert!(!condition.matches(&json!({"owner": {"id": "u1", "x": 1}})));
    }

    #[test]
    fn serializes_back_to_query_shape() {
        let condition = Condition::field_eq("tenantId", "t1")
            .is_in("status", ["open"])
            .or([Condition::field_eq("shared", true)]);
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(
            value,
            json!({
                "tenantId": "t1",
                "status": {"$in": ["open"]},
                "$or": [{"shared": true}]
            })
        );
    }

    #[test]
    fn equality_on_operator_like_object_is_escaped() {
        let condition = Condition::field_eq("meta", json!({"$in": [1]}));
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value, json!({"meta": {"$eq": {"$in": [1]}}}));
        assert!(condition.matches(&json!({"meta": {"$in": [1]}})));
    }
}
