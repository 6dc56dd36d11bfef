//! Filter descriptors for document selection.
//!
//! A [`Filter`] is an ordered mapping from field name to a condition:
//! either a bare literal (compiled to an equality test) or a list of
//! operators. Insertion order is preserved and determines both clause
//! emission order and positional parameter numbering downstream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// A single filter operator applied to one field.
///
/// The operator's payload is the comparison/probe value; `null` payloads
/// are treated as absent and skipped by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Field equals value.
    Equals(Value),
    /// Field greater than value.
    Gt(Value),
    /// Field greater than or equal to value.
    Gte(Value),
    /// Field less than value.
    Lt(Value),
    /// Field less than or equal to value.
    Lte(Value),
    /// Text field contains the given substring.
    Contains(Value),
    /// Text field starts with the given prefix.
    StartsWith(Value),
    /// Text field ends with the given suffix.
    EndsWith(Value),
    /// Collection field contains the given member.
    ArrayContains(Value),
    /// Collection field shares at least one member with the probe array.
    ContainsAny(Value),
    /// Collection field contains every member of the probe array.
    ContainsAll(Value),
}

impl Op {
    /// Create an equality operator.
    pub fn equals(value: impl Into<Value>) -> Self {
        Op::Equals(value.into())
    }

    /// Create a greater-than operator.
    pub fn gt(value: impl Into<Value>) -> Self {
        Op::Gt(value.into())
    }

    /// Create a greater-than-or-equal operator.
    pub fn gte(value: impl Into<Value>) -> Self {
        Op::Gte(value.into())
    }

    /// Create a less-than operator.
    pub fn lt(value: impl Into<Value>) -> Self {
        Op::Lt(value.into())
    }

    /// Create a less-than-or-equal operator.
    pub fn lte(value: impl Into<Value>) -> Self {
        Op::Lte(value.into())
    }

    /// Create a text-contains operator.
    pub fn contains(value: impl Into<Value>) -> Self {
        Op::Contains(value.into())
    }

    /// Create a starts-with operator.
    pub fn starts_with(value: impl Into<Value>) -> Self {
        Op::StartsWith(value.into())
    }

    /// Create an ends-with operator.
    pub fn ends_with(value: impl Into<Value>) -> Self {
        Op::EndsWith(value.into())
    }

    /// Create a collection-membership operator.
    pub fn array_contains(value: impl Into<Value>) -> Self {
        Op::ArrayContains(value.into())
    }

    /// Create a contains-any operator over a probe array.
    pub fn contains_any(value: impl Into<Value>) -> Self {
        Op::ContainsAny(value.into())
    }

    /// Create a contains-all operator over a probe array.
    pub fn contains_all(value: impl Into<Value>) -> Self {
        Op::ContainsAll(value.into())
    }

    /// The operator's payload value.
    pub fn value(&self) -> &Value {
        match self {
            Op::Equals(v)
            | Op::Gt(v)
            | Op::Gte(v)
            | Op::Lt(v)
            | Op::Lte(v)
            | Op::Contains(v)
            | Op::StartsWith(v)
            | Op::EndsWith(v)
            | Op::ArrayContains(v)
            | Op::ContainsAny(v)
            | Op::ContainsAll(v) => v,
        }
    }
}

/// The condition attached to one filter field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// A bare literal, compiled to an equality test.
    Value(Value),
    /// An operator object: one clause per operator, in declared order.
    Ops(Vec<Op>),
}

/// An ordered filter descriptor.
///
/// Entries whose condition value is JSON `null` are skipped entirely at
/// compile time; `false`, `0`, and the empty string are present values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    entries: Vec<(String, Condition)>,
}

impl Filter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare-literal (equality) entry.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .push((name.into(), Condition::Value(value.into())));
        self
    }

    /// Add an operator-object entry.
    pub fn field_ops(mut self, name: impl Into<String>, ops: Vec<Op>) -> Self {
        self.entries.push((name.into(), Condition::Ops(ops)));
        self
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[(String, Condition)] {
        &self.entries
    }

    /// True when the descriptor has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a filter from a JSON object descriptor.
    ///
    /// Each key maps to either a literal value or an operator object with
    /// keys from `equals | gt | gte | lt | lte | contains | startsWith |
    /// endsWith | containsAny | containsAll`. Key order is preserved.
    /// The JSON key `contains` maps to the text form; collection
    /// membership uses the typed [`Op::array_contains`] constructor.
    pub fn from_json(descriptor: &Value) -> Result<Self, Error> {
        let object = descriptor.as_object().ok_or_else(|| {
            Error::InvalidFilter("filter descriptor must be a JSON object".to_string())
        })?;

        let mut filter = Filter::new();
        for (field, condition) in object {
            match condition.as_object() {
                Some(ops) if is_operator_object(ops) => {
                    let mut parsed = Vec::with_capacity(ops.len());
                    for (key, value) in ops {
                        parsed.push(parse_operator(key, value.clone())?);
                    }
                    filter = filter.field_ops(field.clone(), parsed);
                }
                _ => {
                    filter = filter.field(field.clone(), condition.clone());
                }
            }
        }
        Ok(filter)
    }
}

/// Recognized operator keys in JSON descriptors.
const OPERATOR_KEYS: &[&str] = &[
    "equals",
    "gt",
    "gte",
    "lt",
    "lte",
    "contains",
    "startsWith",
    "endsWith",
    "containsAny",
    "containsAll",
];

/// An object is an operator object only if every key is a known operator.
fn is_operator_object(object: &serde_json::Map<String, Value>) -> bool {
    !object.is_empty() && object.keys().all(|k| OPERATOR_KEYS.contains(&k.as_str()))
}

fn parse_operator(key: &str, value: Value) -> Result<Op, Error> {
    let op = match key {
        "equals" => Op::Equals(value),
        "gt" => Op::Gt(value),
        "gte" => Op::Gte(value),
        "lt" => Op::Lt(value),
        "lte" => Op::Lte(value),
        "contains" => Op::Contains(value),
        "startsWith" => Op::StartsWith(value),
        "endsWith" => Op::EndsWith(value),
        "containsAny" => Op::ContainsAny(value),
        "containsAll" => Op::ContainsAll(value),
        other => {
            return Err(Error::InvalidFilter(format!(
                "unknown filter operator: {other}"
            )))
        }
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_builder_preserves_order() {
        let filter = Filter::new()
            .field("status", "active")
            .field_ops("age", vec![Op::gte(18), Op::lt(65)])
            .field("region", "eu");

        let entries = filter.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "status");
        assert_eq!(entries[1].0, "age");
        assert_eq!(entries[2].0, "region");
    }

    #[test]
    fn test_from_json_literal_and_operators() {
        let filter = Filter::from_json(&json!({
            "name": "Alice",
            "age": {"gte": 18, "lt": 65},
        }))
        .unwrap();

        let entries = filter.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, Condition::Value(json!("Alice")));
        assert_eq!(
            entries[1].1,
            Condition::Ops(vec![Op::Gte(json!(18)), Op::Lt(json!(65))])
        );
    }

    #[test]
    fn test_from_json_plain_object_is_literal() {
        // An object with non-operator keys is an equality probe, not an
        // operator object.
        let filter = Filter::from_json(&json!({
            "address": {"city": "Oslo"},
        }))
        .unwrap();

        assert_eq!(
            filter.entries()[0].1,
            Condition::Value(json!({"city": "Oslo"}))
        );
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = Filter::from_json(&json!(["not", "an", "object"])).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_null_entries_are_kept_for_compiler_to_skip() {
        let filter = Filter::from_json(&json!({
            "a": "x",
            "b": null,
        }))
        .unwrap();

        // The descriptor keeps the entry; the compiler is responsible for
        // omitting it from output.
        assert_eq!(filter.entries().len(), 2);
        assert_eq!(filter.entries()[1].1, Condition::Value(Value::Null));
    }

    #[test]
    fn test_op_value_accessor() {
        assert_eq!(Op::gte(18).value(), &json!(18));
        assert_eq!(Op::contains("rust").value(), &json!("rust"));
    }
}
