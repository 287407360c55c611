//! Schema-driven coercion of patch values into typed leaves.
//!
//! Patch values arrive as opaque JSON nodes; their expected type is only
//! known once the target attribute has been resolved. This module turns a
//! raw node into a leaf conforming to the attribute definition, accepting
//! the textual spellings clients commonly send (`"true"` for a boolean,
//! `"42"` for an integer).

use crate::error::{ScimError, ScimResult};
use crate::schema::{AttributeDefinition, AttributeType};

use serde_json::Value;

/// Coerce a raw value into a typed leaf for the given attribute.
///
/// - STRING / DATE_TIME / REFERENCE / BINARY accept string nodes verbatim
///   (date syntax is not validated here);
/// - BOOLEAN accepts `true`/`false` nodes or the strings `"true"`/`"false"`
///   case-insensitively;
/// - INTEGER accepts integral numbers or strings parseable as signed 64-bit;
/// - DECIMAL accepts numbers or strings parseable as IEEE-754 doubles.
///
/// Out-of-range or unparsable values fail with `invalidValue`.
pub fn coerce_value(attribute: &AttributeDefinition, value: &Value) -> ScimResult<Value> {
    match attribute.data_type {
        AttributeType::String
        | AttributeType::DateTime
        | AttributeType::Reference
        | AttributeType::Binary => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(type_error(attribute, other)),
        },
        AttributeType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(type_error(attribute, value)),
            },
            other => Err(type_error(attribute, other)),
        },
        AttributeType::Integer => coerce_integer(attribute, value),
        AttributeType::Decimal => coerce_decimal(attribute, value),
        AttributeType::Complex => Err(ScimError::invalid_value(format!(
            "complex attribute '{}' requires an object value",
            attribute.name
        ))),
    }
}

fn coerce_integer(attribute: &AttributeDefinition, value: &Value) -> ScimResult<Value> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::from(i)),
            // u64 beyond i64::MAX or a fractional double
            None => Err(ScimError::invalid_value(format!(
                "value {} is out of range for integer attribute '{}'",
                n, attribute.name
            ))),
        },
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
            ScimError::invalid_value(format!(
                "'{}' is not a valid integer for attribute '{}'",
                s, attribute.name
            ))
        }),
        other => Err(type_error(attribute, other)),
    }
}

fn coerce_decimal(attribute: &AttributeDefinition, value: &Value) -> ScimResult<Value> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            let parsed: f64 = s.trim().parse().map_err(|_| {
                ScimError::invalid_value(format!(
                    "'{}' is not a valid decimal for attribute '{}'",
                    s, attribute.name
                ))
            })?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| {
                    ScimError::invalid_value(format!(
                        "'{}' is not a finite decimal for attribute '{}'",
                        s, attribute.name
                    ))
                })
        }
        other => Err(type_error(attribute, other)),
    }
}

fn type_error(attribute: &AttributeDefinition, value: &Value) -> ScimError {
    ScimError::invalid_value(format!(
        "value {} is not compatible with attribute '{}' of type {}",
        value, attribute.name, attribute.data_type
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeDefinition;
    use serde_json::json;

    fn attr(data_type: AttributeType) -> AttributeDefinition {
        AttributeDefinition {
            name: "attr".to_string(),
            data_type,
            ..Default::default()
        }
    }

    #[test]
    fn strings_pass_through() {
        let def = attr(AttributeType::String);
        assert_eq!(coerce_value(&def, &json!("hello")).unwrap(), json!("hello"));
        assert!(coerce_value(&def, &json!(5)).is_err());
        assert!(coerce_value(&def, &json!({"a": 1})).is_err());
    }

    #[test]
    fn date_time_syntax_is_not_validated_here() {
        let def = attr(AttributeType::DateTime);
        assert!(coerce_value(&def, &json!("not-a-date")).is_ok());
    }

    #[test]
    fn boolean_parses_case_insensitively() {
        let def = attr(AttributeType::Boolean);
        assert_eq!(coerce_value(&def, &json!(true)).unwrap(), json!(true));
        assert_eq!(coerce_value(&def, &json!("TRUE")).unwrap(), json!(true));
        assert_eq!(coerce_value(&def, &json!("False")).unwrap(), json!(false));
        assert!(coerce_value(&def, &json!("yes")).is_err());
        assert!(coerce_value(&def, &json!(1)).is_err());
    }

    #[test]
    fn integer_parses_and_bounds_check() {
        let def = attr(AttributeType::Integer);
        assert_eq!(coerce_value(&def, &json!(42)).unwrap(), json!(42));
        assert_eq!(coerce_value(&def, &json!("42")).unwrap(), json!(42));
        assert_eq!(
            coerce_value(&def, &json!(i64::MAX)).unwrap(),
            json!(i64::MAX)
        );
        assert!(coerce_value(&def, &json!(u64::MAX)).is_err());
        assert!(coerce_value(&def, &json!(1.5)).is_err());
        assert!(coerce_value(&def, &json!("12.5")).is_err());
        assert!(coerce_value(&def, &json!("abc")).is_err());
    }

    #[test]
    fn decimal_parses_doubles() {
        let def = attr(AttributeType::Decimal);
        assert_eq!(coerce_value(&def, &json!(1.5)).unwrap(), json!(1.5));
        assert_eq!(coerce_value(&def, &json!("2.25")).unwrap(), json!(2.25));
        assert_eq!(coerce_value(&def, &json!(3)).unwrap(), json!(3));
        assert!(coerce_value(&def, &json!("NaN")).is_err());
        assert!(coerce_value(&def, &json!(true)).is_err());
    }

    #[test]
    fn complex_is_rejected() {
        let def = attr(AttributeType::Complex);
        assert!(coerce_value(&def, &json!("x")).is_err());
    }
}
