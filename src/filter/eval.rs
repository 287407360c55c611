//! Filter evaluation against resource nodes.
//!
//! Evaluates a parsed [`FilterExpr`] against candidate members of a
//! multi-valued complex attribute. Literals are typed at evaluation time
//! against the attribute definition when one is supplied; without a
//! definition the comparison falls back to the literal's JSON type with
//! case-insensitive string matching.

use super::ast::{AttrPath, Compare, CompareOp, FilterExpr, Literal, LogicalOp};
use crate::error::{ScimError, ScimResult};
use crate::schema::{AttributeDefinition, AttributeType};

use chrono::DateTime;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Evaluate a filter against an array, returning the matching indices.
///
/// The result is sorted ascending and free of duplicates by construction.
pub fn evaluate_filter(filter: &FilterExpr, array: &[Value]) -> ScimResult<Vec<usize>> {
    evaluate_filter_with(filter, array, None)
}

/// Evaluate a filter against an array with the defining attribute available
/// for literal typing (the attribute is the multi-valued complex attribute
/// whose members are being filtered).
pub fn evaluate_filter_with(
    filter: &FilterExpr,
    array: &[Value],
    attribute: Option<&AttributeDefinition>,
) -> ScimResult<Vec<usize>> {
    let mut matching = Vec::new();
    for (index, candidate) in array.iter().enumerate() {
        if matches(filter, candidate, attribute)? {
            matching.push(index);
        }
    }
    Ok(matching)
}

/// Whether a single candidate node satisfies the filter.
pub fn matches(
    filter: &FilterExpr,
    candidate: &Value,
    attribute: Option<&AttributeDefinition>,
) -> ScimResult<bool> {
    match filter {
        FilterExpr::Compare(cmp) => eval_compare(cmp, candidate, attribute),
        FilterExpr::Logical { op, left, right } => match op {
            // Short-circuit left to right.
            LogicalOp::And => {
                Ok(matches(left, candidate, attribute)? && matches(right, candidate, attribute)?)
            }
            LogicalOp::Or => {
                Ok(matches(left, candidate, attribute)? || matches(right, candidate, attribute)?)
            }
        },
        FilterExpr::Not(inner) => Ok(!matches(inner, candidate, attribute)?),
        FilterExpr::Group(inner) => matches(inner, candidate, attribute),
    }
}

/// Case-insensitive member lookup in a JSON object.
pub(crate) fn attr_value<'v>(object: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn eval_compare(
    cmp: &Compare,
    candidate: &Value,
    attribute: Option<&AttributeDefinition>,
) -> ScimResult<bool> {
    let value = resolve_operand(&cmp.path, candidate);
    let target_def = resolve_operand_def(&cmp.path, attribute);

    if let (Some(def), Some(literal)) = (target_def, cmp.literal.as_ref()) {
        check_literal_type(def, literal, &cmp.path)?;
    }

    let case_exact = target_def.map(|def| def.case_exact).unwrap_or(false);
    let date_time = target_def.map(|def| def.data_type == AttributeType::DateTime);

    match cmp.op {
        CompareOp::Pr => Ok(value.map(is_present).unwrap_or(false)),
        CompareOp::Ne => {
            // A missing attribute satisfies ne against any literal.
            let equal = match value {
                Some(v) => any_element(v, |el| eval_eq(el, cmp.literal.as_ref(), case_exact)),
                None => false,
            };
            Ok(!equal)
        }
        CompareOp::Eq => Ok(match value {
            Some(v) => any_element(v, |el| eval_eq(el, cmp.literal.as_ref(), case_exact)),
            None => cmp.literal == Some(Literal::Null),
        }),
        CompareOp::Co | CompareOp::Sw | CompareOp::Ew => {
            let literal = expect_string_literal(cmp)?;
            Ok(match value {
                Some(v) => any_element(v, |el| eval_substring(el, cmp.op, literal, case_exact)),
                None => false,
            })
        }
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let literal = cmp.literal.as_ref().ok_or_else(|| {
                ScimError::invalid_filter(
                    format!("operator '{}' requires a comparison value", cmp.op),
                    None,
                )
            })?;
            if matches!(literal, Literal::Null | Literal::Boolean(_)) {
                return Err(ScimError::invalid_filter(
                    format!("operator '{}' is not defined for {} literals", cmp.op, literal),
                    None,
                ));
            }
            match value {
                Some(v) => {
                    let mut result = false;
                    for element in elements(v) {
                        if let Some(ordering) = eval_order(element, literal, date_time)? {
                            if ordering_matches(cmp.op, ordering) {
                                result = true;
                                break;
                            }
                        }
                    }
                    Ok(result)
                }
                None => Ok(false),
            }
        }
    }
}

/// Resolve the compared attribute value within the candidate object.
fn resolve_operand<'v>(path: &AttrPath, candidate: &'v Value) -> Option<&'v Value> {
    let object = candidate.as_object()?;
    let value = attr_value(object, &path.name)?;
    match &path.sub {
        Some(sub) => attr_value(value.as_object()?, sub),
        None => Some(value),
    }
}

/// Resolve the definition of the compared attribute relative to the
/// multi-valued complex attribute whose members are filtered.
fn resolve_operand_def<'a>(
    path: &AttrPath,
    attribute: Option<&'a AttributeDefinition>,
) -> Option<&'a AttributeDefinition> {
    let base = attribute?.find_sub_attribute(&path.name)?;
    match &path.sub {
        Some(sub) => base.find_sub_attribute(sub),
        None => Some(base),
    }
}

fn check_literal_type(
    def: &AttributeDefinition,
    literal: &Literal,
    path: &AttrPath,
) -> ScimResult<()> {
    let compatible = match literal {
        Literal::Null => true,
        Literal::String(_) => matches!(
            def.data_type,
            AttributeType::String
                | AttributeType::DateTime
                | AttributeType::Reference
                | AttributeType::Binary
        ),
        Literal::Number(_) => matches!(
            def.data_type,
            AttributeType::Integer | AttributeType::Decimal
        ),
        Literal::Boolean(_) => def.data_type == AttributeType::Boolean,
    };
    if compatible {
        Ok(())
    } else {
        Err(ScimError::invalid_filter(
            format!(
                "literal {} is not comparable with attribute '{}' of type {}",
                literal, path, def.data_type
            ),
            None,
        ))
    }
}

/// A multi-valued operand matches when any of its elements matches.
fn elements(value: &Value) -> impl Iterator<Item = &Value> {
    match value {
        Value::Array(items) => items.iter().collect::<Vec<_>>().into_iter(),
        other => vec![other].into_iter(),
    }
}

fn any_element(value: &Value, predicate: impl Fn(&Value) -> bool) -> bool {
    elements(value).any(|el| predicate(el))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn eval_eq(value: &Value, literal: Option<&Literal>, case_exact: bool) -> bool {
    match (value, literal) {
        (Value::String(s), Some(Literal::String(l))) => {
            if case_exact {
                s == l
            } else {
                s.eq_ignore_ascii_case(l) || s.to_lowercase() == l.to_lowercase()
            }
        }
        (Value::Number(n), Some(Literal::Number(l))) => n.as_f64() == l.as_f64(),
        (Value::Bool(b), Some(Literal::Boolean(l))) => b == l,
        (Value::Null, Some(Literal::Null)) => true,
        _ => false,
    }
}

fn eval_substring(value: &Value, op: CompareOp, literal: &str, case_exact: bool) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let (haystack, needle) = if case_exact {
        (s.clone(), literal.to_string())
    } else {
        (s.to_lowercase(), literal.to_lowercase())
    };
    match op {
        CompareOp::Co => haystack.contains(&needle),
        CompareOp::Sw => haystack.starts_with(&needle),
        CompareOp::Ew => haystack.ends_with(&needle),
        _ => false,
    }
}

/// Ordered comparison of an attribute value against a literal.
///
/// DATE_TIME attributes order chronologically; strings order by Unicode
/// code point (case-sensitive regardless of caseExact); numbers by value.
/// Returns `None` when the dynamic types cannot be ordered against each
/// other.
fn eval_order(
    value: &Value,
    literal: &Literal,
    date_time: Option<bool>,
) -> ScimResult<Option<Ordering>> {
    match (value, literal) {
        (Value::String(s), Literal::String(l)) => {
            let chronological = match date_time {
                Some(true) => parse_date_pair(s, l),
                // Without a definition, strings that both parse as RFC3339
                // still order chronologically.
                None => parse_date_pair(s, l),
                Some(false) => None,
            };
            match chronological {
                Some((a, b)) => Ok(Some(a.cmp(&b))),
                None => Ok(Some(s.as_str().cmp(l.as_str()))),
            }
        }
        (Value::Number(n), Literal::Number(l)) => {
            Ok(n.as_f64().zip(l.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)))
        }
        (Value::Bool(_), _) => Err(ScimError::invalid_filter(
            "boolean values have no defined ordering",
            None,
        )),
        _ => Ok(None),
    }
}

type DatePair = (DateTime<chrono::FixedOffset>, DateTime<chrono::FixedOffset>);

fn parse_date_pair(a: &str, b: &str) -> Option<DatePair> {
    let a = DateTime::parse_from_rfc3339(a).ok()?;
    let b = DateTime::parse_from_rfc3339(b).ok()?;
    Some((a, b))
}

fn ordering_matches(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        _ => false,
    }
}

fn expect_string_literal(cmp: &Compare) -> ScimResult<&str> {
    match cmp.literal.as_ref() {
        Some(Literal::String(s)) => Ok(s),
        _ => Err(ScimError::invalid_filter(
            format!("operator '{}' requires a string literal", cmp.op),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn emails_def() -> AttributeDefinition {
        let registry = SchemaRegistry::with_embedded_schemas().unwrap();
        registry
            .resolve_attribute("User", "emails")
            .unwrap()
            .attribute
            .clone()
    }

    fn eval(filter: &str, candidate: Value) -> bool {
        let parsed = parse_filter(filter).unwrap();
        matches(&parsed, &candidate, Some(&emails_def())).unwrap()
    }

    #[test]
    fn eq_is_case_insensitive_unless_case_exact() {
        assert!(eval("type eq \"WORK\"", json!({"type": "work"})));
        assert!(!eval("type eq \"play\"", json!({"type": "work"})));
    }

    #[test]
    fn ne_matches_missing_attribute() {
        assert!(eval("type ne \"work\"", json!({"value": "a@x"})));
        assert!(!eval("type ne \"work\"", json!({"type": "work"})));
        assert!(eval("type ne \"work\"", json!({"type": "home"})));
    }

    #[test]
    fn substring_operators() {
        let candidate = json!({"value": "barbara@example.com"});
        assert!(eval("value co \"@example\"", candidate.clone()));
        assert!(eval("value sw \"Barbara\"", candidate.clone()));
        assert!(eval("value ew \".COM\"", candidate.clone()));
        assert!(!eval("value co \"nothing\"", candidate));
    }

    #[test]
    fn substring_requires_string_literal() {
        let parsed = parse_filter("value co 3").unwrap();
        let err = matches(&parsed, &json!({"value": "x"}), None).unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter { .. }));
    }

    #[test]
    fn presence_semantics() {
        assert!(eval("value pr", json!({"value": "a@x"})));
        assert!(!eval("value pr", json!({"value": ""})));
        assert!(!eval("value pr", json!({"value": null})));
        assert!(!eval("value pr", json!({"type": "work"})));
        assert!(eval("primary pr", json!({"primary": false})));
    }

    #[test]
    fn missing_attribute_is_false_for_all_but_ne() {
        let candidate = json!({"type": "work"});
        assert!(!eval("value eq \"a\"", candidate.clone()));
        assert!(!eval("value co \"a\"", candidate.clone()));
        assert!(!eval("value sw \"a\"", candidate.clone()));
        assert!(!eval("value gt \"a\"", candidate.clone()));
        assert!(eval("value ne \"a\"", candidate));
    }

    #[test]
    fn logical_operators_combine() {
        let candidate = json!({"type": "work", "value": "a@x", "primary": true});
        assert!(eval("type eq \"work\" and primary eq true", candidate.clone()));
        assert!(eval("type eq \"home\" or primary eq true", candidate.clone()));
        assert!(!eval(
            "not (type eq \"work\" and primary eq true)",
            candidate.clone()
        ));
        assert!(eval("(type eq \"home\") or (value pr)", candidate));
    }

    #[test]
    fn boolean_literal_type_mismatch_is_invalid_filter() {
        let parsed = parse_filter("type eq true").unwrap();
        let err = matches(&parsed, &json!({"type": "work"}), Some(&emails_def())).unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter { .. }));
    }

    #[test]
    fn number_literal_against_string_attribute_is_invalid_filter() {
        let parsed = parse_filter("value eq 42").unwrap();
        let err = matches(&parsed, &json!({"value": "a"}), Some(&emails_def())).unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter { .. }));
    }

    #[test]
    fn date_time_orders_chronologically() {
        // Offset notation differs but the instants are ordered.
        let candidate = json!({"lastUsed": "2024-06-01T12:00:00+02:00"});
        let parsed = parse_filter("lastUsed gt \"2024-06-01T09:00:00Z\"").unwrap();
        assert!(matches(&parsed, &candidate, None).unwrap());
        let parsed = parse_filter("lastUsed lt \"2024-06-01T11:00:00Z\"").unwrap();
        assert!(matches(&parsed, &candidate, None).unwrap());
    }

    #[test]
    fn string_ordering_uses_code_points() {
        let candidate = json!({"value": "b"});
        assert!(eval("value gt \"a\"", candidate.clone()));
        assert!(eval("value le \"b\"", candidate.clone()));
        assert!(!eval("value lt \"B\"", candidate)); // 'b' > 'B' by code point
    }

    #[test]
    fn numeric_ordering() {
        let candidate = json!({"weight": 10});
        let parsed = parse_filter("weight ge 10").unwrap();
        assert!(matches(&parsed, &candidate, None).unwrap());
        let parsed = parse_filter("weight gt 10.5").unwrap();
        assert!(!matches(&parsed, &candidate, None).unwrap());
    }

    #[test]
    fn multi_valued_operand_matches_any_element() {
        let candidate = json!({"tags": ["alpha", "beta"]});
        let parsed = parse_filter("tags eq \"beta\"").unwrap();
        assert!(matches(&parsed, &candidate, None).unwrap());
        let parsed = parse_filter("tags eq \"gamma\"").unwrap();
        assert!(!matches(&parsed, &candidate, None).unwrap());
    }

    #[test]
    fn dotted_operand_path() {
        let candidate = json!({"name": {"givenName": "Barbara"}});
        let parsed = parse_filter("name.givenName sw \"barb\"").unwrap();
        assert!(matches(&parsed, &candidate, None).unwrap());
    }

    #[test]
    fn evaluate_filter_returns_sorted_unique_indices() {
        let array = vec![
            json!({"type": "work", "value": "a@x"}),
            json!({"type": "home", "value": "b@x"}),
            json!({"type": "work", "value": "c@x"}),
        ];
        let parsed = parse_filter("type eq \"work\"").unwrap();
        let indices = evaluate_filter_with(&parsed, &array, Some(&emails_def())).unwrap();
        assert_eq!(indices, vec![0, 2]);

        let none = parse_filter("type eq \"other\"").unwrap();
        assert!(evaluate_filter_with(&none, &array, Some(&emails_def()))
            .unwrap()
            .is_empty());
    }
}
