//! Property-based tests for the filter parser, printer, evaluator, and the
//! patch engine's idempotence guarantees.
//!
//! Uses proptest to generate random ASTs and resource data with automatic
//! shrinking on failure.

use proptest::prelude::*;
use scim_patch::filter::{
    evaluate_filter, parse_filter, AttrPath, Compare, CompareOp, FilterExpr, Literal, LogicalOp,
};
use scim_patch::{PatchEngine, PatchOperation, PatchRequest, SchemaRegistry};
use serde_json::{json, Value};

fn attr_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,7}".prop_filter("logical keywords are not attribute names", |name| {
        !matches!(name.to_ascii_lowercase().as_str(), "and" | "or" | "not")
    })
}

fn literal_strategy() -> impl Strategy<Value = Literal> {
    prop_oneof![
        "[ -~]{0,12}".prop_map(Literal::String),
        any::<i64>().prop_map(|n| Literal::Number(n.into())),
        prop::num::f64::NORMAL.prop_map(|f| {
            Literal::Number(serde_json::Number::from_f64(f).expect("normal floats are finite"))
        }),
        any::<bool>().prop_map(Literal::Boolean),
        Just(Literal::Null),
    ]
}

fn compare_strategy() -> impl Strategy<Value = FilterExpr> {
    let ordered = prop::sample::select(vec![
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Co,
        CompareOp::Sw,
        CompareOp::Ew,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Lt,
        CompareOp::Le,
    ]);
    let with_literal = (
        attr_name(),
        prop::option::of(attr_name()),
        ordered,
        literal_strategy(),
    )
        .prop_map(|(name, sub, op, literal)| {
            FilterExpr::Compare(Compare {
                path: AttrPath { uri: None, name, sub },
                op,
                literal: Some(literal),
            })
        });
    let presence = (attr_name(), prop::option::of(attr_name())).prop_map(|(name, sub)| {
        FilterExpr::Compare(Compare {
            path: AttrPath { uri: None, name, sub },
            op: CompareOp::Pr,
            literal: None,
        })
    });
    prop_oneof![4 => with_literal, 1 => presence]
}

fn filter_strategy() -> impl Strategy<Value = FilterExpr> {
    compare_strategy().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(left, right)| FilterExpr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            }),
            (inner.clone(), inner.clone()).prop_map(|(left, right)| FilterExpr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            }),
            inner.clone().prop_map(|f| FilterExpr::Not(Box::new(f))),
            inner.prop_map(|f| FilterExpr::Group(Box::new(f))),
        ]
    })
}

fn email_array() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["work", "home", "other"]),
            "[a-z]{1,6}",
            any::<bool>(),
        )
            .prop_map(|(kind, value, primary)| {
                json!({"type": kind, "value": value, "primary": primary})
            }),
        0..8,
    )
}

proptest! {
    /// Printing a parsed filter and re-parsing the output yields an equal
    /// AST, and the canonical form is a fixed point of print-parse.
    #[test]
    fn printed_filters_reparse_to_equal_asts(ast in filter_strategy()) {
        let printed = ast.to_string();
        let parsed = parse_filter(&printed)
            .expect("every printed filter must be parseable");
        let reprinted = parsed.to_string();
        let reparsed = parse_filter(&reprinted).unwrap();
        prop_assert_eq!(&parsed, &reparsed);
        prop_assert_eq!(reprinted, reparsed.to_string());
    }

    /// The evaluator returns a sorted, duplicate-free subset of the array
    /// index range.
    #[test]
    fn evaluator_returns_sorted_unique_indices(
        array in email_array(),
        filter_text in prop::sample::select(vec![
            "type eq \"work\"",
            "primary eq true",
            "value pr",
            "type ne \"home\"",
            "not (type eq \"other\")",
            "type eq \"work\" and primary eq true",
            "type eq \"home\" or value sw \"a\"",
        ]),
    ) {
        let filter = parse_filter(filter_text).unwrap();
        let indices = evaluate_filter(&filter, &array).unwrap();
        prop_assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert!(indices.iter().all(|&index| index < array.len()));
    }

    /// Negating a filter selects exactly the complement of its matches.
    #[test]
    fn negation_selects_the_complement(array in email_array()) {
        let filter = parse_filter("type eq \"work\"").unwrap();
        let negated = parse_filter("not (type eq \"work\")").unwrap();
        let selected = evaluate_filter(&filter, &array).unwrap();
        let complement = evaluate_filter(&negated, &array).unwrap();
        let mut union: Vec<usize> = selected.iter().chain(complement.iter()).copied().collect();
        union.sort_unstable();
        let expected: Vec<usize> = (0..array.len()).collect();
        prop_assert_eq!(union, expected);
    }

    /// Two successive replaces of the same (path, value) produce identical
    /// resources and the second reports no change.
    #[test]
    fn replace_is_idempotent(
        path in prop::sample::select(vec![
            "userName",
            "displayName",
            "title",
            "nickName",
            "name.givenName",
        ]),
        value in "[a-zA-Z][a-zA-Z ]{0,10}",
    ) {
        let registry = SchemaRegistry::with_embedded_schemas().unwrap();
        let engine = PatchEngine::new(&registry, "User");
        let resource = json!({"userName": "seed"});
        let request =
            PatchRequest::new(vec![PatchOperation::replace(path, json!(value))]);

        let first = engine.apply(&resource, &request).unwrap();
        let second = engine.apply(&first.resource, &request).unwrap();
        prop_assert!(!second.changed);
        prop_assert_eq!(first.resource, second.resource);
    }

    /// A patch reporting no change returns a resource deep-equal to the
    /// input.
    #[test]
    fn unchanged_patches_preserve_the_resource(value in "[a-z]{1,8}") {
        let registry = SchemaRegistry::with_embedded_schemas().unwrap();
        let engine = PatchEngine::new(&registry, "User");
        let resource = json!({"userName": value.clone()});
        let request =
            PatchRequest::new(vec![PatchOperation::replace("userName", json!(value))]);
        let outcome = engine.apply(&resource, &request).unwrap();
        prop_assert!(!outcome.changed);
        prop_assert_eq!(outcome.resource, resource);
    }
}
