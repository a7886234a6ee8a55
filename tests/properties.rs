//! Property Tests
//!
//! Generated schemas and instances checked against the `jsonschema`
//! validator. Undecided answers are always acceptable; a decided answer
//! must never be contradicted by a concrete value.

use familiar_schema_logic::{
    schema_describes_empty_set, schema_describes_subset, schemas_are_equivalent, to_dnf, Options,
};
use jsonschema::{Draft, JSONSchema};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Schemas over numbers, lengths, arrays and objects, without patterns.
fn schema_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(json!(true)),
        Just(json!(false)),
        prop_oneof![
            Just("null"),
            Just("boolean"),
            Just("integer"),
            Just("number"),
            Just("string"),
            Just("array"),
            Just("object")
        ]
        .prop_map(|t| json!({ "type": t })),
        (-3i64..10).prop_map(|n| json!({ "minimum": n })),
        (-3i64..10).prop_map(|n| json!({ "maximum": n })),
        (-3i64..10).prop_map(|n| json!({ "exclusiveMinimum": n })),
        (1i64..5).prop_map(|n| json!({ "multipleOf": n })),
        (0u64..4).prop_map(|n| json!({ "minLength": n })),
        (0u64..4).prop_map(|n| json!({ "maxLength": n })),
        (0u64..3).prop_map(|n| json!({ "minItems": n })),
        (0u64..3).prop_map(|n| json!({ "maxItems": n })),
        Just(json!({ "uniqueItems": true })),
        prop_oneof![Just("a"), Just("b")].prop_map(|k| json!({ "required": [k] })),
        (0u64..3).prop_map(|n| json!({ "maxProperties": n })),
        (-2i64..3).prop_map(|n| json!({ "const": n })),
        Just(json!({ "enum": [1, "a", null] })),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| json!({ "not": s })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|v| json!({ "allOf": v })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|v| json!({ "anyOf": v })),
            inner.clone().prop_map(|s| json!({ "items": s })),
            inner.clone().prop_map(|s| json!({ "contains": s })),
            inner.clone().prop_map(|s| json!({ "properties": { "a": s } })),
            inner.prop_map(|s| json!({ "additionalProperties": s })),
        ]
    })
}

fn instance_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-4i64..12).prop_map(|n| json!(n)),
        Just(json!(2.5)),
        "[ab]{0,4}".prop_map(Value::String),
    ];
    leaf.prop_recursive(2, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[abc]", inner, 0..3)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Schemas whose leaves only name finitely many values. Every value
/// outside `universe()` behaves like `"z"`, so any difference between two
/// such schemas shows up on the universe.
fn finite_schema_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(json!(true)),
        Just(json!(false)),
        Just(json!({ "type": "null" })),
        Just(json!({ "type": "boolean" })),
        (-2i64..3).prop_map(|n| json!({ "const": n })),
        Just(json!({ "enum": [1, "a", null] })),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| json!({ "not": s })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|v| json!({ "allOf": v })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|v| json!({ "anyOf": v })),
            prop::collection::vec(inner, 1..3).prop_map(|v| json!({ "oneOf": v })),
        ]
    })
}

fn universe() -> Vec<Value> {
    vec![
        json!(null),
        json!(true),
        json!(false),
        json!(-2),
        json!(-1),
        json!(0),
        json!(1),
        json!(2),
        json!("a"),
        json!("z"),
    ]
}

fn is_valid(schema: &Value, instance: &Value) -> bool {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(schema)
        .expect("generated schemas compile");
    compiled.is_valid(instance)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// An empty schema rejects every generated value.
    #[test]
    fn empty_schemas_reject_everything(
        schema in schema_strategy(),
        instances in prop::collection::vec(instance_strategy(), 1..8),
    ) {
        if schema_describes_empty_set(&schema, &Options::default()).unwrap() == Some(true) {
            for instance in &instances {
                prop_assert!(!is_valid(&schema, instance), "{} accepts {}", schema, instance);
            }
        }
    }

    /// A proven subset never admits a value outside its superset.
    #[test]
    fn subsets_are_sound(
        a in schema_strategy(),
        b in schema_strategy(),
        instances in prop::collection::vec(instance_strategy(), 1..8),
    ) {
        if schema_describes_subset(&a, &b, &Options::default()).unwrap() == Some(true) {
            for instance in &instances {
                prop_assert!(!is_valid(&a, instance) || is_valid(&b, instance), "{} ⊄ {} at {}", a, b, instance);
            }
        }
    }

    /// Double negation never changes the value set.
    #[test]
    fn double_negation_is_not_distinguishable(schema in schema_strategy()) {
        let doubled = json!({ "not": { "not": schema.clone() } });
        prop_assert_ne!(schemas_are_equivalent(&schema, &doubled, &Options::default()).unwrap(), Some(false));
    }

    /// Every refuted subset comes with a value in `a` and outside `b`.
    #[test]
    fn subset_refutations_are_witnessed(a in finite_schema_strategy(), b in finite_schema_strategy()) {
        if schema_describes_subset(&a, &b, &Options::default()).unwrap() == Some(false) {
            let witnessed = universe().iter().any(|v| is_valid(&a, v) && !is_valid(&b, v));
            prop_assert!(witnessed, "no value separates {} from {}", a, b);
        }
        if schema_describes_empty_set(&a, &Options::default()).unwrap() == Some(false) {
            prop_assert!(universe().iter().any(|v| is_valid(&a, v)), "no value inhabits {}", a);
        }
    }

    /// The canonical DNF accepts exactly the values the schema accepts.
    #[test]
    fn dnf_preserves_membership(
        schema in schema_strategy(),
        instances in prop::collection::vec(instance_strategy(), 1..8),
    ) {
        let dnf = to_dnf(&schema, &Options::default()).unwrap().to_json_schema();
        for instance in &instances {
            prop_assert_eq!(is_valid(&schema, instance), is_valid(&dnf, instance), "{} vs {} at {}", schema, dnf, instance);
        }
        prop_assert_ne!(schemas_are_equivalent(&schema, &dnf, &Options::default()).unwrap(), Some(false));
    }
}
