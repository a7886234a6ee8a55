//! Oracle Scenario Tests
//!
//! End-to-end checks of the public oracles on hand-written schemas.

use familiar_schema_logic::extract::{ExtractionPlugin, Extractor};
use familiar_schema_logic::validator::ValidationPlugin;
use familiar_schema_logic::{
    schema_describes_empty_set, schema_describes_subset, schemas_are_equivalent, to_dnf, BuiltinPlugin, JsonType,
    Literal, Logic, LogicError, Options, Plugin,
};
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

fn empty(schema: Value) -> Option<bool> {
    schema_describes_empty_set(&schema, &Options::default()).unwrap()
}

fn subset(a: Value, b: Value) -> Option<bool> {
    schema_describes_subset(&a, &b, &Options::default()).unwrap()
}

fn equivalent(a: Value, b: Value) -> Option<bool> {
    schemas_are_equivalent(&a, &b, &Options::default()).unwrap()
}

fn dnf(schema: Value) -> Value {
    to_dnf(&schema, &Options::default()).unwrap().to_json_schema()
}

/// Reference validation of a concrete value.
fn accepts(schema: &Value, instance: &Value) -> bool {
    JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(schema)
        .expect("schema compiles")
        .is_valid(instance)
}

/// `a` is not a subset of `b`, with `witness` in `a` and outside `b`.
fn assert_escapes(a: Value, b: Value, witness: Value) {
    assert!(accepts(&a, &witness), "{} rejects {}", a, witness);
    assert!(!accepts(&b, &witness), "{} accepts {}", b, witness);
    assert_eq!(subset(a, b), Some(false));
}

/// `schema` is inhabited, with `witness` as a member.
fn assert_inhabited(schema: Value, witness: Value) {
    assert!(accepts(&schema, &witness), "{} rejects {}", schema, witness);
    assert_eq!(empty(schema), Some(false));
}

// =============================================================================
// Numbers
// =============================================================================

#[test]
fn test_step_outside_range_is_empty() {
    // typed form; the bare keywords below still admit non-numbers
    assert_eq!(empty(json!({"type": "number", "minimum": 2, "maximum": 8, "multipleOf": 10})), Some(true));
}

#[test]
fn test_numeric_keywords_do_not_constrain_other_types() {
    // null still satisfies the bare numeric constraints
    assert_inhabited(json!({"minimum": 2, "maximum": 8, "multipleOf": 10}), json!(null));
}

#[test]
fn test_progression_covered_by_exclusions() {
    let narrow = json!({"minimum": 10, "maximum": 30, "multipleOf": 5});
    let wide = json!({"anyOf": [{"multipleOf": 3}, {"multipleOf": 20}, {"enum": [10, 25]}]});
    assert_eq!(subset(narrow, wide), Some(true));
}

#[test]
fn test_progression_with_a_gap() {
    let narrow = json!({"type": "number", "minimum": 10, "maximum": 35, "multipleOf": 5});
    let wide = json!({"anyOf": [{"multipleOf": 3}, {"multipleOf": 20}, {"enum": [10, 25]}]});
    // 35 escapes every exclusion
    assert_escapes(narrow, wide, json!(35));
}

#[test]
fn test_huge_integer_range() {
    let schema = json!({"type": "integer", "minimum": -1e38, "maximum": 1e38});
    assert_ne!(empty(schema.clone()), Some(true));
    assert!(accepts(&schema, &json!(0)));
}

#[test]
fn test_integer_is_a_number() {
    assert_eq!(subset(json!({"type": "integer"}), json!({"type": ["number", "string", "boolean"]})), Some(true));
    assert_escapes(json!({"type": "number"}), json!({"type": "integer"}), json!(0.5));
}

#[test]
fn test_exclusive_bounds() {
    assert_eq!(empty(json!({"type": "number", "exclusiveMinimum": 5, "maximum": 5})), Some(true));
    assert_eq!(empty(json!({"type": "integer", "exclusiveMinimum": 1, "exclusiveMaximum": 2})), Some(true));
    assert_inhabited(json!({"type": "number", "exclusiveMinimum": 1, "exclusiveMaximum": 2}), json!(1.5));
}

#[test]
fn test_single_survivor_becomes_const() {
    let schema = json!({"type": "integer", "minimum": 1, "maximum": 3, "not": {"enum": [1, 3]}});
    assert_eq!(dnf(schema), json!({"anyOf": [{"const": 2}]}));
}

#[test]
fn test_fractional_steps() {
    assert_eq!(empty(json!({"type": "number", "minimum": 0.2, "maximum": 0.4, "multipleOf": 0.5})), Some(true));
    assert_eq!(subset(json!({"multipleOf": 0.5}), json!({"multipleOf": 0.25})), Some(true));
    assert_escapes(json!({"multipleOf": 0.25}), json!({"multipleOf": 0.5}), json!(0.25));
}

// =============================================================================
// Strings
// =============================================================================

#[test]
fn test_length_bounds() {
    assert_eq!(empty(json!({"type": "string", "minLength": 3, "maxLength": 2})), Some(true));
    assert_eq!(
        subset(json!({"type": "string", "minLength": 3}), json!({"type": "string", "minLength": 2})),
        Some(true)
    );
}

#[test]
fn test_no_string_exceeds_the_largest_length() {
    assert_eq!(empty(json!({"type": "string", "not": {"maxLength": u64::MAX}})), Some(true));
    assert_eq!(empty(json!({"type": "array", "not": {"maxItems": u64::MAX}})), Some(true));
    assert_eq!(empty(json!({"type": "object", "not": {"maxProperties": u64::MAX}})), Some(true));
}

#[test]
fn test_unequal_patterns_are_undecided() {
    assert_eq!(subset(json!({"pattern": "^[abc]{3}$"}), json!({"pattern": "^[abc]{2,3}$"})), None);
}

#[test]
fn test_equal_patterns_are_decided() {
    assert_eq!(
        subset(json!({"type": "string", "pattern": "^a"}), json!({"pattern": "^a"})),
        Some(true)
    );
}

#[test]
fn test_empty_string_only() {
    assert_eq!(equivalent(json!({"type": "string", "maxLength": 0}), json!({"const": ""})), Some(true));
}

#[test]
fn test_format_stays_in_dnf() {
    assert_eq!(
        dnf(json!({"type": "string", "format": "email"})),
        json!({"anyOf": [{"type": "string", "format": "email"}]})
    );
}

// =============================================================================
// Arrays
// =============================================================================

#[test]
fn test_max_items_zero() {
    assert_eq!(
        dnf(json!({"maxItems": 0})),
        json!({"anyOf": [
            {"const": null},
            {"const": true},
            {"const": false},
            {"type": "number"},
            {"type": "string"},
            {"const": []},
            {"type": "object"}
        ]})
    );
}

#[test]
fn test_items_imply_contains() {
    let a = json!({"type": "array", "items": {"type": "integer"}, "minItems": 1});
    assert_eq!(subset(a, json!({"contains": {"type": "number"}})), Some(true));
}

#[test]
fn test_items_subsumption() {
    assert_eq!(
        subset(json!({"type": "array", "items": {"type": "integer"}}), json!({"items": {"type": "number"}})),
        Some(true)
    );
    assert_escapes(
        json!({"type": "array", "items": {"type": "number"}}),
        json!({"items": {"type": "integer"}}),
        json!([0.5]),
    );
}

#[test]
fn test_empty_prefix_slot_caps_length() {
    let schema = json!({"type": "array", "prefixItems": [true, false], "minItems": 2});
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_unique_items_pigeonhole() {
    assert_eq!(
        empty(json!({"type": "array", "items": {"enum": [1, 2]}, "uniqueItems": true, "minItems": 3})),
        Some(true)
    );
    assert_eq!(
        empty(json!({"type": "array", "prefixItems": [{"const": 1}, {"const": 1}], "uniqueItems": true, "minItems": 2})),
        Some(true)
    );
}

#[test]
fn test_contains_bounds_conflict() {
    let schema = json!({
        "type": "array",
        "contains": {"type": "integer"},
        "minContains": 2,
        "allOf": [{"contains": {"type": "number"}, "maxContains": 1}]
    });
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_contains_needs_room() {
    let schema = json!({"type": "array", "contains": {"type": "string"}, "minContains": 3, "maxItems": 2});
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_contains_pinned_to_prefix() {
    let closed = json!({
        "type": "array",
        "prefixItems": [true, true],
        "items": false,
        "contains": {"const": 1},
        "minContains": 2
    });
    assert_inhabited(closed.clone(), json!([1, 1]));

    let mut unique = closed;
    unique["uniqueItems"] = json!(true);
    assert_eq!(empty(unique), Some(true));
}

#[test]
fn test_contains_narrows_the_only_host() {
    let schema = json!({
        "type": "array",
        "prefixItems": [{"type": "string"}, true],
        "items": false,
        "contains": {"type": "number"},
        "minItems": 2
    });
    let out = dnf(schema.clone());
    assert_eq!(out["anyOf"][0]["prefixItems"], json!([{"type": "string"}, {"type": "number"}]));
    assert_ne!(equivalent(schema, out), Some(false));
}

// =============================================================================
// Objects
// =============================================================================

#[test]
fn test_required_property_subsumption() {
    let typed = json!({"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]});
    let bare = json!({"type": "object", "required": ["a"]});
    assert_eq!(subset(typed.clone(), bare.clone()), Some(true));
    assert_escapes(bare, typed, json!({"a": 1}));
}

#[test]
fn test_too_many_required_keys() {
    assert_eq!(empty(json!({"type": "object", "required": ["a", "b"], "maxProperties": 1})), Some(true));
}

#[test]
fn test_closed_object_rejects_unknown_required_key() {
    let schema = json!({
        "type": "object",
        "properties": {"a": {}},
        "additionalProperties": false,
        "required": ["b"]
    });
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_property_names_reject_required_key() {
    let schema = json!({"type": "object", "propertyNames": {"maxLength": 1}, "required": ["ab"]});
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_disjoint_name_obligations_need_separate_keys() {
    let schema = json!({
        "type": "object",
        "maxProperties": 1,
        "allOf": [
            {"not": {"propertyNames": {"maxLength": 1}}},
            {"not": {"propertyNames": {"minLength": 1}}}
        ]
    });
    assert_eq!(empty(schema.clone()), Some(true));

    let mut roomy = schema;
    roomy["maxProperties"] = json!(2);
    assert_ne!(empty(roomy.clone()), Some(true));
    assert!(accepts(&roomy, &json!({"": 0, "ab": 0})));
}

#[test]
fn test_pattern_properties_apply_to_named_keys() {
    let schema = json!({
        "type": "object",
        "patternProperties": {"^x": {"type": "string"}},
        "properties": {"xa": {"type": "integer"}},
        "required": ["xa"]
    });
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_additional_properties_subsumption() {
    let a = json!({"type": "object", "additionalProperties": {"type": "string"}});
    let b = json!({"additionalProperties": {"type": ["string", "number"]}});
    assert_eq!(subset(a, b), Some(true));
}

#[test]
fn test_dependent_required() {
    let schema = json!({
        "type": "object",
        "dependentRequired": {"a": ["b"]},
        "required": ["a"],
        "properties": {"b": false}
    });
    assert_eq!(empty(schema), Some(true));
}

// =============================================================================
// Logic keywords
// =============================================================================

#[test]
fn test_if_then_else() {
    let schema = json!({"if": {"type": "string"}, "then": {"minLength": 2}, "else": false, "maxLength": 1});
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_one_of_excludes_overlap() {
    let schema = json!({"oneOf": [{"type": "integer"}, {"type": "number"}], "multipleOf": 1});
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_double_negation_round_trip() {
    let inner = json!({"type": "string"});
    let literals = vec![
        json!({"minimum": 3}),
        json!({"maximum": 3}),
        json!({"multipleOf": 3}),
        json!({"minLength": 2}),
        json!({"maxLength": 2}),
        json!({"pattern": "^a"}),
        json!({"format": "date"}),
        json!({"minItems": 2}),
        json!({"maxItems": 2}),
        json!({"uniqueItems": true}),
        json!({"prefixItems": [true, inner.clone()]}),
        json!({"items": inner.clone()}),
        json!({"contains": inner.clone()}),
        json!({"required": ["a"]}),
        json!({"properties": {"a": inner.clone()}}),
        json!({"patternProperties": {"^a": inner.clone()}}),
        json!({"additionalProperties": inner.clone()}),
        json!({"propertyNames": {"maxLength": 3}}),
        json!({"minProperties": 2}),
        json!({"maxProperties": 2}),
        json!({"type": "boolean"}),
        json!({"const": {"a": [1]}}),
    ];
    for literal in literals {
        let doubled = json!({"not": {"not": literal.clone()}});
        assert_eq!(subset(literal.clone(), doubled.clone()), Some(true), "{} ⊆ ¬¬", literal);
        assert_eq!(subset(doubled, literal.clone()), Some(true), "¬¬ ⊆ {}", literal);
    }
}

// =============================================================================
// DNF
// =============================================================================

#[test]
fn test_dnf_is_equivalent_and_idempotent() {
    let schema = json!({"anyOf": [{"type": "string", "minLength": 2}, {"type": "integer", "minimum": 0}]});
    let once = dnf(schema.clone());
    assert_eq!(
        once,
        json!({"anyOf": [{"type": "string", "minLength": 2}, {"type": "integer", "minimum": 0}]})
    );
    assert_eq!(equivalent(schema, once.clone()), Some(true));
    assert_eq!(dnf(once.clone()), once);
}

#[test]
fn test_dnf_of_trivial_schemas() {
    assert_eq!(dnf(json!({})), json!(true));
    assert_eq!(dnf(json!({"type": "string", "minLength": 2, "maxLength": 1})), json!(false));
}

// =============================================================================
// References
// =============================================================================

#[test]
fn test_local_reference() {
    let schema = json!({
        "$defs": {"positive": {"type": "integer", "minimum": 1}},
        "$ref": "#/$defs/positive",
        "maximum": 0
    });
    assert_eq!(empty(schema), Some(true));
}

#[test]
fn test_shared_definition() {
    let options = Options::new().with_definition(
        "https://example.com/positive.json",
        json!({"type": "integer", "minimum": 1}),
    );
    let schema = json!({"$ref": "https://example.com/positive.json", "maximum": 0});
    assert_eq!(schema_describes_empty_set(&schema, &options).unwrap(), Some(true));
}

#[test]
fn test_relative_reference_against_base_uri() {
    let options = Options::new()
        .with_base_uri("https://example.com/schemas/root.json")
        .with_definition("https://example.com/schemas/name.json", json!({"type": "string"}));
    let a = json!({"$ref": "name.json"});
    assert_eq!(schema_describes_subset(&a, &json!({"type": "string"}), &options).unwrap(), Some(true));
}

#[test]
fn test_recursive_reference_terminates() {
    let schema = json!({
        "$id": "https://example.com/tree.json",
        "type": "object",
        "properties": {"child": {"$ref": "#"}},
        "required": ["child"]
    });
    assert_eq!(empty(schema), None);
}

#[test]
fn test_relative_reference_without_base_fails() {
    let result = schema_describes_empty_set(&json!({"$ref": "other.json"}), &Options::default());
    assert!(matches!(result, Err(LogicError::UnresolvableReference { .. })));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unsupported_keyword_surfaces() {
    let result = schema_describes_empty_set(&json!({"unevaluatedItems": false}), &Options::default());
    assert!(matches!(result, Err(LogicError::UnsupportedKeyword { .. })));
}

#[test]
fn test_contradiction_outranks_unsupported_keyword() {
    let schema = json!({"type": "array", "unevaluatedItems": false, "minItems": 3, "maxItems": 1});
    assert_eq!(empty(schema), Some(true));
}

// =============================================================================
// Plugins
// =============================================================================

/// `x-even: true` holds for even numbers
struct EvenExtraction;

impl ExtractionPlugin for EvenExtraction {
    fn id(&self) -> &str {
        "x-even"
    }

    fn keywords(&self) -> &[&str] {
        &["x-even"]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> familiar_schema_logic::Result<Logic> {
        Ok(Logic::lit(Literal::Keyword {
            keyword: "x-even".into(),
            value: schema["x-even"].clone(),
            applies_to: Some(JsonType::Number),
        }))
    }
}

struct EvenValidation;

impl ValidationPlugin for EvenValidation {
    fn id(&self) -> &str {
        "x-even"
    }

    fn validate(&self, schema: &Value, instance: &Value) -> Option<bool> {
        let wanted = schema.get("x-even")?.as_bool()?;
        let even = instance.as_i64().map(|n| n % 2 == 0)?;
        Some(even == wanted)
    }
}

fn even_options() -> Options {
    Options::new()
        .with_plugin(Plugin::extraction(EvenExtraction))
        .with_plugin(Plugin::validation(EvenValidation))
}

#[test]
fn test_custom_keyword_on_consts() {
    let options = even_options();
    let odd = json!({"x-even": true, "const": 3});
    let even = json!({"x-even": true, "const": 4});
    assert_eq!(schema_describes_empty_set(&odd, &options).unwrap(), Some(true));
    assert_eq!(schema_describes_empty_set(&even, &options).unwrap(), Some(false));
    assert!(accepts(&even, &json!(4)));
}

#[test]
fn test_custom_keyword_is_opaque_elsewhere() {
    let options = even_options();
    let schema = json!({"type": "integer", "x-even": true});
    assert_eq!(schema_describes_empty_set(&schema, &options).unwrap(), None);
}

#[test]
fn test_conflicting_overrides_are_rejected() {
    struct Replacement;

    impl ValidationPlugin for Replacement {
        fn id(&self) -> &str {
            "replacement"
        }

        fn overrides(&self) -> Option<BuiltinPlugin> {
            Some(BuiltinPlugin::JsonSchemaValidation)
        }

        fn validate(&self, _: &Value, _: &Value) -> Option<bool> {
            None
        }
    }

    let options = Options::new()
        .with_plugin(Plugin::validation(Replacement))
        .with_plugin(Plugin::validation(Replacement));
    let result = schema_describes_empty_set(&json!({}), &options);
    assert!(matches!(result, Err(LogicError::PluginConfiguration(_))));
}
