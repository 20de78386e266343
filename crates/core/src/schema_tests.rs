// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{sample_registry, SAMPLE_SCHEMAS};

#[test]
fn sample_layouts_are_packed() {
    let registry = sample_registry();

    let sid = registry.resolve("session-id").unwrap();
    assert_eq!(sid.size(), 4);

    let endpoint = registry.resolve("endpoint").unwrap();
    let offsets: Vec<(&str, usize, usize)> = endpoint
        .fields()
        .map(|f| (f.name(), f.offset(), f.size()))
        .collect();
    assert_eq!(offsets, vec![("addr", 0, 17), ("port", 17, 2), ("name", 19, 16)]);
    assert_eq!(endpoint.size(), 35);

    let target = registry.resolve("target").unwrap();
    let hops = target.field("hops").unwrap();
    assert_eq!(hops.offset(), 4);
    assert_eq!(hops.element_size(), 35);
    assert_eq!(hops.element_offset(1), 39);
    assert_eq!(target.size(), 4 + 70 + 16 + 8);
}

#[test]
fn resolve_unknown_schema_fails() {
    let err = sample_registry().resolve("missing").unwrap_err();
    assert_eq!(err, SchemaError::UnknownSchema("missing".to_string()));
}

#[test]
fn unknown_field_fails() {
    let schema = sample_registry().resolve("session-id").unwrap();
    let err = schema.field("nope").unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnknownField {
            schema: "session-id".to_string(),
            field: "nope".to_string(),
        }
    );
}

#[test]
fn resolve_returns_cached_layout() {
    let registry = sample_registry();
    let a = registry.resolve("target").unwrap();
    let b = registry.resolve("target").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn nested_field_points_at_registered_schema() {
    let registry = sample_registry();
    let target = registry.resolve("target").unwrap();
    let nested = target.field("sid").unwrap().nested().unwrap();
    assert!(Arc::ptr_eq(nested, &registry.resolve("session-id").unwrap()));
}

#[test]
fn same_layout_across_registries() {
    let a = sample_registry().resolve("target").unwrap();
    let b = sample_registry().resolve("target").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(a.same_layout(&b));
    assert!(a.same_layout(&a));
}

#[test]
fn same_layout_compares_nested_schemas() {
    let sample = sample_registry().resolve("target").unwrap();

    // same names and total size, but `endpoint` is laid out differently
    let other = SchemaRegistry::new();
    other
        .load_toml(
            r#"
[schema.session-id]
fields = [{ name = "id", type = "u32" }]

[schema.endpoint]
fields = [
    { name = "port", type = "u16" },
    { name = "addr", type = "addr" },
    { name = "name", type = "u8", len = 16 },
]

[schema.target]
fields = [
    { name = "sid", type = "record", schema = "session-id" },
    { name = "hops", type = "record", schema = "endpoint", len = 2 },
    { name = "flags", type = "u32", len = 4 },
    { name = "weight", type = "f64" },
]
"#,
        )
        .unwrap();
    let reordered = other.resolve("target").unwrap();

    assert_eq!(sample.size(), reordered.size());
    assert!(!sample.same_layout(&reordered));
    assert!(!sample
        .field("sid")
        .unwrap()
        .nested()
        .unwrap()
        .same_layout(&sample_registry().resolve("endpoint").unwrap()));
}

#[test]
fn reregistering_identical_definition_is_noop() {
    let registry = sample_registry();
    let before = registry.resolve("session-id").unwrap();
    let again = registry
        .register(SchemaDef::new("session-id", vec![FieldDef::scalar("id", Kind::U32)]))
        .unwrap();
    assert!(Arc::ptr_eq(&before, &again));
}

#[test]
fn reregistering_different_layout_conflicts() {
    let registry = sample_registry();
    let err = registry
        .register(SchemaDef::new("session-id", vec![FieldDef::scalar("id", Kind::U64)]))
        .unwrap_err();
    assert_eq!(err, SchemaError::Conflict("session-id".to_string()));
    assert_eq!(registry.resolve("session-id").unwrap().size(), 4);
}

#[yare::parameterized(
    string_field = { FieldDef::scalar("s", Kind::String) },
    bytes_field  = { FieldDef::array("b", Kind::Bytes, 4) },
)]
fn variable_width_kinds_are_rejected(field: FieldDef) {
    let err = SchemaRegistry::new()
        .register(SchemaDef::new("bad", vec![field]))
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedFieldKind { .. }));
}

#[test]
fn record_field_needs_schema_name() {
    let field = FieldDef {
        name: "r".to_string(),
        kind: Kind::Record,
        arity: 0,
        schema: None,
    };
    let err = SchemaRegistry::new()
        .register(SchemaDef::new("bad", vec![field]))
        .unwrap_err();
    assert!(matches!(err, SchemaError::MissingNestedSchema { .. }));
}

#[test]
fn scalar_field_with_schema_name_is_rejected() {
    let field = FieldDef {
        schema: Some("session-id".to_string()),
        ..FieldDef::scalar("n", Kind::U8)
    };
    let err = sample_registry()
        .register(SchemaDef::new("bad", vec![field]))
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnexpectedNestedSchema { .. }));
}

#[test]
fn duplicate_and_empty_definitions_are_rejected() {
    let registry = SchemaRegistry::new();
    let dup = SchemaDef::new(
        "dup",
        vec![FieldDef::scalar("a", Kind::U8), FieldDef::scalar("a", Kind::U16)],
    );
    assert!(matches!(
        registry.register(dup).unwrap_err(),
        SchemaError::DuplicateField { .. }
    ));
    assert_eq!(
        registry.register(SchemaDef::new("empty", vec![])).unwrap_err(),
        SchemaError::EmptySchema("empty".to_string())
    );
    assert!(registry.names().is_empty());
}

#[test]
fn register_requires_nested_schema_first() {
    let err = SchemaRegistry::new()
        .register(SchemaDef::new("outer", vec![FieldDef::record("inner", "inner")]))
        .unwrap_err();
    assert_eq!(err, SchemaError::UnknownSchema("inner".to_string()));
}

#[test]
fn load_toml_orders_by_dependency() {
    // target is declared before its dependencies in the sample file
    let registry = SchemaRegistry::new();
    let loaded = registry.load_toml(SAMPLE_SCHEMAS).unwrap();
    let names: Vec<&str> = loaded.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["endpoint", "session-id", "target"]);
    assert_eq!(registry.names(), vec!["endpoint", "session-id", "target"]);
}

#[test]
fn load_toml_detects_cycles() {
    let text = r#"
[schema.a]
fields = [{ name = "b", type = "record", schema = "b" }]

[schema.b]
fields = [{ name = "a", type = "record", schema = "a" }]
"#;
    let err = SchemaRegistry::new().load_toml(text).unwrap_err();
    assert!(matches!(err, SchemaError::NestedSchemaCycle(_)));
}

#[test]
fn load_toml_reports_missing_dependency() {
    let text = r#"
[schema.a]
fields = [{ name = "x", type = "record", schema = "ghost" }]
"#;
    let err = SchemaRegistry::new().load_toml(text).unwrap_err();
    assert_eq!(err, SchemaError::UnknownSchema("ghost".to_string()));
}

#[yare::parameterized(
    not_toml     = { "[schema" },
    unknown_kind = { "[schema.a]\nfields = [{ name = \"x\", type = \"u128\" }]" },
    no_fields    = { "[schema.a]\nsize = 4" },
)]
fn load_toml_rejects_malformed_files(text: &str) {
    let err = SchemaRegistry::new().load_toml(text).unwrap_err();
    assert!(matches!(err, SchemaError::Toml(_)));
}

#[test]
fn definition_round_trips() {
    let registry = sample_registry();
    let def = registry.resolve("target").unwrap().definition();
    assert_eq!(def.fields[1], FieldDef::record_array("hops", "endpoint", 2));

    let other = SchemaRegistry::new();
    other.load_toml(SAMPLE_SCHEMAS).unwrap();
    assert_eq!(other.register(def.clone()).unwrap().definition(), def);
}

#[test]
fn global_registry_is_shared() {
    let name = "schema-tests-global";
    SchemaRegistry::global()
        .register(SchemaDef::new(name, vec![FieldDef::scalar("v", Kind::I8)]))
        .unwrap();
    assert!(SchemaRegistry::global().contains(name));
}
