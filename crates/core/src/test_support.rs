// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.
#![allow(clippy::expect_used)]

use crate::{Kind, RecordInstance, SchemaRegistry};

// ── Sample schemas ──────────────────────────────────────────────────────────

/// Schema file used by tests across the workspace.
///
/// - `session-id`: a single `u32` id
/// - `endpoint`: address, port and a 16-byte name buffer
/// - `target`: nested `session-id`, two `endpoint` hops and four `u32` flags
pub const SAMPLE_SCHEMAS: &str = r#"
[schema.target]
fields = [
    { name = "sid", type = "record", schema = "session-id" },
    { name = "hops", type = "record", schema = "endpoint", len = 2 },
    { name = "flags", type = "u32", len = 4 },
    { name = "weight", type = "f64" },
]

[schema.endpoint]
fields = [
    { name = "addr", type = "addr" },
    { name = "port", type = "u16" },
    { name = "name", type = "u8", len = 16 },
]

[schema.session-id]
fields = [{ name = "id", type = "u32" }]
"#;

/// Fresh registry holding [`SAMPLE_SCHEMAS`]
pub fn sample_registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry
        .load_toml(SAMPLE_SCHEMAS)
        .expect("sample schemas are valid");
    registry
}

/// `session-id` record with the given id
pub fn session_id_record(registry: &SchemaRegistry, id: u32) -> RecordInstance {
    let record = RecordInstance::named(registry, "session-id").expect("session-id is registered");
    record.set_u32("id", id).expect("session-id.id is a u32");
    record
}

/// Every integer kind paired with its minimum and maximum as carriers
pub fn integer_bounds() -> Vec<(Kind, i64, i64)> {
    vec![
        (Kind::I8, i64::from(i8::MIN), i64::from(i8::MAX)),
        (Kind::U8, 0, i64::from(u8::MAX)),
        (Kind::I16, i64::from(i16::MIN), i64::from(i16::MAX)),
        (Kind::U16, 0, i64::from(u16::MAX)),
        (Kind::I32, i64::from(i32::MIN), i64::from(i32::MAX)),
        (Kind::U32, 0, i64::from(u32::MAX)),
        (Kind::I64, i64::MIN, i64::MAX),
        (Kind::U64, 0, -1),
    ]
}
