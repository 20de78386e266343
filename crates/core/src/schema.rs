// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record schemas and the schema registry
//!
//! A schema is registered once per name and its layout never changes
//! afterwards. Layouts are packed: each field starts where the previous one
//! ends, array fields occupy `arity * element_size` bytes.
//!
//! Schema files use TOML:
//!
//! ```toml
//! [schema.session-id]
//! fields = [{ name = "id", type = "u32" }]
//!
//! [schema.target]
//! fields = [
//!     { name = "sid", type = "record", schema = "session-id" },
//!     { name = "name", type = "u8", len = 32 },
//! ]
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::Kind;

/// Schema definition and lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    #[error("schema {schema} has no field {field}")]
    UnknownField { schema: String, field: String },

    #[error("schema {schema} declares field {field} twice")]
    DuplicateField { schema: String, field: String },

    #[error("schema {0} has no fields")]
    EmptySchema(String),

    #[error("field {schema}.{field} cannot hold {kind} values")]
    UnsupportedFieldKind {
        schema: String,
        field: String,
        kind: Kind,
    },

    #[error("record field {schema}.{field} does not name a nested schema")]
    MissingNestedSchema { schema: String, field: String },

    #[error("field {schema}.{field} is not a record but names a nested schema")]
    UnexpectedNestedSchema { schema: String, field: String },

    #[error("schema {0} is part of a nested schema cycle")]
    NestedSchemaCycle(String),

    #[error("schema {0} is already registered with a different layout")]
    Conflict(String),

    #[error("invalid schema file: {0}")]
    Toml(String),
}

/// Declared field, as written in a schema file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    /// 0 for scalars, N for a fixed-length array
    #[serde(default, rename = "len")]
    pub arity: usize,
    /// Nested schema name for record fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl FieldDef {
    pub fn scalar(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            arity: 0,
            schema: None,
        }
    }

    pub fn array(name: impl Into<String>, kind: Kind, arity: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            arity,
            schema: None,
        }
    }

    pub fn record(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Kind::Record,
            arity: 0,
            schema: Some(schema.into()),
        }
    }

    pub fn record_array(name: impl Into<String>, schema: impl Into<String>, arity: usize) -> Self {
        Self {
            arity,
            ..Self::record(name, schema)
        }
    }
}

/// Named list of field definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl SchemaDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Names of nested schemas this definition refers to
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| f.schema.as_deref())
    }
}

#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    schema: IndexMap<String, SchemaBody>,
}

#[derive(Deserialize)]
struct SchemaBody {
    fields: Vec<FieldDef>,
}

/// Resolved field layout
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    kind: Kind,
    arity: usize,
    nested: Option<Arc<RecordSchema>>,
    offset: usize,
    element_size: usize,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_array(&self) -> bool {
        self.arity > 0
    }

    /// Number of elements (1 for scalars)
    pub fn element_count(&self) -> usize {
        self.arity.max(1)
    }

    pub fn nested(&self) -> Option<&Arc<RecordSchema>> {
        self.nested.as_ref()
    }

    /// Byte offset relative to the start of the enclosing record
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Total bytes occupied by the field
    pub fn size(&self) -> usize {
        self.element_size * self.element_count()
    }

    /// Offset of element `index`, relative to the enclosing record
    pub fn element_offset(&self, index: usize) -> usize {
        self.offset + index * self.element_size
    }

    fn definition(&self) -> FieldDef {
        FieldDef {
            name: self.name.clone(),
            kind: self.kind,
            arity: self.arity,
            schema: self.nested.as_ref().map(|s| s.name.clone()),
        }
    }
}

/// Immutable, resolved structured-record type
#[derive(Debug)]
pub struct RecordSchema {
    name: String,
    fields: IndexMap<String, FieldDescriptor>,
    size: usize,
}

impl RecordSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Result<&FieldDescriptor, SchemaError> {
        self.fields
            .get(name)
            .ok_or_else(|| SchemaError::UnknownField {
                schema: self.name.clone(),
                field: name.to_string(),
            })
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Size of one instance's backing store in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether records of `other` can be stored where `self` is expected.
    ///
    /// Schemas from different registries match when their names and byte
    /// layouts agree all the way down.
    pub fn same_layout(&self, other: &RecordSchema) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.name == other.name
            && self.size == other.size
            && self.fields.len() == other.fields.len()
            && self.fields.values().zip(other.fields.values()).all(|(a, b)| {
                a.name == b.name
                    && a.kind == b.kind
                    && a.arity == b.arity
                    && a.offset == b.offset
                    && a.element_size == b.element_size
                    && match (&a.nested, &b.nested) {
                        (Some(x), Some(y)) => x.same_layout(y),
                        (None, None) => true,
                        _ => false,
                    }
            })
    }

    pub fn definition(&self) -> SchemaDef {
        SchemaDef::new(
            self.name.clone(),
            self.fields.values().map(FieldDescriptor::definition).collect(),
        )
    }

    fn build(
        def: &SchemaDef,
        known: &HashMap<String, Arc<RecordSchema>>,
    ) -> Result<RecordSchema, SchemaError> {
        if def.fields.is_empty() {
            return Err(SchemaError::EmptySchema(def.name.clone()));
        }

        let mut fields = IndexMap::with_capacity(def.fields.len());
        let mut offset = 0;
        for field in &def.fields {
            let (element_size, nested) = match (field.kind, &field.schema) {
                (Kind::Record, Some(nested_name)) => {
                    let nested = known
                        .get(nested_name)
                        .ok_or_else(|| SchemaError::UnknownSchema(nested_name.clone()))?;
                    (nested.size, Some(Arc::clone(nested)))
                }
                (Kind::Record, None) => {
                    return Err(SchemaError::MissingNestedSchema {
                        schema: def.name.clone(),
                        field: field.name.clone(),
                    });
                }
                (_, Some(_)) => {
                    return Err(SchemaError::UnexpectedNestedSchema {
                        schema: def.name.clone(),
                        field: field.name.clone(),
                    });
                }
                (kind, None) => match kind.fixed_size() {
                    Some(size) => (size, None),
                    None => {
                        return Err(SchemaError::UnsupportedFieldKind {
                            schema: def.name.clone(),
                            field: field.name.clone(),
                            kind,
                        });
                    }
                },
            };

            let descriptor = FieldDescriptor {
                name: field.name.clone(),
                kind: field.kind,
                arity: field.arity,
                nested,
                offset,
                element_size,
            };
            offset += descriptor.size();

            if fields.insert(field.name.clone(), descriptor).is_some() {
                return Err(SchemaError::DuplicateField {
                    schema: def.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        Ok(RecordSchema {
            name: def.name.clone(),
            fields,
            size: offset,
        })
    }
}

/// Name → schema lookup shared by everything that builds or decodes records
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Arc<RwLock<HashMap<String, Arc<RecordSchema>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemaRegistry::new)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<RecordSchema>, SchemaError> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// Registered schema names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Register a schema. Nested schemas must already be registered.
    ///
    /// Registering an identical definition again returns the existing schema.
    pub fn register(&self, def: SchemaDef) -> Result<Arc<RecordSchema>, SchemaError> {
        let mut schemas = self.schemas.write();

        if let Some(existing) = schemas.get(&def.name) {
            if existing.definition() == def {
                return Ok(Arc::clone(existing));
            }
            return Err(SchemaError::Conflict(def.name));
        }

        let schema = Arc::new(RecordSchema::build(&def, &schemas)?);
        tracing::debug!(schema = %def.name, size = schema.size, "registered schema");
        schemas.insert(def.name, Arc::clone(&schema));
        Ok(schema)
    }

    /// Register every schema in a TOML document, in dependency order
    pub fn load_toml(&self, text: &str) -> Result<Vec<Arc<RecordSchema>>, SchemaError> {
        let file: SchemaFile =
            toml::from_str(text).map_err(|e| SchemaError::Toml(e.to_string()))?;

        let mut pending: Vec<SchemaDef> = file
            .schema
            .into_iter()
            .map(|(name, body)| SchemaDef::new(name, body.fields))
            .collect();
        let mut loaded = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|def| def.dependencies().all(|dep| self.contains(dep)));

            if ready.is_empty() {
                return Err(self.unresolved(&blocked));
            }
            for def in ready {
                loaded.push(self.register(def)?);
            }
            pending = blocked;
        }

        Ok(loaded)
    }

    /// Explain why none of `blocked` could be registered
    fn unresolved(&self, blocked: &[SchemaDef]) -> SchemaError {
        let pending: HashSet<&str> = blocked.iter().map(|d| d.name.as_str()).collect();
        for def in blocked {
            if let Some(dep) = def
                .dependencies()
                .find(|dep| !pending.contains(dep) && !self.contains(dep))
            {
                return SchemaError::UnknownSchema(dep.to_string());
            }
        }
        let name = blocked
            .first()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        SchemaError::NestedSchemaCycle(name)
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
