// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured record instances
//!
//! A [`RecordInstance`] is a view of `schema.size()` bytes starting at `base`
//! inside a shared backing store. [`RecordInstance::nested`] hands out views
//! into the same store (edits are visible through the parent), while
//! [`RecordInstance::get`] on a record field and [`Clone`] copy the bytes into
//! a fresh store.
//!
//! Every accessor validates field name, arity, index and kind before touching
//! the store, so a rejected call never leaves a field partially written.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::kind::{Kind, ADDR_SIZE};
use crate::schema::{FieldDescriptor, RecordSchema, SchemaError, SchemaRegistry};
use crate::value::TypedValue;

/// Errors from record field access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("field {field} has arity {arity}, index supplied: {indexed}")]
    ArityMismatch {
        field: String,
        arity: usize,
        indexed: bool,
    },

    #[error("field {field} holds {expected} values, not {found}")]
    TypeMismatch {
        field: String,
        expected: Kind,
        found: Kind,
    },

    #[error("field {field} holds {expected} records, not {found}")]
    SchemaMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("index {index} out of bounds for field {field} of length {len}")]
    IndexOutOfBounds {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("field {field} has {expected} elements, got {found}")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("{len} bytes do not fit field {field} of capacity {capacity}")]
    CapacityExceeded {
        field: String,
        capacity: usize,
        len: usize,
    },

    #[error("field {field} does not hold valid UTF-8")]
    InvalidUtf8 { field: String },

    #[error("schema {schema} needs {expected} bytes, got {found}")]
    SizeMismatch {
        schema: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot store {kind} value in numeric field {field}")]
    NotNumeric { field: String, kind: Kind },
}

/// Mutable value conforming to one [`RecordSchema`]
pub struct RecordInstance {
    schema: Arc<RecordSchema>,
    store: Arc<Mutex<Vec<u8>>>,
    base: usize,
}

macro_rules! typed_accessors {
    ($($get:ident, $set:ident: $ty:ty => $variant:ident),* $(,)?) => {
        $(
            /// Read a scalar field declared with exactly this type
            pub fn $get(&self, name: &str) -> Result<$ty, RecordError> {
                match self.get(name)? {
                    TypedValue::$variant(v) => Ok(v),
                    other => Err(RecordError::TypeMismatch {
                        field: name.to_string(),
                        expected: other.kind(),
                        found: Kind::$variant,
                    }),
                }
            }

            /// Write a scalar numeric field, narrowing to its declared type
            pub fn $set(&self, name: &str, value: $ty) -> Result<(), RecordError> {
                self.set_number(name, TypedValue::$variant(value))
            }
        )*
    };
}

impl RecordInstance {
    /// Zero-filled instance
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let store = vec![0u8; schema.size()];
        Self {
            schema,
            store: Arc::new(Mutex::new(store)),
            base: 0,
        }
    }

    /// Zero-filled instance of a registered schema
    pub fn named(registry: &SchemaRegistry, schema: &str) -> Result<Self, RecordError> {
        Ok(Self::new(registry.resolve(schema)?))
    }

    /// Instance over a copy of `bytes`, which must be exactly `schema.size()` long
    pub fn from_bytes(schema: Arc<RecordSchema>, bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() != schema.size() {
            return Err(RecordError::SizeMismatch {
                schema: schema.name().to_string(),
                expected: schema.size(),
                found: bytes.len(),
            });
        }
        Ok(Self {
            schema,
            store: Arc::new(Mutex::new(bytes.to_vec())),
            base: 0,
        })
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn schema_name(&self) -> &str {
        self.schema.name()
    }

    /// Copy of this record's bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let store = self.store.lock();
        store[self.base..self.base + self.schema.size()].to_vec()
    }

    /// Whether both handles view the same backing store
    pub fn shares_store_with(&self, other: &RecordInstance) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Read a scalar field. Record fields come back as deep copies.
    pub fn get(&self, name: &str) -> Result<TypedValue, RecordError> {
        let (field, offset) = self.locate(name, None)?;
        Ok(self.read_element(field, offset))
    }

    /// Read element `index` of an array field
    pub fn get_at(&self, name: &str, index: usize) -> Result<TypedValue, RecordError> {
        let (field, offset) = self.locate(name, Some(index))?;
        Ok(self.read_element(field, offset))
    }

    /// Read a whole array field
    pub fn get_array(&self, name: &str) -> Result<Vec<TypedValue>, RecordError> {
        let field = self.array_field(name)?;
        Ok((0..field.arity())
            .map(|i| self.read_element(field, self.base + field.element_offset(i)))
            .collect())
    }

    /// Write a scalar field; the value's kind must match the declaration
    pub fn set(&self, name: &str, value: TypedValue) -> Result<(), RecordError> {
        let (field, offset) = self.locate(name, None)?;
        let bytes = encode_checked(field, &value)?;
        self.write_bytes(offset, &bytes);
        Ok(())
    }

    /// Write element `index` of an array field
    pub fn set_at(&self, name: &str, index: usize, value: TypedValue) -> Result<(), RecordError> {
        let (field, offset) = self.locate(name, Some(index))?;
        let bytes = encode_checked(field, &value)?;
        self.write_bytes(offset, &bytes);
        Ok(())
    }

    /// Replace a whole array field. `values.len()` must equal the arity.
    pub fn set_array(&self, name: &str, values: &[TypedValue]) -> Result<(), RecordError> {
        let field = self.array_field(name)?;
        if values.len() != field.arity() {
            return Err(RecordError::LengthMismatch {
                field: name.to_string(),
                expected: field.arity(),
                found: values.len(),
            });
        }

        let mut bytes = Vec::with_capacity(field.size());
        for value in values {
            bytes.extend(encode_checked(field, value)?);
        }
        self.write_bytes(self.base + field.offset(), &bytes);
        Ok(())
    }

    /// Write any numeric value into a numeric scalar field with `as`-cast narrowing
    pub fn set_number(&self, name: &str, value: TypedValue) -> Result<(), RecordError> {
        let (field, offset) = self.locate(name, None)?;
        let bytes = encode_loose(field, &value)?;
        self.write_bytes(offset, &bytes);
        Ok(())
    }

    /// Element form of [`set_number`](Self::set_number)
    pub fn set_number_at(
        &self,
        name: &str,
        index: usize,
        value: TypedValue,
    ) -> Result<(), RecordError> {
        let (field, offset) = self.locate(name, Some(index))?;
        let bytes = encode_loose(field, &value)?;
        self.write_bytes(offset, &bytes);
        Ok(())
    }

    typed_accessors! {
        get_i8, set_i8: i8 => I8,
        get_u8, set_u8: u8 => U8,
        get_i16, set_i16: i16 => I16,
        get_u16, set_u16: u16 => U16,
        get_i32, set_i32: i32 => I32,
        get_u32, set_u32: u32 => U32,
        get_i64, set_i64: i64 => I64,
        get_u64, set_u64: u64 => U64,
        get_f32, set_f32: f32 => F32,
        get_f64, set_f64: f64 => F64,
    }

    pub fn get_addr(&self, name: &str) -> Result<IpAddr, RecordError> {
        match self.get(name)? {
            TypedValue::Addr(a) => Ok(a),
            other => Err(RecordError::TypeMismatch {
                field: name.to_string(),
                expected: other.kind(),
                found: Kind::Addr,
            }),
        }
    }

    pub fn set_addr(&self, name: &str, addr: IpAddr) -> Result<(), RecordError> {
        self.set(name, TypedValue::Addr(addr))
    }

    /// Raw contents of a byte-array field
    pub fn get_bytes(&self, name: &str) -> Result<Vec<u8>, RecordError> {
        let field = self.byte_array_field(name)?;
        let start = self.base + field.offset();
        let store = self.store.lock();
        Ok(store[start..start + field.size()].to_vec())
    }

    /// Replace a byte-array field; `bytes.len()` must equal the arity
    pub fn set_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), RecordError> {
        let field = self.byte_array_field(name)?;
        if bytes.len() != field.arity() {
            return Err(RecordError::LengthMismatch {
                field: name.to_string(),
                expected: field.arity(),
                found: bytes.len(),
            });
        }
        self.write_bytes(self.base + field.offset(), bytes);
        Ok(())
    }

    /// Read a byte-array field as a NUL-terminated UTF-8 string
    pub fn get_str(&self, name: &str) -> Result<String, RecordError> {
        let mut bytes = self.get_bytes(name)?;
        if let Some(nul) = bytes.iter().position(|b| *b == 0) {
            bytes.truncate(nul);
        }
        String::from_utf8(bytes).map_err(|_| RecordError::InvalidUtf8 {
            field: name.to_string(),
        })
    }

    /// Store text in a byte-array field, NUL-padding the remainder.
    ///
    /// Text filling the whole capacity is stored without a terminator.
    pub fn set_str(&self, name: &str, text: &str) -> Result<(), RecordError> {
        let field = self.byte_array_field(name)?;
        let capacity = field.arity();
        if text.len() > capacity {
            return Err(RecordError::CapacityExceeded {
                field: name.to_string(),
                capacity,
                len: text.len(),
            });
        }
        let mut bytes = vec![0u8; capacity];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        self.write_bytes(self.base + field.offset(), &bytes);
        Ok(())
    }

    /// Aliasing view of a nested record field
    pub fn nested(&self, name: &str) -> Result<RecordInstance, RecordError> {
        let (field, offset) = self.locate(name, None)?;
        self.view(field, offset)
    }

    /// Aliasing view of element `index` of a nested record array
    pub fn nested_at(&self, name: &str, index: usize) -> Result<RecordInstance, RecordError> {
        let (field, offset) = self.locate(name, Some(index))?;
        self.view(field, offset)
    }

    fn view(&self, field: &FieldDescriptor, offset: usize) -> Result<RecordInstance, RecordError> {
        match field.nested() {
            Some(schema) => Ok(RecordInstance {
                schema: Arc::clone(schema),
                store: Arc::clone(&self.store),
                base: offset,
            }),
            None => Err(RecordError::TypeMismatch {
                field: field.name().to_string(),
                expected: field.kind(),
                found: Kind::Record,
            }),
        }
    }

    /// Resolve a field and the absolute store offset of the addressed element
    fn locate(
        &self,
        name: &str,
        index: Option<usize>,
    ) -> Result<(&FieldDescriptor, usize), RecordError> {
        let field = self.schema.field(name)?;
        match (field.is_array(), index) {
            (false, None) => Ok((field, self.base + field.offset())),
            (true, Some(i)) if i < field.arity() => Ok((field, self.base + field.element_offset(i))),
            (true, Some(i)) => Err(RecordError::IndexOutOfBounds {
                field: name.to_string(),
                index: i,
                len: field.arity(),
            }),
            (_, index) => Err(RecordError::ArityMismatch {
                field: name.to_string(),
                arity: field.arity(),
                indexed: index.is_some(),
            }),
        }
    }

    fn array_field(&self, name: &str) -> Result<&FieldDescriptor, RecordError> {
        let field = self.schema.field(name)?;
        if !field.is_array() {
            return Err(RecordError::ArityMismatch {
                field: name.to_string(),
                arity: 0,
                indexed: true,
            });
        }
        Ok(field)
    }

    fn byte_array_field(&self, name: &str) -> Result<&FieldDescriptor, RecordError> {
        let field = self.array_field(name)?;
        if !matches!(field.kind(), Kind::U8 | Kind::I8) {
            return Err(RecordError::TypeMismatch {
                field: name.to_string(),
                expected: field.kind(),
                found: Kind::Bytes,
            });
        }
        Ok(field)
    }

    fn read_element(&self, field: &FieldDescriptor, offset: usize) -> TypedValue {
        let bytes = {
            let store = self.store.lock();
            store[offset..offset + field.element_size()].to_vec()
        };
        match field.nested() {
            Some(schema) => TypedValue::Record(RecordInstance {
                schema: Arc::clone(schema),
                store: Arc::new(Mutex::new(bytes)),
                base: 0,
            }),
            None => decode_scalar(field.kind(), &bytes),
        }
    }

    fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        let mut store = self.store.lock();
        store[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

/// Encode `value` for `field`, requiring an exact kind and record layout match
fn encode_checked(field: &FieldDescriptor, value: &TypedValue) -> Result<Vec<u8>, RecordError> {
    if value.kind() != field.kind() {
        return Err(RecordError::TypeMismatch {
            field: field.name().to_string(),
            expected: field.kind(),
            found: value.kind(),
        });
    }
    if let (TypedValue::Record(record), Some(expected)) = (value, field.nested()) {
        if !record.schema().same_layout(expected) {
            return Err(RecordError::SchemaMismatch {
                field: field.name().to_string(),
                expected: expected.name().to_string(),
                found: record.schema_name().to_string(),
            });
        }
    }
    Ok(encode_scalar(value))
}

/// Encode a numeric `value` for a numeric `field`, narrowing as needed
fn encode_loose(field: &FieldDescriptor, value: &TypedValue) -> Result<Vec<u8>, RecordError> {
    if !field.kind().is_numeric() {
        return Err(RecordError::TypeMismatch {
            field: field.name().to_string(),
            expected: field.kind(),
            found: value.kind(),
        });
    }
    let narrowed = value
        .narrow_to(field.kind())
        .map_err(|_| RecordError::NotNumeric {
            field: field.name().to_string(),
            kind: value.kind(),
        })?;
    Ok(encode_scalar(&narrowed))
}

fn encode_scalar(value: &TypedValue) -> Vec<u8> {
    match value {
        TypedValue::I8(v) => v.to_le_bytes().to_vec(),
        TypedValue::U8(v) => v.to_le_bytes().to_vec(),
        TypedValue::I16(v) => v.to_le_bytes().to_vec(),
        TypedValue::U16(v) => v.to_le_bytes().to_vec(),
        TypedValue::I32(v) => v.to_le_bytes().to_vec(),
        TypedValue::U32(v) => v.to_le_bytes().to_vec(),
        TypedValue::I64(v) => v.to_le_bytes().to_vec(),
        TypedValue::U64(v) => v.to_le_bytes().to_vec(),
        TypedValue::F32(v) => v.to_le_bytes().to_vec(),
        TypedValue::F64(v) => v.to_le_bytes().to_vec(),
        TypedValue::Addr(addr) => {
            let mut out = vec![0u8; ADDR_SIZE];
            match addr {
                IpAddr::V4(v4) => {
                    out[0] = 4;
                    out[1..5].copy_from_slice(&v4.octets());
                }
                IpAddr::V6(v6) => {
                    out[0] = 6;
                    out[1..].copy_from_slice(&v6.octets());
                }
            }
            out
        }
        TypedValue::Record(record) => record.to_bytes(),
        // Rejected by schema registration; never stored in a record
        TypedValue::String(_) | TypedValue::Bytes(_) => Vec::new(),
    }
}

fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn decode_scalar(kind: Kind, bytes: &[u8]) -> TypedValue {
    match kind {
        Kind::I8 => TypedValue::I8(i8::from_le_bytes(le(bytes))),
        Kind::U8 => TypedValue::U8(bytes[0]),
        Kind::I16 => TypedValue::I16(i16::from_le_bytes(le(bytes))),
        Kind::U16 => TypedValue::U16(u16::from_le_bytes(le(bytes))),
        Kind::I32 => TypedValue::I32(i32::from_le_bytes(le(bytes))),
        Kind::U32 => TypedValue::U32(u32::from_le_bytes(le(bytes))),
        Kind::I64 => TypedValue::I64(i64::from_le_bytes(le(bytes))),
        Kind::U64 => TypedValue::U64(u64::from_le_bytes(le(bytes))),
        Kind::F32 => TypedValue::F32(f32::from_le_bytes(le(bytes))),
        Kind::F64 => TypedValue::F64(f64::from_le_bytes(le(bytes))),
        Kind::Addr => match bytes[0] {
            6 => TypedValue::Addr(IpAddr::V6(Ipv6Addr::from(le::<16>(&bytes[1..])))),
            _ => TypedValue::Addr(IpAddr::V4(Ipv4Addr::from(le::<4>(&bytes[1..])))),
        },
        Kind::String => TypedValue::String(None),
        Kind::Bytes | Kind::Record => TypedValue::Bytes(bytes.to_vec()),
    }
}

impl Clone for RecordInstance {
    /// Deep copy into an independent store
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            store: Arc::new(Mutex::new(self.to_bytes())),
            base: 0,
        }
    }
}

impl PartialEq for RecordInstance {
    fn eq(&self, other: &Self) -> bool {
        self.schema_name() == other.schema_name() && self.to_bytes() == other.to_bytes()
    }
}

impl Eq for RecordInstance {}

impl Hash for RecordInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema_name().hash(state);
        self.to_bytes().hash(state);
    }
}

impl fmt::Display for RecordInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.schema_name())?;
        for (i, field) in self.schema.fields().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}: ", sep, field.name())?;
            if field.is_array() {
                let values = self.get_array(field.name()).map_err(|_| fmt::Error)?;
                f.write_str("[")?;
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")?;
            } else {
                let value = self.get(field.name()).map_err(|_| fmt::Error)?;
                write!(f, "{}", value)?;
            }
        }
        f.write_str(" }")
    }
}

impl fmt::Debug for RecordInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordInstance")
            .field("schema", &self.schema_name())
            .field("base", &self.base)
            .field("value", &format_args!("{}", self))
            .finish()
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
