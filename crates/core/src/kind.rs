// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Value discriminants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminant of a [`TypedValue`](crate::TypedValue).
///
/// The same tag identifies a value on the wire and declares the type of a
/// record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Addr,
    Record,
}

/// Encoded size of an address element: family byte + 16 address bytes
pub const ADDR_SIZE: usize = 17;

impl Kind {
    pub const ALL: [Kind; 14] = [
        Kind::I8,
        Kind::U8,
        Kind::I16,
        Kind::U16,
        Kind::I32,
        Kind::U32,
        Kind::I64,
        Kind::U64,
        Kind::F32,
        Kind::F64,
        Kind::String,
        Kind::Bytes,
        Kind::Addr,
        Kind::Record,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::I8 => "i8",
            Kind::U8 => "u8",
            Kind::I16 => "i16",
            Kind::U16 => "u16",
            Kind::I32 => "i32",
            Kind::U32 => "u32",
            Kind::I64 => "i64",
            Kind::U64 => "u64",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Addr => "addr",
            Kind::Record => "record",
        }
    }

    /// Integer or floating point kinds
    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Kind::F32 | Kind::F64)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Kind::I8
                | Kind::U8
                | Kind::I16
                | Kind::U16
                | Kind::I32
                | Kind::U32
                | Kind::I64
                | Kind::U64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64)
    }

    /// Fixed element size inside a record store.
    ///
    /// `None` for kinds that have no fixed width (`string`, `bytes`) and for
    /// `record`, whose size comes from the nested schema.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Kind::I8 | Kind::U8 => Some(1),
            Kind::I16 | Kind::U16 => Some(2),
            Kind::I32 | Kind::U32 | Kind::F32 => Some(4),
            Kind::I64 | Kind::U64 | Kind::F64 => Some(8),
            Kind::Addr => Some(ADDR_SIZE),
            Kind::String | Kind::Bytes | Kind::Record => None,
        }
    }

    /// Bit width of integer kinds
    pub fn bits(self) -> Option<u32> {
        match self {
            Kind::I8 | Kind::U8 => Some(8),
            Kind::I16 | Kind::U16 => Some(16),
            Kind::I32 | Kind::U32 => Some(32),
            Kind::I64 | Kind::U64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a kind name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
#[path = "kind_tests.rs"]
mod tests;
