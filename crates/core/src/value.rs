// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed values exchanged over a session
//!
//! Unsigned integers keep their native width here, but every integer also
//! exposes a signed 64-bit *carrier* (`carrier()` / `from_carrier()`): `u8`,
//! `u16` and `u32` widen to a non-negative carrier, `u64` travels as its raw
//! bit pattern. Deciding whether a carrier is "negative" is left to the
//! caller, and bit patterns round-trip exactly.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

use crate::kind::Kind;
use crate::record::RecordInstance;

/// Errors from constructing or converting values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("cannot parse {text:?} as {kind}: {reason}")]
    Format {
        kind: Kind,
        text: String,
        reason: String,
    },

    #[error("{0} value is not numeric")]
    NotNumeric(Kind),
}

/// A tagged, immutable wire value
#[derive(Debug, Clone)]
pub enum TypedValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// UTF-8 text; `None` is the null string
    String(Option<String>),
    Bytes(Vec<u8>),
    Addr(IpAddr),
    /// Cloning a record value deep-copies its backing store
    Record(RecordInstance),
}

macro_rules! numeric_cast {
    ($value:expr, $ty:ty) => {
        match $value {
            TypedValue::I8(v) => Ok(*v as $ty),
            TypedValue::U8(v) => Ok(*v as $ty),
            TypedValue::I16(v) => Ok(*v as $ty),
            TypedValue::U16(v) => Ok(*v as $ty),
            TypedValue::I32(v) => Ok(*v as $ty),
            TypedValue::U32(v) => Ok(*v as $ty),
            TypedValue::I64(v) => Ok(*v as $ty),
            TypedValue::U64(v) => Ok(*v as $ty),
            TypedValue::F32(v) => Ok(*v as $ty),
            TypedValue::F64(v) => Ok(*v as $ty),
            other => Err(ValueError::NotNumeric(other.kind())),
        }
    };
}

impl TypedValue {
    /// The null string value
    pub fn null_string() -> Self {
        TypedValue::String(None)
    }

    pub fn kind(&self) -> Kind {
        match self {
            TypedValue::I8(_) => Kind::I8,
            TypedValue::U8(_) => Kind::U8,
            TypedValue::I16(_) => Kind::I16,
            TypedValue::U16(_) => Kind::U16,
            TypedValue::I32(_) => Kind::I32,
            TypedValue::U32(_) => Kind::U32,
            TypedValue::I64(_) => Kind::I64,
            TypedValue::U64(_) => Kind::U64,
            TypedValue::F32(_) => Kind::F32,
            TypedValue::F64(_) => Kind::F64,
            TypedValue::String(_) => Kind::String,
            TypedValue::Bytes(_) => Kind::Bytes,
            TypedValue::Addr(_) => Kind::Addr,
            TypedValue::Record(_) => Kind::Record,
        }
    }

    /// Parse a value of `kind` from its textual form.
    ///
    /// Integers accept an optional sign and a `0x`, `0b` or leading-`0`
    /// (octal) radix prefix. A literal is accepted when it fits either the
    /// signed or the unsigned reading of the width, so `"0xffffffff"` and
    /// `"-1"` produce the same `i32`.
    pub fn parse(kind: Kind, text: &str) -> Result<Self, ValueError> {
        let format_err = |reason: String| ValueError::Format {
            kind,
            text: text.to_string(),
            reason,
        };

        if let Some(bits) = kind.bits() {
            let value = parse_integer(text).map_err(format_err)?;
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << bits) - 1;
            if value < min || value > max {
                return Err(format_err(format!("out of range for {}", kind)));
            }
            return Self::from_carrier(kind, value as i64);
        }

        match kind {
            Kind::F32 => text
                .trim()
                .parse::<f32>()
                .map(TypedValue::F32)
                .map_err(|e| format_err(e.to_string())),
            Kind::F64 => text
                .trim()
                .parse::<f64>()
                .map(TypedValue::F64)
                .map_err(|e| format_err(e.to_string())),
            Kind::String => Ok(TypedValue::String(Some(text.to_string()))),
            Kind::Bytes => parse_hex(text).map(TypedValue::Bytes).map_err(format_err),
            Kind::Addr => text
                .trim()
                .parse::<IpAddr>()
                .map(TypedValue::Addr)
                .map_err(|e| format_err(e.to_string())),
            _ => Err(format_err("not representable as text".to_string())),
        }
    }

    /// Signed 64-bit carrier of an integer value
    pub fn carrier(&self) -> Option<i64> {
        match self {
            TypedValue::I8(v) => Some(i64::from(*v)),
            TypedValue::U8(v) => Some(i64::from(*v)),
            TypedValue::I16(v) => Some(i64::from(*v)),
            TypedValue::U16(v) => Some(i64::from(*v)),
            TypedValue::I32(v) => Some(i64::from(*v)),
            TypedValue::U32(v) => Some(i64::from(*v)),
            TypedValue::I64(v) => Some(*v),
            TypedValue::U64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Rebuild an integer value from a carrier, truncating to the kind's width
    pub fn from_carrier(kind: Kind, carrier: i64) -> Result<Self, ValueError> {
        Ok(match kind {
            Kind::I8 => TypedValue::I8(carrier as i8),
            Kind::U8 => TypedValue::U8(carrier as u8),
            Kind::I16 => TypedValue::I16(carrier as i16),
            Kind::U16 => TypedValue::U16(carrier as u16),
            Kind::I32 => TypedValue::I32(carrier as i32),
            Kind::U32 => TypedValue::U32(carrier as u32),
            Kind::I64 => TypedValue::I64(carrier),
            Kind::U64 => TypedValue::U64(carrier as u64),
            other => return Err(ValueError::NotNumeric(other)),
        })
    }

    /// Convert any numeric value to `kind` with `as`-cast semantics
    pub fn narrow_to(&self, kind: Kind) -> Result<Self, ValueError> {
        match kind {
            Kind::F32 => self.to_f32().map(TypedValue::F32),
            Kind::F64 => self.to_f64().map(TypedValue::F64),
            k if k.is_integer() => match self {
                TypedValue::F32(_) | TypedValue::F64(_) => {
                    Self::from_carrier(k, self.to_i64()?)
                }
                _ => {
                    let carrier = self.carrier().ok_or(ValueError::NotNumeric(self.kind()))?;
                    Self::from_carrier(k, carrier)
                }
            },
            other => Err(ValueError::NotNumeric(other)),
        }
    }

    pub fn to_i8(&self) -> Result<i8, ValueError> {
        numeric_cast!(self, i8)
    }

    pub fn to_u8(&self) -> Result<u8, ValueError> {
        numeric_cast!(self, u8)
    }

    pub fn to_i16(&self) -> Result<i16, ValueError> {
        numeric_cast!(self, i16)
    }

    pub fn to_u16(&self) -> Result<u16, ValueError> {
        numeric_cast!(self, u16)
    }

    pub fn to_i32(&self) -> Result<i32, ValueError> {
        numeric_cast!(self, i32)
    }

    pub fn to_u32(&self) -> Result<u32, ValueError> {
        numeric_cast!(self, u32)
    }

    pub fn to_i64(&self) -> Result<i64, ValueError> {
        numeric_cast!(self, i64)
    }

    pub fn to_u64(&self) -> Result<u64, ValueError> {
        numeric_cast!(self, u64)
    }

    pub fn to_f32(&self) -> Result<f32, ValueError> {
        numeric_cast!(self, f32)
    }

    pub fn to_f64(&self) -> Result<f64, ValueError> {
        numeric_cast!(self, f64)
    }

    /// String contents; `None` for non-strings and the null string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => s.as_deref(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::String(None))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TypedValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_addr(&self) -> Option<IpAddr> {
        match self {
            TypedValue::Addr(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordInstance> {
        match self {
            TypedValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<RecordInstance> {
        match self {
            TypedValue::Record(r) => Some(r),
            _ => None,
        }
    }
}

fn parse_integer(text: &str) -> Result<i128, String> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = if let Some(rest) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(rest) = body
        .strip_prefix("0b")
        .or_else(|| body.strip_prefix("0B"))
    {
        (2, rest)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
        return Err("missing digits".to_string());
    }

    let magnitude = u128::from_str_radix(digits, radix).map_err(|e| e.to_string())?;
    let value = i128::try_from(magnitude).map_err(|_| "too large".to_string())?;
    Ok(if negative { -value } else { value })
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .ok_or_else(|| "invalid hex".to_string())
                .and_then(|pair| u8::from_str_radix(pair, 16).map_err(|e| e.to_string()))
        })
        .collect()
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypedValue::I8(a), TypedValue::I8(b)) => a == b,
            (TypedValue::U8(a), TypedValue::U8(b)) => a == b,
            (TypedValue::I16(a), TypedValue::I16(b)) => a == b,
            (TypedValue::U16(a), TypedValue::U16(b)) => a == b,
            (TypedValue::I32(a), TypedValue::I32(b)) => a == b,
            (TypedValue::U32(a), TypedValue::U32(b)) => a == b,
            (TypedValue::I64(a), TypedValue::I64(b)) => a == b,
            (TypedValue::U64(a), TypedValue::U64(b)) => a == b,
            (TypedValue::F32(a), TypedValue::F32(b)) => a.to_bits() == b.to_bits(),
            (TypedValue::F64(a), TypedValue::F64(b)) => a.to_bits() == b.to_bits(),
            (TypedValue::String(a), TypedValue::String(b)) => a == b,
            (TypedValue::Bytes(a), TypedValue::Bytes(b)) => a == b,
            (TypedValue::Addr(a), TypedValue::Addr(b)) => a == b,
            (TypedValue::Record(a), TypedValue::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            TypedValue::F32(v) => v.to_bits().hash(state),
            TypedValue::F64(v) => v.to_bits().hash(state),
            TypedValue::String(s) => s.hash(state),
            TypedValue::Bytes(b) => b.hash(state),
            TypedValue::Addr(a) => a.hash(state),
            TypedValue::Record(r) => r.hash(state),
            integer => integer.carrier().hash(state),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::I8(v) => write!(f, "{}", v),
            TypedValue::U8(v) => write!(f, "{}", v),
            TypedValue::I16(v) => write!(f, "{}", v),
            TypedValue::U16(v) => write!(f, "{}", v),
            TypedValue::I32(v) => write!(f, "{}", v),
            TypedValue::U32(v) => write!(f, "{}", v),
            TypedValue::I64(v) => write!(f, "{}", v),
            TypedValue::U64(v) => write!(f, "{}", v),
            TypedValue::F32(v) => write!(f, "{}", v),
            TypedValue::F64(v) => write!(f, "{}", v),
            TypedValue::String(None) => f.write_str("null"),
            TypedValue::String(Some(s)) => f.write_str(s),
            TypedValue::Bytes(b) => {
                f.write_str("0x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            TypedValue::Addr(a) => write!(f, "{}", a),
            TypedValue::Record(r) => write!(f, "{}", r),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TypedValue {
                fn from(v: $ty) -> Self {
                    TypedValue::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
    IpAddr => Addr,
    RecordInstance => Record,
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(Some(s))
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(Some(s.to_string()))
    }
}

impl From<Option<String>> for TypedValue {
    fn from(s: Option<String>) -> Self {
        TypedValue::String(s)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(b: &[u8]) -> Self {
        TypedValue::Bytes(b.to_vec())
    }
}

impl From<Ipv4Addr> for TypedValue {
    fn from(a: Ipv4Addr) -> Self {
        TypedValue::Addr(IpAddr::V4(a))
    }
}

impl From<Ipv6Addr> for TypedValue {
    fn from(a: Ipv6Addr) -> Self {
        TypedValue::Addr(IpAddr::V6(a))
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
