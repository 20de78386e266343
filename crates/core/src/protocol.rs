// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frames exchanged with the controller.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

use std::io::{Read, Write};
use std::net::IpAddr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::record::{RecordError, RecordInstance};
use crate::schema::SchemaRegistry;
use crate::value::TypedValue;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

/// Maximum message size (200 MB)
pub const MAX_MESSAGE_SIZE: usize = 200 * 1024 * 1024;

/// Transport or remote failure that ends an invocation without a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    Refused,
    Reset,
    HungUp,
    TimedOut,
    AuthFailed,
    TooManyClients,
    UnknownService,
    ProtocolViolation,
    Canceled,
    Closed,
}

impl Fault {
    /// Whether the stream can no longer be trusted to deliver the next reply
    pub fn desynchronizes(self) -> bool {
        matches!(
            self,
            Fault::Reset | Fault::HungUp | Fault::TimedOut | Fault::ProtocolViolation | Fault::Canceled
        )
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Fault::Refused => "connection refused",
            Fault::Reset => "connection reset",
            Fault::HungUp => "peer hung up",
            Fault::TimedOut => "timed out",
            Fault::AuthFailed => "authentication failed",
            Fault::TooManyClients => "too many clients",
            Fault::UnknownService => "unknown service",
            Fault::ProtocolViolation => "protocol violation",
            Fault::Canceled => "canceled",
            Fault::Closed => "connection closed",
        };
        f.write_str(text)
    }
}

/// Serialized form of a [`TypedValue`].
///
/// Floats travel as bit patterns so NaN payloads survive; records travel as
/// their schema name plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum WireValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(u32),
    F64(u64),
    String(Option<String>),
    Bytes(Vec<u8>),
    Addr(IpAddr),
    Record { schema: String, data: Vec<u8> },
}

impl From<&TypedValue> for WireValue {
    fn from(value: &TypedValue) -> Self {
        match value {
            TypedValue::I8(v) => WireValue::I8(*v),
            TypedValue::U8(v) => WireValue::U8(*v),
            TypedValue::I16(v) => WireValue::I16(*v),
            TypedValue::U16(v) => WireValue::U16(*v),
            TypedValue::I32(v) => WireValue::I32(*v),
            TypedValue::U32(v) => WireValue::U32(*v),
            TypedValue::I64(v) => WireValue::I64(*v),
            TypedValue::U64(v) => WireValue::U64(*v),
            TypedValue::F32(v) => WireValue::F32(v.to_bits()),
            TypedValue::F64(v) => WireValue::F64(v.to_bits()),
            TypedValue::String(s) => WireValue::String(s.clone()),
            TypedValue::Bytes(b) => WireValue::Bytes(b.clone()),
            TypedValue::Addr(a) => WireValue::Addr(*a),
            TypedValue::Record(r) => WireValue::Record {
                schema: r.schema_name().to_string(),
                data: r.to_bytes(),
            },
        }
    }
}

impl WireValue {
    /// Rebuild the typed value, resolving record schemas in `registry`
    pub fn into_typed(self, registry: &SchemaRegistry) -> Result<TypedValue, ProtocolError> {
        Ok(match self {
            WireValue::I8(v) => TypedValue::I8(v),
            WireValue::U8(v) => TypedValue::U8(v),
            WireValue::I16(v) => TypedValue::I16(v),
            WireValue::U16(v) => TypedValue::U16(v),
            WireValue::I32(v) => TypedValue::I32(v),
            WireValue::U32(v) => TypedValue::U32(v),
            WireValue::I64(v) => TypedValue::I64(v),
            WireValue::U64(v) => TypedValue::U64(v),
            WireValue::F32(bits) => TypedValue::F32(f32::from_bits(bits)),
            WireValue::F64(bits) => TypedValue::F64(f64::from_bits(bits)),
            WireValue::String(s) => TypedValue::String(s),
            WireValue::Bytes(b) => TypedValue::Bytes(b),
            WireValue::Addr(a) => TypedValue::Addr(a),
            WireValue::Record { schema, data } => {
                let schema = registry.resolve(&schema).map_err(RecordError::from)?;
                TypedValue::Record(RecordInstance::from_bytes(schema, &data)?)
            }
        })
    }
}

/// Service invocation sent by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub service: String,
    pub service_id: u32,
    #[serde(default)]
    pub args: Vec<WireValue>,
}

impl Request {
    pub fn new(service: impl Into<String>, service_id: u32, args: &[TypedValue]) -> Self {
        Self {
            service: service.into(),
            service_id,
            args: args.iter().map(WireValue::from).collect(),
        }
    }

    pub fn typed_args(self, registry: &SchemaRegistry) -> Result<Vec<TypedValue>, ProtocolError> {
        self.args.into_iter().map(|v| v.into_typed(registry)).collect()
    }
}

/// Controller reply to a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Service ran; `code` is service-defined
    Reply {
        code: i32,
        #[serde(default)]
        values: Vec<WireValue>,
    },

    /// Request rejected before or instead of running the service
    Fault { fault: Fault },
}

impl Response {
    pub fn reply(code: i32, values: &[TypedValue]) -> Self {
        Response::Reply {
            code,
            values: values.iter().map(WireValue::from).collect(),
        }
    }
}

/// Encode a message to JSON bytes (without length prefix)
///
/// Use with `write_frame()` which handles the length-prefix wire format.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;

    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok(json)
}

/// Decode a message from wire format
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read a length-prefixed message from a blocking reader
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    // Read length prefix
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    // Read payload
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Write a length-prefixed message to a blocking writer
pub fn write_frame<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_be_bytes())?;
    writer.write_all(data)?;
    writer.flush()?;
    Ok(())
}

/// Reassembles length-prefixed frames from arbitrarily split reads
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame, if one has arrived
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let Some(prefix) = self.buf.get(..4) else {
            return Ok(None);
        };
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(prefix);
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }

        let frame = self.buf[4..4 + len].to_vec();
        self.buf.drain(..4 + len);
        Ok(Some(frame))
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
