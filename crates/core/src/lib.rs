// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ctlwire-core: typed values, record schemas and wire frames for the
//! controller IPC protocol

pub mod kind;
pub mod protocol;
pub mod record;
pub mod schema;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use kind::{Kind, UnknownKind};
pub use protocol::{Fault, ProtocolError, Request, Response, WireValue};
pub use record::{RecordError, RecordInstance};
pub use schema::{FieldDef, FieldDescriptor, RecordSchema, SchemaDef, SchemaError, SchemaRegistry};
pub use value::{TypedValue, ValueError};
