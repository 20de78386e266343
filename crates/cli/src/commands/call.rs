// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctlwire call`: one invoke against a controller service

use anyhow::Result;
use clap::Args;
use ctlwire_adapters::Connection;
use ctlwire_client::{ConnectionPool, InvokeOutcome, Session, SessionError, Timeout};
use ctlwire_core::{Fault, Kind, SchemaRegistry, TypedValue, UnknownKind, ValueError, WireValue};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::exit_error::ExitError;
use crate::output::{print_json, OutputFormat};

/// Exit code when the invoke ends in a fault
const EXIT_FAULT: i32 = 2;

#[derive(Args)]
pub struct CallArgs {
    /// Controller address: unix:<path>, tcp:<host:port> or <host:port>
    pub address: String,

    /// Service name
    pub service: String,

    /// Service instance id
    pub service_id: u32,

    /// Arguments written as kind:value, e.g. u32:7 or addr:10.0.0.1
    #[arg(value_name = "KIND:VALUE", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Schema file for records in the reply
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Reply timeout in milliseconds; 0 waits forever
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// A `kind:value` argument that could not be turned into a value
#[derive(Debug, Error)]
pub enum ArgError {
    #[error("argument {0:?} is not written as kind:value")]
    MissingKind(String),

    #[error(transparent)]
    Kind(#[from] UnknownKind),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Parse `kind:value`, splitting on the first colon so addresses and
/// strings may contain more
pub fn parse_arg(text: &str) -> Result<TypedValue, ArgError> {
    let (kind, value) = text
        .split_once(':')
        .ok_or_else(|| ArgError::MissingKind(text.to_string()))?;
    let kind: Kind = kind.parse()?;
    Ok(TypedValue::parse(kind, value)?)
}

/// Reply of one invoke
#[derive(Debug, Clone, PartialEq)]
pub struct CallReply {
    pub outcome: InvokeOutcome,
    pub values: Vec<TypedValue>,
}

#[derive(Serialize)]
struct JsonReply {
    code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<Fault>,
    values: Vec<WireValue>,
}

impl CallReply {
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let reply = JsonReply {
            code: self.outcome.code(),
            fault: match self.outcome {
                InvokeOutcome::Fatal(fault) => Some(fault),
                InvokeOutcome::Completed(_) => None,
            },
            values: self.values.iter().map(WireValue::from).collect(),
        };
        serde_json::to_value(reply)
    }

    pub fn to_text(&self) -> String {
        let mut out = match self.outcome {
            InvokeOutcome::Completed(code) => format!("code: {}\n", code),
            InvokeOutcome::Fatal(fault) => format!("fault: {}\n", fault),
        };
        for (i, value) in self.values.iter().enumerate() {
            out.push_str(&format!("  [{}] {} {}\n", i, value.kind(), value));
        }
        out
    }
}

/// Send `values` to `service`/`service_id` over `connection`
pub fn invoke(
    connection: Connection,
    registry: SchemaRegistry,
    service: &str,
    service_id: u32,
    values: Vec<TypedValue>,
    timeout: Option<Timeout>,
) -> Result<CallReply, SessionError> {
    let mut session = Session::new(connection, service, service_id).with_registry(registry);
    if let Some(timeout) = timeout {
        session = session.with_timeout(timeout);
    }
    for value in values {
        session.append(value)?;
    }
    let outcome = session.invoke()?;
    let values = match outcome {
        InvokeOutcome::Completed(_) => session.responses()?,
        InvokeOutcome::Fatal(_) => Vec::new(),
    };
    Ok(CallReply { outcome, values })
}

fn timeout_from_ms(ms: u64) -> Timeout {
    match ms {
        0 => Timeout::Infinite,
        ms => Timeout::After(Duration::from_millis(ms)),
    }
}

pub fn handle(args: CallArgs, format: OutputFormat) -> Result<()> {
    let values = args
        .args
        .iter()
        .map(|arg| parse_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let registry = super::load_registry(args.schema.as_deref())?;

    let pool = ConnectionPool::global();
    let reply = pool
        .open(&args.address)
        .map_err(anyhow::Error::from)
        .and_then(|connection| {
            invoke(
                connection,
                registry,
                &args.service,
                args.service_id,
                values,
                args.timeout_ms.map(timeout_from_ms),
            )
            .map_err(anyhow::Error::from)
        });
    ConnectionPool::shutdown_global();
    let reply = reply?;

    match format {
        OutputFormat::Text => print!("{}", reply.to_text()),
        OutputFormat::Json => print_json(&reply.to_json()?)?,
    }

    if let InvokeOutcome::Fatal(fault) = reply.outcome {
        tracing::warn!(%fault, service = %args.service, "invoke failed");
        return Err(ExitError::new(EXIT_FAULT, String::new()).into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
