// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport boundary between sessions and the controller

mod connection;
mod stream;

pub use connection::Connection;
pub use stream::StreamConnector;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeConnector, TransportCall};

use ctlwire_core::{Fault, ProtocolError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Fault(Fault),

    /// Gave up waiting for a turn on the connection; nothing was written
    #[error("{0} before sending")]
    Unsent(Fault),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed")]
    Closed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl From<Fault> for TransportError {
    fn from(fault: Fault) -> Self {
        TransportError::Fault(fault)
    }
}

impl TransportError {
    /// True when the request never reached the wire, so the stream is
    /// still in step with the controller
    pub fn is_unsent(&self) -> bool {
        matches!(self, TransportError::Unsent(_))
    }

    /// Fault reported to the session for this error
    pub fn fault(&self) -> Fault {
        match self {
            TransportError::Fault(fault) | TransportError::Unsent(fault) => *fault,
            TransportError::Protocol(_) => Fault::ProtocolViolation,
            TransportError::Closed => Fault::Closed,
            TransportError::InvalidAddress(_) => Fault::Refused,
        }
    }
}

/// Cooperative cancellation flag polled by [`Transport::recv`]
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single duplex link to the controller carrying length-prefixed frames
pub trait Transport: Send + Sync {
    /// Send one frame (payload without length prefix)
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Block until one frame arrives, `deadline` passes, or `cancel` is set.
    ///
    /// `None` waits forever. Expiry yields [`Fault::TimedOut`], cancellation
    /// yields [`Fault::Canceled`].
    fn recv(&self, deadline: Option<Instant>, cancel: &CancelFlag) -> Result<Vec<u8>, TransportError>;

    /// Close the link; idempotent
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Opens transports to controller addresses
pub trait Connector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError>;
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        (**self).connect(address)
    }
}

/// Parsed controller address.
///
/// `unix:<path>` selects a Unix domain socket, `tcp:<host:port>` or a bare
/// `host:port` selects TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    pub fn parse(address: &str) -> Result<Self, TransportError> {
        let invalid = || TransportError::InvalidAddress(address.to_string());

        if let Some(path) = address.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let host_port = address.strip_prefix("tcp:").unwrap_or(address);
        match host_port.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(host_port.to_string()))
            }
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
