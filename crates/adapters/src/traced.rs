// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced transport wrappers for consistent observability

use crate::transport::{CancelFlag, Connector, Transport, TransportError};
use std::time::Instant;

/// Wrapper that adds tracing to any Connector
#[derive(Clone)]
pub struct TracedConnector<C> {
    inner: C,
}

impl<C> TracedConnector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Connector> Connector for TracedConnector<C> {
    fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        tracing::info_span!("transport.connect", address).in_scope(|| {
            tracing::info!("connecting");
            let start = Instant::now();
            let result = self.inner.connect(address);
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match result {
                Ok(transport) => {
                    tracing::info!(elapsed_ms, "connected");
                    Ok(Box::new(TracedTransport {
                        inner: transport,
                        address: address.to_string(),
                    }) as Box<dyn Transport>)
                }
                Err(e) => {
                    tracing::error!(elapsed_ms, error = %e, "connect failed");
                    Err(e)
                }
            }
        })
    }
}

struct TracedTransport {
    inner: Box<dyn Transport>,
    address: String,
}

impl Transport for TracedTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        tracing::info_span!("transport.send", address = %self.address)
            .in_scope(|| tracing::debug!(frame_len = frame.len(), "sending"));
        let result = self.inner.send(frame);
        if let Err(ref e) = result {
            tracing::error!(address = %self.address, error = %e, "send failed");
        }
        result
    }

    fn recv(&self, deadline: Option<Instant>, cancel: &CancelFlag) -> Result<Vec<u8>, TransportError> {
        let start = Instant::now();
        let result = self.inner.recv(deadline, cancel);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info_span!("transport.recv", address = %self.address).in_scope(|| match &result {
            Ok(frame) => tracing::debug!(frame_len = frame.len(), elapsed_ms, "received"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "recv failed"),
        });
        result
    }

    fn close(&self) {
        let was_open = self.inner.is_open();
        self.inner.close();
        if was_open {
            tracing::info_span!("transport.close", address = %self.address)
                .in_scope(|| tracing::info!("closed"));
        }
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
