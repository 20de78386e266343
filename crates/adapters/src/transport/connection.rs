// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared connection handle

use super::{CancelFlag, Connector, Transport, TransportError};
use ctlwire_core::Fault;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Granularity for re-checking cancellation while another exchange holds the link
const LOCK_POLL: Duration = Duration::from_millis(10);

struct Inner {
    id: u64,
    address: String,
    transport: Box<dyn Transport>,
    /// One request/reply exchange at a time
    exchange: Mutex<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        tracing::debug!(id = self.id, address = %self.address, "closing connection");
        self.transport.close();
    }
}

/// Cloneable handle to one open transport.
///
/// The transport is closed when the last handle is dropped, or earlier by
/// [`Connection::close`].
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub fn new(address: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                address: address.into(),
                transport,
                exchange: Mutex::new(()),
            }),
        }
    }

    /// Connect to `address` through `connector`
    pub fn open<C: Connector + ?Sized>(connector: &C, address: &str) -> Result<Self, TransportError> {
        let transport = connector.connect(address)?;
        let connection = Self::new(address, transport);
        tracing::debug!(id = connection.id(), address, "connection opened");
        Ok(connection)
    }

    /// Process-unique identity of the underlying transport
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn is_open(&self) -> bool {
        self.inner.transport.is_open()
    }

    /// Close the transport now, even while other handles exist
    pub fn close(&self) {
        self.inner.transport.close();
    }

    /// Number of live handles to this connection
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Send one request frame and wait for its reply.
    ///
    /// Exchanges on one connection are serialized; a caller waiting for its
    /// turn still honours `deadline` and `cancel`, failing with
    /// [`TransportError::Unsent`] without touching the stream.
    pub fn exchange(
        &self,
        frame: &[u8],
        deadline: Option<Instant>,
        cancel: &CancelFlag,
    ) -> Result<Vec<u8>, TransportError> {
        let _turn = loop {
            if cancel.is_canceled() {
                return Err(TransportError::Unsent(Fault::Canceled));
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TransportError::Unsent(Fault::TimedOut));
                    }
                    LOCK_POLL.min(deadline - now)
                }
                None => LOCK_POLL,
            };
            if let Some(guard) = self.inner.exchange.try_lock_for(wait) {
                break guard;
            }
        };

        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.inner.transport.send(frame)?;
        self.inner.transport.recv(deadline, cancel)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("address", &self.inner.address)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
