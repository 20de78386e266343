// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Address-keyed connection cache.
//!
//! Each address maps to at most one cached [`Connection`]. The pool holds one
//! handle per entry; a connection is idle when that is the only handle left.
//! Evicting an entry drops the pool's handle, so a connection still held by
//! sessions stays open until they let go. [`ConnectionPool::discard`] and
//! [`ConnectionPool::destroy`] close connections outright.

use crate::config::ClientConfig;
use ctlwire_adapters::{Connection, Connector, TracedConnector, TransportError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Errors from pool operations
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool destroyed")]
    BadPool,

    #[error("connection {0} is not cached in this pool")]
    NotCached(u64),

    #[error("connect failed: {0}")]
    Connect(#[from] TransportError),
}

struct Entry {
    connection: Connection,
    /// Tick of the most recent open
    last_used: u64,
    /// Opened since the previous non-forced reap
    referenced: bool,
}

impl Entry {
    fn is_idle(&self) -> bool {
        self.connection.handle_count() == 1
    }
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<String, Entry>,
    tick: u64,
    destroyed: bool,
}

impl PoolState {
    fn live(&mut self) -> Result<&mut Self, PoolError> {
        if self.destroyed {
            return Err(PoolError::BadPool);
        }
        Ok(self)
    }

    fn touch(&mut self, address: &str) -> Option<Connection> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(address)?;
        entry.last_used = tick;
        entry.referenced = true;
        Some(entry.connection.clone())
    }

    /// Least recently used entry other than `keep`
    fn lru_victim(&self, keep: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|(address, _)| address.as_str() != keep)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(address, _)| address.clone())
    }
}

struct Inner {
    connector: Box<dyn Connector>,
    capacity: Option<usize>,
    state: Mutex<PoolState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let entries = std::mem::take(&mut self.state.get_mut().entries);
        for entry in entries.into_values() {
            entry.connection.close();
        }
    }
}

/// Capacity-bounded cache of connections keyed by address.
///
/// Cloning yields another handle to the same pool. Dropping the last handle
/// destroys the pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

impl ConnectionPool {
    /// Private pool holding at most `capacity` connections (minimum 1)
    pub fn new(connector: impl Connector + 'static, capacity: usize) -> Self {
        Self::build(Box::new(connector), Some(capacity.max(1)))
    }

    /// Private pool without a capacity bound
    pub fn unbounded(connector: impl Connector + 'static) -> Self {
        Self::build(Box::new(connector), None)
    }

    fn build(connector: Box<dyn Connector>, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                capacity,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Process-wide pool over real sockets, configured from the environment
    pub fn global() -> &'static ConnectionPool {
        static GLOBAL: OnceLock<ConnectionPool> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = ClientConfig::from_env_or_default();
            let connector = TracedConnector::new(config.connector());
            Self::build(Box::new(connector), config.global_capacity())
        })
    }

    /// Close everything the global pool caches; later opens reconnect
    pub fn shutdown_global() -> usize {
        let pool = Self::global();
        let entries: Vec<Entry> = pool.inner.state.lock().entries.drain().map(|(_, e)| e).collect();
        let count = entries.len();
        for entry in entries {
            entry.connection.close();
        }
        tracing::info!(count, "global pool shut down");
        count
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }

    /// Cached connection for `address`, connecting and caching one if needed
    pub fn open(&self, address: &str) -> Result<Connection, PoolError> {
        {
            let mut state = self.inner.state.lock();
            let state = state.live()?;
            match state.touch(address) {
                Some(connection) if connection.is_open() => {
                    tracing::trace!(address, id = connection.id(), "pool hit");
                    return Ok(connection);
                }
                Some(_) => {
                    tracing::debug!(address, "dropping closed connection");
                    state.entries.remove(address);
                }
                None => {}
            }
        }

        // Connect without holding the pool lock
        let connection = Connection::open(self.inner.connector.as_ref(), address)?;

        let (result, evicted) = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                connection.close();
                return Err(PoolError::BadPool);
            }
            if let Some(existing) = state.touch(address).filter(Connection::is_open) {
                // Lost a race with another opener
                (existing, Vec::new())
            } else {
                let mut evicted = Vec::new();
                if let Some(capacity) = self.inner.capacity {
                    while state.entries.len() >= capacity {
                        let Some(victim) = state.lru_victim(address) else {
                            break;
                        };
                        if let Some(entry) = state.entries.remove(&victim) {
                            tracing::debug!(address = %victim, "evicting least recently used");
                            evicted.push(entry);
                        }
                    }
                }
                state.tick += 1;
                let tick = state.tick;
                state.entries.insert(
                    address.to_string(),
                    Entry {
                        connection: connection.clone(),
                        last_used: tick,
                        referenced: true,
                    },
                );
                (connection, evicted)
            }
        };
        drop(evicted);
        Ok(result)
    }

    /// Cached connection for `address` without connecting
    pub fn cached(&self, address: &str) -> Result<Option<Connection>, PoolError> {
        let mut state = self.inner.state.lock();
        let state = state.live()?;
        Ok(state
            .entries
            .get(address)
            .map(|entry| entry.connection.clone()))
    }

    /// Remove `connection` from the pool and close it, even if in use
    pub fn discard(&self, connection: &Connection) -> Result<(), PoolError> {
        let entry = {
            let mut state = self.inner.state.lock();
            let state = state.live()?;
            let address = state
                .entries
                .iter()
                .find(|(_, entry)| entry.connection == *connection)
                .map(|(address, _)| address.clone())
                .ok_or(PoolError::NotCached(connection.id()))?;
            state.entries.remove(&address)
        };
        if let Some(entry) = entry {
            tracing::warn!(address = entry.connection.address(), "discarding connection");
            entry.connection.close();
        }
        Ok(())
    }

    /// Evict idle connections.
    ///
    /// Without `force`, only connections not opened since the previous reap
    /// are evicted, and every survivor's reference bit is cleared. With
    /// `force`, every idle connection goes. Closed connections are always
    /// dropped. Returns the number evicted.
    pub fn reap(&self, force: bool) -> Result<usize, PoolError> {
        let evicted: Vec<Entry> = {
            let mut state = self.inner.state.lock();
            let state = state.live()?;
            let victims: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| {
                    !entry.connection.is_open() || (entry.is_idle() && (force || !entry.referenced))
                })
                .map(|(address, _)| address.clone())
                .collect();
            let evicted = victims
                .iter()
                .filter_map(|address| state.entries.remove(address))
                .collect();
            if !force {
                for entry in state.entries.values_mut() {
                    entry.referenced = false;
                }
            }
            evicted
        };
        let count = evicted.len();
        tracing::debug!(count, force, "reaped");
        Ok(count)
    }

    /// Close every cached connection; later calls fail with `BadPool`
    pub fn destroy(&self) {
        let entries: Vec<Entry> = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        tracing::debug!(count = entries.len(), "pool destroyed");
        for entry in entries {
            entry.connection.close();
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
