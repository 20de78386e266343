// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory controller for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CancelFlag, Connector, Transport, TransportError};
use ctlwire_core::protocol::{decode, encode};
use ctlwire_core::{Fault, Request, Response};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(2);

type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// Recorded transport call
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Open { address: String },
    Send { link: u64, request: Request },
    Close { link: u64 },
}

#[derive(Default)]
struct Link {
    open: AtomicBool,
    hung_up: AtomicBool,
}

struct FakeState {
    calls: Vec<TransportCall>,
    handler: Handler,
    latency: Duration,
    fail_open: Option<Fault>,
    next_link: u64,
    links: HashMap<u64, Arc<Link>>,
}

/// Fake connector whose transports answer every request through a handler.
///
/// The default handler echoes the request arguments back with code 0.
#[derive(Clone)]
pub struct FakeConnector {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                handler: Arc::new(echo),
                latency: Duration::ZERO,
                fail_open: None,
                next_link: 0,
                links: HashMap::new(),
            })),
        }
    }
}

fn echo(request: &Request) -> Response {
    Response::Reply {
        code: 0,
        values: request.args.clone(),
    }
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<Request> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Send { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Replace the reply handler
    pub fn set_handler(&self, handler: impl Fn(&Request) -> Response + Send + Sync + 'static) {
        self.inner.lock().handler = Arc::new(handler);
    }

    /// Delay every reply by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Make subsequent connects fail with `fault`
    pub fn fail_open(&self, fault: Option<Fault>) {
        self.inner.lock().fail_open = fault;
    }

    /// Number of transports opened so far
    pub fn opened(&self) -> usize {
        self.inner.lock().links.len()
    }

    /// Number of transports currently open
    pub fn open_count(&self) -> usize {
        self.inner
            .lock()
            .links
            .values()
            .filter(|link| link.open.load(Ordering::SeqCst))
            .count()
    }

    /// Whether transport `link` (numbered from 1 in open order) is open
    pub fn is_open(&self, link: u64) -> bool {
        self.inner
            .lock()
            .links
            .get(&link)
            .is_some_and(|link| link.open.load(Ordering::SeqCst))
    }

    /// Simulate the controller hanging up on every open transport
    pub fn hang_up_all(&self) {
        for link in self.inner.lock().links.values() {
            link.hung_up.store(true, Ordering::SeqCst);
        }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        let mut inner = self.inner.lock();

        inner.calls.push(TransportCall::Open {
            address: address.to_string(),
        });

        if let Some(fault) = inner.fail_open {
            return Err(fault.into());
        }

        inner.next_link += 1;
        let id = inner.next_link;
        let link = Arc::new(Link::default());
        link.open.store(true, Ordering::SeqCst);
        inner.links.insert(id, Arc::clone(&link));

        Ok(Box::new(FakeTransport {
            id,
            link,
            shared: Arc::clone(&self.inner),
            replies: Mutex::new(VecDeque::new()),
        }))
    }
}

struct FakeTransport {
    id: u64,
    link: Arc<Link>,
    shared: Arc<Mutex<FakeState>>,
    replies: Mutex<VecDeque<(Instant, Vec<u8>)>>,
}

impl Transport for FakeTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let request: Request = decode(frame)?;

        let (handler, latency) = {
            let mut inner = self.shared.lock();
            inner.calls.push(TransportCall::Send {
                link: self.id,
                request: request.clone(),
            });
            (Arc::clone(&inner.handler), inner.latency)
        };

        let reply = encode(&handler(&request))?;
        self.replies.lock().push_back((Instant::now() + latency, reply));
        Ok(())
    }

    fn recv(&self, deadline: Option<Instant>, cancel: &CancelFlag) -> Result<Vec<u8>, TransportError> {
        loop {
            if !self.is_open() {
                return Err(TransportError::Closed);
            }
            let now = Instant::now();
            {
                let mut replies = self.replies.lock();
                if replies.front().is_some_and(|(ready_at, _)| *ready_at <= now) {
                    if let Some((_, frame)) = replies.pop_front() {
                        return Ok(frame);
                    }
                }
            }
            if self.link.hung_up.load(Ordering::SeqCst) {
                return Err(Fault::HungUp.into());
            }
            if cancel.is_canceled() {
                return Err(Fault::Canceled.into());
            }
            let wait = match deadline {
                Some(deadline) if now >= deadline => return Err(Fault::TimedOut.into()),
                Some(deadline) => POLL.min(deadline - now),
                None => POLL,
            };
            std::thread::sleep(wait);
        }
    }

    fn close(&self) {
        if self.link.open.swap(false, Ordering::SeqCst) {
            self.shared
                .lock()
                .calls
                .push(TransportCall::Close { link: self.id });
        }
    }

    fn is_open(&self) -> bool {
        self.link.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
