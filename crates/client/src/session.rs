// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response sessions bound to one remote service.
//!
//! A session moves Ready → Busy → Result and back to Ready through
//! [`Session::reset`]. Discard is terminal. Methods take `&self` so one
//! session can be shared across threads: a second caller that tries to
//! change state while an invoke is in flight gets
//! [`SessionError::ResourceBusy`], and [`Session::cancel`] from another
//! thread unblocks the invoke.

use crate::config::ClientConfig;
use ctlwire_adapters::{CancelFlag, Connection, TransportError};
use ctlwire_core::protocol::{decode, encode};
use ctlwire_core::{Fault, ProtocolError, Request, Response, SchemaRegistry, TypedValue};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Busy,
    Result,
    Discard,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Ready => "ready",
            SessionState::Busy => "busy",
            SessionState::Result => "result",
            SessionState::Discard => "discard",
        };
        f.write_str(name)
    }
}

/// Errors from misusing a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{op} not allowed in {state} state")]
    BadState {
        op: &'static str,
        state: SessionState,
    },

    #[error("session discarded")]
    Shutdown,

    #[error("session destroyed")]
    Destroyed,

    #[error("session busy with another invoke")]
    ResourceBusy,

    #[error("response index {index} out of bounds (count {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("session was not created cancelable")]
    CancelDisabled,

    #[error("failed to encode request: {0}")]
    Encode(#[from] ProtocolError),
}

/// How long an invoke waits for its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    After(Duration),
    Infinite,
}

impl Timeout {
    fn deadline(self, from: Instant) -> Option<Instant> {
        match self {
            Timeout::After(duration) => from.checked_add(duration),
            Timeout::Infinite => None,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::After(duration)
    }
}

/// Result of [`Session::invoke`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The service replied with this code; responses are readable
    Completed(i32),
    /// The invoke failed in transport or was rejected remotely
    Fatal(Fault),
}

impl InvokeOutcome {
    /// Code reported for a fatal outcome
    pub const FATAL_CODE: i32 = -1;

    pub fn code(&self) -> i32 {
        match self {
            InvokeOutcome::Completed(code) => *code,
            InvokeOutcome::Fatal(_) => Self::FATAL_CODE,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, InvokeOutcome::Fatal(_))
    }
}

struct State {
    phase: SessionState,
    service: String,
    service_id: u32,
    pending: Vec<TypedValue>,
    response: Vec<TypedValue>,
    code: i32,
    timeout: Timeout,
    last_fault: Option<Fault>,
    destroyed: bool,
    busy: usize,
    /// Released on destroy once `busy` drops to zero
    connection: Option<Connection>,
}

impl State {
    /// Lifecycle checks shared by every operation
    fn check_live(&self) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        if self.phase == SessionState::Discard {
            return Err(SessionError::Shutdown);
        }
        Ok(())
    }

    /// Checks for operations that change the request or response
    fn check_mutable(&self, op: &'static str) -> Result<(), SessionError> {
        self.check_live()?;
        match self.phase {
            SessionState::Busy => Err(SessionError::ResourceBusy),
            SessionState::Ready => Ok(()),
            state => Err(SessionError::BadState { op, state }),
        }
    }

    fn check_result(&self, op: &'static str) -> Result<(), SessionError> {
        self.check_live()?;
        match self.phase {
            SessionState::Result => Ok(()),
            state => Err(SessionError::BadState { op, state }),
        }
    }
}

/// A request/response unit bound to one `(service, service_id)` at a time
pub struct Session {
    state: Mutex<State>,
    cancel: CancelFlag,
    cancelable: bool,
    registry: SchemaRegistry,
}

impl Session {
    /// Non-cancelable session on `connection`, decoding records against the
    /// global schema registry
    pub fn new(connection: Connection, service: impl Into<String>, service_id: u32) -> Self {
        Self::build(connection, service.into(), service_id, false)
    }

    /// Session that accepts [`Session::cancel`] and [`Session::discard`]
    pub fn cancelable(connection: Connection, service: impl Into<String>, service_id: u32) -> Self {
        Self::build(connection, service.into(), service_id, true)
    }

    fn build(connection: Connection, service: String, service_id: u32, cancelable: bool) -> Self {
        let io_timeout = ClientConfig::from_env_or_default().io_timeout();
        Self {
            state: Mutex::new(State {
                phase: SessionState::Ready,
                service,
                service_id,
                pending: Vec::new(),
                response: Vec::new(),
                code: 0,
                timeout: Timeout::After(io_timeout),
                last_fault: None,
                destroyed: false,
                busy: 0,
                connection: Some(connection),
            }),
            cancel: CancelFlag::new(),
            cancelable,
            registry: SchemaRegistry::global().clone(),
        }
    }

    /// Decode response records against `registry` instead of the global one
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the initial timeout
    pub fn with_timeout(self, timeout: impl Into<Timeout>) -> Self {
        self.state.lock().timeout = timeout.into();
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().phase
    }

    pub fn service(&self) -> (String, u32) {
        let state = self.state.lock();
        (state.service.clone(), state.service_id)
    }

    pub fn timeout(&self) -> Timeout {
        self.state.lock().timeout
    }

    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Fault from the most recent fatal invoke
    pub fn last_fault(&self) -> Option<Fault> {
        self.state.lock().last_fault
    }

    /// Number of values queued for the next invoke
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Queue an argument for the next invoke
    pub fn append(&self, value: impl Into<TypedValue>) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.check_mutable("append")?;
        state.pending.push(value.into());
        Ok(())
    }

    /// Send the pending values and wait for the reply.
    ///
    /// Transport failures and remote rejections come back as
    /// [`InvokeOutcome::Fatal`] and leave the session Ready (or Discard if it
    /// was discarded meanwhile). Misuse comes back as `Err`.
    pub fn invoke(&self) -> Result<InvokeOutcome, SessionError> {
        let (connection, frame, deadline, service, service_id, _guard) = {
            let mut state = self.state.lock();
            state.check_mutable("invoke")?;
            let connection = state.connection.clone().ok_or(SessionError::Destroyed)?;
            let request = Request::new(state.service.clone(), state.service_id, &state.pending);
            let frame = encode(&request)?;

            state.pending.clear();
            state.phase = SessionState::Busy;
            state.busy += 1;
            self.cancel.clear();
            let deadline = state.timeout.deadline(Instant::now());
            (
                connection,
                frame,
                deadline,
                request.service,
                request.service_id,
                BusyGuard { session: self },
            )
        };

        let span = tracing::info_span!("session.invoke", service = %service, service_id);
        let _enter = span.enter();
        tracing::debug!(frame_len = frame.len(), "invoking");
        let start = Instant::now();

        let exchanged = connection.exchange(&frame, deadline, &self.cancel);
        let unsent = exchanged.as_ref().is_err_and(TransportError::is_unsent);
        let result =
            exchanged.and_then(|reply| decode::<Response>(&reply).map_err(TransportError::from));
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let reply = match result {
            Ok(Response::Reply { code, values }) => values
                .into_iter()
                .map(|value| value.into_typed(&self.registry))
                .collect::<Result<Vec<_>, _>>()
                .map(|values| (code, values))
                .map_err(|e| TransportError::Protocol(e).fault()),
            Ok(Response::Fault { fault }) => Err(fault),
            Err(e) => Err(e.fault()),
        };

        if let Err(fault) = reply {
            if fault.desynchronizes() && !unsent {
                connection.close();
            }
        }

        let mut state = self.state.lock();
        let discarded = state.phase == SessionState::Discard;
        let outcome = match reply {
            Ok((code, values)) if !discarded => {
                tracing::info!(code, values = values.len(), elapsed_ms, "completed");
                state.phase = SessionState::Result;
                state.response = values;
                state.code = code;
                InvokeOutcome::Completed(code)
            }
            Ok(_) => {
                tracing::warn!(elapsed_ms, "reply dropped, session discarded");
                InvokeOutcome::Fatal(Fault::Canceled)
            }
            Err(fault) => {
                tracing::warn!(%fault, elapsed_ms, "invoke failed");
                if !discarded {
                    state.phase = SessionState::Ready;
                }
                state.last_fault = Some(fault);
                InvokeOutcome::Fatal(fault)
            }
        };
        drop(state);
        Ok(outcome)
    }

    /// Bind to a new service target, dropping any response and pending values
    pub fn reset(&self, service: impl Into<String>, service_id: u32) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.check_live()?;
        if state.phase == SessionState::Busy {
            return Err(SessionError::ResourceBusy);
        }
        state.phase = SessionState::Ready;
        state.service = service.into();
        state.service_id = service_id;
        state.pending.clear();
        state.response.clear();
        state.code = 0;
        Ok(())
    }

    /// Response value at `index`
    pub fn response(&self, index: usize) -> Result<TypedValue, SessionError> {
        let state = self.state.lock();
        state.check_result("response")?;
        state
            .response
            .get(index)
            .cloned()
            .ok_or(SessionError::IndexOutOfBounds {
                index,
                count: state.response.len(),
            })
    }

    pub fn response_count(&self) -> Result<usize, SessionError> {
        let state = self.state.lock();
        state.check_result("response_count")?;
        Ok(state.response.len())
    }

    pub fn response_code(&self) -> Result<i32, SessionError> {
        let state = self.state.lock();
        state.check_result("response_code")?;
        Ok(state.code)
    }

    /// All response values
    pub fn responses(&self) -> Result<Vec<TypedValue>, SessionError> {
        let state = self.state.lock();
        state.check_result("responses")?;
        Ok(state.response.clone())
    }

    /// Append `other`'s responses `begin..end` to this session's pending values
    pub fn forward(&self, other: &Session, begin: usize, end: usize) -> Result<(), SessionError> {
        // Copy out first so two sessions are never locked together
        let values = {
            let source = other.state.lock();
            source.check_result("forward")?;
            let count = source.response.len();
            if end > count {
                return Err(SessionError::IndexOutOfBounds { index: end, count });
            }
            if begin > end {
                return Err(SessionError::IndexOutOfBounds { index: begin, count });
            }
            source.response[begin..end].to_vec()
        };

        let mut state = self.state.lock();
        state.check_mutable("forward")?;
        state.pending.extend(values);
        Ok(())
    }

    /// Applies to invokes started after this call
    pub fn set_timeout(&self, timeout: impl Into<Timeout>) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.check_live()?;
        state.timeout = timeout.into();
        Ok(())
    }

    /// Interrupt an in-flight invoke, which then returns `Fatal(Canceled)`
    pub fn cancel(&self) -> Result<(), SessionError> {
        if !self.cancelable {
            return Err(SessionError::CancelDisabled);
        }
        let state = self.state.lock();
        state.check_live()?;
        if state.phase == SessionState::Busy {
            tracing::debug!(service = %state.service, "canceling invoke");
            self.cancel.cancel();
        }
        Ok(())
    }

    /// Cancel any in-flight invoke and move to Discard for good
    pub fn discard(&self) -> Result<(), SessionError> {
        if !self.cancelable {
            return Err(SessionError::CancelDisabled);
        }
        let mut state = self.state.lock();
        state.check_live()?;
        if state.phase == SessionState::Busy {
            self.cancel.cancel();
        }
        tracing::warn!(service = %state.service, "session discarded");
        state.phase = SessionState::Discard;
        state.pending.clear();
        state.response.clear();
        Ok(())
    }

    /// Invalidate the session.
    ///
    /// Idempotent. The connection handle is released now, or when the last
    /// in-flight invoke returns.
    pub fn destroy(&self) {
        let released = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.pending.clear();
            state.response.clear();
            if state.busy == 0 {
                state.connection.take()
            } else {
                tracing::debug!(busy = state.busy, "deferring connection release");
                None
            }
        };
        drop(released);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("service", &state.service)
            .field("service_id", &state.service_id)
            .field("state", &state.phase)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

/// Holds the busy count for one invoke
struct BusyGuard<'a> {
    session: &'a Session,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let released = {
            let mut state = self.session.state.lock();
            state.busy = state.busy.saturating_sub(1);
            if state.busy == 0 && state.destroyed {
                state.connection.take()
            } else {
                None
            }
        };
        drop(released);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
