// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ctlwire-client: sessions and pooled connections for talking to
//! controllers

pub mod config;
pub mod pool;
pub mod session;

pub use config::{ClientConfig, ConfigError};
pub use pool::{ConnectionPool, PoolError};
pub use session::{InvokeOutcome, Session, SessionError, SessionState, Timeout};
