//! # relay-testing
//!
//! Helpers for tests that exercise relay connections from a synchronous
//! test body while callbacks fire on other threads.
//!
//! - [`WaitGate`]: pass/fail/timeout gate an assertion thread can block on
//! - [`capture_logs`]: thread-local capture of `tracing` events

#![deny(unsafe_code)]

pub mod capture;
pub mod errors;
pub mod wait_gate;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};
pub use errors::WaitError;
pub use wait_gate::{GateOutcome, WaitGate};
