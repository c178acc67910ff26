//! Deterministic, pure logic of the decision pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! snapshots and plans and return deterministic outputs suitable for tests.

pub mod candidate;
pub mod compact;
pub mod loop_guard;
pub mod phase;
pub mod rules;
pub mod salvage;
pub mod snapshot;
pub mod surface;
pub mod types;
pub mod validator;
