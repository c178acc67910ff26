//! Guarded decision engine for driving a trip-planner app one step at a time.
//!
//! Each invocation turns one accessibility snapshot plus recent history into
//! exactly one validated action. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (extraction, scoring, phase
//!   classification, rules, validation, loop detection). No I/O.
//! - **[`io`]**: Side-effecting operations (snapshot and plan files, history
//!   log, configuration, the chat-completion client).
//! - **[`agents`]**: The model-backed arbiter consulted when no rule fires.
//!
//! Orchestration modules ([`step`], [`inspect`]) coordinate core logic with
//! I/O to implement CLI commands.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod inspect;
pub mod io;
pub mod logging;
pub mod plan;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
