//! I/O helpers for engine commands.

pub mod chat;
pub mod config;
pub mod history;
pub mod plan_store;
pub mod prompt;
pub mod snapshot;
