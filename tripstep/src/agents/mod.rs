//! Agent abstractions backed by an external model.

pub mod arbiter;
