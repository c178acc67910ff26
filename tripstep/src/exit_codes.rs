//! Stable exit codes for tripstep CLI commands.

/// A decision (possibly a recovery action) was printed, or inspection succeeded.
pub const OK: i32 = 0;
/// Unreadable snapshot, plan, or configuration; nothing was printed on stdout.
pub const INVALID: i32 = 1;
