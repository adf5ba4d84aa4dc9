//! Stable exit codes for the `ctrlr` and `oracle` CLIs.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: unreadable input, invalid log or contract violations.
pub const INVALID: i32 = 1;
