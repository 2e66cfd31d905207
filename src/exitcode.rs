//! Process exit codes.

/// Successful termination
pub const OK: i32 = 0;

/// Usage, validation, unsupported model, or model load error
pub const USAGE: i32 = 1;

/// I/O, rendering, or other runtime error
pub const RUNTIME: i32 = 2;
