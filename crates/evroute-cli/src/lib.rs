//! evroute CLI library.
//!
//! Command handlers, terminal styling and output formatting for the `evroute`
//! binary. Kept in a library so the handlers can be exercised without
//! spawning the binary.

pub mod commands;
pub mod output;
pub mod terminal;
