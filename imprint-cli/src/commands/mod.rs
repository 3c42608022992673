//! Subcommand implementations.

pub mod analyze;
pub mod bootstrap;
pub mod fingerprint;
pub mod search;
pub mod similar;
pub mod store;
