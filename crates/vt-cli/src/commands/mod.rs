//! CLI subcommand implementations.

pub mod check;
pub mod simulate;
pub mod watch;
