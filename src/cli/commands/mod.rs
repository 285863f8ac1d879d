//! CLI command implementations.

pub mod diagnose;
pub mod evaluate;
pub mod init;
pub mod state;
