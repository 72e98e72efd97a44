// ABOUTME: Command implementations for the pg-compare CLI
// ABOUTME: Exports the compare and prepare commands

pub mod compare;
pub mod prepare;

pub use compare::{compare, CompareOptions};
pub use prepare::{prepare, PrepareOptions};
