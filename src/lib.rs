// ABOUTME: Library module for pg-compare
// ABOUTME: Exports catalog capture, diffing, ownership reconciliation, and the CLI commands

pub mod catalog;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod interactive;
pub mod postgres;
pub mod reconcile;
pub mod report;
pub mod utils;
