// ABOUTME: PostgreSQL session module
// ABOUTME: Exports connection setup used by every command

pub mod connection;

pub use connection::connect;
