//! Offline synchronization engine for a personal accounting client.
//!
//! The engine keeps one locally persisted, schema-validated ledger document,
//! funnels every local mutation through a single writer, and reconciles the
//! document bidirectionally against a remote accounting service. It stays
//! usable without network connectivity: an unreachable service only shortens
//! a sync run, it never corrupts state or faults the caller.

pub mod client;
pub mod config;
pub mod ledger;
