//! Integration Tests Module
//!
//! End-to-end tests for the project memory store. Scenario tests run against
//! file-backed stores of both backends in temporary project roots.

// Write, context, and search scenarios on each backend
mod scenarios_test;

// SQLite and document backends observe the same behavior
mod parity_test;

// Stdio dispatcher: operation names, argument decoding, error kinds
mod dispatcher_test;

// Reopening a project root keeps data and id sequences
mod persistence_test;

// Threads and separate store instances writing to one project root
mod concurrency_test;
