//! Integration tests for the Almacén backend.
//!
//! The tests in `tests/` exercise the public API of the core and server
//! crates without external services; flows that need a live `PostgreSQL`
//! or a push gateway are covered by the unit tests colocated with the
//! repositories and services.

#![cfg_attr(not(test), forbid(unsafe_code))]
