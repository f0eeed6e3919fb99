//! Almacén Core - Shared domain types.
//!
//! This crate provides the vocabulary shared by the server and its tests:
//! - type-safe entity IDs
//! - money helpers for the store's single operating currency
//! - product/order/alert status enums, including the order state machine
//!   and the low-stock threshold rule
//! - user roles
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. Database bindings for the types are gated behind the `postgres`
//! feature so pure consumers stay lightweight.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
