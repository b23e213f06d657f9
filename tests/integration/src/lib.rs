//! Integration test utilities for Ephemera
//!
//! This crate provides helpers for running end-to-end tests against a
//! fully wired service context on either backend.

pub mod helpers;
pub mod fixtures;

pub use helpers::*;
pub use fixtures::*;
