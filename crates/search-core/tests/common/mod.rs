//! Shared test infrastructure for the search core integration tests.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
