//! Shared utilities.
//!
//! Hashing, write primitives and test helpers used across the crate.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
