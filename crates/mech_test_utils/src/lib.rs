//! # Mech Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Fixture setups (standard units, open maps, scripted dice)
//! - A simple autoplay driver for whole games
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod autoplay;
pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
