//! Shared utilities for storyreel integration tests.
//!
//! - scripted collaborators that count calls and fail on demand
//! - `TestHarness`, an engine wired to those collaborators

pub mod collaborators;
pub mod harness;

pub use collaborators::*;
pub use harness::*;
