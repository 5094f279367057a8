//! Concrete [`crate::Problem`] implementations shipped alongside the engine.
//!
//! Each domain is a self-contained state encoding, callback set, and
//! instance parser; the CLI binaries under `demos/` are thin wrappers that
//! read an instance file and drive [`crate::Engine`] with one of these.

pub mod eight_puzzle;
pub mod maze;
pub mod number_link;
