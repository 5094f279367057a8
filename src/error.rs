//! Error kinds surfaced by the engine and by domain instance parsers.
//!
//! The core engine never throws a subsystem failure across a thread
//! boundary: workers report through shared state that the engine inspects
//! after its thread scope joins (see [`crate::engine::Engine::solve`]). What
//! reaches the caller as a `Result` is only what can be decided before any
//! worker is spawned.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("worker count must be at least 1")]
    EmptyWorkerCount,
}

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("could not read instance file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("malformed instance shape: expected {expected}, found {found}")]
    Shape { expected: String, found: String },
}
