//! Simulation error types.

use thiserror::Error;

/// Errors produced by entity constructors, resource counters and lifecycle
/// operations.
///
/// Resource exhaustion raised during placement is always intercepted by the
/// placement policies and converted into a failed-placement return, so it
/// reaches the caller only on direct counter manipulation. Invalid-state
/// errors indicate a broken usage of the API and stop the simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Constructor or argument constraints violated.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Attempted allocation beyond the available amount.
    #[error("resource exhausted: requested {requested}, available {available}")]
    ResourceExhausted { requested: f64, available: f64 },
    /// Operation applied to an object in a state that does not admit it.
    #[error("invalid state: {0}")]
    InvalidState(String),
}
