/// Errors raised by the gate itself.
///
/// Denials, timeouts and primitive failures are *outcomes*, not errors; see
/// [`ExecutionOutcome`](crate::ExecutionOutcome). A `GateError` means the run
/// must stop.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A second confirmation was requested while one is still outstanding.
    #[error("gate invariant violated: {0}")]
    InvariantViolation(String),

    /// Run-scoped state could not be accessed (lock poisoned).
    #[error("internal gate error: {0}")]
    Internal(String),
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
