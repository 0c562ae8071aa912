// ─────────────────────────────────────────────────────────────────────
// Keel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Keel failures.
#[derive(Error, Debug)]
pub enum KeelError {
    /// Configuration rejected (invalid hyperparameters, negative variances,
    /// malformed channel table).
    #[error("config error: {0}")]
    Config(String),

    /// Riccati recursion cannot produce a gain (singular input-cost matrix).
    #[error("riccati error: {0}")]
    Riccati(String),

    /// Numerical error (NaN/Inf in a computation that must stay finite).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Invalid input to a step call (wrong control-vector length).
    #[error("validation error: {0}")]
    Validation(String),
}

pub type KeelResult<T> = Result<T, KeelError>;
