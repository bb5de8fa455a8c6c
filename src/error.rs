//! Error types surfaced across the simulator.

use std::fmt;

/// Fatal conditions that abort the simulation run (spec.md §7).
///
/// These are programmer/input errors, never task-level outcomes — a
/// rejected task is recorded in `Statistics`, not reported here.
#[derive(Debug)]
pub enum SimError {
    /// Malformed JSON, missing required fields, negative sizes, empty
    /// implementation list.
    InputError(String),
    /// Broker type requires parameters absent from the broker config
    /// (e.g. SOSM without weights).
    ConfigMismatch(String),
    /// `running_vms < 0`, `available_* > capacity`, list-length mismatch
    /// on `attach_resources`, a power function called with NaN, etc.
    InvariantViolation(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::InputError(msg) => write!(f, "input error: {}", msg),
            SimError::ConfigMismatch(msg) => write!(f, "config mismatch: {}", msg),
            SimError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

/// Outcome of a resource-level probe/deploy/unload call. Never wraps a
/// `SimError` — capacity exhaustion is a routine, expected outcome that
/// the caller turns into a rejected-task statistic, not a fatal error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AllocationVerdict {
    Success,
    ProbeFail,
    NotDeployed,
}
