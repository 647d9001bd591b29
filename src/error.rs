use thiserror::Error;

use crate::algorithm::ExtensionSlot;

/// Unified error type for `smart-analyze` operations.
///
/// Non-convergence is not an error: an exhausted recovery search is reported
/// through [`RunStatus::Failed`](crate::session::RunStatus::Failed).
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Raised when an algorithm code has no entry in the catalog.
    #[error("algorithm code {code} is not in the catalog")]
    UnknownAlgorithm { code: u32 },

    /// Raised when no algorithm codes were configured.
    #[error("at least one algorithm code must be configured")]
    EmptyAlgorithmList,

    /// Raised when a step length, tolerance or count must be strictly positive.
    #[error("{context} must be positive, found {value}")]
    NonPositiveValue {
        /// Name of the offending parameter.
        context: &'static str,
        /// The value that was supplied.
        value: f64,
    },

    /// Raised when a step length or displacement target is NaN or infinite.
    #[error("{context} must be finite, found {value}")]
    NonFiniteValue {
        /// Name of the offending parameter.
        context: &'static str,
        /// The value that was supplied.
        value: f64,
    },

    /// Raised when a trial selects an algorithm past the end of the configured list.
    #[error("algorithm index {index} is out of range for {len} configured algorithms")]
    AlgorithmIndexOutOfRange { index: usize, len: usize },

    /// Raised when the bisection factor leaves the open unit interval.
    #[error("relaxation must lie strictly between 0 and 1, found {value}")]
    RelaxationOutOfRange { value: f64 },

    /// Raised when a static run is given no displacement targets.
    #[error("a static loading protocol needs at least one displacement target")]
    EmptyProtocol,

    /// Raised when a transient run is asked for zero steps.
    #[error("a transient run needs at least one step")]
    ZeroSegments,

    /// Raised when a user algorithm slot is configured without a registered callback.
    #[error("user algorithm slot {slot} is configured but no callback is registered")]
    MissingExtension { slot: ExtensionSlot },

    /// Raised by a solver collaborator for faults that no recovery strategy can fix.
    #[error("solver fault during {context}: {message}")]
    SolverFault {
        /// The collaborator call that failed.
        context: &'static str,
        /// Message reported by the solver.
        message: String,
    },
}

impl AnalyzeError {
    /// Helper to format a [`NonPositiveValue`](AnalyzeError::NonPositiveValue) error.
    pub fn non_positive(context: &'static str, value: f64) -> Self {
        Self::NonPositiveValue { context, value }
    }

    /// Helper for solver adapters reporting an unrecoverable fault.
    pub fn solver_fault<M: Into<String>>(context: &'static str, message: M) -> Self {
        Self::SolverFault {
            context,
            message: message.into(),
        }
    }

    /// Returns `true` for errors detected before any solver call is made.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::SolverFault { .. })
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, AnalyzeError>;
