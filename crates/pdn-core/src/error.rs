//! Unified error types for the risk engine
//!
//! [`PdnError`] separates the three failure classes the engine distinguishes:
//!
//! - **Structural** violations of the topology (malformed or non-canonical edge
//!   keys, references to unknown nodes). These are fatal at index build time.
//! - **Invariant breaches** in computed outputs (a negative probability or
//!   consequence). These are surfaced as-is so callers can tell them apart from
//!   a legitimate zero.
//! - **Configuration / loading** problems.
//!
//! Missing data is *not* an error: accessors return `None` and log instead.
//!
//! # Example
//!
//! ```ignore
//! use pdn_core::{PdnError, PdnResult};
//!
//! fn analyse(snapshot: NetworkSnapshot) -> PdnResult<RiskReport> {
//!     let engine = RiskEngine::new(snapshot, RiskConfig::default())?;
//!     engine.comprehensive_risk_analysis()
//! }
//! ```

use thiserror::Error;

/// Unified error type for all engine operations.
#[derive(Error, Debug)]
pub enum PdnError {
    /// I/O errors (config file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored edge key is not a pair of two distinct node ids
    #[error("Malformed edge key {key}: {reason}")]
    MalformedEdgeKey { key: String, reason: String },

    /// Stored edge key is a valid pair but not in (min, max) order
    #[error("Non-canonical edge key ({0}, {1}); stored keys must list the smaller id first")]
    NonCanonicalEdge(u32, u32),

    /// The same canonical edge appears more than once in the edge table
    #[error("Duplicate edge ({0}, {1}) in edge table")]
    DuplicateEdge(u32, u32),

    /// An edge or feeder root references a node absent from the node table
    #[error("Unknown node {node} referenced by {context}")]
    UnknownNode { node: u32, context: String },

    /// A computed probability, consequence or risk violated its sign invariant
    #[error("Invariant breach: {quantity} for {entity} is {value}")]
    InvariantBreach {
        quantity: &'static str,
        entity: String,
        value: f64,
    },
}

impl PdnError {
    /// True for errors raised because the topology itself is corrupt.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PdnError::MalformedEdgeKey { .. }
                | PdnError::NonCanonicalEdge(..)
                | PdnError::DuplicateEdge(..)
                | PdnError::UnknownNode { .. }
        )
    }

    /// True for errors raised because a computed output broke its invariant.
    pub fn is_invariant_breach(&self) -> bool {
        matches!(self, PdnError::InvariantBreach { .. })
    }
}

/// Convenience type alias for Results using PdnError.
pub type PdnResult<T> = Result<T, PdnError>;

/// Reject negative or NaN values for quantities that must be non-negative.
///
/// Returns the value unchanged when it is valid; values are never clamped.
pub fn ensure_non_negative(
    quantity: &'static str,
    entity: impl std::fmt::Display,
    value: f64,
) -> PdnResult<f64> {
    if value.is_nan() || value < 0.0 {
        Err(PdnError::InvariantBreach {
            quantity,
            entity: entity.to_string(),
            value,
        })
    } else {
        Ok(value)
    }
}

impl From<serde_json::Error> for PdnError {
    fn from(err: serde_json::Error) -> Self {
        PdnError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PdnError::NonCanonicalEdge(7, 3);
        assert!(err.to_string().contains("(7, 3)"));
        assert!(err.is_structural());
        assert!(!err.is_invariant_breach());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PdnError = io_err.into();
        assert!(matches!(err, PdnError::Io(_)));
    }

    #[test]
    fn test_ensure_non_negative() {
        assert_eq!(ensure_non_negative("risk", "node 1", 0.0).unwrap(), 0.0);
        assert_eq!(ensure_non_negative("risk", "node 1", 2.5).unwrap(), 2.5);

        let err = ensure_non_negative("risk", "node 1", -0.5).unwrap_err();
        assert!(err.is_invariant_breach());
        assert!(err.to_string().contains("node 1"));

        assert!(ensure_non_negative("risk", "node 1", f64::NAN).is_err());
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> PdnResult<()> {
            Err(PdnError::Config("bad".into()))
        }

        fn outer() -> PdnResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
