//! Error Types
//!
//! The assessment path distinguishes fatal input problems, which abort a
//! request before any scoring work, from degraded signals, which are
//! recorded and allowed through. Factor-level failures never surface here;
//! those degrade to a zero contribution inside the engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a semantic violation found in login signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    /// Aborts the assessment with a [`ValidationError`].
    Block,
    /// Recorded on the assessment, the request proceeds.
    Degrade,
}

/// A single semantic violation found in untrusted login signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalViolation {
    /// Dotted path of the offending field, e.g. `signals.reputationScore`.
    pub field: String,
    /// Human-readable description of what was wrong.
    pub message: String,
    /// Whether the violation blocks the assessment.
    pub severity: ViolationSeverity,
}

impl SignalViolation {
    /// Blocking violation.
    pub fn block(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ViolationSeverity::Block,
        }
    }

    /// Non-blocking violation.
    pub fn degrade(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ViolationSeverity::Degrade,
        }
    }
}

impl fmt::Display for SignalViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Aggregated blocking violations, raised before any scoring work runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Blocking violations in discovery order.
    pub violations: Vec<SignalViolation>,
}

impl ValidationError {
    /// Wrap a set of blocking violations.
    pub fn new(violations: Vec<SignalViolation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocking violation(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "; {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Riskgate error type.
#[derive(Error, Debug)]
pub enum RiskError {
    /// The context carried no timestamp; assessments never fall back to the
    /// wall clock.
    #[error("context timestamp is required for assessment")]
    MissingTimestamp,

    /// The context timestamp could not be parsed as ISO-8601.
    #[error("context timestamp {value:?} is not valid ISO-8601: {reason}")]
    InvalidTimestamp {
        /// The raw timestamp string as received.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Blocking semantic violations in the login signals.
    #[error("signal validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Risk-level thresholds are not strictly ordered bands.
    #[error("invalid risk thresholds: {0}")]
    InvalidThresholds(String),
}

/// Result alias used across riskgate.
pub type RiskResult<T> = Result<T, RiskError>;
