//! Riskgate Common - Shared Foundation
//!
//! Validation primitives and the error taxonomy shared across the
//! riskgate crates. Everything here is pure and synchronous so it can be
//! used from both the scoring hot path and offline tooling.

#![warn(missing_docs)]

pub mod error;
pub mod validate;

pub use error::{RiskError, RiskResult, SignalViolation, ValidationError, ViolationSeverity};
pub use validate::{
    finalize_score, is_valid_ip, is_valid_ipv4, is_valid_ipv6, is_valid_latitude,
    is_valid_longitude, normalize_factor_score, score_in_declared_range,
};
