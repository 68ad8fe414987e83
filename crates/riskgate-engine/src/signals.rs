//! Semantic Signal Validation
//!
//! Untrusted login signals are checked before any scoring work. Blocking
//! violations abort the assessment; degrade violations are recorded on the
//! assessment and the request proceeds. A syntactically invalid IP only
//! degrades, the network factor independently refuses to score it.

use riskgate_common::{is_valid_ip, is_valid_latitude, is_valid_longitude, SignalViolation};

use crate::{GeoInfo, RiskContext, ViolationSeverity};

/// Collect every semantic violation in the context, in discovery order.
pub fn validate_signals(context: &RiskContext) -> Vec<SignalViolation> {
    let mut violations = Vec::new();

    if let Some(geo) = &context.geo {
        check_coordinates("geo", geo, &mut violations);
    }

    if let Some(signals) = &context.signals {
        if let Some(reputation) = signals.reputation_score {
            if !reputation.is_finite() || !(0.0..=100.0).contains(&reputation) {
                violations.push(SignalViolation::block(
                    "signals.reputationScore",
                    format!("reputation score {reputation} outside [0, 100]"),
                ));
            }
        }
        if let Some(velocity) = signals.velocity_score {
            if !velocity.is_finite() || !(0.0..=100.0).contains(&velocity) {
                violations.push(SignalViolation::degrade(
                    "signals.velocityScore",
                    format!("velocity score {velocity} outside [0, 100]"),
                ));
            }
        }
        if let Some(previous) = &signals.previous_geo {
            check_coordinates("signals.previousGeo", previous, &mut violations);
        }
    }

    if let Some(ip) = context.ip.as_deref() {
        if !is_valid_ip(ip) {
            violations.push(SignalViolation::degrade(
                "ip",
                format!("{ip:?} is not a valid IPv4 or IPv6 address"),
            ));
        }
    }

    violations
}

/// Malformed coordinates on a present geo object are blocking.
fn check_coordinates(field: &str, geo: &GeoInfo, violations: &mut Vec<SignalViolation>) {
    if let Some(latitude) = geo.latitude {
        if !is_valid_latitude(latitude) {
            violations.push(SignalViolation::block(
                format!("{field}.lat"),
                format!("latitude {latitude} outside [-90, 90]"),
            ));
        }
    }
    if let Some(longitude) = geo.longitude {
        if !is_valid_longitude(longitude) {
            violations.push(SignalViolation::block(
                format!("{field}.lng"),
                format!("longitude {longitude} outside [-180, 180]"),
            ));
        }
    }
}

/// Split violations into the blocking set and the degrade set, preserving
/// order within each.
pub fn partition_violations(
    violations: Vec<SignalViolation>,
) -> (Vec<SignalViolation>, Vec<SignalViolation>) {
    violations
        .into_iter()
        .partition(|violation| violation.severity == ViolationSeverity::Block)
}
