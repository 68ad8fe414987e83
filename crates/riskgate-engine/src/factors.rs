//! Built-in Factor Calculators
//!
//! The four standard factor families. Each calculator is a pure function of
//! the scoring context that returns a raw score in `[0, 100]`; absent
//! evidence contributes nothing.

use std::sync::Arc;

use riskgate_common::{is_valid_ip, normalize_factor_score};

use crate::{DeviceType, FactorCategory, FactorConfig, RiskWeights, ScoringContext};

/// Points for a device whose type could not be classified.
pub const DEVICE_UNKNOWN_TYPE_POINTS: f64 = 40.0;
/// Points for an IoT device attempting an interactive login.
pub const DEVICE_IOT_TYPE_POINTS: f64 = 30.0;
/// Points for a fingerprint with no operating system.
pub const DEVICE_MISSING_OS_POINTS: f64 = 20.0;
/// Points for a fingerprint with no browser.
pub const DEVICE_MISSING_BROWSER_POINTS: f64 = 15.0;

/// Points for a login geolocated to a high-risk country.
pub const GEO_HIGH_RISK_COUNTRY_POINTS: f64 = 40.0;
/// Points for a country change against the previously seen location.
pub const GEO_COUNTRY_MISMATCH_POINTS: f64 = 60.0;

/// ISO 3166-1 alpha-2 codes treated as high risk regardless of other
/// geo evidence.
pub const HIGH_RISK_COUNTRIES: [&str; 3] = ["KP", "IR", "SY"];

/// Points for a Tor exit node.
pub const NETWORK_TOR_POINTS: f64 = 70.0;
/// Points for a VPN egress.
pub const NETWORK_VPN_POINTS: f64 = 50.0;
/// Points for an anonymizing proxy.
pub const NETWORK_PROXY_POINTS: f64 = 40.0;
/// Points when IP reputation is below [`REPUTATION_CRITICAL_BELOW`].
pub const NETWORK_REPUTATION_CRITICAL_POINTS: f64 = 50.0;
/// Points when IP reputation is below [`REPUTATION_LOW_BELOW`].
pub const NETWORK_REPUTATION_LOW_POINTS: f64 = 30.0;

/// Reputation scores below this value are critical.
pub const REPUTATION_CRITICAL_BELOW: f64 = 10.0;
/// Reputation scores below this value (and at or above the critical cutoff)
/// are low.
pub const REPUTATION_LOW_BELOW: f64 = 50.0;

/// Device risk: additive points for unclassifiable or thin fingerprints.
pub fn device_risk(ctx: &ScoringContext) -> f64 {
    let mut score = 0.0;

    match ctx.device.device_type {
        DeviceType::Unknown => score += DEVICE_UNKNOWN_TYPE_POINTS,
        DeviceType::IoT => score += DEVICE_IOT_TYPE_POINTS,
        _ => {}
    }
    if ctx.device.os.as_deref().map_or(true, str::is_empty) {
        score += DEVICE_MISSING_OS_POINTS;
    }
    if ctx.device.browser.as_deref().map_or(true, str::is_empty) {
        score += DEVICE_MISSING_BROWSER_POINTS;
    }

    score.min(100.0)
}

/// Geo risk: high-risk countries and country changes against the previously
/// seen location. Missing geo on either side contributes nothing.
pub fn geo_risk(ctx: &ScoringContext) -> f64 {
    let mut score = 0.0;

    let country = ctx
        .geo
        .as_ref()
        .and_then(|geo| geo.country.as_deref())
        .filter(|country| !country.is_empty());
    let previous = ctx
        .signals
        .as_ref()
        .and_then(|signals| signals.previous_geo.as_ref())
        .and_then(|geo| geo.country.as_deref())
        .filter(|country| !country.is_empty());

    if let Some(country) = country {
        if HIGH_RISK_COUNTRIES.contains(&country) {
            score += GEO_HIGH_RISK_COUNTRY_POINTS;
        }
        if let Some(previous) = previous {
            if country != previous {
                score += GEO_COUNTRY_MISMATCH_POINTS;
            }
        }
    }

    score.min(100.0)
}

/// Network risk: anonymizing infrastructure flags and IP reputation. An
/// absent or syntactically invalid address voids all network evidence.
pub fn network_risk(ctx: &ScoringContext) -> f64 {
    let valid_ip = ctx.ip.as_deref().is_some_and(is_valid_ip);
    if !valid_ip {
        return 0.0;
    }
    let Some(signals) = ctx.signals.as_ref() else {
        return 0.0;
    };

    let mut score = 0.0;
    if signals.is_tor == Some(true) {
        score += NETWORK_TOR_POINTS;
    }
    if signals.is_vpn == Some(true) {
        score += NETWORK_VPN_POINTS;
    }
    if signals.is_proxy == Some(true) {
        score += NETWORK_PROXY_POINTS;
    }
    if let Some(reputation) = signals.reputation_score {
        if reputation < REPUTATION_CRITICAL_BELOW {
            score += NETWORK_REPUTATION_CRITICAL_POINTS;
        } else if reputation < REPUTATION_LOW_BELOW {
            score += NETWORK_REPUTATION_LOW_POINTS;
        }
    }

    score.min(100.0)
}

/// Velocity risk: the caller-computed velocity score, normalized.
pub fn velocity_risk(ctx: &ScoringContext) -> f64 {
    ctx.signals
        .as_ref()
        .and_then(|signals| signals.velocity_score)
        .map_or(0.0, normalize_factor_score)
}

/// The four built-in factors as generic configs, in canonical order.
pub fn standard_factors(weights: &RiskWeights) -> Vec<FactorConfig> {
    vec![
        FactorConfig::new(
            "device",
            FactorCategory::Device,
            weights.device,
            Arc::new(device_risk),
        ),
        FactorConfig::new("geo", FactorCategory::Geo, weights.geo, Arc::new(geo_risk)),
        FactorConfig::new(
            "network",
            FactorCategory::Network,
            weights.network,
            Arc::new(network_risk),
        ),
        FactorConfig::new(
            "velocity",
            FactorCategory::Velocity,
            weights.velocity,
            Arc::new(velocity_risk),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceInfo, GeoInfo, ScoringSignals};

    fn context(device_type: DeviceType, os: Option<&str>, browser: Option<&str>) -> ScoringContext {
        ScoringContext {
            device: DeviceInfo {
                device_id: "dev-1".to_string(),
                device_type,
                os: os.map(str::to_string),
                browser: browser.map(str::to_string),
            },
            geo: None,
            ip: None,
            signals: None,
        }
    }

    fn geo(country: &str) -> GeoInfo {
        GeoInfo {
            country: Some(country.to_string()),
            ..GeoInfo::default()
        }
    }

    #[test]
    fn test_device_risk_unknown_and_thin_fingerprint() {
        let ctx = context(DeviceType::Unknown, None, None);
        assert_eq!(device_risk(&ctx), 75.0);
    }

    #[test]
    fn test_device_risk_iot() {
        let ctx = context(DeviceType::IoT, Some("linux"), Some("curl"));
        assert_eq!(device_risk(&ctx), 30.0);
    }

    #[test]
    fn test_device_risk_known_full_fingerprint() {
        let ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        assert_eq!(device_risk(&ctx), 0.0);
    }

    #[test]
    fn test_device_risk_empty_strings_count_as_missing() {
        let ctx = context(DeviceType::Desktop, Some(""), Some("Firefox"));
        assert_eq!(device_risk(&ctx), 20.0);
    }

    #[test]
    fn test_geo_risk_country_mismatch() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        ctx.geo = Some(geo("DE"));
        ctx.signals = Some(ScoringSignals {
            previous_geo: Some(geo("US")),
            ..ScoringSignals::default()
        });
        assert_eq!(geo_risk(&ctx), 60.0);
    }

    #[test]
    fn test_geo_risk_high_risk_country_plus_mismatch_caps_at_100() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        ctx.geo = Some(geo("KP"));
        ctx.signals = Some(ScoringSignals {
            previous_geo: Some(geo("US")),
            ..ScoringSignals::default()
        });
        assert_eq!(geo_risk(&ctx), 100.0);
    }

    #[test]
    fn test_geo_risk_same_country_no_mismatch() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        ctx.geo = Some(geo("US"));
        ctx.signals = Some(ScoringSignals {
            previous_geo: Some(geo("US")),
            ..ScoringSignals::default()
        });
        assert_eq!(geo_risk(&ctx), 0.0);
    }

    #[test]
    fn test_geo_risk_missing_sides_contribute_nothing() {
        let ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        assert_eq!(geo_risk(&ctx), 0.0);

        let mut with_previous_only = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        with_previous_only.signals = Some(ScoringSignals {
            previous_geo: Some(geo("US")),
            ..ScoringSignals::default()
        });
        assert_eq!(geo_risk(&with_previous_only), 0.0);
    }

    #[test]
    fn test_network_risk_requires_valid_ip() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        ctx.signals = Some(ScoringSignals {
            is_tor: Some(true),
            ..ScoringSignals::default()
        });

        ctx.ip = None;
        assert_eq!(network_risk(&ctx), 0.0);

        ctx.ip = Some("999.1.1.1".to_string());
        assert_eq!(network_risk(&ctx), 0.0);

        ctx.ip = Some("185.220.101.5".to_string());
        assert_eq!(network_risk(&ctx), NETWORK_TOR_POINTS);
    }

    #[test]
    fn test_network_risk_flags_accumulate_and_cap() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        ctx.ip = Some("185.220.101.5".to_string());
        ctx.signals = Some(ScoringSignals {
            is_tor: Some(true),
            is_vpn: Some(true),
            is_proxy: Some(true),
            ..ScoringSignals::default()
        });
        assert_eq!(network_risk(&ctx), 100.0);
    }

    #[test]
    fn test_network_risk_reputation_tiers() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        ctx.ip = Some("8.8.8.8".to_string());

        ctx.signals = Some(ScoringSignals {
            reputation_score: Some(5.0),
            ..ScoringSignals::default()
        });
        assert_eq!(network_risk(&ctx), NETWORK_REPUTATION_CRITICAL_POINTS);

        ctx.signals = Some(ScoringSignals {
            reputation_score: Some(10.0),
            ..ScoringSignals::default()
        });
        assert_eq!(network_risk(&ctx), NETWORK_REPUTATION_LOW_POINTS);

        ctx.signals = Some(ScoringSignals {
            reputation_score: Some(49.9),
            ..ScoringSignals::default()
        });
        assert_eq!(network_risk(&ctx), NETWORK_REPUTATION_LOW_POINTS);

        ctx.signals = Some(ScoringSignals {
            reputation_score: Some(50.0),
            ..ScoringSignals::default()
        });
        assert_eq!(network_risk(&ctx), 0.0);
    }

    #[test]
    fn test_velocity_risk_normalizes() {
        let mut ctx = context(DeviceType::Desktop, Some("macOS"), Some("Firefox"));
        assert_eq!(velocity_risk(&ctx), 0.0);

        ctx.signals = Some(ScoringSignals {
            velocity_score: Some(42.0),
            ..ScoringSignals::default()
        });
        assert_eq!(velocity_risk(&ctx), 42.0);

        ctx.signals = Some(ScoringSignals {
            velocity_score: Some(250.0),
            ..ScoringSignals::default()
        });
        assert_eq!(velocity_risk(&ctx), 100.0);

        ctx.signals = Some(ScoringSignals {
            velocity_score: Some(f64::NAN),
            ..ScoringSignals::default()
        });
        assert_eq!(velocity_risk(&ctx), 0.0);
    }

    #[test]
    fn test_standard_factors_order_and_weights() {
        let weights = RiskWeights::default();
        let factors = standard_factors(&weights);
        let ids: Vec<&str> = factors.iter().map(FactorConfig::id).collect();
        assert_eq!(ids, vec!["device", "geo", "network", "velocity"]);
        assert_eq!(factors[0].weight, weights.device);
        assert_eq!(factors[3].weight, weights.velocity);
    }
}
