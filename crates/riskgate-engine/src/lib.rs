//! Riskgate - Risk-Based Authentication Decision Engine
//!
//! Login-time risk assessment with:
//! - Weighted multi-factor scoring (device, geo, network, velocity)
//! - Sandboxed async/ML factors with per-factor timeouts
//! - Content-addressed score caching
//! - Declarative factor loading with a custom-factor plugin registry
//! - Decision hints, externalized rules, and audit dispatch
//!
//! # Assessment Path
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    LOGIN RISK ASSESSMENT                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  DeviceInfo + RiskContext                                    │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//! │  │ Validate │──►│ Plugins │──►│ Scoring  │──►│ Classify  │  │
//! │  │ fatal /  │   │ context │   │ cache +  │   │ rules +   │  │
//! │  │ degrade  │   │ extend  │   │ sandbox  │   │ decision  │  │
//! │  └──────────┘   └─────────┘   └──────────┘   └───────────┘  │
//! │                                                    │         │
//! │                                                    ▼         │
//! │                                               Audit Hooks    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scoring is deterministic for identical inputs: the wall clock only ever
//! touches operational concerns (cache expiry, audit timestamps), never a
//! score.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Module declarations
pub mod assess;
pub mod audit;
pub mod cache;
pub mod factors;
pub mod registry;
pub mod rules;
pub mod sandbox;
pub mod scoring;
pub mod signals;

pub use riskgate_common::{
    RiskError, RiskResult, SignalViolation, ValidationError, ViolationSeverity,
};

pub use assess::{ContextPlugin, LoginAssessor};
pub use audit::{AuditEvent, AuditEventKind, AuditHook, AuditLog, AuditQuery};
pub use cache::{cache_key, ScoreCache};
pub use factors::standard_factors;
pub use registry::{CustomFactorPlugin, FactorDescriptor, PluginRegistry};
pub use rules::{NoRules, RuleEvaluator};
pub use sandbox::{AsyncFactorSource, FnFactorSource};
pub use scoring::ScoringEngine;

// =============================================================================
// Core Types
// =============================================================================

/// Fingerprinted client device for one login attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: DeviceType,
    pub os: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Laptop,
    Mobile,
    Tablet,
    Server,
    IoT,
    Unknown,
}

/// Geographic attribution of an address or account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lng")]
    pub longitude: Option<f64>,
}

/// Network and behavioral signals forwarded by the caller. All fields are
/// optional; absent evidence never raises a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSignals {
    pub is_vpn: Option<bool>,
    pub is_tor: Option<bool>,
    pub is_proxy: Option<bool>,
    pub reputation_score: Option<f64>,
    pub velocity_score: Option<f64>,
    pub previous_geo: Option<GeoInfo>,
}

/// Everything a factor calculator may look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    pub device: DeviceInfo,
    pub geo: Option<GeoInfo>,
    pub ip: Option<String>,
    pub signals: Option<ScoringSignals>,
}

/// Untrusted request context accompanying a login attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskContext {
    pub ip: Option<String>,
    pub geo: Option<GeoInfo>,
    pub signals: Option<ScoringSignals>,
    /// ISO-8601 event time supplied by the caller. Required for assessment;
    /// the engine never substitutes the wall clock.
    pub timestamp: Option<String>,
    pub session_id: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Factor Model
// =============================================================================

/// Default per-factor timeout for async factors, in milliseconds.
pub const DEFAULT_FACTOR_TIMEOUT_MS: u64 = 5_000;

/// Hard ceiling any requested factor timeout is clamped to, in milliseconds.
pub const MAX_FACTOR_TIMEOUT_MS: u64 = 30_000;

/// Built-in factor families plus the escape hatch for registered plugins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FactorCategory {
    Device,
    Geo,
    Network,
    Velocity,
    Custom,
}

fn default_min_score() -> f64 {
    0.0
}

fn default_max_score() -> f64 {
    100.0
}

/// Identity and declared output contract of a factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorMetadata {
    pub id: String,
    pub category: FactorCategory,
    /// Timeout override in milliseconds, async factors only.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Declared lower bound of this factor's output.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Declared upper bound of this factor's output.
    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

impl FactorMetadata {
    pub fn new(id: impl Into<String>, category: FactorCategory) -> Self {
        Self {
            id: id.into(),
            category,
            timeout_ms: None,
            min_score: 0.0,
            max_score: 100.0,
        }
    }
}

/// Synchronous scoring function. Pure and deterministic, no I/O.
pub type SyncCalculator = Arc<dyn Fn(&ScoringContext) -> f64 + Send + Sync>;

/// A synchronous weighted factor.
#[derive(Clone)]
pub struct FactorConfig {
    pub metadata: FactorMetadata,
    pub weight: f64,
    pub calculate: SyncCalculator,
}

impl FactorConfig {
    pub fn new(
        id: impl Into<String>,
        category: FactorCategory,
        weight: f64,
        calculate: SyncCalculator,
    ) -> Self {
        Self {
            metadata: FactorMetadata::new(id, category),
            weight,
            calculate,
        }
    }

    /// Wrap a plain closure or fn item.
    pub fn from_fn<F>(
        id: impl Into<String>,
        category: FactorCategory,
        weight: f64,
        calculate: F,
    ) -> Self
    where
        F: Fn(&ScoringContext) -> f64 + Send + Sync + 'static,
    {
        Self::new(id, category, weight, Arc::new(calculate))
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Run this factor's calculator against a context.
    pub fn compute(&self, ctx: &ScoringContext) -> f64 {
        (*self.calculate)(ctx)
    }
}

impl fmt::Debug for FactorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorConfig")
            .field("metadata", &self.metadata)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// An asynchronous weighted factor, executed under sandbox rules: bounded
/// wait, fallback contribution of zero on timeout, error, or an
/// out-of-contract result.
#[derive(Clone)]
pub struct AsyncFactorConfig {
    pub metadata: FactorMetadata,
    pub weight: f64,
    pub source: Arc<dyn AsyncFactorSource>,
}

impl AsyncFactorConfig {
    pub fn new(id: impl Into<String>, weight: f64, source: Arc<dyn AsyncFactorSource>) -> Self {
        Self {
            metadata: FactorMetadata::new(id, FactorCategory::Custom),
            weight,
            source,
        }
    }

    /// Wrap an async closure or fn item.
    pub fn from_fn<F, Fut>(id: impl Into<String>, weight: f64, calculate: F) -> Self
    where
        F: Fn(ScoringContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<f64>> + Send + 'static,
    {
        Self::new(id, weight, Arc::new(FnFactorSource::new(calculate)))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.metadata.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_score_range(mut self, min: f64, max: f64) -> Self {
        self.metadata.min_score = min;
        self.metadata.max_score = max;
        self
    }

    /// Requested timeout clamped to the hard ceiling.
    pub fn effective_timeout(&self) -> Duration {
        let ms = self
            .metadata
            .timeout_ms
            .unwrap_or(DEFAULT_FACTOR_TIMEOUT_MS)
            .min(MAX_FACTOR_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl fmt::Debug for AsyncFactorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFactorConfig")
            .field("metadata", &self.metadata)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// A sync or async factor in one mixed scoring list.
#[derive(Debug, Clone)]
pub enum Factor {
    Sync(FactorConfig),
    Async(AsyncFactorConfig),
}

impl Factor {
    pub fn id(&self) -> &str {
        match self {
            Factor::Sync(factor) => factor.id(),
            Factor::Async(factor) => factor.id(),
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Factor::Sync(factor) => factor.weight,
            Factor::Async(factor) => factor.weight,
        }
    }
}

// =============================================================================
// Policy & Decisions
// =============================================================================

/// Relative weight of each built-in factor family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub device: f64,
    pub geo: f64,
    pub network: f64,
    pub velocity: f64,
}

impl RiskWeights {
    pub fn sum(&self) -> f64 {
        self.device + self.geo + self.network + self.velocity
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            device: 0.30,
            geo: 0.25,
            network: 0.25,
            velocity: 0.20,
        }
    }
}

/// Inclusive lower bounds of the medium, high and critical bands. Scores
/// below `medium` are low risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: u8,
    pub high: u8,
    pub critical: u8,
}

impl RiskThresholds {
    /// Map a score to its band.
    pub fn classify(&self, score: u8) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Bands must be strictly increasing so every score maps to exactly one
    /// level.
    pub fn validate(&self) -> RiskResult<()> {
        if self.medium < self.high && self.high < self.critical && self.critical <= 100 {
            Ok(())
        } else {
            Err(RiskError::InvalidThresholds(format!(
                "medium {} / high {} / critical {} must be strictly increasing and at most 100",
                self.medium, self.high, self.critical
            )))
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 25,
            high: 50,
            critical: 75,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// What the caller should do with the login attempt. Ordered by severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Login = 0,
    Mfa = 1,
    Block = 2,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DecisionAction::Login => "login",
            DecisionAction::Mfa => "mfa",
            DecisionAction::Block => "block",
        };
        f.write_str(label)
    }
}

/// Recommended action plus every pressure that contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionHint {
    pub action: DecisionAction,
    pub reasons: Vec<String>,
}

/// Record of an externally evaluated rule that fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredRule {
    pub rule_id: String,
    pub name: String,
    pub action: DecisionAction,
}

/// Flattened view of the request handed to rule evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleContext {
    pub device_id: String,
    pub device_type: DeviceType,
    pub ip: Option<String>,
    pub country: Option<String>,
    pub timestamp_ms: i64,
    /// Free-form attributes contributed by context plugins.
    pub attributes: HashMap<String, serde_json::Value>,
}

impl RuleContext {
    pub fn from_parts(device: &DeviceInfo, context: &RiskContext, timestamp_ms: i64) -> Self {
        Self {
            device_id: device.device_id.clone(),
            device_type: device.device_type,
            ip: context.ip.clone(),
            country: context.geo.as_ref().and_then(|geo| geo.country.clone()),
            timestamp_ms,
            attributes: HashMap::new(),
        }
    }
}

/// Free-form attributes attached to the assessment record by plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentContext {
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Normalized record of one assessed login attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub device_id: String,
    pub session_id: Option<String>,
    pub ip: Option<String>,
    /// Event time in epoch milliseconds, parsed from the caller-supplied
    /// timestamp.
    pub timestamp_ms: i64,
    /// Non-blocking violations that were observed and allowed through.
    pub degraded_signals: Vec<SignalViolation>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Full outcome of a login risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentResult {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub triggered_rules: Vec<TriggeredRule>,
    pub decision_hint: DecisionHint,
    pub assessment: Assessment,
}

/// Tunable policy for one assessment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPolicy {
    /// Factor weight overrides; engine defaults apply when absent.
    pub weights: Option<RiskWeights>,
    pub thresholds: RiskThresholds,
    /// Lowest risk level that recommends an MFA challenge.
    pub mfa_at: RiskLevel,
    /// Lowest risk level that recommends blocking outright.
    pub block_at: RiskLevel,
    /// Also dispatch MFA challenges to the audit hook.
    pub audit_challenges: bool,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            weights: None,
            thresholds: RiskThresholds::default(),
            mfa_at: RiskLevel::High,
            block_at: RiskLevel::Critical,
            audit_challenges: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((RiskWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_classification_inclusive_lower_bounds() {
        let thresholds = RiskThresholds::default();
        assert_eq!(thresholds.classify(0), RiskLevel::Low);
        assert_eq!(thresholds.classify(24), RiskLevel::Low);
        assert_eq!(thresholds.classify(25), RiskLevel::Medium);
        assert_eq!(thresholds.classify(49), RiskLevel::Medium);
        assert_eq!(thresholds.classify(50), RiskLevel::High);
        assert_eq!(thresholds.classify(74), RiskLevel::High);
        assert_eq!(thresholds.classify(75), RiskLevel::Critical);
        assert_eq!(thresholds.classify(100), RiskLevel::Critical);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(RiskThresholds::default().validate().is_ok());
        let overlapping = RiskThresholds {
            medium: 50,
            high: 50,
            critical: 75,
        };
        assert!(overlapping.validate().is_err());
        let inverted = RiskThresholds {
            medium: 80,
            high: 50,
            critical: 90,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_action_and_level_ordering() {
        assert!(DecisionAction::Login < DecisionAction::Mfa);
        assert!(DecisionAction::Mfa < DecisionAction::Block);
        assert!(RiskLevel::Low < RiskLevel::Critical);
    }

    #[test]
    fn test_wire_field_names() {
        let device = DeviceInfo {
            device_id: "dev-1".to_string(),
            device_type: DeviceType::IoT,
            os: None,
            browser: None,
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["deviceId"], "dev-1");
        assert_eq!(json["deviceType"], "iot");

        let geo = GeoInfo {
            latitude: Some(52.52),
            longitude: Some(13.405),
            ..GeoInfo::default()
        };
        let json = serde_json::to_value(&geo).unwrap();
        assert_eq!(json["lat"], 52.52);
        assert_eq!(json["lng"], 13.405);

        let signals: ScoringSignals =
            serde_json::from_str(r#"{"isVpn":true,"reputationScore":42.0}"#).unwrap();
        assert_eq!(signals.is_vpn, Some(true));
        assert_eq!(signals.reputation_score, Some(42.0));
        assert_eq!(signals.is_tor, None);
    }
}
