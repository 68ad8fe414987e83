//! Login Risk Assessment
//!
//! Orchestrates one login attempt end to end: timestamp normalization,
//! signal validation, plugin context extension, scoring, risk-level
//! classification, external rule evaluation, decision-hint determination
//! and audit dispatch.

use std::sync::Arc;

use riskgate_common::{RiskError, RiskResult, ValidationError};

use crate::audit::AuditHook;
use crate::factors::{standard_factors, REPUTATION_CRITICAL_BELOW};
use crate::rules::{NoRules, RuleEvaluator};
use crate::scoring::ScoringEngine;
use crate::signals::{partition_violations, validate_signals};
use crate::{
    Assessment, AssessmentContext, DecisionAction, DecisionHint, DeviceInfo, Factor,
    RiskAssessmentResult, RiskContext, RiskLevel, RiskPolicy, RuleContext, ScoringContext,
    TriggeredRule,
};

/// Context-builder plugin applied in registration order while deriving the
/// scoring, rule and assessment contexts. Every hook defaults to identity,
/// implement only what the plugin needs.
pub trait ContextPlugin: Send + Sync {
    /// Plugin name for diagnostics.
    fn name(&self) -> &str;

    fn extend_scoring_context(&self, ctx: ScoringContext, _risk: &RiskContext) -> ScoringContext {
        ctx
    }

    fn extend_rule_context(&self, ctx: RuleContext, _risk: &RiskContext) -> RuleContext {
        ctx
    }

    fn extend_assessment_context(
        &self,
        ctx: AssessmentContext,
        _risk: &RiskContext,
    ) -> AssessmentContext {
        ctx
    }
}

/// Composition root over the scoring engine, the rule boundary, optional
/// ML factors and audit dispatch.
pub struct LoginAssessor {
    engine: ScoringEngine,
    rules: Arc<dyn RuleEvaluator>,
    ml_factors: Vec<Factor>,
}

impl LoginAssessor {
    pub fn new(engine: ScoringEngine) -> Self {
        Self {
            engine,
            rules: Arc::new(NoRules),
            ml_factors: Vec::new(),
        }
    }

    /// Attach an external rule evaluator.
    pub fn with_rules(mut self, rules: Arc<dyn RuleEvaluator>) -> Self {
        self.rules = rules;
        self
    }

    /// Attach async/ML factors. When any are present, assessments take the
    /// mixed scoring path with its own cache.
    pub fn with_ml_factors(mut self, factors: Vec<Factor>) -> Self {
        self.ml_factors = factors;
        self
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Assess one login attempt.
    pub async fn assess_login_risk(
        &self,
        device: &DeviceInfo,
        context: &RiskContext,
        policy: Option<&RiskPolicy>,
        plugins: &[Arc<dyn ContextPlugin>],
        audit_hook: Option<&dyn AuditHook>,
    ) -> RiskResult<RiskAssessmentResult> {
        // 1. Normalize the event timestamp, failing fast without one
        let timestamp = context
            .timestamp
            .as_deref()
            .ok_or(RiskError::MissingTimestamp)?;
        let timestamp_ms = parse_timestamp(timestamp)?;

        // 2. Reject blocking signal violations before any scoring work
        let (blocking, degraded) = partition_violations(validate_signals(context));
        if !blocking.is_empty() {
            return Err(ValidationError::new(blocking).into());
        }
        for violation in &degraded {
            tracing::warn!(
                field = %violation.field,
                message = %violation.message,
                "degraded login signal"
            );
        }

        // 3. Policy sanity
        let policy = policy.cloned().unwrap_or_default();
        policy.thresholds.validate()?;

        // 4. Derive contexts, applying plugins in registration order
        let mut scoring_ctx = ScoringContext {
            device: device.clone(),
            geo: context.geo.clone(),
            ip: context.ip.clone(),
            signals: context.signals.clone(),
        };
        let mut rule_ctx = RuleContext::from_parts(device, context, timestamp_ms);
        let mut assessment_ctx = AssessmentContext::default();
        for plugin in plugins {
            tracing::debug!(plugin = %plugin.name(), "applying context plugin");
            scoring_ctx = plugin.extend_scoring_context(scoring_ctx, context);
            rule_ctx = plugin.extend_rule_context(rule_ctx, context);
            assessment_ctx = plugin.extend_assessment_context(assessment_ctx, context);
        }

        // 5. Score
        let score = if self.ml_factors.is_empty() {
            self.engine
                .score(&scoring_ctx, policy.weights.as_ref(), true)
        } else {
            let weights = policy.weights.unwrap_or(*self.engine.weights());
            let mut factors: Vec<Factor> = standard_factors(&weights)
                .into_iter()
                .map(Factor::Sync)
                .collect();
            factors.extend(self.ml_factors.iter().cloned());
            self.engine
                .score_with_async_factors(&scoring_ctx, &factors, true)
                .await
        };

        // 6. Classify
        let level = policy.thresholds.classify(score);

        // 7. External rules
        let triggered = self.rules.evaluate(&rule_ctx, score, level).await;

        // 8. Decision
        let reputation = context
            .signals
            .as_ref()
            .and_then(|signals| signals.reputation_score);
        let hint = determine_decision_hint(level, &triggered, reputation, &policy);

        // 9. Assemble the result
        let result = RiskAssessmentResult {
            risk_score: score,
            risk_level: level,
            triggered_rules: triggered,
            decision_hint: hint,
            assessment: Assessment {
                device_id: device.device_id.clone(),
                session_id: context.session_id.clone(),
                ip: context.ip.clone(),
                timestamp_ms,
                degraded_signals: degraded,
                attributes: assessment_ctx.attributes,
            },
        };

        // 10. Dispatch outcomes the policy wants recorded
        dispatch_audit(&result, context, &policy, audit_hook);

        Ok(result)
    }
}

impl Default for LoginAssessor {
    fn default() -> Self {
        Self::new(ScoringEngine::new())
    }
}

/// Parse the caller-supplied ISO-8601 timestamp to epoch milliseconds.
fn parse_timestamp(value: &str) -> RiskResult<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.timestamp_millis())
        .map_err(|error| RiskError::InvalidTimestamp {
            value: value.to_string(),
            reason: error.to_string(),
        })
}

/// Combine risk level, rule outcomes and reputation pressure into the final
/// hint. The most severe requested action wins; reasons enumerate every
/// contributing pressure.
pub fn determine_decision_hint(
    level: RiskLevel,
    triggered: &[TriggeredRule],
    reputation: Option<f64>,
    policy: &RiskPolicy,
) -> DecisionHint {
    let mut action = DecisionAction::Login;
    let mut reasons = Vec::new();

    if level >= policy.block_at {
        action = DecisionAction::Block;
        reasons.push(format!("risk level {level} at or above block threshold"));
    } else if level >= policy.mfa_at {
        action = DecisionAction::Mfa;
        reasons.push(format!("risk level {level} at or above challenge threshold"));
    }

    for rule in triggered {
        if rule.action > DecisionAction::Login {
            reasons.push(format!("rule {} requests {}", rule.rule_id, rule.action));
            if rule.action > action {
                action = rule.action;
            }
        }
    }

    if let Some(reputation) = reputation {
        if reputation.is_finite() && reputation < REPUTATION_CRITICAL_BELOW {
            reasons.push(format!("ip reputation {reputation} below critical cutoff"));
            if action < DecisionAction::Mfa {
                action = DecisionAction::Mfa;
            }
        }
    }

    if reasons.is_empty() {
        reasons.push("no elevated risk signals".to_string());
    }

    DecisionHint { action, reasons }
}

fn dispatch_audit(
    result: &RiskAssessmentResult,
    context: &RiskContext,
    policy: &RiskPolicy,
    hook: Option<&dyn AuditHook>,
) {
    let Some(hook) = hook else {
        return;
    };
    let audited = match result.decision_hint.action {
        DecisionAction::Block => true,
        DecisionAction::Mfa => policy.audit_challenges,
        DecisionAction::Login => false,
    };
    if !audited {
        return;
    }
    if let Err(error) = hook.on_assessment(result, context) {
        tracing::warn!(error = %error, "audit hook failed");
    }
}
