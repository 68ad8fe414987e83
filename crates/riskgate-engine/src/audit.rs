//! Audit Dispatch
//!
//! Hook contract for auditable assessment outcomes plus an in-memory,
//! queryable audit trail. Hook failures are logged at the dispatch site and
//! never fail the login path.

use crate::{DecisionAction, RiskAssessmentResult, RiskContext, RiskLevel};

/// Receiver for auditable assessment outcomes. Dispatched for blocked
/// logins, and for MFA challenges when the policy asks for them.
pub trait AuditHook: Send + Sync {
    fn on_assessment(
        &self,
        result: &RiskAssessmentResult,
        context: &RiskContext,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    LoginBlocked,
    MfaChallenged,
    LoginAllowed,
}

impl From<DecisionAction> for AuditEventKind {
    fn from(action: DecisionAction) -> Self {
        match action {
            DecisionAction::Block => AuditEventKind::LoginBlocked,
            DecisionAction::Mfa => AuditEventKind::MfaChallenged,
            DecisionAction::Login => AuditEventKind::LoginAllowed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: String,
    pub kind: AuditEventKind,
    pub device_id: String,
    pub session_id: Option<String>,
    pub ip: Option<String>,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub action: DecisionAction,
    pub reasons: Vec<String>,
    /// Event time of the assessed login, epoch milliseconds.
    pub assessment_timestamp_ms: i64,
    /// When this trail entry was written.
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// In-memory audit trail.
pub struct AuditLog {
    events: dashmap::DashMap<String, AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            events: dashmap::DashMap::new(),
        }
    }

    fn store_event(&self, event: AuditEvent) {
        tracing::info!(
            kind = ?event.kind,
            device_id = %event.device_id,
            risk_score = event.risk_score,
            action = %event.action,
            "audit event"
        );

        self.events.insert(event.id.clone(), event);
    }

    /// Query recorded events. Results are unordered.
    pub fn query(&self, query: AuditQuery) -> Vec<AuditEvent> {
        self.events
            .iter()
            .filter(|event| {
                if let Some(device_id) = &query.device_id {
                    if &event.device_id != device_id {
                        return false;
                    }
                }

                if !query.kinds.is_empty() && !query.kinds.contains(&event.kind) {
                    return false;
                }

                if let Some(from_ms) = query.from_ms {
                    if event.assessment_timestamp_ms < from_ms {
                        return false;
                    }
                }
                if let Some(to_ms) = query.to_ms {
                    if event.assessment_timestamp_ms > to_ms {
                        return false;
                    }
                }

                true
            })
            .map(|event| event.clone())
            .take(query.limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&self) {
        self.events.clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditHook for AuditLog {
    fn on_assessment(
        &self,
        result: &RiskAssessmentResult,
        context: &RiskContext,
    ) -> anyhow::Result<()> {
        let event = AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            kind: result.decision_hint.action.into(),
            device_id: result.assessment.device_id.clone(),
            session_id: context.session_id.clone(),
            ip: context.ip.clone(),
            risk_score: result.risk_score,
            risk_level: result.risk_level,
            action: result.decision_hint.action,
            reasons: result.decision_hint.reasons.clone(),
            assessment_timestamp_ms: result.assessment.timestamp_ms,
            recorded_at: chrono::Utc::now(),
        };

        self.store_event(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct AuditQuery {
    pub device_id: Option<String>,
    pub kinds: Vec<AuditEventKind>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub limit: usize,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }
}
