//! Rule Evaluation Boundary
//!
//! Rule matching lives outside this engine. The assessment layer hands a
//! flattened rule context plus the computed score to a [`RuleEvaluator`]
//! and consumes the ordered list of rules that fired.

use async_trait::async_trait;

use crate::{RiskLevel, RuleContext, TriggeredRule};

/// External rule engine seam.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    /// Evaluate the configured rules against one login attempt. The
    /// returned order is preserved in the assessment result.
    async fn evaluate(&self, ctx: &RuleContext, score: u8, level: RiskLevel) -> Vec<TriggeredRule>;
}

/// Evaluator that never fires anything. The default when an embedding
/// service has no rule engine wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

#[async_trait]
impl RuleEvaluator for NoRules {
    async fn evaluate(
        &self,
        _ctx: &RuleContext,
        _score: u8,
        _level: RiskLevel,
    ) -> Vec<TriggeredRule> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceInfo, DeviceType, RiskContext};

    #[tokio::test]
    async fn test_no_rules_fires_nothing() {
        let device = DeviceInfo {
            device_id: "dev-1".to_string(),
            device_type: DeviceType::Desktop,
            os: Some("macOS".to_string()),
            browser: Some("Firefox".to_string()),
        };
        let ctx = RuleContext::from_parts(&device, &RiskContext::default(), 1_700_000_000_000);
        let fired = NoRules.evaluate(&ctx, 80, RiskLevel::Critical).await;
        assert!(fired.is_empty());
    }
}
