//! Weighted Scoring Engine
//!
//! Combines normalized factor outputs into the final integer risk score in
//! `0..=100`. Owns the sync- and async-path score caches; the two stay
//! separate because their result domains are not interchangeable.

use riskgate_common::{finalize_score, normalize_factor_score};

use crate::cache::{cache_key, ScoreCache};
use crate::factors::standard_factors;
use crate::sandbox;
use crate::{Factor, FactorConfig, RiskWeights, ScoringContext};

/// Tolerated deviation of a factor weight sum from 1.0 before the engine
/// renormalizes proportionally.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.1;

/// Weighted risk scoring engine with per-path caches.
pub struct ScoringEngine {
    weights: RiskWeights,
    sync_cache: ScoreCache,
    async_cache: ScoreCache,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::with_weights(RiskWeights::default())
    }

    pub fn with_weights(weights: RiskWeights) -> Self {
        Self::with_caches(
            weights,
            ScoreCache::with_defaults(),
            ScoreCache::with_defaults(),
        )
    }

    /// Full dependency injection for embedders that tune cache behavior.
    pub fn with_caches(weights: RiskWeights, sync_cache: ScoreCache, async_cache: ScoreCache) -> Self {
        Self {
            weights,
            sync_cache,
            async_cache,
        }
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Score with the four built-in factors.
    pub fn score(&self, ctx: &ScoringContext, weights: Option<&RiskWeights>, use_cache: bool) -> u8 {
        let weights = weights.copied().unwrap_or(self.weights);
        self.score_with_factors(ctx, &standard_factors(&weights), use_cache)
    }

    /// Score with an arbitrary synchronous factor list.
    ///
    /// Results land in the shared sync-path cache keyed by context alone,
    /// so callers that vary factors or weights per call for the same
    /// context should pass `use_cache = false`.
    pub fn score_with_factors(
        &self,
        ctx: &ScoringContext,
        factors: &[FactorConfig],
        use_cache: bool,
    ) -> u8 {
        if use_cache {
            let key = cache_key(ctx);
            if let Some(score) = self.sync_cache.get(&key) {
                return score;
            }
            let score = compute_sync(ctx, factors);
            self.sync_cache.insert(key, score);
            return score;
        }
        compute_sync(ctx, factors)
    }

    /// Score a mixed sync/async factor list. Async factors run under the
    /// sandbox rules in [`crate::sandbox`].
    pub async fn score_with_async_factors(
        &self,
        ctx: &ScoringContext,
        factors: &[Factor],
        use_cache: bool,
    ) -> u8 {
        if use_cache {
            let key = cache_key(ctx);
            if let Some(score) = self.async_cache.get(&key) {
                return score;
            }
            let score = compute_mixed(ctx, factors).await;
            self.async_cache.insert(key, score);
            return score;
        }
        compute_mixed(ctx, factors).await
    }

    pub fn clear_score_cache(&self) {
        self.sync_cache.clear();
    }

    pub fn clear_async_score_cache(&self) {
        self.async_cache.clear();
    }

    pub fn score_cache_size(&self) -> usize {
        self.sync_cache.len()
    }

    pub fn async_score_cache_size(&self) -> usize {
        self.async_cache.len()
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_sync(ctx: &ScoringContext, factors: &[FactorConfig]) -> u8 {
    let scores: Vec<f64> = factors
        .iter()
        .map(|factor| normalize_factor_score(factor.compute(ctx)))
        .collect();
    let weights: Vec<f64> = factors.iter().map(|factor| factor.weight).collect();
    combine(&scores, &weights)
}

async fn compute_mixed(ctx: &ScoringContext, factors: &[Factor]) -> u8 {
    let mut scores = vec![0.0f64; factors.len()];
    let mut async_batch = Vec::new();
    let mut async_slots = Vec::new();

    for (idx, factor) in factors.iter().enumerate() {
        match factor {
            Factor::Sync(config) => {
                scores[idx] = normalize_factor_score(config.compute(ctx));
            }
            Factor::Async(config) => {
                async_slots.push(idx);
                async_batch.push(config.clone());
            }
        }
    }

    let sandboxed = sandbox::run_factors(ctx, &async_batch).await;
    for (slot, score) in async_slots.into_iter().zip(sandboxed) {
        scores[slot] = score;
    }

    let weights: Vec<f64> = factors.iter().map(Factor::weight).collect();
    combine(&scores, &weights)
}

/// Weighted combination with proportional renormalization when the weight
/// sum drifts outside tolerance.
fn combine(scores: &[f64], weights: &[f64]) -> u8 {
    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        tracing::warn!(weight_sum = sum, "non-positive factor weight sum; score degrades to 0");
        return 0;
    }

    let scale = if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        tracing::warn!(
            weight_sum = sum,
            "factor weight sum outside tolerance; renormalizing proportionally"
        );
        1.0 / sum
    } else {
        1.0
    };

    let weighted: f64 = scores
        .iter()
        .zip(weights)
        .map(|(score, weight)| score * weight * scale)
        .sum();
    finalize_score(weighted)
}
