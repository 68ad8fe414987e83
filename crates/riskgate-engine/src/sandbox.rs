//! Async Factor Sandbox
//!
//! Execution discipline for ML and other async factors. Every factor runs
//! concurrently under its own deadline; a factor that times out, errors,
//! panics, or settles outside its declared score range contributes zero
//! instead of failing the assessment. Deadlines are logical: an overrunning
//! computation keeps running detached and its eventual result is ignored.

use std::future::Future;

use async_trait::async_trait;
use tokio::task::JoinSet;

use riskgate_common::score_in_declared_range;

use crate::{AsyncFactorConfig, ScoringContext};

/// An asynchronous score source, typically an ML model or an external
/// enrichment service.
#[async_trait]
pub trait AsyncFactorSource: Send + Sync {
    /// Compute this factor's raw score for the supplied context.
    async fn calculate(&self, ctx: &ScoringContext) -> anyhow::Result<f64>;
}

/// Adapter turning an async closure into an [`AsyncFactorSource`].
pub struct FnFactorSource<F> {
    calculate: F,
}

impl<F> FnFactorSource<F> {
    pub fn new(calculate: F) -> Self {
        Self { calculate }
    }
}

#[async_trait]
impl<F, Fut> AsyncFactorSource for FnFactorSource<F>
where
    F: Fn(ScoringContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<f64>> + Send + 'static,
{
    async fn calculate(&self, ctx: &ScoringContext) -> anyhow::Result<f64> {
        (self.calculate)(ctx.clone()).await
    }
}

/// Run a batch of async factors concurrently and return their sandboxed
/// scores in input order.
///
/// Wall-clock time is bounded by the largest effective timeout in the
/// batch, not the sum.
pub async fn run_factors(ctx: &ScoringContext, factors: &[AsyncFactorConfig]) -> Vec<f64> {
    let mut supervisors = JoinSet::new();

    for (idx, factor) in factors.iter().enumerate() {
        let source = factor.source.clone();
        let metadata = factor.metadata.clone();
        let deadline = factor.effective_timeout();
        let call_ctx = ctx.clone();

        supervisors.spawn(async move {
            let work = tokio::spawn(async move { source.calculate(&call_ctx).await });
            let score = match tokio::time::timeout(deadline, work).await {
                Ok(Ok(Ok(value))) => {
                    if score_in_declared_range(value, metadata.min_score, metadata.max_score) {
                        value
                    } else {
                        tracing::warn!(
                            factor = %metadata.id,
                            value,
                            min = metadata.min_score,
                            max = metadata.max_score,
                            "async factor settled outside its declared range"
                        );
                        0.0
                    }
                }
                Ok(Ok(Err(error))) => {
                    tracing::warn!(factor = %metadata.id, error = %error, "async factor failed");
                    0.0
                }
                Ok(Err(join_error)) => {
                    tracing::warn!(
                        factor = %metadata.id,
                        error = %join_error,
                        "async factor panicked"
                    );
                    0.0
                }
                Err(_) => {
                    // The dropped handle detaches the computation rather
                    // than aborting it.
                    tracing::warn!(
                        factor = %metadata.id,
                        timeout_ms = deadline.as_millis() as u64,
                        "async factor timed out"
                    );
                    0.0
                }
            };
            (idx, score)
        });
    }

    let mut scores = vec![0.0; factors.len()];
    while let Some(joined) = supervisors.join_next().await {
        match joined {
            Ok((idx, score)) => scores[idx] = score,
            Err(error) => {
                tracing::warn!(error = %error, "factor supervisor failed");
            }
        }
    }
    scores
}
