//! Declarative Factor Loading
//!
//! Factor descriptors are plain data (config files, database rows) resolved
//! against the built-in calculators and an explicitly registered
//! custom-factor table. There is no dynamic code evaluation: a `custom`
//! descriptor can only name a plugin registered ahead of time. Invalid
//! descriptors are dropped with a warning, never fatal.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{factors, FactorCategory, FactorConfig, FactorMetadata, ScoringContext, SyncCalculator};

/// JSON-declarable factor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorDescriptor {
    pub id: String,
    pub weight: f64,
    #[serde(rename = "type")]
    pub factor_type: FactorCategory,
    /// Required when `type` is `custom`, meaningless otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
}

impl FactorDescriptor {
    /// Structural schema check. Resolution against the plugin table happens
    /// separately in [`build_factors`].
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must be non-empty".to_string());
        }
        if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
            return Err(format!("weight {} outside [0, 1]", self.weight));
        }
        if self.factor_type == FactorCategory::Custom
            && self.plugin_id.as_deref().map_or(true, |id| id.trim().is_empty())
        {
            return Err("custom factor requires a pluginId".to_string());
        }
        Ok(())
    }
}

/// A named custom factor registration.
#[derive(Clone)]
pub struct CustomFactorPlugin {
    pub id: String,
    pub calculate: SyncCalculator,
}

impl CustomFactorPlugin {
    pub fn new<F>(id: impl Into<String>, calculate: F) -> Self
    where
        F: Fn(&ScoringContext) -> f64 + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            calculate: Arc::new(calculate),
        }
    }
}

/// Custom factor table shared by the embedding service. Registration under
/// an already-used id replaces the previous calculator.
pub struct PluginRegistry {
    plugins: DashMap<String, SyncCalculator>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: DashMap::new(),
        }
    }

    pub fn register(&self, plugin: CustomFactorPlugin) {
        tracing::debug!(plugin_id = %plugin.id, "registering custom factor plugin");
        self.plugins.insert(plugin.id, plugin.calculate);
    }

    pub fn register_fn<F>(&self, id: impl Into<String>, calculate: F)
    where
        F: Fn(&ScoringContext) -> f64 + Send + Sync + 'static,
    {
        self.register(CustomFactorPlugin::new(id, calculate));
    }

    pub fn resolve(&self, id: &str) -> Option<SyncCalculator> {
        self.plugins.get(id).map(|entry| entry.value().clone())
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.plugins.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build runnable factor configs from descriptors. Descriptors that fail
/// validation or plugin resolution are dropped with a warning; the order of
/// the survivors is preserved.
pub fn build_factors(
    descriptors: &[FactorDescriptor],
    registry: &PluginRegistry,
) -> Vec<FactorConfig> {
    let mut configs = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        match build_one(descriptor, registry) {
            Ok(config) => configs.push(config),
            Err(reason) => {
                tracing::warn!(
                    factor_id = %descriptor.id,
                    %reason,
                    "dropping invalid factor descriptor"
                );
            }
        }
    }
    configs
}

fn build_one(
    descriptor: &FactorDescriptor,
    registry: &PluginRegistry,
) -> Result<FactorConfig, String> {
    descriptor.validate()?;
    let calculate: SyncCalculator = match descriptor.factor_type {
        FactorCategory::Device => Arc::new(factors::device_risk),
        FactorCategory::Geo => Arc::new(factors::geo_risk),
        FactorCategory::Network => Arc::new(factors::network_risk),
        FactorCategory::Velocity => Arc::new(factors::velocity_risk),
        FactorCategory::Custom => {
            let plugin_id = descriptor.plugin_id.as_deref().unwrap_or_default();
            registry
                .resolve(plugin_id)
                .ok_or_else(|| format!("no plugin registered under {plugin_id:?}"))?
        }
    };
    Ok(FactorConfig {
        metadata: FactorMetadata::new(descriptor.id.clone(), descriptor.factor_type),
        weight: descriptor.weight,
        calculate,
    })
}

/// Parse a JSON array of descriptors.
pub fn descriptors_from_json(json: &str) -> Result<Vec<FactorDescriptor>, serde_json::Error> {
    serde_json::from_str(json)
}
