//! Token pricing and cost derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::trace::TokenUsage;

/// Per-million-token prices in USD.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

/// Default prices plus per-model overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PricingTable {
    pub default: ModelPricing,
    pub models: BTreeMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    pub fn for_model(&self, model: &str) -> ModelPricing {
        self.models.get(model).copied().unwrap_or(self.default)
    }
}

/// USD cost of one run, derived linearly from its token usage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CostMetrics {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
}

impl CostMetrics {
    pub fn from_usage(usage: &TokenUsage, pricing: &ModelPricing) -> Self {
        let input_cost_usd = usage.input_tokens as f64 * pricing.input_per_million / 1_000_000.0;
        let output_cost_usd =
            usage.output_tokens as f64 * pricing.output_per_million / 1_000_000.0;
        Self {
            input_cost_usd,
            output_cost_usd,
            total_cost_usd: input_cost_usd + output_cost_usd,
        }
    }
}
