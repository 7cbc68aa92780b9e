//! Results documents: the JSON file a run writes and a later regression
//! check reads back as its baseline.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::config::StatsConfig;
use crate::domain::{EvalError, EvalResult, PricingTable};

/// Headline numbers over every result in a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsSummary {
    pub total_runs: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_score: f64,
    pub avg_tokens: u64,
    pub avg_duration_seconds: f64,
    pub avg_cost_usd: f64,
    pub pass_at_1: f64,
    pub pass_at_3: f64,
}

impl ResultsSummary {
    /// `None` for an empty result set.
    pub fn from_results(results: &[EvalResult], pricing: &PricingTable) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let config = StatsConfig {
            pass_at_k: vec![1, 3],
            ..StatsConfig::default()
        };
        let m = aggregate(results, pricing, &config);
        Some(Self {
            total_runs: m.total_runs,
            passed: m.passed,
            failed: m.failed,
            pass_rate: m.pass_rate,
            avg_score: m.avg_score,
            avg_tokens: m.avg_tokens,
            avg_duration_seconds: m.avg_duration,
            avg_cost_usd: m.avg_cost,
            pass_at_1: m.pass_at_k.get(&1).copied().unwrap_or_default(),
            pass_at_3: m.pass_at_k.get(&3).copied().unwrap_or_default(),
        })
    }
}

/// On-disk results document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsDocument {
    pub timestamp: DateTime<Utc>,
    pub num_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ResultsSummary>,
    pub results: Vec<EvalResult>,
}

impl ResultsDocument {
    pub fn new(results: Vec<EvalResult>, pricing: &PricingTable) -> Self {
        Self {
            timestamp: Utc::now(),
            num_results: results.len(),
            summary: ResultsSummary::from_results(&results, pricing),
            results,
        }
    }

    /// Reject documents whose declared count disagrees with their contents.
    pub fn validate(&self) -> std::result::Result<(), EvalError> {
        if self.num_results != self.results.len() {
            return Err(EvalError::MalformedResults(format!(
                "num_results is {} but {} results are present",
                self.num_results,
                self.results.len()
            )));
        }
        Ok(())
    }
}

/// Write a results document in pretty JSON format.
pub fn write_results_json(path: &Path, results: &[EvalResult], pricing: &PricingTable) -> Result<()> {
    let document = ResultsDocument::new(results.to_vec(), pricing);
    let content = serde_json::to_string_pretty(&document).context("serialize results document")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    tracing::info!(path = %path.display(), results = results.len(), "results written");
    Ok(())
}

/// Read a results document and return its results.
pub fn read_results_json(path: &Path) -> Result<Vec<EvalResult>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let document: ResultsDocument =
        serde_json::from_str(&raw).with_context(|| format!("parse results document {:?}", path))?;
    document
        .validate()
        .with_context(|| format!("validate {:?}", path))?;
    Ok(document.results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutionTrace;
    use serde_json::json;

    fn result(passed: bool) -> EvalResult {
        EvalResult {
            task_id: "t".to_string(),
            config_name: "c".to_string(),
            model: "m".to_string(),
            run_index: 0,
            timestamp: Utc::now(),
            trace: ExecutionTrace::default(),
            grades: Vec::new(),
            overall_score: if passed { 1.0 } else { 0.0 },
            passed,
        }
    }

    #[test]
    fn document_has_expected_keys() {
        let document = ResultsDocument::new(vec![result(true), result(false)], &PricingTable::default());
        let raw = serde_json::to_value(&document).expect("serialize document");
        let obj = raw.as_object().expect("document object");
        for key in ["timestamp", "num_results", "summary", "results"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["num_results"], json!(2));
        assert_eq!(raw["summary"]["passed"], json!(1));
        assert_eq!(raw["summary"]["pass_rate"], json!(0.5));
    }

    #[test]
    fn empty_results_have_no_summary() {
        let document = ResultsDocument::new(Vec::new(), &PricingTable::default());
        assert!(document.summary.is_none());
        let raw = serde_json::to_value(&document).expect("serialize document");
        assert!(raw.get("summary").is_none());
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let mut document = ResultsDocument::new(vec![result(true)], &PricingTable::default());
        document.num_results = 3;
        let err = document.validate().expect_err("mismatch must fail");
        assert!(matches!(err, EvalError::MalformedResults(_)));
    }
}
