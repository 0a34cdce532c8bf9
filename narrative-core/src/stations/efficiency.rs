//! Station 4: efficiency metrics and improvement recommendations.

use super::{ask, payload_status};
use crate::analysis::{EfficiencyAnalyzer, EfficiencyMetrics};
use crate::network::ConflictNetwork;
use crate::oracle::{string_list, Oracle, OracleRequest};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

const ANALYSIS_FAILED: &str = "Analysis failed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyInput {
    pub conflict_network: ConflictNetwork,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub priority_actions: Vec<String>,
    pub quick_fixes: Vec<String>,
    pub structural_revisions: Vec<String>,
}

impl Recommendations {
    fn from_payload(payload: &Value) -> Self {
        Self {
            priority_actions: string_list(payload, "priority_actions"),
            quick_fixes: string_list(payload, "quick_fixes"),
            structural_revisions: string_list(payload, "structural_revisions"),
        }
    }

    fn failed() -> Self {
        let failed = vec![ANALYSIS_FAILED.to_string()];
        Self {
            priority_actions: failed.clone(),
            quick_fixes: failed.clone(),
            structural_revisions: failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyOutput {
    pub efficiency_metrics: EfficiencyMetrics,
    pub recommendations: Recommendations,
    pub analysis_time_ms: u64,
    pub metadata: StageMetadata,
}

pub struct EfficiencyStation {
    oracle: Arc<dyn Oracle>,
    analyzer: EfficiencyAnalyzer,
}

impl EfficiencyStation {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            analyzer: EfficiencyAnalyzer::new(),
        }
    }

    async fn recommend(&self, metrics: &EfficiencyMetrics) -> Result<Value, StationError> {
        let prompt = format!(
            r#"Here is an efficiency analysis of a story's dramatic network:

## Metrics
- Overall score: {score:.1}/100
- Rating: {rating}
- Conflict cohesion: {cohesion:.2}
- Dramatic balance: {balance:.2}
- Narrative efficiency: characters {characters:.2}, relationships {relationships:.2}, conflicts {conflicts:.2}
- Average redundancy: {redundancy:.2}

Suggest specific, practical recommendations to improve the network.

Respond with ONLY a JSON object:
{{
  "priority_actions": ["High-priority action 1", "High-priority action 2", "High-priority action 3"],
  "quick_fixes": ["Quick fix 1", "Quick fix 2", "Quick fix 3"],
  "structural_revisions": ["Structural revision 1", "Structural revision 2"]
}}"#,
            score = metrics.overall_efficiency_score,
            rating = metrics.overall_rating,
            cohesion = metrics.conflict_cohesion,
            balance = metrics.dramatic_balance.balance_score,
            characters = metrics.narrative_efficiency.character_efficiency,
            relationships = metrics.narrative_efficiency.relationship_efficiency,
            conflicts = metrics.narrative_efficiency.conflict_efficiency,
            redundancy = metrics.redundancy_metrics.average(),
        );
        ask(self.oracle.as_ref(), OracleRequest::new(prompt).with_temperature(0.7)).await
    }
}

#[async_trait]
impl Station for EfficiencyStation {
    type Input = EfficiencyInput;
    type Output = EfficiencyOutput;

    fn number(&self) -> u8 {
        4
    }

    fn name(&self) -> &'static str {
        "Efficiency Metrics"
    }

    async fn process(&self, input: &EfficiencyInput) -> Result<EfficiencyOutput, StationError> {
        let started = Instant::now();
        let efficiency_metrics = self.analyzer.analyze(&input.conflict_network);
        let payload = self.recommend(&efficiency_metrics).await?;

        Ok(EfficiencyOutput {
            efficiency_metrics,
            recommendations: Recommendations::from_payload(&payload),
            analysis_time_ms: started.elapsed().as_millis() as u64,
            metadata: StageMetadata::new(payload_status([&payload])),
        })
    }

    fn extract_required_data(&self, input: &EfficiencyInput) -> Value {
        let network = &input.conflict_network;
        json!({
            "characters_count": network.characters().len(),
            "relationships_count": network.relationships().len(),
            "conflicts_count": network.conflicts().len(),
        })
    }

    fn error_fallback(&self) -> EfficiencyOutput {
        EfficiencyOutput {
            efficiency_metrics: EfficiencyMetrics::failed(),
            recommendations: Recommendations::failed(),
            analysis_time_ms: 0,
            metadata: StageMetadata::failed(),
        }
    }
}
