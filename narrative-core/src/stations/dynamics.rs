//! Station 5: dynamic, episodic, symbolic and stylistic analysis.
//!
//! The dynamic and episodic parts are computed from the network. The
//! symbolic and stylistic parts are two concurrent oracle passes over the
//! text; a payload that does not fit the expected shape is replaced by the
//! default result rather than failing the station.

use super::efficiency::EfficiencyOutput;
use super::{ask, decode_or_default, excerpt, payload_status};
use crate::analysis::{DynamicAnalysis, EpisodicIntegration, EpisodicIntegrator, EvolutionAnalyzer};
use crate::network::{deserialize_lenient, ConflictNetwork, Label};
use crate::oracle::{Oracle, OracleRequest};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

const CONTEXT_CHARS: usize = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicsInput {
    pub conflict_network: ConflictNetwork,
    pub station4: EfficiencyOutput,
    pub full_text: String,
}

// ============================================================================
// Symbolic analysis
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySymbol {
    pub symbol: String,
    pub interpretation: String,
    pub frequency: f64,
    pub contextual_meanings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurringMotif {
    pub motif: String,
    pub occurrences: f64,
    pub narrative_function: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolicNetwork {
    pub primary_symbol: String,
    pub related_symbols: Vec<String>,
    pub thematic_connection: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolicAnalysis {
    pub key_symbols: Vec<KeySymbol>,
    pub recurring_motifs: Vec<RecurringMotif>,
    pub central_themes_hinted_by_symbols: Vec<String>,
    pub symbolic_networks: Vec<SymbolicNetwork>,
    /// 0 to 10.
    pub depth_score: f64,
    /// 0 to 10.
    pub consistency_score: f64,
}

// ============================================================================
// Stylistic analysis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageLevel {
    Simple,
    #[default]
    Moderate,
    Complex,
    HighlyComplex,
}

impl Label for LanguageLevel {
    const ALL: &'static [Self] = &[Self::Simple, Self::Moderate, Self::Complex, Self::HighlyComplex];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::HighlyComplex => "highly_complex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    VerySlow,
    Slow,
    #[default]
    Balanced,
    Fast,
    VeryFast,
}

impl Label for Pacing {
    const ALL: &'static [Self] = &[
        Self::VerySlow,
        Self::Slow,
        Self::Balanced,
        Self::Fast,
        Self::VeryFast,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::VerySlow => "very_slow",
            Self::Slow => "slow",
            Self::Balanced => "balanced",
            Self::Fast => "fast",
            Self::VeryFast => "very_fast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneAssessment {
    pub primary_tone: String,
    pub secondary_tones: Vec<String>,
    pub tone_consistency: f64,
    pub explanation: String,
}

impl Default for ToneAssessment {
    fn default() -> Self {
        Self {
            primary_tone: "Unknown".to_string(),
            secondary_tones: Vec::new(),
            tone_consistency: 0.0,
            explanation: "Analysis failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageComplexity {
    #[serde(deserialize_with = "deserialize_lenient")]
    pub level: LanguageLevel,
    pub readability_score: f64,
    pub vocabulary_richness: f64,
}

impl Default for LanguageComplexity {
    fn default() -> Self {
        Self {
            level: LanguageLevel::Moderate,
            readability_score: 5.0,
            vocabulary_richness: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingImpression {
    #[serde(deserialize_with = "deserialize_lenient")]
    pub overall_pacing: Pacing,
    pub pacing_variation: f64,
    pub scene_length_distribution: Vec<f64>,
}

impl Default for PacingImpression {
    fn default() -> Self {
        Self {
            overall_pacing: Pacing::Balanced,
            pacing_variation: 5.0,
            scene_length_distribution: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueStyle {
    pub characterization: String,
    pub naturalness: f64,
    pub effectiveness: f64,
    pub distinctiveness: f64,
}

impl Default for DialogueStyle {
    fn default() -> Self {
        Self {
            characterization: "Unknown".to_string(),
            naturalness: 5.0,
            effectiveness: 5.0,
            distinctiveness: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptiveRichness {
    pub visual_detail_level: f64,
    pub sensory_engagement: f64,
    pub atmospheric_quality: f64,
}

impl Default for DescriptiveRichness {
    fn default() -> Self {
        Self {
            visual_detail_level: 5.0,
            sensory_engagement: 5.0,
            atmospheric_quality: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDeviation {
    pub location: String,
    #[serde(rename = "type")]
    pub deviation_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyImpression {
    pub consistency_score: f64,
    pub deviations: Vec<StyleDeviation>,
}

impl Default for ConsistencyImpression {
    fn default() -> Self {
        Self {
            consistency_score: 5.0,
            deviations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylisticAnalysis {
    pub overall_tone_assessment: ToneAssessment,
    pub language_complexity: LanguageComplexity,
    pub pacing_impression: PacingImpression,
    pub dialogue_style: DialogueStyle,
    pub descriptive_richness: DescriptiveRichness,
    pub stylistic_consistency_impression: ConsistencyImpression,
}

// ============================================================================
// Station
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicsOutput {
    pub dynamic_analysis: DynamicAnalysis,
    pub episodic_integration: EpisodicIntegration,
    pub symbolic_analysis: SymbolicAnalysis,
    pub stylistic_analysis: StylisticAnalysis,
    pub analysis_time_ms: u64,
    pub metadata: StageMetadata,
}

pub struct DynamicsStation {
    oracle: Arc<dyn Oracle>,
    evolution: EvolutionAnalyzer,
    episodic: EpisodicIntegrator,
}

impl DynamicsStation {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            evolution: EvolutionAnalyzer::new(),
            episodic: EpisodicIntegrator::default(),
        }
    }

    pub fn with_episodes_per_season(mut self, episodes: usize) -> Self {
        self.episodic = EpisodicIntegrator::new(episodes);
        self
    }

    async fn symbolic_pass(&self, full_text: &str) -> Result<Value, StationError> {
        let prompt = r#"Based on the attached narrative text, identify:

1. **key_symbols**: 3-5 recurring or symbolically significant objects, places or items. For each give "symbol", "interpretation", "frequency" (estimated appearances) and "contextual_meanings" (a list).
2. **recurring_motifs**: 2-3 recurring ideas, patterns or situations. For each give "motif", "occurrences" and "narrative_function".
3. **central_themes_hinted_by_symbols**: the main themes these symbols suggest (a list of strings).
4. **symbolic_networks**: objects with "primary_symbol", "related_symbols" (a list) and "thematic_connection".
5. **depth_score**: 0-10, the depth of symbolic usage.
6. **consistency_score**: 0-10, the consistency of symbolic usage.

Respond with ONLY a JSON object using the keys above."#;
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, CONTEXT_CHARS))
            .with_temperature(0.7);
        ask(self.oracle.as_ref(), request).await
    }

    async fn stylistic_pass(&self, full_text: &str) -> Result<Value, StationError> {
        let levels = LanguageLevel::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ");
        let pacings = Pacing::ALL.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ");
        let prompt = format!(
            r#"Based on the attached narrative text, assess its style:

1. **overall_tone_assessment**: "primary_tone", "secondary_tones" (a list), "tone_consistency" (0-10), "explanation".
2. **language_complexity**: "level" (one of {levels}), "readability_score" (0-10), "vocabulary_richness" (0-10).
3. **pacing_impression**: "overall_pacing" (one of {pacings}), "pacing_variation" (0-10), "scene_length_distribution" (a list of approximate scene lengths).
4. **dialogue_style**: "characterization", "naturalness" (0-10), "effectiveness" (0-10), "distinctiveness" (0-10).
5. **descriptive_richness**: "visual_detail_level", "sensory_engagement", "atmospheric_quality" (each 0-10).
6. **stylistic_consistency_impression**: "consistency_score" (0-10) and "deviations", a list of objects with "location", "type" and "description".

Respond with ONLY a JSON object using the keys above."#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, CONTEXT_CHARS))
            .with_temperature(0.6);
        ask(self.oracle.as_ref(), request).await
    }
}

#[async_trait]
impl Station for DynamicsStation {
    type Input = DynamicsInput;
    type Output = DynamicsOutput;

    fn number(&self) -> u8 {
        5
    }

    fn name(&self) -> &'static str {
        "Dynamic, Symbolic & Stylistic Analysis"
    }

    async fn process(&self, input: &DynamicsInput) -> Result<DynamicsOutput, StationError> {
        let started = Instant::now();
        let network = &input.conflict_network;

        let dynamic_analysis = self.evolution.analyze(network);
        let episodic_integration = self.episodic.integrate(network);

        let (symbolic, stylistic) = futures::try_join!(
            self.symbolic_pass(&input.full_text),
            self.stylistic_pass(&input.full_text),
        )?;

        Ok(DynamicsOutput {
            dynamic_analysis,
            episodic_integration,
            symbolic_analysis: decode_or_default(&symbolic),
            stylistic_analysis: decode_or_default(&stylistic),
            analysis_time_ms: started.elapsed().as_millis() as u64,
            metadata: StageMetadata::new(payload_status([&symbolic, &stylistic])),
        })
    }

    fn extract_required_data(&self, input: &DynamicsInput) -> Value {
        json!({
            "characters_count": input.conflict_network.characters().len(),
            "conflicts_count": input.conflict_network.conflicts().len(),
            "snapshots_count": input.conflict_network.snapshots().len(),
            "efficiency_score": input.station4.efficiency_metrics.overall_efficiency_score,
            "text_length": input.full_text.chars().count(),
        })
    }

    fn error_fallback(&self) -> DynamicsOutput {
        DynamicsOutput {
            dynamic_analysis: DynamicAnalysis::failed(),
            episodic_integration: EpisodicIntegration::failed(),
            symbolic_analysis: SymbolicAnalysis::default(),
            stylistic_analysis: StylisticAnalysis::default(),
            analysis_time_ms: 0,
            metadata: StageMetadata::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{StageStatus, StationRunner};
    use crate::testing::{sample_efficiency, sample_network, MockOracle};

    fn input() -> DynamicsInput {
        DynamicsInput {
            conflict_network: sample_network(),
            station4: sample_efficiency(),
            full_text: "The crown passes from hand to hand.".to_string(),
        }
    }

    #[test]
    fn test_stylistic_defaults() {
        let style = StylisticAnalysis::default();
        assert_eq!(style.overall_tone_assessment.primary_tone, "Unknown");
        assert_eq!(style.language_complexity.level, LanguageLevel::Moderate);
        assert_eq!(style.pacing_impression.overall_pacing, Pacing::Balanced);
        assert_eq!(style.dialogue_style.naturalness, 5.0);
    }

    #[test]
    fn test_stylistic_payload_is_lenient() {
        let payload = json!({
            "language_complexity": {"level": "Highly Complex", "readability_score": 3},
            "pacing_impression": {"overall_pacing": "glacial"}
        });
        let style: StylisticAnalysis = decode_or_default(&payload);
        assert_eq!(style.language_complexity.level, LanguageLevel::HighlyComplex);
        assert_eq!(style.language_complexity.readability_score, 3.0);
        assert_eq!(style.language_complexity.vocabulary_richness, 5.0);
        assert_eq!(style.pacing_impression.overall_pacing, Pacing::Balanced);
        assert_eq!(style.overall_tone_assessment.explanation, "Analysis failed");
    }

    #[test]
    fn test_mismatched_symbolic_payload_uses_default() {
        let payload = json!({"key_symbols": "a sword"});
        let symbolic: SymbolicAnalysis = decode_or_default(&payload);
        assert_eq!(symbolic, SymbolicAnalysis::default());
    }

    #[tokio::test]
    async fn test_process_combines_engines_and_passes() {
        let oracle = Arc::new(
            MockOracle::new()
                .respond_to(
                    "key_symbols",
                    json!({"key_symbols": [{"symbol": "Crown", "frequency": 4}], "depth_score": 7}),
                )
                .respond_to("assess its style", json!({"raw": "prose answer"})),
        );
        let station = DynamicsStation::new(oracle.clone()).with_episodes_per_season(4);

        let output = station.process(&input()).await.unwrap();

        assert_eq!(output.symbolic_analysis.key_symbols[0].symbol, "Crown");
        assert_eq!(output.symbolic_analysis.depth_score, 7.0);
        assert_eq!(output.stylistic_analysis, StylisticAnalysis::default());
        assert_eq!(output.episodic_integration.series_structure.episodes_per_season, 4);
        assert_eq!(
            output.dynamic_analysis,
            EvolutionAnalyzer::new().analyze(&input().conflict_network)
        );
        assert_eq!(output.metadata.status, StageStatus::Partial);
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_returns_defaults() {
        let oracle = MockOracle::new().fail_on("key_symbols");
        let runner = StationRunner::new(DynamicsStation::new(Arc::new(oracle)), "mock");
        let run = runner.execute(&input()).await;

        assert!(run.metadata.error_occurred);
        assert_eq!(run.output.episodic_integration.series_structure.total_episodes, 0);
        assert_eq!(
            run.output.episodic_integration.balance_report.recommendations,
            vec!["Analysis failed"]
        );
        assert_eq!(run.output.metadata.status, StageStatus::Failed);
    }
}
