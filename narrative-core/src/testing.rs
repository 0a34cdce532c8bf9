//! Testing utilities for the analysis pipeline.
//!
//! This module provides tools for integration testing:
//! - `MockOracle` for deterministic testing without API calls
//! - Fixture builders for every station's output
//! - Assertion helpers for station runs and networks

use crate::analysis::{EfficiencyAnalyzer, EpisodicIntegrator, EvolutionAnalyzer, NetworkDiagnostics};
use crate::network::{
    Character, CharacterId, CharacterProfile, Conflict, ConflictId, ConflictNetwork,
    ConflictPhase, ConflictScope, ConflictSubject, Relationship, RelationshipId,
    RelationshipNature, RelationshipType,
};
use crate::oracle::{Oracle, OracleError, OracleRequest, OracleResponse, ResponseMetadata, TokenUsage};
use crate::station::{StageMetadata, StageStatus, StationRun};
use crate::stations::conceptual::{ArtisticReferences, ConceptualOutput, StoryMap};
use crate::stations::dynamics::{DynamicsOutput, StylisticAnalysis, SymbolicAnalysis};
use crate::stations::efficiency::{EfficiencyOutput, Recommendations};
use crate::stations::finalization::FinalizationInput;
use crate::stations::network_builder::{NetworkBuilderOutput, NetworkSummary, INITIAL_SNAPSHOT};
use crate::stations::text_analysis::{
    CharacterAnalysis, KeyRelationship, NarrativeStyle, TextAnalysisOutput,
};
use crate::stations::treatment::{post_diagnostic_metrics, TreatmentOutput, TreatmentPlanner};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Model name reported by [`MockOracle`].
pub const MOCK_MODEL: &str = "mock";

/// What a matching rule does.
#[derive(Debug, Clone)]
enum MockReply {
    Content(Value),
    Fail,
}

#[derive(Debug, Clone)]
struct MockRule {
    needle: String,
    reply: MockReply,
}

/// An oracle that answers from scripted rules.
///
/// Each rule is keyed by a substring of the request prompt. The first rule
/// whose needle appears in the prompt decides the reply; a request that
/// matches nothing gets the default payload (`{}` unless changed).
///
/// Use this for deterministic integration tests without API calls.
pub struct MockOracle {
    rules: Vec<MockRule>,
    default: Value,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: json!({}),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer prompts containing `needle` with `content`.
    pub fn respond_to(mut self, needle: impl Into<String>, content: Value) -> Self {
        self.rules.push(MockRule {
            needle: needle.into(),
            reply: MockReply::Content(content),
        });
        self
    }

    /// Fail prompts containing `needle` with a 503 from the model API.
    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.rules.push(MockRule {
            needle: needle.into(),
            reply: MockReply::Fail,
        });
        self
    }

    /// Payload for prompts no rule matches.
    pub fn with_default(mut self, content: Value) -> Self {
        self.default = content;
        self
    }

    /// Scripted answers for every station prompt of the sample story, in
    /// which Ana and Ben are rivals and Ana and Cleo fight over a crown.
    pub fn for_sample_story() -> Self {
        Self::new()
            .respond_to("most central", json!({"major_characters": ["Ana", "Ben", "Cleo"]}))
            .respond_to(
                "key relationships",
                json!({"key_relationships": [
                    {"characters": ["Ana", "Ben"], "dynamic": "Rivals for the council's favour",
                     "narrative_importance": "Drives the first act"}
                ]}),
            )
            .respond_to(
                "narrative style",
                json!({"overall_tone": "Tense", "pacing_analysis": "Measured",
                       "language_style": "Formal"}),
            )
            .respond_to("**Ana**", json!({"personality_traits": "Proud, decisive",
                                          "motivations_goals": "Claim the crown"}))
            .respond_to("**Ben**", json!({"personality_traits": "Loyal, wary"}))
            .respond_to("**Cleo**", json!({"personality_traits": "Patient, cunning"}))
            .respond_to(
                "Story Statement",
                json!({"story_statement_alternatives": ["A crown divides two sisters."]}),
            )
            .respond_to("three-axis", json!({"horizontal_events_axis": [{"event": "The king dies"}]}))
            .respond_to("hybrid genre.", json!({"hybrid_genre_alternatives": ["Court Intrigue"]}))
            .respond_to("elevator pitch", json!({"elevator_pitch": "Two heirs, one crown."}))
            .respond_to(
                "inferred_relationships",
                json!({"inferred_relationships": [
                    {"character1_name_or_id": "Ana", "character2_name_or_id": "Ben",
                     "relationship_type": "RIVALRY", "relationship_nature": "NEGATIVE",
                     "strength": 8}
                ]}),
            )
            .respond_to(
                "inferred_conflicts",
                json!({"inferred_conflicts": [
                    {"conflict_name": "The Crown", "involved_character_names_or_ids": ["Ana", "Cleo"],
                     "subject": "POWER", "scope": "PERSONAL", "initial_phase": "ESCALATING",
                     "strength": 6}
                ]}),
            )
            .respond_to(
                "practical recommendations",
                json!({"priority_actions": ["Give Ben a stake in the succession"]}),
            )
            .respond_to("key_symbols", json!({"key_symbols": [{"symbol": "Crown", "frequency": 5}]}))
            .respond_to(
                "assess its style",
                json!({"overall_tone_assessment": {"primary_tone": "Tense"}}),
            )
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn reply_for(&self, prompt: &str) -> MockReply {
        self.rules
            .iter()
            .find(|rule| prompt.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| MockReply::Content(self.default.clone()))
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.prompt.clone());

        match self.reply_for(&request.prompt) {
            MockReply::Fail => Err(OracleError::Api(::gemini::Error::Api {
                status: 503,
                message: "Scripted failure".to_string(),
            })),
            MockReply::Content(content) => {
                let usage = TokenUsage::estimate(&request.prompt, &content.to_string());
                Ok(OracleResponse {
                    model: MOCK_MODEL.to_string(),
                    content: request.check(content)?,
                    usage,
                    metadata: ResponseMetadata {
                        timestamp: Utc::now(),
                        latency_ms: 0,
                    },
                })
            }
        }
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fixed instant used by every fixture (2024-06-01T12:00:00Z).
pub fn sample_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_717_243_200, 0).unwrap_or_default()
}

fn analysis(traits: &str, goals: &str, arc: &str) -> CharacterAnalysis {
    CharacterAnalysis {
        personality_traits: traits.to_string(),
        motivations_goals: goals.to_string(),
        key_relationships_brief: "N/A".to_string(),
        narrative_function: "N/A".to_string(),
        potential_arc_observation: arc.to_string(),
    }
}

/// Station 1 output for three characters: Ana, Ben and Cleo.
pub fn sample_text_analysis() -> TextAnalysisOutput {
    let mut character_analysis = BTreeMap::new();
    character_analysis.insert(
        "Ana".to_string(),
        analysis("Proud, decisive", "Claim the crown", "From ambition to sacrifice"),
    );
    character_analysis.insert(
        "Ben".to_string(),
        analysis("Loyal, wary", "Protect the council", "N/A"),
    );
    character_analysis.insert(
        "Cleo".to_string(),
        analysis("Patient, cunning", "Outlast her sister", "N/A"),
    );

    TextAnalysisOutput {
        major_characters: vec!["Ana".to_string(), "Ben".to_string(), "Cleo".to_string()],
        character_analysis,
        key_relationships: vec![KeyRelationship {
            characters: vec!["Ana".to_string(), "Ben".to_string()],
            dynamic: "Rivals for the council's favour".to_string(),
            narrative_importance: "Drives the first act".to_string(),
        }],
        narrative_style: NarrativeStyle {
            overall_tone: "Tense".to_string(),
            pacing_analysis: "Measured".to_string(),
            language_style: "Formal".to_string(),
        },
        metadata: StageMetadata::success(),
    }
}

/// Station 2 output to pair with [`sample_text_analysis`].
pub fn sample_conceptual() -> ConceptualOutput {
    ConceptualOutput {
        story_statement: "A crown divides two sisters.".to_string(),
        story_map: StoryMap::default(),
        elevator_pitch: "Two heirs, one crown.".to_string(),
        hybrid_genre: "Court Intrigue".to_string(),
        genre_contribution_matrix: BTreeMap::new(),
        dynamic_tone: BTreeMap::new(),
        artistic_references: ArtisticReferences::default(),
        metadata: StageMetadata::success(),
    }
}

/// Three characters with one relationship and one conflict:
///
/// - Ana and Ben are rivals (strength 8)
/// - Ana and Cleo fight over the crown (strength 6)
///
/// Ids and timestamps are fixed, so analyses of two copies are equal.
pub fn sample_network() -> ConflictNetwork {
    let at = sample_time();
    let ana = CharacterId::from_roster_index(0);
    let ben = CharacterId::from_roster_index(1);
    let cleo = CharacterId::from_roster_index(2);

    let mut network = ConflictNetwork::new("network_sample", "The Crown...");
    network.add_character(
        Character::new(ana.clone(), "Ana")
            .with_description("Proud, decisive")
            .with_profile(CharacterProfile {
                personality_traits: "Proud, decisive".to_string(),
                motivations_goals: "Claim the crown".to_string(),
                potential_arc: "From ambition to sacrifice".to_string(),
            }),
    );
    network.add_character(Character::new(ben.clone(), "Ben").with_description("Loyal, wary"));
    network.add_character(Character::new(cleo.clone(), "Cleo").with_description("Patient, cunning"));

    network.add_relationship(
        Relationship::new(
            RelationshipId::new("rel_char_1_char_2"),
            ana.clone(),
            ben,
            RelationshipType::Rivalry,
        )
        .with_nature(RelationshipNature::Negative)
        .with_strength(8),
    );
    network.add_conflict(
        Conflict::new(ConflictId::new("conflict_crown"), "The Crown", vec![ana, cleo])
            .with_subject(ConflictSubject::Power)
            .with_scope(ConflictScope::Personal)
            .with_phase(ConflictPhase::Escalating)
            .with_strength(6)
            .with_timestamp(at),
    );
    network.take_snapshot_at(at, INITIAL_SNAPSHOT);
    network
}

/// Station 3 output wrapping [`sample_network`].
pub fn sample_network_builder() -> NetworkBuilderOutput {
    let conflict_network = sample_network();
    NetworkBuilderOutput {
        network_summary: NetworkSummary::of(&conflict_network),
        conflict_network,
        build_time_ms: 0,
        metadata: StageMetadata::success(),
    }
}

/// Station 4 output for [`sample_network`].
pub fn sample_efficiency() -> EfficiencyOutput {
    EfficiencyOutput {
        efficiency_metrics: EfficiencyAnalyzer::new().analyze(&sample_network()),
        recommendations: Recommendations {
            priority_actions: vec!["Give Ben a stake in the succession".to_string()],
            quick_fixes: Vec::new(),
            structural_revisions: Vec::new(),
        },
        analysis_time_ms: 0,
        metadata: StageMetadata::success(),
    }
}

/// Station 5 output for [`sample_network`] with default oracle passes.
pub fn sample_dynamics() -> DynamicsOutput {
    let network = sample_network();
    DynamicsOutput {
        dynamic_analysis: EvolutionAnalyzer::new().analyze(&network),
        episodic_integration: EpisodicIntegrator::default().integrate(&network),
        symbolic_analysis: SymbolicAnalysis::default(),
        stylistic_analysis: StylisticAnalysis::default(),
        analysis_time_ms: 0,
        metadata: StageMetadata::success(),
    }
}

/// Station 6 output for [`sample_network`], measured at [`sample_time`].
pub fn sample_treatment() -> TreatmentOutput {
    let network = sample_network();
    let dynamics = sample_dynamics();
    let report = NetworkDiagnostics::new(&network)
        .with_reference_time(sample_time())
        .run_all_diagnostics();
    let plan = TreatmentPlanner::new(&network, &report)
        .with_dynamics(&dynamics)
        .plan();
    let metrics = post_diagnostic_metrics(&report, &plan);

    TreatmentOutput {
        diagnostics_report: report,
        treatment_recommendations: plan,
        advanced_efficiency_metrics: metrics,
        analysis_time_ms: 0,
        metadata: StageMetadata::success(),
    }
}

/// Station 7 input built from every sample output.
pub fn sample_finalization_input(output_dir: PathBuf) -> FinalizationInput {
    FinalizationInput {
        project_name: "The Crown".to_string(),
        output_dir,
        conflict_network: sample_network(),
        station1: sample_text_analysis(),
        station2: sample_conceptual(),
        station3: sample_network_builder(),
        station4: sample_efficiency(),
        station5: sample_dynamics(),
        station6: sample_treatment(),
    }
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert that a run produced real output.
#[track_caller]
pub fn assert_clean_run<O>(run: &StationRun<O>) {
    assert!(
        !run.metadata.error_occurred,
        "Expected a clean run, got error: {:?}",
        run.metadata.error_details
    );
}

/// Assert that a run fell back after an error.
#[track_caller]
pub fn assert_fallback<O>(run: &StationRun<O>) {
    assert!(run.metadata.error_occurred, "Expected the fallback output");
    assert!(
        run.metadata.error_details.is_some(),
        "Fallback output should carry error details"
    );
}

/// Assert a stage status.
#[track_caller]
pub fn assert_status(metadata: &StageMetadata, expected: StageStatus) {
    assert_eq!(
        metadata.status, expected,
        "Expected status {:?}, got {:?}",
        expected, metadata.status
    );
}

/// Assert that the network has a character with this name.
#[track_caller]
pub fn assert_has_character(network: &ConflictNetwork, name: &str) {
    assert!(
        network.find_character_by_name(name).is_some(),
        "Expected character '{}' in network '{}'",
        name,
        network.name
    );
}

/// Assert that a score lies within `[low, high]`.
#[track_caller]
pub fn assert_in_range(value: f64, low: f64, high: f64) {
    assert!(
        (low..=high).contains(&value),
        "Expected {value} within [{low}, {high}]"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CriticalityLevel, DiagnosticReport};

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let oracle = MockOracle::new()
            .respond_to("crown", json!({"answer": 1}))
            .respond_to("crown and sword", json!({"answer": 2}));

        let response = oracle
            .generate(OracleRequest::new("the crown and sword"))
            .await
            .unwrap();
        assert_eq!(response.content, json!({"answer": 1}));
        assert_eq!(response.model, MOCK_MODEL);
    }

    #[tokio::test]
    async fn test_default_and_recording() {
        let oracle = MockOracle::new().with_default(json!({"empty": true}));

        let first = oracle.generate(OracleRequest::new("one")).await.unwrap();
        oracle.generate(OracleRequest::new("two")).await.unwrap();

        assert_eq!(first.content, json!({"empty": true}));
        assert_eq!(oracle.call_count(), 2);
        assert_eq!(oracle.prompts(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let oracle = MockOracle::new().fail_on("doomed");
        let result = oracle.generate(OracleRequest::new("a doomed call")).await;
        assert!(matches!(
            result,
            Err(OracleError::Api(::gemini::Error::Api { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_validator_applies() {
        fn has_answer(v: &Value) -> bool {
            v.get("answer").is_some()
        }
        let oracle = MockOracle::new();
        let result = oracle
            .generate(OracleRequest::new("x").with_validator(has_answer))
            .await;
        assert!(matches!(result, Err(OracleError::Rejected(_))));
    }

    #[test]
    fn test_sample_network_is_deterministic() {
        let network = sample_network();
        assert_eq!(
            serde_json::to_value(&network).unwrap(),
            serde_json::to_value(sample_network()).unwrap()
        );
        assert_has_character(&network, "Ana");
        assert_has_character(&network, "Cleo");
        assert_eq!(network.snapshots().len(), 1);
    }

    #[test]
    fn test_sample_treatment_matches_diagnostics() {
        let treatment = sample_treatment();
        let report: &DiagnosticReport = &treatment.diagnostics_report;
        // Two components and Ben without a conflict.
        assert_eq!(report.overall_health_score, 75);
        assert_eq!(report.criticality_level, CriticalityLevel::MinorIssues);
        assert_in_range(treatment.advanced_efficiency_metrics.improvement_potential, 0.0, 1.0);
    }
}
