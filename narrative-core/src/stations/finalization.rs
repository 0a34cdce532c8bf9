//! Station 7: final report, visualization payload and artifact export.
//!
//! Everything here is assembled from the network and the outputs of the
//! earlier stations. The two artifacts are written into the output
//! directory as [`FINAL_REPORT_FILE`] and [`VISUALIZATION_FILE`].

use super::conceptual::ConceptualOutput;
use super::dynamics::DynamicsOutput;
use super::efficiency::EfficiencyOutput;
use super::network_builder::{NetworkBuilderOutput, NetworkSummary};
use super::text_analysis::TextAnalysisOutput;
use super::treatment::TreatmentOutput;
use crate::analysis::episodic::NarrativeFunction;
use crate::analysis::evolution::{ArcType, EventType, NarrativePhase};
use crate::analysis::stats::mean;
use crate::analysis::{CriticalityLevel, EfficiencyRating};
use crate::network::{
    CharacterId, ConflictId, ConflictNetwork, ConflictPhase, RelationshipDirection,
    RelationshipId, RelationshipNature, RelationshipType,
};
use crate::oracle::NOT_AVAILABLE;
use crate::persist::{save_json, FINAL_REPORT_FILE, VISUALIZATION_FILE};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

const ANALYSIS_FAILED: &str = "Analysis failed";
const HIGH_STAGNATION: f64 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizationInput {
    pub project_name: String,
    pub output_dir: PathBuf,
    pub conflict_network: ConflictNetwork,
    pub station1: TextAnalysisOutput,
    pub station2: ConceptualOutput,
    pub station3: NetworkBuilderOutput,
    pub station4: EfficiencyOutput,
    pub station5: DynamicsOutput,
    pub station6: TreatmentOutput,
}

// ============================================================================
// Final report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallRating {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Critical,
}

impl OverallRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 55.0 {
            Self::Fair
        } else if score >= 40.0 {
            Self::NeedsImprovement
        } else {
            Self::Critical
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs Improvement",
            Self::Critical => "Critical",
        }
    }
}

/// Scores from 0 to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub narrative_quality_score: f64,
    pub structural_integrity_score: f64,
    pub character_development_score: f64,
    pub conflict_effectiveness_score: f64,
    pub overall_score: f64,
    pub rating: OverallRating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFindings {
    pub major_characters: Vec<String>,
    pub overall_tone: String,
    pub key_relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptFindings {
    pub story_statement: String,
    pub elevator_pitch: String,
    pub hybrid_genre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyFindings {
    pub overall_efficiency_score: f64,
    pub rating: EfficiencyRating,
    pub priority_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsFindings {
    pub timeline_events: usize,
    pub growth_rate: f64,
    /// Number of characters per arc type.
    pub arc_types: BTreeMap<String, usize>,
    pub total_episodes: usize,
    pub episodic_balance: f64,
    pub key_symbols: Vec<String>,
    pub primary_tone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsFindings {
    pub health_score: u32,
    pub criticality_level: CriticalityLevel,
    pub total_issues: usize,
    pub summary: String,
}

/// One summary per earlier station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedFindings {
    pub text_analysis: TextFindings,
    pub conceptual: ConceptFindings,
    pub network: NetworkSummary,
    pub efficiency: EfficiencyFindings,
    pub dynamics: DynamicsFindings,
    pub diagnostics: DiagnosticsFindings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub project_name: String,
    pub generated_at: DateTime<Utc>,
    pub executive_summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub overall_assessment: OverallAssessment,
    /// `None` only when finalization failed.
    pub detailed_findings: Option<DetailedFindings>,
}

// ============================================================================
// Visualization payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: CharacterId,
    pub label: String,
    pub relationship_count: usize,
    pub conflict_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: RelationshipId,
    pub source: CharacterId,
    pub target: CharacterId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub nature: RelationshipNature,
    pub directed: bool,
    pub strength: u8,
}

/// A conflict drawn as a hyperedge over its participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictHyperedge {
    pub id: ConflictId,
    pub label: String,
    pub members: Vec<CharacterId>,
    pub phase: ConflictPhase,
    pub strength: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub description: String,
    pub significance: u8,
    pub narrative_phase: NarrativePhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeCell {
    pub season: usize,
    pub episode: usize,
    pub conflicts: Vec<ConflictId>,
    pub intensity: f64,
    pub narrative_function: NarrativeFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub hyperedges: Vec<ConflictHyperedge>,
    pub timeline: Vec<TimelineEntry>,
    pub episode_grid: Vec<EpisodeCell>,
}

impl Visualization {
    pub fn build(network: &ConflictNetwork, dynamics: &DynamicsOutput) -> Self {
        let nodes = network
            .characters()
            .iter()
            .map(|c| GraphNode {
                id: c.id.clone(),
                label: c.name.clone(),
                relationship_count: network.relationships_of(&c.id).count(),
                conflict_count: network.conflicts_of(&c.id).count(),
            })
            .collect();

        let edges = network
            .relationships()
            .iter()
            .map(|r| GraphEdge {
                id: r.id.clone(),
                source: r.source.clone(),
                target: r.target.clone(),
                relationship_type: r.relationship_type,
                nature: r.nature,
                directed: r.direction == RelationshipDirection::Directed,
                strength: r.strength,
            })
            .collect();

        let hyperedges = network
            .conflicts()
            .iter()
            .map(|k| ConflictHyperedge {
                id: k.id.clone(),
                label: k.name.clone(),
                members: k.involved_characters.clone(),
                phase: k.phase,
                strength: k.strength,
            })
            .collect();

        let timeline = dynamics
            .dynamic_analysis
            .event_timeline
            .iter()
            .map(|e| TimelineEntry {
                timestamp: e.timestamp,
                event_type: e.event_type,
                description: e.description.clone(),
                significance: e.significance,
                narrative_phase: e.narrative_phase,
            })
            .collect();

        let episode_grid = dynamics
            .episodic_integration
            .episodes()
            .map(|e| EpisodeCell {
                season: e.season_number,
                episode: e.episode_number,
                conflicts: e.assigned_conflicts.clone(),
                intensity: e.estimated_intensity,
                narrative_function: e.narrative_function,
            })
            .collect();

        Self {
            nodes,
            edges,
            hyperedges,
            timeline,
            episode_grid,
        }
    }
}

// ============================================================================
// Report assembly
// ============================================================================

fn useful(items: &[String]) -> impl Iterator<Item = &String> {
    items
        .iter()
        .filter(|s| !s.is_empty() && s.as_str() != ANALYSIS_FAILED && s.as_str() != NOT_AVAILABLE)
}

/// Score the story on four axes and combine them.
pub fn assess(input: &FinalizationInput) -> OverallAssessment {
    let metrics = &input.station4.efficiency_metrics;
    let development = &input.station5.dynamic_analysis.character_development;

    let transformation = mean(
        &development
            .iter()
            .map(|c| c.transformation_score)
            .collect::<Vec<_>>(),
    );
    let character_development_score = (100.0
        * (0.6 * metrics.narrative_efficiency.character_efficiency
            + 0.4 * transformation / 10.0))
        .clamp(0.0, 100.0);
    let conflict_effectiveness_score = (100.0
        * (0.5 * metrics.narrative_efficiency.conflict_efficiency
            + 0.5 * metrics.conflict_cohesion))
        .clamp(0.0, 100.0);
    let narrative_quality_score = metrics.overall_efficiency_score;
    let structural_integrity_score = f64::from(input.station6.diagnostics_report.overall_health_score);

    let overall_score = mean(&[
        narrative_quality_score,
        structural_integrity_score,
        character_development_score,
        conflict_effectiveness_score,
    ]);

    OverallAssessment {
        narrative_quality_score,
        structural_integrity_score,
        character_development_score,
        conflict_effectiveness_score,
        overall_score,
        rating: OverallRating::from_score(overall_score),
    }
}

fn strengths(input: &FinalizationInput) -> Vec<String> {
    let metrics = &input.station4.efficiency_metrics;
    let network = &input.conflict_network;
    let mut strengths = Vec::new();

    if network.conflicts().len() >= 2 && metrics.conflict_cohesion >= 0.5 {
        strengths.push("Conflicts are tightly interwoven through shared characters".to_string());
    }
    if !network.characters().is_empty() && metrics.dramatic_balance.balance_score >= 0.7 {
        strengths.push("Dramatic weight is shared evenly across the cast".to_string());
    }
    if metrics.narrative_efficiency.character_efficiency >= 0.8 {
        strengths.push("Nearly every character takes part in the drama".to_string());
    }
    if !network.is_empty() && metrics.redundancy_metrics.average() < 0.1 {
        strengths.push("Little redundancy between story elements".to_string());
    }
    if input.station6.diagnostics_report.criticality_level == CriticalityLevel::Healthy {
        strengths.push("The conflict network is structurally healthy".to_string());
    }
    if input.station5.episodic_integration.balance_report.overall_balance >= 0.7 {
        strengths.push("Conflicts spread well over an episodic structure".to_string());
    }

    strengths
}

fn weaknesses(input: &FinalizationInput) -> Vec<String> {
    let report = &input.station6.diagnostics_report;
    let metrics = &input.station4.efficiency_metrics;
    let mut weaknesses: Vec<String> = report
        .structural_issues
        .iter()
        .map(|issue| issue.description.clone())
        .collect();

    let counted = [
        (report.isolated_characters.total, "isolated characters"),
        (report.abandoned_conflicts.total, "abandoned conflicts"),
        (report.overloaded_characters.total, "overloaded characters"),
        (report.weak_connections.total, "weak connections"),
        (report.redundancies.total, "redundant elements"),
    ];
    for (count, what) in counted {
        if count > 0 {
            weaknesses.push(format!("{count} {what}"));
        }
    }

    if input.conflict_network.conflicts().len() >= 2 && metrics.conflict_cohesion < 0.3 {
        weaknesses.push("Conflicts rarely share characters".to_string());
    }

    weaknesses
}

fn opportunities(input: &FinalizationInput) -> Vec<String> {
    let mut opportunities: Vec<String> =
        useful(&input.station4.recommendations.priority_actions).cloned().collect();
    opportunities.extend(
        input
            .station6
            .treatment_recommendations
            .prioritized_actions
            .iter()
            .take(3)
            .map(|action| action.description.clone()),
    );
    opportunities.dedup();
    opportunities
}

fn threats(input: &FinalizationInput) -> Vec<String> {
    let mut threats: Vec<String> = useful(
        &input
            .station6
            .advanced_efficiency_metrics
            .risk_assessment
            .implementation_risks,
    )
    .cloned()
    .collect();

    if matches!(
        input.station6.diagnostics_report.criticality_level,
        CriticalityLevel::MajorIssues | CriticalityLevel::Critical
    ) {
        threats.push("Structural problems threaten the story's cohesion".to_string());
    }
    threats.extend(
        input
            .station5
            .dynamic_analysis
            .conflict_progression
            .iter()
            .filter(|p| p.stagnation_risk >= HIGH_STAGNATION)
            .map(|p| format!("Conflict \"{}\" risks stagnating", p.conflict_name)),
    );

    threats
}

fn executive_summary(input: &FinalizationInput, assessment: &OverallAssessment) -> String {
    let network = &input.conflict_network;
    let report = &input.station6.diagnostics_report;

    let mut summary = format!(
        "{} features {} characters, {} relationships and {} conflicts.",
        input.project_name,
        network.characters().len(),
        network.relationships().len(),
        network.conflicts().len(),
    );
    let genre = input.station2.hybrid_genre.trim();
    if !genre.is_empty() {
        summary.push_str(&format!(" Genre: {genre}."));
    }
    summary.push_str(&format!(
        " Overall score {:.1}/100 ({}); network health {}/100 ({}).",
        assessment.overall_score,
        assessment.rating.name(),
        report.overall_health_score,
        report.criticality_level.name(),
    ));
    summary
}

fn detailed_findings(input: &FinalizationInput) -> DetailedFindings {
    let dynamics = &input.station5;

    let mut arc_types = BTreeMap::new();
    for evolution in &dynamics.dynamic_analysis.character_development {
        let arc = match evolution.arc_type {
            ArcType::Positive => "positive",
            ArcType::Negative => "negative",
            ArcType::Flat => "flat",
            ArcType::Complex => "complex",
        };
        *arc_types.entry(arc.to_string()).or_insert(0) += 1;
    }

    DetailedFindings {
        text_analysis: TextFindings {
            major_characters: input.station1.major_characters.clone(),
            overall_tone: input.station1.narrative_style.overall_tone.clone(),
            key_relationships: input.station1.key_relationships.len(),
        },
        conceptual: ConceptFindings {
            story_statement: input.station2.story_statement.clone(),
            elevator_pitch: input.station2.elevator_pitch.clone(),
            hybrid_genre: input.station2.hybrid_genre.clone(),
        },
        network: NetworkSummary::of(&input.conflict_network),
        efficiency: EfficiencyFindings {
            overall_efficiency_score: input.station4.efficiency_metrics.overall_efficiency_score,
            rating: input.station4.efficiency_metrics.overall_rating,
            priority_actions: input.station4.recommendations.priority_actions.clone(),
        },
        dynamics: DynamicsFindings {
            timeline_events: dynamics.dynamic_analysis.event_timeline.len(),
            growth_rate: dynamics.dynamic_analysis.network_evolution.overall_growth_rate,
            arc_types,
            total_episodes: dynamics.episodic_integration.series_structure.total_episodes,
            episodic_balance: dynamics.episodic_integration.balance_report.overall_balance,
            key_symbols: dynamics
                .symbolic_analysis
                .key_symbols
                .iter()
                .map(|s| s.symbol.clone())
                .collect(),
            primary_tone: dynamics
                .stylistic_analysis
                .overall_tone_assessment
                .primary_tone
                .clone(),
        },
        diagnostics: DiagnosticsFindings {
            health_score: input.station6.diagnostics_report.overall_health_score,
            criticality_level: input.station6.diagnostics_report.criticality_level,
            total_issues: input.station6.diagnostics_report.total_issues(),
            summary: input
                .station6
                .treatment_recommendations
                .consolidated_summary
                .clone(),
        },
    }
}

/// Assemble the final report from the network and every earlier output.
pub fn build_report(input: &FinalizationInput) -> FinalReport {
    let overall_assessment = assess(input);
    FinalReport {
        project_name: input.project_name.clone(),
        generated_at: Utc::now(),
        executive_summary: executive_summary(input, &overall_assessment),
        strengths: strengths(input),
        weaknesses: weaknesses(input),
        opportunities: opportunities(input),
        threats: threats(input),
        overall_assessment,
        detailed_findings: Some(detailed_findings(input)),
    }
}

// ============================================================================
// Station
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizationOutput {
    pub final_report: FinalReport,
    pub visualization: Visualization,
    /// Paths of the artifacts written, in write order.
    pub exported_files: Vec<PathBuf>,
    pub metadata: StageMetadata,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FinalizationStation;

impl FinalizationStation {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Station for FinalizationStation {
    type Input = FinalizationInput;
    type Output = FinalizationOutput;

    fn number(&self) -> u8 {
        7
    }

    fn name(&self) -> &'static str {
        "Finalization"
    }

    async fn process(&self, input: &FinalizationInput) -> Result<FinalizationOutput, StationError> {
        let final_report = build_report(input);
        let visualization = Visualization::build(&input.conflict_network, &input.station5);

        let report_path = input.output_dir.join(FINAL_REPORT_FILE);
        let visualization_path = input.output_dir.join(VISUALIZATION_FILE);
        save_json(&report_path, &final_report).await?;
        save_json(&visualization_path, &visualization).await?;
        info!(
            output_dir = %input.output_dir.display(),
            overall_score = final_report.overall_assessment.overall_score,
            "Artifacts written"
        );

        Ok(FinalizationOutput {
            final_report,
            visualization,
            exported_files: vec![report_path, visualization_path],
            metadata: StageMetadata::success(),
        })
    }

    fn extract_required_data(&self, input: &FinalizationInput) -> Value {
        json!({
            "project_name": input.project_name,
            "output_dir": input.output_dir.display().to_string(),
            "characters_count": input.conflict_network.characters().len(),
        })
    }

    fn validate_input(&self, input: &FinalizationInput) -> Result<(), String> {
        if input.output_dir.as_os_str().is_empty() {
            return Err("Output directory is empty".to_string());
        }
        Ok(())
    }

    fn error_fallback(&self) -> FinalizationOutput {
        FinalizationOutput {
            final_report: FinalReport {
                project_name: String::new(),
                generated_at: Utc::now(),
                executive_summary: "Finalization failed".to_string(),
                strengths: Vec::new(),
                weaknesses: vec![ANALYSIS_FAILED.to_string()],
                opportunities: Vec::new(),
                threats: Vec::new(),
                overall_assessment: OverallAssessment {
                    narrative_quality_score: 0.0,
                    structural_integrity_score: 0.0,
                    character_development_score: 0.0,
                    conflict_effectiveness_score: 0.0,
                    overall_score: 0.0,
                    rating: OverallRating::Critical,
                },
                detailed_findings: None,
            },
            visualization: Visualization::default(),
            exported_files: Vec::new(),
            metadata: StageMetadata::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::load_json;
    use crate::station::{StageStatus, StationRunner};
    use crate::testing::sample_finalization_input;
    use tempfile::TempDir;

    #[test]
    fn test_rating_bands() {
        assert_eq!(OverallRating::from_score(85.0), OverallRating::Excellent);
        assert_eq!(OverallRating::from_score(70.0), OverallRating::Good);
        assert_eq!(OverallRating::from_score(55.0), OverallRating::Fair);
        assert_eq!(OverallRating::from_score(40.0), OverallRating::NeedsImprovement);
        assert_eq!(OverallRating::from_score(39.9), OverallRating::Critical);
        assert_eq!(
            serde_json::to_value(OverallRating::NeedsImprovement).unwrap(),
            json!("Needs Improvement")
        );
    }

    #[test]
    fn test_assessment_uses_prior_scores() {
        let input = sample_finalization_input(PathBuf::from("unused"));
        let assessment = assess(&input);

        assert_eq!(
            assessment.narrative_quality_score,
            input.station4.efficiency_metrics.overall_efficiency_score
        );
        assert_eq!(
            assessment.structural_integrity_score,
            f64::from(input.station6.diagnostics_report.overall_health_score)
        );
        let expected = (assessment.narrative_quality_score
            + assessment.structural_integrity_score
            + assessment.character_development_score
            + assessment.conflict_effectiveness_score)
            / 4.0;
        assert!((assessment.overall_score - expected).abs() < 1e-9);
        assert_eq!(assessment.rating, OverallRating::from_score(expected));
    }

    #[test]
    fn test_visualization_mirrors_network() {
        let input = sample_finalization_input(PathBuf::from("unused"));
        let viz = Visualization::build(&input.conflict_network, &input.station5);

        assert_eq!(viz.nodes.len(), input.conflict_network.characters().len());
        assert_eq!(viz.edges.len(), input.conflict_network.relationships().len());
        assert_eq!(viz.hyperedges.len(), input.conflict_network.conflicts().len());
        assert_eq!(viz.timeline.len(), input.station5.dynamic_analysis.event_timeline.len());
        assert_eq!(
            viz.episode_grid.len(),
            input.station5.episodic_integration.series_structure.total_episodes
        );
    }

    #[test]
    fn test_weaknesses_name_issue_counts() {
        let input = sample_finalization_input(PathBuf::from("unused"));
        let report = build_report(&input);
        let isolated = input.station6.diagnostics_report.isolated_characters.total;

        if isolated > 0 {
            assert!(report
                .weaknesses
                .contains(&format!("{isolated} isolated characters")));
        }
        assert!(report.executive_summary.starts_with(&input.project_name));
        assert!(report.detailed_findings.is_some());
    }

    #[tokio::test]
    async fn test_artifacts_written() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = sample_finalization_input(temp_dir.path().to_path_buf());
        let runner = StationRunner::new(FinalizationStation::new(), "none");

        let run = runner.execute(&input).await;

        assert!(!run.metadata.error_occurred);
        assert_eq!(run.output.metadata.status, StageStatus::Success);
        assert_eq!(
            run.output.exported_files,
            vec![
                temp_dir.path().join(FINAL_REPORT_FILE),
                temp_dir.path().join(VISUALIZATION_FILE)
            ]
        );

        let report: FinalReport = load_json(temp_dir.path().join(FINAL_REPORT_FILE))
            .await
            .expect("Failed to load report");
        assert_eq!(report.project_name, input.project_name);
        assert_eq!(report.executive_summary, run.output.final_report.executive_summary);
        assert_eq!(report.weaknesses, run.output.final_report.weaknesses);
        let viz: Visualization = load_json(temp_dir.path().join(VISUALIZATION_FILE))
            .await
            .expect("Failed to load visualization");
        assert_eq!(viz.nodes, run.output.visualization.nodes);
        assert_eq!(viz.edges, run.output.visualization.edges);
        assert_eq!(viz.hyperedges, run.output.visualization.hyperedges);
    }

    #[tokio::test]
    async fn test_missing_directory_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = sample_finalization_input(temp_dir.path().join("missing"));
        let runner = StationRunner::new(FinalizationStation::new(), "none");

        let run = runner.execute(&input).await;

        assert!(run.metadata.error_occurred);
        assert_eq!(run.output.metadata.status, StageStatus::Failed);
        assert_eq!(run.output.final_report.overall_assessment.rating, OverallRating::Critical);
        assert!(run.output.exported_files.is_empty());
    }
}
