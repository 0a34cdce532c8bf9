//! Station 6: diagnostics and treatment.
//!
//! Runs the canonical [`NetworkDiagnostics`], turns every issue it reports
//! into concrete treatment steps, and projects how far those steps could
//! lift the network's health. No oracle calls are made here.

use super::dynamics::DynamicsOutput;
use crate::analysis::diagnostics::{
    AbandonmentType, ConnectionKind, IsolationType, RedundancyKind, Severity, StructuralIssueKind,
};
use crate::analysis::evolution::ArcType;
use crate::analysis::{DiagnosticReport, NetworkDiagnostics};
use crate::network::{CharacterId, ConflictId, ConflictNetwork, Label};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

const CONNECT_PREFIX: &str = "Connect with ";
const INVOLVE_PREFIX: &str = "Involve in conflict: ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentInput {
    pub conflict_network: ConflictNetwork,
    pub station5: DynamicsOutput,
    /// Conflict inactivity is measured against this time.
    pub reference_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Critical,
            Severity::High => Self::High,
            Severity::Medium => Self::Medium,
            Severity::Low => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Add,
    Remove,
    Modify,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Relationship,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntity {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedAction {
    pub priority: Priority,
    pub action_type: ActionType,
    /// `None` when the action spans the whole network or several elements.
    pub target: Option<TargetEntity>,
    pub description: String,
    pub expected_impact: String,
    pub effort: Effort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickFix {
    pub issue_id: String,
    pub fix_description: String,
    pub implementation: String,
    pub estimated_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionType {
    AddBridgeCharacter,
    MergeConflicts,
    SplitOverloadedCharacter,
    CreateSubplot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralRevision {
    pub revision_type: RevisionType,
    pub rationale: String,
    pub steps: Vec<String>,
    pub affected_elements: Vec<String>,
    pub expected_outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDevelopmentSuggestion {
    pub character_id: CharacterId,
    pub character_name: String,
    pub current_state: String,
    pub suggested_arc: String,
    pub key_milestones: Vec<String>,
    /// Names of characters to build relationships with.
    pub relationships_to_add: Vec<String>,
    /// Names of conflicts to draw the character into.
    pub conflicts_to_involve: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEnhancementStrategy {
    pub conflict_id: String,
    pub conflict_name: String,
    pub current_weakness: String,
    pub enhancement_approach: String,
    pub stakes_escalation: String,
    pub characters_to_involve: Vec<String>,
    pub phase_progression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentRecommendations {
    /// Most urgent first.
    pub prioritized_actions: Vec<PrioritizedAction>,
    pub quick_fixes: Vec<QuickFix>,
    pub structural_revisions: Vec<StructuralRevision>,
    pub character_development_suggestions: Vec<CharacterDevelopmentSuggestion>,
    pub conflict_enhancement_strategies: Vec<ConflictEnhancementStrategy>,
    pub consolidated_summary: String,
}

impl TreatmentRecommendations {
    fn failed() -> Self {
        Self {
            prioritized_actions: Vec::new(),
            quick_fixes: Vec::new(),
            structural_revisions: Vec::new(),
            character_development_suggestions: Vec::new(),
            conflict_enhancement_strategies: Vec::new(),
            consolidated_summary: "Analysis failed - unable to generate recommendations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub optimistic_score: f64,
    pub realistic_score: f64,
    pub pessimistic_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub implementation_risks: Vec<String>,
    /// 0 to 1.
    pub narrative_coherence_risk: f64,
    /// 0 to 1.
    pub character_consistency_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedEfficiencyMetrics {
    pub post_diagnostic_score: f64,
    /// 0 to 1.
    pub improvement_potential: f64,
    /// 0 to 1.
    pub treatment_feasibility: f64,
    pub expected_outcome: ExpectedOutcome,
    pub risk_assessment: RiskAssessment,
}

impl AdvancedEfficiencyMetrics {
    fn failed() -> Self {
        Self {
            post_diagnostic_score: 0.0,
            improvement_potential: 0.0,
            treatment_feasibility: 0.0,
            expected_outcome: ExpectedOutcome {
                optimistic_score: 0.0,
                realistic_score: 0.0,
                pessimistic_score: 0.0,
            },
            risk_assessment: RiskAssessment {
                implementation_risks: vec!["Analysis failed".to_string()],
                narrative_coherence_risk: 1.0,
                character_consistency_risk: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentOutput {
    pub diagnostics_report: DiagnosticReport,
    pub treatment_recommendations: TreatmentRecommendations,
    pub advanced_efficiency_metrics: AdvancedEfficiencyMetrics,
    pub analysis_time_ms: u64,
    pub metadata: StageMetadata,
}

// ============================================================================
// Treatment planning
// ============================================================================

/// Derives treatment steps from a diagnostic report.
pub struct TreatmentPlanner<'a> {
    network: &'a ConflictNetwork,
    report: &'a DiagnosticReport,
    dynamics: Option<&'a DynamicsOutput>,
}

impl<'a> TreatmentPlanner<'a> {
    pub fn new(network: &'a ConflictNetwork, report: &'a DiagnosticReport) -> Self {
        Self {
            network,
            report,
            dynamics: None,
        }
    }

    /// Use tracked character arcs when suggesting development.
    pub fn with_dynamics(mut self, dynamics: &'a DynamicsOutput) -> Self {
        self.dynamics = Some(dynamics);
        self
    }

    pub fn plan(&self) -> TreatmentRecommendations {
        let prioritized_actions = self.prioritized_actions();
        let quick_fixes = self.quick_fixes();
        let structural_revisions = self.structural_revisions();
        let consolidated_summary =
            self.summary(prioritized_actions.len(), quick_fixes.len(), structural_revisions.len());

        TreatmentRecommendations {
            prioritized_actions,
            quick_fixes,
            structural_revisions,
            character_development_suggestions: self.character_development(),
            conflict_enhancement_strategies: self.conflict_enhancements(),
            consolidated_summary,
        }
    }

    fn character_target(&self, id: &str) -> TargetEntity {
        let name = self
            .network
            .character(&CharacterId::new(id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string());
        TargetEntity {
            kind: EntityKind::Character,
            id: id.to_string(),
            name,
        }
    }

    pub fn prioritized_actions(&self) -> Vec<PrioritizedAction> {
        let mut actions = Vec::new();

        for issue in &self.report.structural_issues {
            match issue.kind {
                StructuralIssueKind::DisconnectedComponents => actions.push(PrioritizedAction {
                    priority: issue.severity.into(),
                    action_type: ActionType::Add,
                    target: None,
                    description: "Add relationships that bridge the disconnected parts of the network"
                        .to_string(),
                    expected_impact: "Story threads converge into a single dramatic web".to_string(),
                    effort: Effort::High,
                }),
                StructuralIssueKind::SinglePointFailure => {
                    for id in &issue.affected_elements {
                        actions.push(PrioritizedAction {
                            priority: issue.severity.into(),
                            action_type: ActionType::Modify,
                            target: Some(self.character_target(id)),
                            description: "Spread this character's relationships across the cast"
                                .to_string(),
                            expected_impact: "The network no longer hinges on one character"
                                .to_string(),
                            effort: Effort::Medium,
                        });
                    }
                }
            }
        }

        for issue in &self.report.isolated_characters.items {
            let priority = match issue.isolation_type {
                IsolationType::CompletelyIsolated => Priority::High,
                IsolationType::WeaklyConnected | IsolationType::ConflictIsolated => Priority::Medium,
            };
            actions.push(PrioritizedAction {
                priority,
                action_type: ActionType::Add,
                target: Some(self.character_target(issue.character_id.as_str())),
                description: format!("Give {} a stake in the main conflicts", issue.character_name),
                expected_impact: "Every major character drives the plot".to_string(),
                effort: Effort::Medium,
            });
        }

        for issue in &self.report.abandoned_conflicts.items {
            let priority = match issue.issue_type {
                AbandonmentType::StuckInPhase => Priority::High,
                AbandonmentType::WeakInvolvement => Priority::Medium,
            };
            actions.push(PrioritizedAction {
                priority,
                action_type: ActionType::Modify,
                target: Some(TargetEntity {
                    kind: EntityKind::Conflict,
                    id: issue.conflict_id.clone(),
                    name: issue.conflict_name.clone(),
                }),
                description: format!("Revive the conflict \"{}\"", issue.conflict_name),
                expected_impact: "The conflict moves forward and keeps tension alive".to_string(),
                effort: Effort::Medium,
            });
        }

        for issue in &self.report.overloaded_characters.items {
            actions.push(PrioritizedAction {
                priority: Priority::High,
                action_type: ActionType::Modify,
                target: Some(self.character_target(issue.character_id.as_str())),
                description: format!(
                    "Reduce {}'s load from {} to about {}",
                    issue.character_name, issue.current_load, issue.recommended_load
                ),
                expected_impact: "Dramatic weight is shared more evenly".to_string(),
                effort: Effort::High,
            });
        }

        for issue in &self.report.redundancies.items {
            let kind = match issue.redundancy_type {
                RedundancyKind::DuplicateRelationships => EntityKind::Relationship,
                RedundancyKind::SimilarConflicts => EntityKind::Conflict,
            };
            let target = (issue.affected_elements.len() == 1).then(|| TargetEntity {
                kind,
                id: issue.affected_elements[0].clone(),
                name: issue.affected_elements[0].clone(),
            });
            actions.push(PrioritizedAction {
                priority: Priority::Low,
                action_type: ActionType::Merge,
                target,
                description: issue.consolidation_suggestion.clone(),
                expected_impact: "A leaner network with no repeated beats".to_string(),
                effort: Effort::Low,
            });
        }

        actions.sort_by_key(|action| action.priority);
        actions
    }

    pub fn quick_fixes(&self) -> Vec<QuickFix> {
        self.report
            .weak_connections
            .items
            .iter()
            .map(|issue| QuickFix {
                issue_id: issue.element_id.clone(),
                fix_description: issue.weakness.clone(),
                implementation: issue.improvement_suggestions.first().cloned().unwrap_or_default(),
                estimated_time: match issue.connection_type {
                    ConnectionKind::Relationship => "1-2 hours",
                    ConnectionKind::ConflictInvolvement => "2-4 hours",
                }
                .to_string(),
            })
            .collect()
    }

    pub fn structural_revisions(&self) -> Vec<StructuralRevision> {
        let mut revisions = Vec::new();

        for issue in &self.report.structural_issues {
            if issue.kind == StructuralIssueKind::DisconnectedComponents {
                revisions.push(StructuralRevision {
                    revision_type: RevisionType::AddBridgeCharacter,
                    rationale: issue.description.clone(),
                    steps: vec![
                        "Identify the groups that never interact".to_string(),
                        "Introduce or promote a character with ties to each group".to_string(),
                        "Give that character a conflict spanning the groups".to_string(),
                    ],
                    affected_elements: issue.affected_elements.clone(),
                    expected_outcome: "A single connected network".to_string(),
                });
            }
        }

        for issue in &self.report.redundancies.items {
            if issue.redundancy_type == RedundancyKind::SimilarConflicts {
                revisions.push(StructuralRevision {
                    revision_type: RevisionType::MergeConflicts,
                    rationale: "Several conflicts share participants and subject".to_string(),
                    steps: vec![
                        "Choose the strongest of the similar conflicts".to_string(),
                        "Fold the others' pivot points into it".to_string(),
                        "Remove the absorbed conflicts".to_string(),
                    ],
                    affected_elements: issue.affected_elements.clone(),
                    expected_outcome: "One richer conflict instead of several thin ones".to_string(),
                });
            }
        }

        for issue in &self.report.overloaded_characters.items {
            revisions.push(StructuralRevision {
                revision_type: RevisionType::SplitOverloadedCharacter,
                rationale: format!(
                    "{} carries a load of {} against a recommended {}",
                    issue.character_name, issue.current_load, issue.recommended_load
                ),
                steps: issue.suggested_distribution.clone(),
                affected_elements: vec![issue.character_id.to_string()],
                expected_outcome: "Supporting characters share the dramatic weight".to_string(),
            });
        }

        let sidelined: Vec<String> = self
            .report
            .isolated_characters
            .items
            .iter()
            .filter(|issue| issue.isolation_type == IsolationType::ConflictIsolated)
            .map(|issue| issue.character_id.to_string())
            .collect();
        if !sidelined.is_empty() {
            revisions.push(StructuralRevision {
                revision_type: RevisionType::CreateSubplot,
                rationale: "Connected characters without any conflict of their own".to_string(),
                steps: vec![
                    "Find a want these characters share or contest".to_string(),
                    "Build a subplot around it".to_string(),
                    "Let the subplot touch a main conflict at its climax".to_string(),
                ],
                affected_elements: sidelined,
                expected_outcome: "Every connected character has something at stake".to_string(),
            });
        }

        revisions
    }

    fn arc_of(&self, character: &CharacterId) -> Option<ArcType> {
        self.dynamics?
            .dynamic_analysis
            .character_development
            .iter()
            .find(|evolution| &evolution.character_id == character)
            .map(|evolution| evolution.arc_type)
    }

    pub fn character_development(&self) -> Vec<CharacterDevelopmentSuggestion> {
        self.report
            .isolated_characters
            .items
            .iter()
            .map(|issue| {
                let current_state = match issue.isolation_type {
                    IsolationType::CompletelyIsolated => "No relationships and no conflicts",
                    IsolationType::WeaklyConnected => "A single relationship and no conflicts",
                    IsolationType::ConflictIsolated => "Connected but outside every conflict",
                };
                let suggested_arc = match self.arc_of(&issue.character_id) {
                    Some(ArcType::Positive) => "Deepen the rising arc by testing it in conflict",
                    Some(ArcType::Negative) => "Turn the decline into a meaningful fall",
                    Some(ArcType::Flat) | Some(ArcType::Complex) | None => {
                        "Build a transformation arc through new ties and stakes"
                    }
                };
                let relationships_to_add = issue
                    .suggested_connections
                    .iter()
                    .filter_map(|s| s.strip_prefix(CONNECT_PREFIX))
                    .map(str::to_string)
                    .collect();
                let conflicts_to_involve = issue
                    .suggested_connections
                    .iter()
                    .filter_map(|s| s.strip_prefix(INVOLVE_PREFIX))
                    .map(str::to_string)
                    .collect();

                CharacterDevelopmentSuggestion {
                    character_id: issue.character_id.clone(),
                    character_name: issue.character_name.clone(),
                    current_state: current_state.to_string(),
                    suggested_arc: suggested_arc.to_string(),
                    key_milestones: vec![
                        format!("Introduce what {} wants", issue.character_name),
                        "Force a choice that costs something".to_string(),
                        "Show the change in a decisive scene".to_string(),
                    ],
                    relationships_to_add,
                    conflicts_to_involve,
                }
            })
            .collect()
    }

    pub fn conflict_enhancements(&self) -> Vec<ConflictEnhancementStrategy> {
        self.report
            .abandoned_conflicts
            .items
            .iter()
            .map(|issue| {
                let conflict = self.network.conflicts().get(&ConflictId::new(&issue.conflict_id));
                let characters_to_involve = self
                    .network
                    .characters()
                    .iter()
                    .filter(|c| conflict.is_some_and(|k| !k.involves(&c.id)))
                    .take(2)
                    .map(|c| c.name.clone())
                    .collect();
                let phase_progression = conflict
                    .map(|k| format!("{} → {}", k.phase.as_str(), k.phase.next_phase().as_str()))
                    .unwrap_or_default();
                let (current_weakness, enhancement_approach) = match issue.issue_type {
                    AbandonmentType::StuckInPhase => (
                        format!("No activity for {} days", issue.days_inactive),
                        "Add a turning point that forces the next phase",
                    ),
                    AbandonmentType::WeakInvolvement => (
                        "Too little at stake for its participants".to_string(),
                        "Tie the conflict to its participants' core motivations",
                    ),
                };

                ConflictEnhancementStrategy {
                    conflict_id: issue.conflict_id.clone(),
                    conflict_name: issue.conflict_name.clone(),
                    current_weakness,
                    enhancement_approach: enhancement_approach.to_string(),
                    stakes_escalation: "Make failure cost something the characters cannot replace"
                        .to_string(),
                    characters_to_involve,
                    phase_progression,
                }
            })
            .collect()
    }

    fn summary(&self, actions: usize, fixes: usize, revisions: usize) -> String {
        let report = self.report;
        if report.total_issues() == 0 {
            return format!(
                "Health score {}/100 ({}). No issues found; the network needs no treatment.",
                report.overall_health_score,
                report.criticality_level.name()
            );
        }
        format!(
            "Health score {}/100 ({}). Found {} issues: {} structural, {} isolated characters, \
             {} abandoned conflicts, {} overloaded characters, {} weak connections, \
             {} redundancies. Proposed {} prioritized actions, {} quick fixes and {} \
             structural revisions.",
            report.overall_health_score,
            report.criticality_level.name(),
            report.total_issues(),
            report.structural_issues.len(),
            report.isolated_characters.total,
            report.abandoned_conflicts.total,
            report.overloaded_characters.total,
            report.weak_connections.total,
            report.redundancies.total,
            actions,
            fixes,
            revisions,
        )
    }
}

/// Health after diagnosis and the range of outcomes treatment could reach.
pub fn post_diagnostic_metrics(
    report: &DiagnosticReport,
    plan: &TreatmentRecommendations,
) -> AdvancedEfficiencyMetrics {
    let health = f64::from(report.overall_health_score);
    let recoverable = 100.0 - health;

    let steps = plan.prioritized_actions.len() + plan.quick_fixes.len();
    let easy = plan
        .prioritized_actions
        .iter()
        .filter(|a| a.effort != Effort::High)
        .count()
        + plan.quick_fixes.len();
    let treatment_feasibility = if steps == 0 {
        1.0
    } else {
        easy as f64 / steps as f64
    };

    let score = |gain: f64| (health + gain).min(100.0);
    let expected_outcome = ExpectedOutcome {
        optimistic_score: score(recoverable * 0.8),
        realistic_score: score(recoverable * 0.5 * treatment_feasibility),
        pessimistic_score: score(recoverable * 0.2 * treatment_feasibility),
    };

    let mut implementation_risks = Vec::new();
    if !report.structural_issues.is_empty() {
        implementation_risks.push("Bridging components needs new connective scenes".to_string());
    }
    if !report.overloaded_characters.is_empty() {
        implementation_risks
            .push("Redistributing load may blur established character roles".to_string());
    }
    if !report.redundancies.is_empty() {
        implementation_risks.push("Merging elements may remove scenes the plot relies on".to_string());
    }
    let narrative_coherence_risk = (report.structural_issues.len() as f64 * 0.2
        + report.redundancies.total as f64 * 0.1)
        .min(1.0);
    let character_consistency_risk = (report.overloaded_characters.total as f64 * 0.2
        + report.isolated_characters.total as f64 * 0.1)
        .min(1.0);

    AdvancedEfficiencyMetrics {
        post_diagnostic_score: health,
        improvement_potential: recoverable / 100.0,
        treatment_feasibility,
        expected_outcome,
        risk_assessment: RiskAssessment {
            implementation_risks,
            narrative_coherence_risk,
            character_consistency_risk,
        },
    }
}

// ============================================================================
// Station
// ============================================================================

/// Station 6. Pure computation over the network and station 5 output.
#[derive(Debug, Default, Clone)]
pub struct TreatmentStation;

impl TreatmentStation {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Station for TreatmentStation {
    type Input = TreatmentInput;
    type Output = TreatmentOutput;

    fn number(&self) -> u8 {
        6
    }

    fn name(&self) -> &'static str {
        "Diagnostics & Treatment"
    }

    async fn process(&self, input: &TreatmentInput) -> Result<TreatmentOutput, StationError> {
        let started = Instant::now();
        let network = &input.conflict_network;

        let report = NetworkDiagnostics::new(network)
            .with_reference_time(input.reference_time)
            .run_all_diagnostics();
        info!(
            health_score = report.overall_health_score,
            issues = report.total_issues(),
            "Diagnostics complete"
        );

        let plan = TreatmentPlanner::new(network, &report)
            .with_dynamics(&input.station5)
            .plan();
        let metrics = post_diagnostic_metrics(&report, &plan);
        info!(
            actions = plan.prioritized_actions.len(),
            improvement_potential = metrics.improvement_potential,
            "Treatment planned"
        );

        Ok(TreatmentOutput {
            diagnostics_report: report,
            treatment_recommendations: plan,
            advanced_efficiency_metrics: metrics,
            analysis_time_ms: started.elapsed().as_millis() as u64,
            metadata: StageMetadata::success(),
        })
    }

    fn extract_required_data(&self, input: &TreatmentInput) -> Value {
        json!({
            "characters_count": input.conflict_network.characters().len(),
            "relationships_count": input.conflict_network.relationships().len(),
            "conflicts_count": input.conflict_network.conflicts().len(),
        })
    }

    fn error_fallback(&self) -> TreatmentOutput {
        TreatmentOutput {
            diagnostics_report: DiagnosticReport::failed(),
            treatment_recommendations: TreatmentRecommendations::failed(),
            advanced_efficiency_metrics: AdvancedEfficiencyMetrics::failed(),
            analysis_time_ms: 0,
            metadata: StageMetadata::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CriticalityLevel;
    use crate::network::{Character, Conflict, ConflictPhase, Relationship, RelationshipId, RelationshipType};
    use crate::station::{StageStatus, StationRunner};
    use crate::testing::{sample_dynamics, sample_network};
    use chrono::Duration;

    fn at() -> DateTime<Utc> {
        sample_network()
            .snapshots()
            .last()
            .map(|s| s.timestamp)
            .unwrap_or_else(Utc::now)
    }

    fn troubled_network() -> ConflictNetwork {
        let now = at();
        let mut network = ConflictNetwork::new("n", "Troubled");
        for (i, name) in ["Ana", "Ben", "Cleo", "Dara"].iter().enumerate() {
            network.add_character(Character::new(CharacterId::from_roster_index(i), *name));
        }
        let id = CharacterId::from_roster_index;
        network.add_relationship(
            Relationship::new(RelationshipId::new("r1"), id(0), id(1), RelationshipType::Rivalry)
                .with_strength(2),
        );
        network.add_conflict(
            Conflict::new(ConflictId::new("k1"), "Old feud", vec![id(0), id(2)])
                .with_phase(ConflictPhase::Escalating)
                .with_timestamp(now - Duration::days(40)),
        );
        network
    }

    fn report_for(network: &ConflictNetwork) -> DiagnosticReport {
        NetworkDiagnostics::new(network)
            .with_reference_time(at())
            .run_all_diagnostics()
    }

    #[test]
    fn test_actions_are_sorted_by_priority() {
        let network = troubled_network();
        let report = report_for(&network);
        let actions = TreatmentPlanner::new(&network, &report).prioritized_actions();

        assert!(!actions.is_empty());
        assert!(actions.windows(2).all(|w| w[0].priority <= w[1].priority));
        let dara = actions
            .iter()
            .find(|a| a.target.as_ref().is_some_and(|t| t.name == "Dara"))
            .unwrap();
        assert_eq!(dara.priority, Priority::High);
        assert_eq!(dara.action_type, ActionType::Add);
    }

    #[test]
    fn test_weak_relationship_becomes_quick_fix() {
        let network = troubled_network();
        let report = report_for(&network);
        let fixes = TreatmentPlanner::new(&network, &report).quick_fixes();

        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].issue_id, "r1");
        assert_eq!(fixes[0].estimated_time, "1-2 hours");
    }

    #[test]
    fn test_disconnected_network_gets_bridge_revision() {
        let network = troubled_network();
        let report = report_for(&network);
        let revisions = TreatmentPlanner::new(&network, &report).structural_revisions();

        assert!(revisions
            .iter()
            .any(|r| r.revision_type == RevisionType::AddBridgeCharacter));
    }

    #[test]
    fn test_development_splits_suggestions() {
        let network = troubled_network();
        let report = report_for(&network);
        let suggestions = TreatmentPlanner::new(&network, &report).character_development();

        let dara = suggestions.iter().find(|s| s.character_name == "Dara").unwrap();
        assert_eq!(dara.relationships_to_add, vec!["Ana", "Ben", "Cleo"]);
        assert!(dara.conflicts_to_involve.is_empty());
        assert_eq!(dara.current_state, "No relationships and no conflicts");
    }

    #[test]
    fn test_stuck_conflict_strategy() {
        let network = troubled_network();
        let report = report_for(&network);
        let strategies = TreatmentPlanner::new(&network, &report).conflict_enhancements();

        assert_eq!(strategies.len(), 1);
        let feud = &strategies[0];
        assert_eq!(feud.current_weakness, "No activity for 40 days");
        assert_eq!(feud.phase_progression, "ESCALATING → CLIMAX");
        assert_eq!(feud.characters_to_involve, vec!["Ben", "Dara"]);
    }

    #[test]
    fn test_healthy_network_metrics() {
        let network = ConflictNetwork::empty();
        let report = report_for(&network);
        let plan = TreatmentPlanner::new(&network, &report).plan();
        let metrics = post_diagnostic_metrics(&report, &plan);

        assert_eq!(report.criticality_level, CriticalityLevel::Healthy);
        assert!(plan.consolidated_summary.contains("No issues found"));
        assert_eq!(metrics.post_diagnostic_score, 100.0);
        assert_eq!(metrics.improvement_potential, 0.0);
        assert_eq!(metrics.treatment_feasibility, 1.0);
        assert_eq!(metrics.expected_outcome.optimistic_score, 100.0);
        assert!(metrics.risk_assessment.implementation_risks.is_empty());
    }

    #[test]
    fn test_outcomes_are_ordered() {
        let network = troubled_network();
        let report = report_for(&network);
        let plan = TreatmentPlanner::new(&network, &report).plan();
        let metrics = post_diagnostic_metrics(&report, &plan);
        let outcome = metrics.expected_outcome;

        assert!(outcome.optimistic_score >= outcome.realistic_score);
        assert!(outcome.realistic_score >= outcome.pessimistic_score);
        assert!(outcome.pessimistic_score >= metrics.post_diagnostic_score);
        assert!(outcome.optimistic_score <= 100.0);
    }

    #[tokio::test]
    async fn test_station_runs_without_oracle() {
        let runner = StationRunner::new(TreatmentStation::new(), "none");
        let run = runner
            .execute(&TreatmentInput {
                conflict_network: sample_network(),
                station5: sample_dynamics(),
                reference_time: at(),
            })
            .await;

        assert!(!run.metadata.error_occurred);
        assert_eq!(run.output.metadata.status, StageStatus::Success);
        assert_eq!(
            run.output.diagnostics_report,
            NetworkDiagnostics::new(&sample_network())
                .with_reference_time(at())
                .run_all_diagnostics()
        );
    }
}
