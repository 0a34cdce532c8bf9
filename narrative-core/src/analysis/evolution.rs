//! How the network changes over its snapshot history.
//!
//! Everything here is derived from [`ConflictNetwork::snapshots`] plus the
//! conflicts' own timestamps; nothing is inferred from text.

use super::stats::{mean, variance};
use crate::network::{
    CharacterId, Conflict, ConflictId, ConflictNetwork, ConflictPhase, NetworkSnapshot,
    RelationshipId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complexity jump between consecutive snapshots that marks a transition.
const TRANSITION_THRESHOLD: usize = 5;
const SNAPSHOT_SIGNIFICANCE: u8 = 5;
const MAX_TRANSFORMATION: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NetworkSnapshot,
    ConflictEmerged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativePhase {
    Setup,
    RisingAction,
    Climax,
    FallingAction,
    Resolution,
}

impl NarrativePhase {
    /// Phase for a normalized position in `[0, 1]`.
    pub fn from_position(position: f64) -> Self {
        if position < 0.2 {
            Self::Setup
        } else if position < 0.5 {
            Self::RisingAction
        } else if position < 0.7 {
            Self::Climax
        } else if position < 0.9 {
            Self::FallingAction
        } else {
            Self::Resolution
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvolvedEntities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<CharacterId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub description: String,
    pub involved_entities: InvolvedEntities,
    /// 1 to 10.
    pub significance: u8,
    pub narrative_phase: NarrativePhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPoint {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub impact_score: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub structural_stability: f64,
    pub character_stability: f64,
    pub conflict_stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionAnalysis {
    pub overall_growth_rate: f64,
    pub complexity_progression: Vec<usize>,
    pub density_progression: Vec<f64>,
    pub critical_transition_points: Vec<TransitionPoint>,
    pub stability_metrics: StabilityMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentStage {
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub relationships: Vec<RelationshipId>,
    pub conflicts: Vec<ConflictId>,
}

impl DevelopmentStage {
    fn involvement(&self) -> i64 {
        (self.relationships.len() + self.conflicts.len()) as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcType {
    Positive,
    Negative,
    Flat,
    Complex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterEvolution {
    pub character_id: CharacterId,
    pub character_name: String,
    pub development_stages: Vec<DevelopmentStage>,
    pub arc_type: ArcType,
    /// 0 to 10.
    pub transformation_score: f64,
    pub key_moments: Vec<KeyMoment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub timestamp: DateTime<Utc>,
    pub from_phase: ConflictPhase,
    pub to_phase: ConflictPhase,
    pub catalyst: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictProgression {
    pub conflict_id: ConflictId,
    pub conflict_name: String,
    pub phase_transitions: Vec<PhaseTransition>,
    pub intensity_progression: Vec<u8>,
    pub resolution_probability: f64,
    pub stagnation_risk: f64,
}

/// Combined output of [`EvolutionAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicAnalysis {
    pub event_timeline: Vec<TimelineEvent>,
    pub network_evolution: EvolutionAnalysis,
    pub character_development: Vec<CharacterEvolution>,
    pub conflict_progression: Vec<ConflictProgression>,
}

impl DynamicAnalysis {
    /// Result reported when the analysis could not run.
    pub fn failed() -> Self {
        Self {
            event_timeline: Vec::new(),
            network_evolution: EvolutionAnalysis {
                overall_growth_rate: 0.0,
                complexity_progression: Vec::new(),
                density_progression: Vec::new(),
                critical_transition_points: Vec::new(),
                stability_metrics: StabilityMetrics {
                    structural_stability: 0.0,
                    character_stability: 0.0,
                    conflict_stability: 0.0,
                },
            },
            character_development: Vec::new(),
            conflict_progression: Vec::new(),
        }
    }
}

/// Builds timelines and evolution metrics from snapshot history.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvolutionAnalyzer;

impl EvolutionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, network: &ConflictNetwork) -> DynamicAnalysis {
        let event_timeline = self.construct_timeline(network);
        let network_evolution = self.analyze_network_evolution(network);
        let character_development = self.track_character_development(network, &event_timeline);
        let conflict_progression = self.track_conflict_progression(network, &event_timeline);

        DynamicAnalysis {
            event_timeline,
            network_evolution,
            character_development,
            conflict_progression,
        }
    }

    /// Snapshot and conflict-emergence events, oldest first.
    pub fn construct_timeline(&self, network: &ConflictNetwork) -> Vec<TimelineEvent> {
        let snapshots = network.snapshots();

        let snapshot_events = snapshots.iter().map(|snapshot| TimelineEvent {
            timestamp: snapshot.timestamp,
            event_type: EventType::NetworkSnapshot,
            description: snapshot.description.clone(),
            involved_entities: InvolvedEntities::default(),
            significance: SNAPSHOT_SIGNIFICANCE,
            narrative_phase: narrative_phase_at(snapshot.timestamp, snapshots),
        });

        let conflict_events = network.conflicts().iter().filter_map(|conflict| {
            let emerged = conflict.first_seen()?;
            Some(TimelineEvent {
                timestamp: emerged,
                event_type: EventType::ConflictEmerged,
                description: format!("Conflict emerged: {}", conflict.name),
                involved_entities: InvolvedEntities {
                    characters: conflict.involved_characters.clone(),
                    relationships: Vec::new(),
                    conflicts: vec![conflict.id.clone()],
                },
                significance: conflict.strength,
                narrative_phase: narrative_phase_at(emerged, snapshots),
            })
        });

        let mut events: Vec<_> = snapshot_events.chain(conflict_events).collect();
        events.sort_by_key(|event| event.timestamp);
        events
    }

    pub fn analyze_network_evolution(&self, network: &ConflictNetwork) -> EvolutionAnalysis {
        let snapshots = network.snapshots();
        let complexity: Vec<usize> = snapshots.iter().map(|s| s.state.element_count()).collect();
        let density: Vec<f64> = snapshots
            .iter()
            .map(|s| s.state.relationship_density())
            .collect();

        let critical_transition_points = complexity
            .windows(2)
            .zip(&snapshots[1.min(snapshots.len())..])
            .filter_map(|(pair, snapshot)| {
                let change = pair[0].abs_diff(pair[1]);
                (change > TRANSITION_THRESHOLD).then(|| TransitionPoint {
                    timestamp: snapshot.timestamp,
                    description: snapshot.description.clone(),
                    impact_score: change,
                })
            })
            .collect();

        let overall_growth_rate = match (complexity.first(), complexity.last()) {
            (Some(&first), Some(&last)) if complexity.len() > 1 => {
                (last as f64 - first as f64) / complexity.len() as f64
            }
            _ => 0.0,
        };

        let complexity_values: Vec<f64> = complexity.iter().map(|&c| c as f64).collect();
        let structural_stability = 1.0 / (1.0 + variance(&complexity_values));
        let stability_metrics = StabilityMetrics {
            structural_stability,
            character_stability: 1.0 / (1.0 + variance(&density)),
            conflict_stability: structural_stability,
        };

        EvolutionAnalysis {
            overall_growth_rate,
            complexity_progression: complexity,
            density_progression: density,
            critical_transition_points,
            stability_metrics,
        }
    }

    pub fn track_character_development(
        &self,
        network: &ConflictNetwork,
        timeline: &[TimelineEvent],
    ) -> Vec<CharacterEvolution> {
        network
            .characters()
            .iter()
            .map(|character| {
                let development_stages: Vec<DevelopmentStage> = network
                    .snapshots()
                    .iter()
                    .filter(|snapshot| snapshot.contains_character(&character.id))
                    .map(|snapshot| stage_at(snapshot, &character.id))
                    .collect();

                let key_moments = timeline
                    .iter()
                    .filter(|event| event.involved_entities.characters.contains(&character.id))
                    .map(|event| KeyMoment {
                        timestamp: event.timestamp,
                        event: event.description.clone(),
                        impact: format!("Significance: {}/10", event.significance),
                    })
                    .collect();

                CharacterEvolution {
                    character_id: character.id.clone(),
                    character_name: character.name.clone(),
                    arc_type: arc_type(&development_stages),
                    transformation_score: transformation_score(&development_stages),
                    development_stages,
                    key_moments,
                }
            })
            .collect()
    }

    pub fn track_conflict_progression(
        &self,
        network: &ConflictNetwork,
        timeline: &[TimelineEvent],
    ) -> Vec<ConflictProgression> {
        network
            .conflicts()
            .iter()
            .map(|conflict| {
                let mut phase_transitions = Vec::new();
                let mut intensity_progression = Vec::new();
                let mut previous: Option<ConflictPhase> = None;

                for snapshot in network.snapshots() {
                    let Some(state) = snapshot.state.conflicts.get(&conflict.id) else {
                        continue;
                    };
                    intensity_progression.push(state.strength);

                    if let Some(from_phase) = previous.filter(|p| *p != state.phase) {
                        phase_transitions.push(PhaseTransition {
                            timestamp: snapshot.timestamp,
                            from_phase,
                            to_phase: state.phase,
                            catalyst: catalyst(timeline, snapshot.timestamp, &conflict.id),
                        });
                    }
                    previous = Some(state.phase);
                }

                ConflictProgression {
                    conflict_id: conflict.id.clone(),
                    conflict_name: conflict.name.clone(),
                    resolution_probability: resolution_probability(
                        conflict,
                        phase_transitions.len(),
                    ),
                    stagnation_risk: stagnation_risk(
                        &intensity_progression,
                        phase_transitions.len(),
                    ),
                    phase_transitions,
                    intensity_progression,
                }
            })
            .collect()
    }
}

/// Position of `at` between the first and last snapshot, bucketed.
fn narrative_phase_at(at: DateTime<Utc>, snapshots: &[NetworkSnapshot]) -> NarrativePhase {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return NarrativePhase::Setup;
    };
    let span = (last.timestamp - first.timestamp).num_milliseconds();
    if span == 0 {
        return NarrativePhase::Setup;
    }
    let offset = (at - first.timestamp).num_milliseconds();
    NarrativePhase::from_position(offset as f64 / span as f64)
}

fn stage_at(snapshot: &NetworkSnapshot, character: &CharacterId) -> DevelopmentStage {
    DevelopmentStage {
        timestamp: snapshot.timestamp,
        stage: snapshot.description.clone(),
        relationships: snapshot
            .state
            .relationships_of(character)
            .map(|r| r.id.clone())
            .collect(),
        conflicts: snapshot
            .state
            .conflicts_of(character)
            .map(|k| k.id.clone())
            .collect(),
    }
}

/// Classify by net change in involvement. The `Complex` check comes after
/// the signed checks, so it only applies to changes the others miss.
fn arc_type(stages: &[DevelopmentStage]) -> ArcType {
    let (Some(first), Some(last)) = (stages.first(), stages.last()) else {
        return ArcType::Flat;
    };
    if stages.len() < 2 {
        return ArcType::Flat;
    }
    let change = last.involvement() - first.involvement();
    if change > 2 {
        ArcType::Positive
    } else if change < -2 {
        ArcType::Negative
    } else if change.abs() > 4 {
        ArcType::Complex
    } else {
        ArcType::Flat
    }
}

/// Mean absolute change in involvement per step, capped at 10.
fn transformation_score(stages: &[DevelopmentStage]) -> f64 {
    if stages.len() < 2 {
        return 0.0;
    }
    let steps: Vec<f64> = stages
        .windows(2)
        .map(|pair| {
            let conflicts = pair[1].conflicts.len().abs_diff(pair[0].conflicts.len());
            let relationships = pair[1]
                .relationships
                .len()
                .abs_diff(pair[0].relationships.len());
            (conflicts + relationships) as f64
        })
        .collect();
    mean(&steps).min(MAX_TRANSFORMATION)
}

fn catalyst(timeline: &[TimelineEvent], at: DateTime<Utc>, conflict: &ConflictId) -> String {
    timeline
        .iter()
        .find(|event| event.timestamp == at && event.involved_entities.conflicts.contains(conflict))
        .map(|event| event.description.clone())
        .unwrap_or_else(|| "Unknown catalyst".to_string())
}

fn resolution_probability(conflict: &Conflict, transitions: usize) -> f64 {
    let bonus = (transitions as f64 * 0.05).min(0.3);
    (conflict.phase.resolution_baseline() + bonus).clamp(0.0, 1.0)
}

fn stagnation_risk(intensities: &[u8], transitions: usize) -> f64 {
    if intensities.len() < 3 {
        return 0.5;
    }
    let values: Vec<f64> = intensities.iter().map(|&v| f64::from(v)).collect();
    let spread = variance(&values);

    let transition_factor: f64 = match transitions {
        0 => 0.8,
        1 => 0.5,
        _ => 0.2,
    };
    let variance_factor = if spread < 1.0 {
        0.7
    } else if spread < 3.0 {
        0.4
    } else {
        0.1
    };
    ((transition_factor + variance_factor) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Character, Relationship, RelationshipType};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn id(s: &str) -> CharacterId {
        CharacterId::new(s)
    }

    fn stage(relationships: usize, conflicts: usize) -> DevelopmentStage {
        DevelopmentStage {
            timestamp: t0(),
            stage: String::new(),
            relationships: (0..relationships)
                .map(|i| RelationshipId::new(format!("r{i}")))
                .collect(),
            conflicts: (0..conflicts)
                .map(|i| ConflictId::new(format!("k{i}")))
                .collect(),
        }
    }

    #[test]
    fn test_phase_from_position() {
        assert_eq!(NarrativePhase::from_position(0.0), NarrativePhase::Setup);
        assert_eq!(NarrativePhase::from_position(0.3), NarrativePhase::RisingAction);
        assert_eq!(NarrativePhase::from_position(0.6), NarrativePhase::Climax);
        assert_eq!(NarrativePhase::from_position(0.8), NarrativePhase::FallingAction);
        assert_eq!(NarrativePhase::from_position(1.0), NarrativePhase::Resolution);
    }

    #[test]
    fn test_timeline_orders_events_and_tags_phases() {
        let mut network = ConflictNetwork::new("n", "Timeline");
        network.add_character(Character::new(id("a"), "A"));
        network.take_snapshot_at(t0(), "start");
        network.add_conflict(
            Conflict::new(ConflictId::new("k"), "Feud", vec![id("a")])
                .with_strength(7)
                .with_timestamp(t0() + Duration::days(5)),
        );
        network.take_snapshot_at(t0() + Duration::days(10), "end");

        let timeline = EvolutionAnalyzer::new().construct_timeline(&network);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].event_type, EventType::NetworkSnapshot);
        assert_eq!(timeline[0].narrative_phase, NarrativePhase::Setup);
        assert_eq!(timeline[1].event_type, EventType::ConflictEmerged);
        assert_eq!(timeline[1].significance, 7);
        assert_eq!(timeline[1].narrative_phase, NarrativePhase::Climax);
        assert_eq!(timeline[1].description, "Conflict emerged: Feud");
        assert_eq!(timeline[2].narrative_phase, NarrativePhase::Resolution);
    }

    #[test]
    fn test_timeline_without_snapshots_is_setup() {
        let mut network = ConflictNetwork::new("n", "No history");
        network.add_conflict(
            Conflict::new(ConflictId::new("k"), "Feud", vec![id("a")]).with_timestamp(t0()),
        );
        network.add_conflict(Conflict::new(ConflictId::new("u"), "Undated", vec![id("a")]));

        let timeline = EvolutionAnalyzer::new().construct_timeline(&network);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].narrative_phase, NarrativePhase::Setup);
    }

    #[test]
    fn test_network_evolution() {
        let mut network = ConflictNetwork::new("n", "Growth");
        network.add_character(Character::new(id("a"), "A"));
        network.add_character(Character::new(id("b"), "B"));
        network.take_snapshot_at(t0(), "two characters");
        for i in 0..6 {
            network.add_character(Character::new(id(&format!("x{i}")), "X"));
        }
        network.add_relationship(Relationship::new(
            RelationshipId::new("r"),
            id("a"),
            id("b"),
            RelationshipType::Family,
        ));
        network.take_snapshot_at(t0() + Duration::days(1), "crowd arrives");

        let evolution = EvolutionAnalyzer::new().analyze_network_evolution(&network);
        assert_eq!(evolution.complexity_progression, vec![2, 9]);
        assert_eq!(evolution.density_progression[0], 0.0);
        assert_eq!(evolution.critical_transition_points.len(), 1);
        assert_eq!(evolution.critical_transition_points[0].impact_score, 7);
        assert!((evolution.overall_growth_rate - 3.5).abs() < 1e-9);
        assert!(evolution.stability_metrics.structural_stability < 1.0);
        assert_eq!(
            evolution.stability_metrics.structural_stability,
            evolution.stability_metrics.conflict_stability
        );
    }

    #[test]
    fn test_single_snapshot_has_no_growth() {
        let mut network = ConflictNetwork::new("n", "Static");
        network.add_character(Character::new(id("a"), "A"));
        network.take_snapshot_at(t0(), "only");

        let evolution = EvolutionAnalyzer::new().analyze_network_evolution(&network);
        assert_eq!(evolution.overall_growth_rate, 0.0);
        assert!(evolution.critical_transition_points.is_empty());
        assert_eq!(evolution.stability_metrics.structural_stability, 1.0);
    }

    #[test]
    fn test_arc_type_rules() {
        assert_eq!(arc_type(&[stage(1, 0)]), ArcType::Flat);
        assert_eq!(arc_type(&[stage(0, 0), stage(2, 1)]), ArcType::Positive);
        assert_eq!(arc_type(&[stage(3, 2), stage(0, 1)]), ArcType::Negative);
        assert_eq!(arc_type(&[stage(1, 1), stage(2, 2)]), ArcType::Flat);
    }

    #[test]
    fn test_transformation_score_is_mean_step_change() {
        assert_eq!(transformation_score(&[stage(1, 1)]), 0.0);
        let stages = [stage(0, 0), stage(2, 0), stage(2, 2)];
        assert!((transformation_score(&stages) - 2.0).abs() < 1e-9);
        let wild = [stage(0, 0), stage(20, 10)];
        assert_eq!(transformation_score(&wild), 10.0);
    }

    #[test]
    fn test_character_development_collects_stages_and_moments() {
        let mut network = ConflictNetwork::new("n", "Arc");
        network.add_character(Character::new(id("a"), "A"));
        network.add_character(Character::new(id("b"), "B"));
        network.take_snapshot_at(t0(), "start");
        network.add_conflict(
            Conflict::new(ConflictId::new("k"), "Duel", vec![id("a"), id("b")])
                .with_timestamp(t0() + Duration::hours(1)),
        );
        network.take_snapshot_at(t0() + Duration::hours(2), "after duel");

        let analysis = EvolutionAnalyzer::new().analyze(&network);
        let a = &analysis.character_development[0];
        assert_eq!(a.development_stages.len(), 2);
        assert_eq!(a.development_stages[1].conflicts, vec![ConflictId::new("k")]);
        assert_eq!(a.key_moments.len(), 1);
        assert_eq!(a.key_moments[0].impact, "Significance: 5/10");
        assert_eq!(a.arc_type, ArcType::Flat);
        assert!((a.transformation_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_conflict_progression() {
        let mut network = ConflictNetwork::new("n", "Progress");
        let at = |h| t0() + Duration::hours(h);
        let base = Conflict::new(ConflictId::new("k"), "War", vec![id("a")]).with_timestamp(at(0));

        network.add_conflict(base.clone().with_strength(3));
        network.take_snapshot_at(at(0), "one");
        network.add_conflict(
            base.clone()
                .with_strength(6)
                .with_phase(ConflictPhase::Escalating),
        );
        network.take_snapshot_at(at(1), "two");
        network.add_conflict(base.with_strength(9).with_phase(ConflictPhase::Climax));
        network.take_snapshot_at(at(2), "three");

        let analysis = EvolutionAnalyzer::new().analyze(&network);
        let progression = &analysis.conflict_progression[0];
        assert_eq!(progression.intensity_progression, vec![3, 6, 9]);
        assert_eq!(progression.phase_transitions.len(), 2);
        assert_eq!(progression.phase_transitions[0].from_phase, ConflictPhase::Emerging);
        assert_eq!(progression.phase_transitions[1].to_phase, ConflictPhase::Climax);
        assert_eq!(progression.phase_transitions[0].catalyst, "Unknown catalyst");
        assert!((progression.resolution_probability - 0.7).abs() < 1e-9);
        assert!((progression.stagnation_risk - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_stagnation_needs_three_points() {
        assert_eq!(stagnation_risk(&[5, 5], 0), 0.5);
        assert!((stagnation_risk(&[5, 5, 5], 0) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_probability_is_clamped() {
        let conflict = Conflict::new(ConflictId::new("k"), "Over", vec![id("a")])
            .with_phase(ConflictPhase::Aftermath);
        assert_eq!(resolution_probability(&conflict, 4), 1.0);
    }
}
