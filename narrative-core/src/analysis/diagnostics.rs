//! Health diagnostics for a conflict network.
//!
//! [`NetworkDiagnostics`] looks for six kinds of problems and folds their
//! counts into a single 0–100 health score:
//!
//! | check                  | penalty per issue |
//! |------------------------|-------------------|
//! | structural issues      | 15                |
//! | isolated characters    | 10                |
//! | abandoned conflicts    | 8                 |
//! | overloaded characters  | 12                |
//! | weak connections       | 5                 |
//! | redundancies           | 7                 |

use crate::network::{CharacterId, Conflict, ConflictNetwork};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const STRUCTURAL_PENALTY: i64 = 15;
const ISOLATED_PENALTY: i64 = 10;
const ABANDONED_PENALTY: i64 = 8;
const OVERLOADED_PENALTY: i64 = 12;
const WEAK_PENALTY: i64 = 5;
const REDUNDANT_PENALTY: i64 = 7;

/// Relationship count at which a character is treated as a critical node.
const CRITICAL_NODE_DEGREE: usize = 3;
/// Days without activity before a conflict counts as stuck.
const STALE_AFTER_DAYS: i64 = 30;
/// Assumed inactivity for conflicts with no timestamps.
const UNDATED_DAYS: i64 = 365;
const WEAK_CONFLICT_STRENGTH: u8 = 3;
const WEAK_CONNECTION_STRENGTH: u8 = 4;
const OVERLOAD_THRESHOLD: usize = 8;
const RECOMMENDED_LOAD: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalityLevel {
    Healthy,
    MinorIssues,
    ModerateIssues,
    MajorIssues,
    Critical,
}

impl CriticalityLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 85 => Self::Healthy,
            s if s >= 70 => Self::MinorIssues,
            s if s >= 50 => Self::ModerateIssues,
            s if s >= 30 => Self::MajorIssues,
            _ => Self::Critical,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::MinorIssues => "minor issues",
            Self::ModerateIssues => "moderate issues",
            Self::MajorIssues => "major issues",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralIssueKind {
    DisconnectedComponents,
    SinglePointFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralIssue {
    pub kind: StructuralIssueKind,
    pub severity: Severity,
    pub description: String,
    pub affected_elements: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationType {
    CompletelyIsolated,
    WeaklyConnected,
    ConflictIsolated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolatedCharacterIssue {
    pub character_id: CharacterId,
    pub character_name: String,
    pub isolation_type: IsolationType,
    pub suggested_connections: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonmentType {
    StuckInPhase,
    WeakInvolvement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonedConflictIssue {
    pub conflict_id: String,
    pub conflict_name: String,
    pub issue_type: AbandonmentType,
    pub days_inactive: i64,
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverloadType {
    CentralBottleneck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverloadedCharacterIssue {
    pub character_id: CharacterId,
    pub character_name: String,
    pub overload_type: OverloadType,
    pub current_load: usize,
    pub recommended_load: usize,
    pub suggested_distribution: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Relationship,
    ConflictInvolvement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakConnectionIssue {
    pub connection_type: ConnectionKind,
    pub element_id: String,
    pub weakness: String,
    pub strength_score: u8,
    pub improvement_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyKind {
    DuplicateRelationships,
    SimilarConflicts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundancyIssue {
    pub redundancy_type: RedundancyKind,
    pub affected_elements: Vec<String>,
    pub redundancy_score: f64,
    pub consolidation_suggestion: String,
}

/// A counted list of issues of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueList<T> {
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> IssueList<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for IssueList<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Everything [`NetworkDiagnostics::run_all_diagnostics`] found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// 0 to 100.
    pub overall_health_score: u32,
    pub criticality_level: CriticalityLevel,
    pub structural_issues: Vec<StructuralIssue>,
    pub isolated_characters: IssueList<IsolatedCharacterIssue>,
    pub abandoned_conflicts: IssueList<AbandonedConflictIssue>,
    pub overloaded_characters: IssueList<OverloadedCharacterIssue>,
    pub weak_connections: IssueList<WeakConnectionIssue>,
    pub redundancies: IssueList<RedundancyIssue>,
}

impl DiagnosticReport {
    /// Report returned when diagnostics could not run.
    pub fn failed() -> Self {
        Self {
            overall_health_score: 0,
            criticality_level: CriticalityLevel::Critical,
            structural_issues: Vec::new(),
            isolated_characters: IssueList::default(),
            abandoned_conflicts: IssueList::default(),
            overloaded_characters: IssueList::default(),
            weak_connections: IssueList::default(),
            redundancies: IssueList::default(),
        }
    }

    /// Number of issues across all categories.
    pub fn total_issues(&self) -> usize {
        self.structural_issues.len()
            + self.isolated_characters.total
            + self.abandoned_conflicts.total
            + self.overloaded_characters.total
            + self.weak_connections.total
            + self.redundancies.total
    }
}

/// Health score from issue counts, floored at 0.
pub fn health_score(
    structural: usize,
    isolated: usize,
    abandoned: usize,
    overloaded: usize,
    weak: usize,
    redundant: usize,
) -> u32 {
    let penalty = structural as i64 * STRUCTURAL_PENALTY
        + isolated as i64 * ISOLATED_PENALTY
        + abandoned as i64 * ABANDONED_PENALTY
        + overloaded as i64 * OVERLOADED_PENALTY
        + weak as i64 * WEAK_PENALTY
        + redundant as i64 * REDUNDANT_PENALTY;
    (100 - penalty).max(0) as u32
}

/// Runs health checks over a network.
pub struct NetworkDiagnostics<'a> {
    network: &'a ConflictNetwork,
    reference_time: DateTime<Utc>,
}

impl<'a> NetworkDiagnostics<'a> {
    /// Diagnose `network`, measuring inactivity against the current time.
    /// Reports then depend on the clock; pin it with
    /// [`with_reference_time`](Self::with_reference_time) for repeatable runs.
    pub fn new(network: &'a ConflictNetwork) -> Self {
        Self {
            network,
            reference_time: Utc::now(),
        }
    }

    /// Measure inactivity against a fixed time instead.
    pub fn with_reference_time(mut self, at: DateTime<Utc>) -> Self {
        self.reference_time = at;
        self
    }

    pub fn run_all_diagnostics(&self) -> DiagnosticReport {
        let structural_issues = self.analyze_structural_issues();
        let isolated_characters = self.find_isolated_characters();
        let abandoned_conflicts = self.find_abandoned_conflicts();
        let overloaded_characters = self.find_overloaded_characters();
        let weak_connections = self.find_weak_connections();
        let redundancies = self.find_redundancies();

        let overall_health_score = health_score(
            structural_issues.len(),
            isolated_characters.total,
            abandoned_conflicts.total,
            overloaded_characters.total,
            weak_connections.total,
            redundancies.total,
        );

        DiagnosticReport {
            overall_health_score,
            criticality_level: CriticalityLevel::from_score(overall_health_score),
            structural_issues,
            isolated_characters,
            abandoned_conflicts,
            overloaded_characters,
            weak_connections,
            redundancies,
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    pub fn analyze_structural_issues(&self) -> Vec<StructuralIssue> {
        let mut issues = Vec::new();

        let components = self.connected_components();
        if components.len() > 1 {
            issues.push(StructuralIssue {
                kind: StructuralIssueKind::DisconnectedComponents,
                severity: Severity::High,
                description: format!(
                    "The network splits into {} disconnected components",
                    components.len()
                ),
                affected_elements: components
                    .into_iter()
                    .flatten()
                    .map(|id| id.to_string())
                    .collect(),
            });
        }

        let critical = self.critical_nodes();
        if !critical.is_empty() {
            issues.push(StructuralIssue {
                kind: StructuralIssueKind::SinglePointFailure,
                severity: Severity::Medium,
                description: "Some characters hold so many relationships that removing them \
                              could fragment the network"
                    .to_string(),
                affected_elements: critical.into_iter().map(|id| id.to_string()).collect(),
            });
        }

        issues
    }

    /// Connected components over relationship edges, in roster order.
    /// Edges to ids that are not characters are ignored.
    pub fn connected_components(&self) -> Vec<Vec<&'a CharacterId>> {
        let mut visited: HashSet<&CharacterId> = HashSet::new();
        let mut components = Vec::new();

        for start in self.network.characters().keys() {
            if visited.contains(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                component.push(current);
                for rel in self.network.relationships_of(current) {
                    if let Some(other) = rel.other_end(current) {
                        if !visited.contains(other) && self.network.characters().contains_key(other)
                        {
                            stack.push(other);
                        }
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// Degree heuristic: characters with many relationships.
    fn critical_nodes(&self) -> Vec<&'a CharacterId> {
        self.network
            .characters()
            .keys()
            .filter(|id| self.network.relationships_of(id).count() >= CRITICAL_NODE_DEGREE)
            .collect()
    }

    // =========================================================================
    // Characters
    // =========================================================================

    pub fn find_isolated_characters(&self) -> IssueList<IsolatedCharacterIssue> {
        let mut issues = Vec::new();

        for character in self.network.characters() {
            let relationships = self.network.relationships_of(&character.id).count();
            let conflicts = self.network.conflicts_of(&character.id).count();
            if conflicts > 0 {
                continue;
            }

            let (isolation_type, suggested_connections) = match relationships {
                0 => (
                    IsolationType::CompletelyIsolated,
                    self.suggest_connections(&character.id),
                ),
                1 => (
                    IsolationType::WeaklyConnected,
                    self.suggest_connections(&character.id),
                ),
                _ => (IsolationType::ConflictIsolated, self.suggest_conflicts()),
            };

            issues.push(IsolatedCharacterIssue {
                character_id: character.id.clone(),
                character_name: character.name.clone(),
                isolation_type,
                suggested_connections,
            });
        }

        IssueList::new(issues)
    }

    pub fn find_overloaded_characters(&self) -> IssueList<OverloadedCharacterIssue> {
        let issues = self
            .network
            .characters()
            .iter()
            .filter_map(|character| {
                let relationships = self.network.relationships_of(&character.id).count();
                let conflicts = self.network.conflicts_of(&character.id).count();
                let load = relationships + conflicts * 2;
                (load > OVERLOAD_THRESHOLD).then(|| OverloadedCharacterIssue {
                    character_id: character.id.clone(),
                    character_name: character.name.clone(),
                    overload_type: OverloadType::CentralBottleneck,
                    current_load: load,
                    recommended_load: RECOMMENDED_LOAD,
                    suggested_distribution: vec![
                        "Hand some relationships to other characters".to_string(),
                        "Split large conflicts into smaller ones".to_string(),
                        "Introduce supporting characters".to_string(),
                    ],
                })
            })
            .collect();

        IssueList::new(issues)
    }

    fn suggest_connections(&self, character: &CharacterId) -> Vec<String> {
        self.network
            .characters()
            .iter()
            .filter(|other| &other.id != character)
            .take(3)
            .map(|other| format!("Connect with {}", other.name))
            .collect()
    }

    fn suggest_conflicts(&self) -> Vec<String> {
        self.network
            .conflicts()
            .iter()
            .take(2)
            .map(|conflict| format!("Involve in conflict: {}", conflict.name))
            .collect()
    }

    // =========================================================================
    // Conflicts and connections
    // =========================================================================

    pub fn find_abandoned_conflicts(&self) -> IssueList<AbandonedConflictIssue> {
        let issues = self
            .network
            .conflicts()
            .iter()
            .filter_map(|conflict| {
                let days_inactive = self.days_since_last_update(conflict);
                let issue_type = if days_inactive > STALE_AFTER_DAYS {
                    AbandonmentType::StuckInPhase
                } else if conflict.strength < WEAK_CONFLICT_STRENGTH {
                    AbandonmentType::WeakInvolvement
                } else {
                    return None;
                };
                Some(AbandonedConflictIssue {
                    conflict_id: conflict.id.to_string(),
                    conflict_name: conflict.name.clone(),
                    issue_type,
                    days_inactive,
                    suggested_actions: vec![
                        "Advance the conflict to its next phase".to_string(),
                        "Add a new turning point".to_string(),
                        "Raise the involvement of its characters".to_string(),
                        "Tie the conflict to other conflicts".to_string(),
                    ],
                })
            })
            .collect();

        IssueList::new(issues)
    }

    /// Whole days between the last timestamp and the reference time,
    /// rounded up.
    fn days_since_last_update(&self, conflict: &Conflict) -> i64 {
        let Some(last) = conflict.last_seen() else {
            return UNDATED_DAYS;
        };
        let millis = (self.reference_time - last).num_milliseconds().abs();
        const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
        (millis + DAY_MILLIS - 1) / DAY_MILLIS
    }

    pub fn find_weak_connections(&self) -> IssueList<WeakConnectionIssue> {
        let relationships = self
            .network
            .relationships()
            .iter()
            .filter(|r| r.strength < WEAK_CONNECTION_STRENGTH)
            .map(|r| WeakConnectionIssue {
                connection_type: ConnectionKind::Relationship,
                element_id: r.id.to_string(),
                weakness: "Relationship strength is low".to_string(),
                strength_score: r.strength,
                improvement_suggestions: vec![
                    "Add more scenes where the two characters interact".to_string(),
                    "Develop their shared history".to_string(),
                    "Create a conflict that binds them".to_string(),
                ],
            });

        let conflicts = self
            .network
            .conflicts()
            .iter()
            .filter(|k| k.strength < WEAK_CONNECTION_STRENGTH)
            .map(|k| WeakConnectionIssue {
                connection_type: ConnectionKind::ConflictInvolvement,
                element_id: k.id.to_string(),
                weakness: "Conflict involvement is weak".to_string(),
                strength_score: k.strength,
                improvement_suggestions: vec![
                    "Sharpen the conflict".to_string(),
                    "Add meaningful turning points".to_string(),
                    "Tie the conflict to the characters' core motivations".to_string(),
                ],
            });

        IssueList::new(relationships.chain(conflicts).collect())
    }

    pub fn find_redundancies(&self) -> IssueList<RedundancyIssue> {
        let mut issues = Vec::new();

        let relationships = self.network.relationships().as_slice();
        for (i, first) in relationships.iter().enumerate() {
            for second in &relationships[i + 1..] {
                if first.duplicates(second) {
                    issues.push(RedundancyIssue {
                        redundancy_type: RedundancyKind::DuplicateRelationships,
                        affected_elements: vec![first.id.to_string(), second.id.to_string()],
                        redundancy_score: 0.8,
                        consolidation_suggestion:
                            "Merge the duplicate relationships into one stronger relationship"
                                .to_string(),
                    });
                }
            }
        }

        for group in self.similar_conflict_groups() {
            issues.push(RedundancyIssue {
                redundancy_type: RedundancyKind::SimilarConflicts,
                affected_elements: group,
                redundancy_score: 0.7,
                consolidation_suggestion:
                    "Merge the similar conflicts into a single, richer conflict".to_string(),
            });
        }

        IssueList::new(issues)
    }

    /// Greedy grouping: each unprocessed conflict collects every later
    /// unprocessed conflict that resembles it.
    fn similar_conflict_groups(&self) -> Vec<Vec<String>> {
        let conflicts = self.network.conflicts().as_slice();
        let mut processed = HashSet::new();
        let mut groups = Vec::new();

        for conflict in conflicts {
            if !processed.insert(&conflict.id) {
                continue;
            }
            let mut group = vec![conflict.id.to_string()];
            for other in conflicts {
                if other.id != conflict.id
                    && !processed.contains(&other.id)
                    && conflict.resembles(other)
                {
                    processed.insert(&other.id);
                    group.push(other.id.to_string());
                }
            }
            if group.len() > 1 {
                groups.push(group);
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        Character, ConflictId, ConflictScope, ConflictSubject, Relationship, RelationshipId,
        RelationshipType,
    };
    use chrono::{Duration, TimeZone};

    fn id(s: &str) -> CharacterId {
        CharacterId::new(s)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn rel(key: &str, a: &str, b: &str, strength: u8) -> Relationship {
        Relationship::new(RelationshipId::new(key), id(a), id(b), RelationshipType::Alliance)
            .with_strength(strength)
    }

    fn network_with(characters: &[&str]) -> ConflictNetwork {
        let mut network = ConflictNetwork::new("n", "Test");
        for c in characters {
            network.add_character(Character::new(id(c), c.to_uppercase()));
        }
        network
    }

    #[test]
    fn test_empty_network_is_healthy() {
        let network = ConflictNetwork::new("e", "Empty");
        let report = NetworkDiagnostics::new(&network).run_all_diagnostics();
        assert_eq!(report.overall_health_score, 100);
        assert_eq!(report.criticality_level, CriticalityLevel::Healthy);
        assert_eq!(report.total_issues(), 0);
    }

    #[test]
    fn test_disconnected_components() {
        let mut network = network_with(&["a", "b", "c", "d"]);
        network.add_relationship(rel("ab", "a", "b", 7));
        network.add_relationship(rel("cd", "c", "d", 7));
        network.add_relationship(rel("dx", "d", "ghost", 7));

        let diagnostics = NetworkDiagnostics::new(&network);
        let components = diagnostics.connected_components();
        assert_eq!(components.len(), 2);
        assert!(components.iter().flatten().all(|c| c.as_str() != "ghost"));

        let issues = diagnostics.analyze_structural_issues();
        assert_eq!(issues[0].kind, StructuralIssueKind::DisconnectedComponents);
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].affected_elements.len(), 4);
    }

    #[test]
    fn test_high_degree_node_is_single_point_failure() {
        let mut network = network_with(&["hub", "a", "b", "c"]);
        for (key, other) in [("1", "a"), ("2", "b"), ("3", "c")] {
            network.add_relationship(rel(key, "hub", other, 6));
        }
        let issues = NetworkDiagnostics::new(&network).analyze_structural_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, StructuralIssueKind::SinglePointFailure);
        assert_eq!(issues[0].affected_elements, vec!["hub".to_string()]);
    }

    #[test]
    fn test_isolation_classification() {
        let mut network = network_with(&["lonely", "single", "social", "x", "y", "z"]);
        network.add_relationship(rel("1", "single", "x", 6));
        network.add_relationship(rel("2", "social", "y", 6));
        network.add_relationship(rel("3", "social", "z", 6));
        network.add_conflict(
            Conflict::new(ConflictId::new("k"), "Feud", vec![id("x"), id("y"), id("z")])
                .with_timestamp(now()),
        );

        let isolated = NetworkDiagnostics::new(&network).find_isolated_characters();
        let kinds: Vec<_> = isolated
            .items
            .iter()
            .map(|i| (i.character_id.as_str(), i.isolation_type))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("lonely", IsolationType::CompletelyIsolated),
                ("single", IsolationType::WeaklyConnected),
                ("social", IsolationType::ConflictIsolated),
            ]
        );
        assert_eq!(isolated.items[0].suggested_connections.len(), 3);
        assert_eq!(
            isolated.items[2].suggested_connections,
            vec!["Involve in conflict: Feud".to_string()]
        );
    }

    #[test]
    fn test_abandoned_conflicts() {
        let mut network = network_with(&["a", "b"]);
        network.add_conflict(
            Conflict::new(ConflictId::new("old"), "Old grudge", vec![id("a")])
                .with_strength(8)
                .with_timestamp(now() - Duration::days(45)),
        );
        network.add_conflict(
            Conflict::new(ConflictId::new("weak"), "Spat", vec![id("b")])
                .with_strength(2)
                .with_timestamp(now() - Duration::hours(5)),
        );
        network.add_conflict(Conflict::new(ConflictId::new("undated"), "Myth", vec![id("a")]));
        network.add_conflict(
            Conflict::new(ConflictId::new("fine"), "War", vec![id("a"), id("b")])
                .with_strength(7)
                .with_timestamp(now()),
        );

        let abandoned = NetworkDiagnostics::new(&network)
            .with_reference_time(now())
            .find_abandoned_conflicts();

        assert_eq!(abandoned.total, 3);
        assert_eq!(abandoned.items[0].issue_type, AbandonmentType::StuckInPhase);
        assert_eq!(abandoned.items[0].days_inactive, 45);
        assert_eq!(abandoned.items[1].issue_type, AbandonmentType::WeakInvolvement);
        assert_eq!(abandoned.items[1].days_inactive, 1);
        assert_eq!(abandoned.items[2].days_inactive, 365);
        assert_eq!(abandoned.items[2].suggested_actions.len(), 4);
    }

    #[test]
    fn test_overloaded_character() {
        let mut network = network_with(&["hero", "a", "b", "c"]);
        for (key, other) in [("1", "a"), ("2", "b"), ("3", "c")] {
            network.add_relationship(rel(key, "hero", other, 6));
        }
        for key in ["k1", "k2", "k3"] {
            network.add_conflict(Conflict::new(ConflictId::new(key), key, vec![id("hero")]));
        }

        let overloaded = NetworkDiagnostics::new(&network).find_overloaded_characters();
        assert_eq!(overloaded.total, 1);
        assert_eq!(overloaded.items[0].current_load, 9);
        assert_eq!(overloaded.items[0].recommended_load, 6);
    }

    #[test]
    fn test_weak_connections_and_redundancies() {
        let mut network = network_with(&["a", "b", "c"]);
        network.add_relationship(rel("r1", "a", "b", 2));
        network.add_relationship(rel("r2", "b", "a", 9));
        for key in ["k1", "k2", "k3"] {
            network.add_conflict(
                Conflict::new(ConflictId::new(key), key, vec![id("a"), id("c")])
                    .with_strength(3)
                    .with_subject(ConflictSubject::Value)
                    .with_scope(ConflictScope::Group),
            );
        }

        let diagnostics = NetworkDiagnostics::new(&network);
        let weak = diagnostics.find_weak_connections();
        assert_eq!(weak.total, 4);
        assert_eq!(weak.items[0].connection_type, ConnectionKind::Relationship);

        let redundancies = diagnostics.find_redundancies();
        assert_eq!(redundancies.total, 2);
        assert_eq!(
            redundancies.items[0].redundancy_type,
            RedundancyKind::DuplicateRelationships
        );
        assert_eq!(redundancies.items[1].affected_elements, vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn test_health_score_floor_and_bands() {
        assert_eq!(health_score(0, 0, 0, 0, 0, 0), 100);
        assert_eq!(health_score(1, 1, 1, 1, 1, 1), 43);
        assert_eq!(health_score(10, 0, 0, 0, 0, 0), 0);
        assert_eq!(CriticalityLevel::from_score(43), CriticalityLevel::MajorIssues);
        assert_eq!(CriticalityLevel::from_score(29), CriticalityLevel::Critical);
    }

    #[test]
    fn test_diagnostics_are_idempotent() {
        let mut network = network_with(&["a", "b"]);
        network.add_relationship(rel("r", "a", "b", 3));
        let diagnostics = NetworkDiagnostics::new(&network).with_reference_time(now());
        assert_eq!(diagnostics.run_all_diagnostics(), diagnostics.run_all_diagnostics());
    }
}
