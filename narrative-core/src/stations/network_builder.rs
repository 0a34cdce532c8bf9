//! Station 3: build the conflict network.
//!
//! Characters come straight from station 1. Relationships and then conflicts
//! are inferred by the oracle; the conflict prompt sees the first few
//! inferred relationships, so the two calls run one after the other.

use super::conceptual::ConceptualOutput;
use super::text_analysis::TextAnalysisOutput;
use super::{ask, excerpt, payload_status};
use crate::network::{
    Character, CharacterId, CharacterProfile, Conflict, ConflictId, ConflictNetwork,
    ConflictPhase, ConflictScope, ConflictSubject, Label, Relationship, RelationshipDirection,
    RelationshipId, RelationshipNature, RelationshipType,
};
use crate::oracle::{
    object_list, strength_field, string_list, text_or, Oracle, OracleRequest, NOT_AVAILABLE,
};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const CONTEXT_CHARS: usize = 25_000;
const NAME_PREFIX_CHARS: usize = 50;
const RELATIONSHIPS_IN_CONFLICT_PROMPT: usize = 5;
const INFERENCE_SOURCE: &str = "ai_inference_engine";

/// Description of the first snapshot taken after population.
pub const INITIAL_SNAPSHOT: &str = "Initial network state after AI inference";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkBuilderInput {
    pub station1: TextAnalysisOutput,
    pub station2: ConceptualOutput,
    pub full_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub characters_count: usize,
    pub relationships_count: usize,
    pub conflicts_count: usize,
    pub snapshots_count: usize,
}

impl NetworkSummary {
    pub fn of(network: &ConflictNetwork) -> Self {
        Self {
            characters_count: network.characters().len(),
            relationships_count: network.relationships().len(),
            conflicts_count: network.conflicts().len(),
            snapshots_count: network.snapshots().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkBuilderOutput {
    pub conflict_network: ConflictNetwork,
    pub network_summary: NetworkSummary,
    pub build_time_ms: u64,
    pub metadata: StageMetadata,
}

pub struct NetworkBuilderStation {
    oracle: Arc<dyn Oracle>,
}

impl NetworkBuilderStation {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    async fn infer_relationships(
        &self,
        characters: &[Character],
        full_text: &str,
    ) -> Result<Value, StationError> {
        let roster = characters
            .iter()
            .map(|c| format!("'{}' (ID: {})", c.name, c.id))
            .collect::<Vec<_>>()
            .join(", ");
        let types = labels(RelationshipType::ALL);
        let natures = labels(RelationshipNature::ALL);
        let directions = labels(RelationshipDirection::ALL);

        let prompt = format!(
            r#"Based on the attached narrative, infer the main relationships between the characters.

## Available characters
{roster}

For each main relationship give:
1. The two characters (by name or ID)
2. The relationship type ({types})
3. The relationship nature ({natures})
4. A short description and rationale
5. The strength (1-10)
6. The direction ({directions})
7. The triggers that drive it

Respond with ONLY a JSON object:
{{
  "inferred_relationships": [
    {{
      "character1_name_or_id": "...",
      "character2_name_or_id": "...",
      "relationship_type": "...",
      "relationship_nature": "...",
      "description_rationale": "...",
      "strength": 7,
      "direction": "...",
      "triggers": ["Trigger 1", "Trigger 2"]
    }}
  ]
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, CONTEXT_CHARS))
            .with_temperature(0.7);
        ask(self.oracle.as_ref(), request).await
    }

    async fn infer_conflicts(
        &self,
        network: &ConflictNetwork,
        full_text: &str,
    ) -> Result<Value, StationError> {
        let characters: Vec<Value> = network
            .characters()
            .iter()
            .map(|c| json!({"id": c.id, "name": c.name, "description": c.description}))
            .collect();
        let relationships: Vec<Value> = network
            .relationships()
            .iter()
            .take(RELATIONSHIPS_IN_CONFLICT_PROMPT)
            .map(|r| {
                let name_of = |id: &CharacterId| network.character(id).map(|c| c.name.clone());
                json!({
                    "characters": [name_of(&r.source), name_of(&r.target)],
                    "type": r.relationship_type.as_str(),
                    "nature": r.nature.as_str(),
                })
            })
            .collect();
        let characters = pretty(&Value::Array(characters));
        let relationships = pretty(&Value::Array(relationships));
        let subjects = labels(ConflictSubject::ALL);
        let scopes = labels(ConflictScope::ALL);
        let phases = labels(ConflictPhase::ALL);

        let prompt = format!(
            r#"Based on the attached narrative, infer the main conflicts of the story (3-5 conflicts).

## Characters
{characters}

## Relationships
{relationships}

For each conflict give:
1. The conflict name
2. The involved characters (names or IDs)
3. The subject ({subjects})
4. The scope ({scopes})
5. The initial phase ({phases})
6. A description with evidence
7. The strength (1-10)
8. The pivot points

Respond with ONLY a JSON object:
{{
  "inferred_conflicts": [
    {{
      "conflict_name": "...",
      "involved_character_names_or_ids": ["...", "..."],
      "subject": "...",
      "scope": "...",
      "initial_phase": "...",
      "description_rationale": "...",
      "strength": 8,
      "related_relationships": [],
      "pivot_points": ["Pivot 1", "Pivot 2"]
    }}
  ]
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, CONTEXT_CHARS))
            .with_temperature(0.7);
        ask(self.oracle.as_ref(), request).await
    }
}

fn labels<T: Label>(all: &[T]) -> String {
    all.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn filled(text: &str) -> String {
    if text == NOT_AVAILABLE {
        String::new()
    } else {
        text.to_string()
    }
}

/// One character per major character, `char_<n>` in roster order.
pub fn characters_from_analysis(station1: &TextAnalysisOutput) -> Vec<Character> {
    let analysed_at = station1.metadata.generated_at.to_rfc3339();
    station1
        .major_characters
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let analysis = station1.character_analysis.get(name);
            let description = analysis
                .map(|a| filled(&a.narrative_function))
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "Major character".to_string());
            let profile = analysis
                .map(|a| CharacterProfile {
                    personality_traits: filled(&a.personality_traits),
                    motivations_goals: filled(&a.motivations_goals),
                    potential_arc: filled(&a.potential_arc_observation),
                })
                .unwrap_or_default();

            Character::new(CharacterId::from_roster_index(index), name.clone())
                .with_description(description)
                .with_profile(profile)
                .with_metadata("source", json!("station1_analysis"))
                .with_metadata("analysis_timestamp", json!(analysed_at))
        })
        .collect()
}

/// Maps a name or id the model produced onto a character id.
struct Resolver {
    by_name: HashMap<String, CharacterId>,
}

impl Resolver {
    fn new(characters: &[Character]) -> Self {
        Self {
            by_name: characters
                .iter()
                .map(|c| (c.name.clone(), c.id.clone()))
                .collect(),
        }
    }

    /// Exact name match, else the reference itself taken as an id.
    fn resolve(&self, reference: &str) -> Option<CharacterId> {
        if reference.is_empty() {
            return None;
        }
        Some(
            self.by_name
                .get(reference)
                .cloned()
                .unwrap_or_else(|| CharacterId::new(reference)),
        )
    }
}

fn inference_metadata(at: DateTime<Utc>) -> crate::network::Metadata {
    let mut metadata = crate::network::Metadata::new();
    metadata.insert("source".to_string(), json!(INFERENCE_SOURCE));
    metadata.insert("inference_timestamp".to_string(), json!(at.to_rfc3339()));
    metadata
}

/// Relationships from an `inferred_relationships` payload. Self-loops and
/// unresolvable ends are dropped.
pub fn relationships_from_payload(
    payload: &Value,
    characters: &[Character],
    at: DateTime<Utc>,
) -> Vec<Relationship> {
    let resolver = Resolver::new(characters);
    let mut relationships = Vec::new();

    let items = object_list(payload, "inferred_relationships");
    for (index, item) in items.into_iter().enumerate() {
        let source = resolver.resolve(&text_or(item, "character1_name_or_id", ""));
        let target = resolver.resolve(&text_or(item, "character2_name_or_id", ""));
        let (Some(source), Some(target)) = (source, target) else {
            debug!("Dropping relationship with a missing end");
            continue;
        };
        if source == target {
            debug!(character = %source, "Dropping self-relationship");
            continue;
        }

        let id = RelationshipId::synthesize(&source, &target, at, index);
        let relationship_type = RelationshipType::parse(&text_or(item, "relationship_type", ""));
        let mut relationship = Relationship::new(id, source, target, relationship_type)
            .with_nature(RelationshipNature::parse(&text_or(item, "relationship_nature", "")))
            .with_direction(RelationshipDirection::parse(&text_or(item, "direction", "")))
            .with_strength(strength_field(item, "strength", 5))
            .with_description(text_or(item, "description_rationale", ""))
            .with_triggers(string_list(item, "triggers"));
        relationship.metadata = inference_metadata(at);
        relationships.push(relationship);
    }
    relationships
}

/// Conflicts from an `inferred_conflicts` payload. Records with no
/// resolvable participant are dropped.
pub fn conflicts_from_payload(
    payload: &Value,
    characters: &[Character],
    at: DateTime<Utc>,
) -> Vec<Conflict> {
    let resolver = Resolver::new(characters);
    let mut conflicts = Vec::new();

    for item in object_list(payload, "inferred_conflicts") {
        let involved: Vec<CharacterId> = string_list(item, "involved_character_names_or_ids")
            .iter()
            .filter_map(|reference| resolver.resolve(reference))
            .collect();
        if involved.is_empty() {
            debug!("Dropping conflict without participants");
            continue;
        }

        let related = string_list(item, "related_relationships")
            .into_iter()
            .map(RelationshipId::new)
            .collect();
        let mut conflict = Conflict::new(
            ConflictId::generate(at),
            text_or(item, "conflict_name", "Unnamed Conflict"),
            involved,
        )
        .with_description(text_or(item, "description_rationale", ""))
        .with_subject(ConflictSubject::parse(&text_or(item, "subject", "")))
        .with_scope(ConflictScope::parse(&text_or(item, "scope", "")))
        .with_phase(ConflictPhase::parse(&text_or(item, "initial_phase", "")))
        .with_strength(strength_field(item, "strength", 5))
        .with_related_relationships(related)
        .with_pivot_points(string_list(item, "pivot_points"))
        .with_timestamp(at);
        conflict.metadata = inference_metadata(at);
        conflicts.push(conflict);
    }
    conflicts
}

fn network_name(story_statement: &str) -> String {
    let prefix: String = story_statement.chars().take(NAME_PREFIX_CHARS).collect();
    format!("{prefix}...")
}

#[async_trait]
impl Station for NetworkBuilderStation {
    type Input = NetworkBuilderInput;
    type Output = NetworkBuilderOutput;

    fn number(&self) -> u8 {
        3
    }

    fn name(&self) -> &'static str {
        "Network Builder"
    }

    async fn process(&self, input: &NetworkBuilderInput) -> Result<NetworkBuilderOutput, StationError> {
        let started = Instant::now();
        let mut network = ConflictNetwork::new(
            format!("network_{}", Utc::now().timestamp_millis()),
            network_name(&input.station2.story_statement),
        );

        let characters = characters_from_analysis(&input.station1);
        for character in characters.iter().cloned() {
            network.add_character(character);
        }

        let relationship_payload = self.infer_relationships(&characters, &input.full_text).await?;
        for relationship in relationships_from_payload(&relationship_payload, &characters, Utc::now()) {
            network.add_relationship(relationship);
        }

        let conflict_payload = self.infer_conflicts(&network, &input.full_text).await?;
        for conflict in conflicts_from_payload(&conflict_payload, &characters, Utc::now()) {
            network.add_conflict(conflict);
        }

        network.take_snapshot(INITIAL_SNAPSHOT);

        let network_summary = NetworkSummary::of(&network);
        info!(
            characters = network_summary.characters_count,
            relationships = network_summary.relationships_count,
            conflicts = network_summary.conflicts_count,
            "Conflict network built"
        );

        Ok(NetworkBuilderOutput {
            conflict_network: network,
            network_summary,
            build_time_ms: started.elapsed().as_millis() as u64,
            metadata: StageMetadata::new(payload_status([&relationship_payload, &conflict_payload])),
        })
    }

    fn extract_required_data(&self, input: &NetworkBuilderInput) -> Value {
        json!({
            "station1_characters": input.station1.major_characters.len(),
            "story_statement_length": input.station2.story_statement.chars().count(),
            "text_length": input.full_text.chars().count(),
        })
    }

    fn error_fallback(&self) -> NetworkBuilderOutput {
        NetworkBuilderOutput {
            conflict_network: ConflictNetwork::empty(),
            network_summary: NetworkSummary::default(),
            build_time_ms: 0,
            metadata: StageMetadata::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{StageStatus, StationRunner};
    use crate::testing::{sample_conceptual, sample_text_analysis, MockOracle};

    fn input() -> NetworkBuilderInput {
        NetworkBuilderInput {
            station1: sample_text_analysis(),
            station2: sample_conceptual(),
            full_text: "Ana, Ben and Cleo fight over the crown.".to_string(),
        }
    }

    fn roster() -> Vec<Character> {
        characters_from_analysis(&sample_text_analysis())
    }

    #[test]
    fn test_characters_follow_roster_order() {
        let characters = roster();
        let ids: Vec<&str> = characters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["char_1", "char_2", "char_3"]);
        assert_eq!(characters[0].name, "Ana");
        assert_eq!(characters[0].metadata["source"], json!("station1_analysis"));
    }

    #[test]
    fn test_missing_analysis_uses_placeholder() {
        let mut station1 = sample_text_analysis();
        station1.major_characters.push("Dara".to_string());
        let characters = characters_from_analysis(&station1);
        let dara = characters.last().unwrap();
        assert_eq!(dara.description, "Major character");
        assert_eq!(dara.profile, CharacterProfile::default());
    }

    #[test]
    fn test_relationship_resolution_and_filtering() {
        let payload = json!({"inferred_relationships": [
            {"character1_name_or_id": "Ana", "character2_name_or_id": "Ben",
             "relationship_type": "love", "relationship_nature": "Positive",
             "direction": "directed", "strength": "12", "triggers": ["A letter"]},
            {"character1_name_or_id": "Ana", "character2_name_or_id": "char_1"},
            {"character1_name_or_id": "", "character2_name_or_id": "Ben"},
            {"character1_name_or_id": "Ben", "character2_name_or_id": "Stranger",
             "relationship_type": "un-known", "strength": "strong"}
        ]});
        let at = Utc::now();
        let relationships = relationships_from_payload(&payload, &roster(), at);

        assert_eq!(relationships.len(), 2);
        let first = &relationships[0];
        assert_eq!(first.source.as_str(), "char_1");
        assert_eq!(first.target.as_str(), "char_2");
        assert_eq!(first.relationship_type, RelationshipType::Love);
        assert_eq!(first.nature, RelationshipNature::Positive);
        assert_eq!(first.direction, RelationshipDirection::Directed);
        assert_eq!(first.strength, 10);
        assert_eq!(first.triggers, vec!["A letter"]);
        assert_eq!(
            first.id.as_str(),
            format!("rel_char_1_char_2_{}_0", at.timestamp_millis())
        );

        let dangling = &relationships[1];
        assert_eq!(dangling.target.as_str(), "Stranger");
        assert_eq!(dangling.relationship_type, RelationshipType::Other);
        assert_eq!(dangling.nature, RelationshipNature::Neutral);
        assert_eq!(dangling.direction, RelationshipDirection::Bidirectional);
        assert_eq!(dangling.strength, 5);
    }

    #[test]
    fn test_parallel_relationships_keep_distinct_ids() {
        let payload = json!({"inferred_relationships": [
            {"character1_name_or_id": "Ana", "character2_name_or_id": "Ben",
             "relationship_type": "LOVE"},
            {"character1_name_or_id": "Ana", "character2_name_or_id": "Ben",
             "relationship_type": "RIVALRY"},
            {"character1_name_or_id": "Ana", "character2_name_or_id": "Ben",
             "relationship_type": "RIVALRY"}
        ]});
        let at = Utc::now();
        let relationships = relationships_from_payload(&payload, &roster(), at);
        assert_eq!(relationships.len(), 3);

        let ids: std::collections::HashSet<_> = relationships.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 3);

        let mut network = ConflictNetwork::new("network_test", "Parallel edges");
        for character in roster() {
            network.add_character(character);
        }
        for relationship in relationships {
            network.add_relationship(relationship);
        }
        assert_eq!(network.relationships().len(), 3);

        let redundancies = crate::analysis::NetworkDiagnostics::new(&network).find_redundancies();
        assert_eq!(redundancies.total, 1);
    }

    #[test]
    fn test_conflict_parsing_defaults() {
        let payload = json!({"inferred_conflicts": [
            {"conflict_name": "Succession", "involved_character_names_or_ids": ["Ana", "Cleo"],
             "subject": "power", "scope": "group", "initial_phase": "DE-ESCALATING",
             "strength": 6, "pivot_points": ["The will"]},
            {"involved_character_names_or_ids": []},
            {"involved_character_names_or_ids": ["Ben"], "subject": "???"}
        ]});
        let at = Utc::now();
        let conflicts = conflicts_from_payload(&payload, &roster(), at);

        assert_eq!(conflicts.len(), 2);
        let succession = &conflicts[0];
        assert_eq!(succession.involved_characters[1].as_str(), "char_3");
        assert_eq!(succession.subject, ConflictSubject::Power);
        assert_eq!(succession.scope, ConflictScope::Group);
        assert_eq!(succession.phase, ConflictPhase::Deescalating);
        assert_eq!(succession.timestamps, vec![at]);
        assert!(succession.id.as_str().starts_with("conflict_"));

        let unnamed = &conflicts[1];
        assert_eq!(unnamed.name, "Unnamed Conflict");
        assert_eq!(unnamed.subject, ConflictSubject::Other);
        assert_eq!(unnamed.scope, ConflictScope::Personal);
        assert_eq!(unnamed.phase, ConflictPhase::Emerging);
    }

    #[test]
    fn test_network_name_truncates() {
        let long = "x".repeat(80);
        assert_eq!(network_name(&long).chars().count(), NAME_PREFIX_CHARS + 3);
        assert_eq!(network_name("Short"), "Short...");
    }

    #[tokio::test]
    async fn test_process_builds_network_with_snapshot() {
        let oracle = Arc::new(
            MockOracle::new()
                .respond_to(
                    "inferred_relationships",
                    json!({"inferred_relationships": [
                        {"character1_name_or_id": "Ana", "character2_name_or_id": "Ben",
                         "relationship_type": "RIVALRY", "strength": 8}
                    ]}),
                )
                .respond_to(
                    "inferred_conflicts",
                    json!({"inferred_conflicts": [
                        {"conflict_name": "Crown", "involved_character_names_or_ids": ["Ana", "Ben"]}
                    ]}),
                ),
        );
        let station = NetworkBuilderStation::new(oracle.clone());
        let output = station.process(&input()).await.unwrap();

        let summary = output.network_summary;
        assert_eq!(summary.characters_count, 3);
        assert_eq!(summary.relationships_count, 1);
        assert_eq!(summary.conflicts_count, 1);
        assert_eq!(summary.snapshots_count, 1);
        assert_eq!(output.conflict_network.snapshots()[0].description, INITIAL_SNAPSHOT);
        assert!(output.conflict_network.id.starts_with("network_"));

        let prompts = oracle.prompts();
        assert!(prompts[1].contains("RIVALRY"));
    }

    #[tokio::test]
    async fn test_oracle_failure_yields_empty_network() {
        let oracle = MockOracle::new().fail_on("inferred_conflicts");
        let runner = StationRunner::new(NetworkBuilderStation::new(Arc::new(oracle)), "mock");
        let run = runner.execute(&input()).await;

        assert!(run.metadata.error_occurred);
        assert!(run.output.conflict_network.is_empty());
        assert_eq!(run.output.metadata.status, StageStatus::Failed);
    }
}
