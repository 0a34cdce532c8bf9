//! Station 2: story statement, story map, genre and tone.

use super::text_analysis::TextAnalysisOutput;
use super::{ask, decode_or_default, excerpt, payload_status};
use crate::oracle::{string_list, text_or, Oracle, OracleRequest};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const STATEMENT_CONTEXT_CHARS: usize = 25_000;
const GENRE_CONTEXT_CHARS: usize = 20_000;
const MATRIX_CONTEXT_CHARS: usize = 15_000;

const STATEMENT_FALLBACK: &str = "Story statement could not be generated";
const PITCH_FALLBACK: &str = "Elevator pitch could not be generated";
const GENRE_FALLBACK: &str = "Drama-Thriller";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptualInput {
    pub station1: TextAnalysisOutput,
    pub full_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalEvent {
    pub event: String,
    pub scene_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeaningLayer {
    pub event_ref: String,
    pub symbolic_layer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalAxis {
    pub past_influence: String,
    pub present_choices: String,
    pub future_expectations: String,
    pub hero_arc_connection: String,
}

/// Events, their symbolic weight, and how time shapes the hero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryMap {
    pub horizontal_events_axis: Vec<HorizontalEvent>,
    pub vertical_meaning_axis: Vec<MeaningLayer>,
    pub temporal_development_axis: TemporalAxis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenreContribution {
    pub conflict_contribution: String,
    pub pacing_contribution: String,
    pub visual_composition_contribution: String,
    pub sound_music_contribution: String,
    pub characters_contribution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneStage {
    pub visual_atmosphere_described: String,
    pub written_pacing: String,
    pub dialogue_structure: String,
    pub sound_indications_described: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualReference {
    pub work: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtisticReferences {
    pub visual_references: Vec<VisualReference>,
    pub musical_mood: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptualOutput {
    pub story_statement: String,
    pub story_map: StoryMap,
    pub elevator_pitch: String,
    pub hybrid_genre: String,
    /// Keyed by component genre.
    pub genre_contribution_matrix: BTreeMap<String, GenreContribution>,
    /// Keyed by story stage.
    pub dynamic_tone: BTreeMap<String, ToneStage>,
    pub artistic_references: ArtisticReferences,
    pub metadata: StageMetadata,
}

pub struct ConceptualStation {
    oracle: Arc<dyn Oracle>,
}

impl ConceptualStation {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    async fn story_statements(&self, context: &str, full_text: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"As an expert screenwriting assistant, and based on the character summary and the attached full text, propose **three (3)** distinct alternatives for the "Story Statement".

Each statement must be **four sentences** covering:
1. The central inciting event
2. The intertwined conflicts or crossing motivations
3. The distinctive, unified story world
4. The overarching theme or philosophical question

## Summary
{context}

Respond with ONLY a JSON object:
{{
  "story_statement_alternatives": ["First statement...", "Second statement...", "Third statement..."]
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, STATEMENT_CONTEXT_CHARS))
            .with_temperature(0.8);
        ask(self.oracle.as_ref(), request).await
    }

    async fn story_map(&self, context: &str, full_text: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"Build a three-axis story map for the narrative.

## Summary
{context}

Respond with ONLY a JSON object:
{{
  "horizontal_events_axis": [{{"event": "Short event", "scene_ref": "Scene number"}}],
  "vertical_meaning_axis": [{{"event_ref": "Event", "symbolic_layer": "Symbolic layer"}}],
  "temporal_development_axis": {{
    "past_influence": "...",
    "present_choices": "...",
    "future_expectations": "...",
    "hero_arc_connection": "..."
  }}
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, STATEMENT_CONTEXT_CHARS))
            .with_temperature(0.7);
        ask(self.oracle.as_ref(), request).await
    }

    async fn hybrid_genres(&self, context: &str, full_text: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"Based on the summary and the full text, propose **between 3 and 5** precise alternatives for the story's hybrid genre.

## Summary
{context}

Respond with ONLY a JSON object:
{{
  "hybrid_genre_alternatives": ["First hybrid genre with explanation...", "Second..."]
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, GENRE_CONTEXT_CHARS))
            .with_temperature(0.8);
        ask(self.oracle.as_ref(), request).await
    }

    async fn elevator_pitch(&self, statement: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"Based on this story statement: "{statement}"

Write a compelling elevator pitch of no more than 40 words.

Respond with ONLY a JSON object:
{{
  "elevator_pitch": "..."
}}"#
        );
        ask(self.oracle.as_ref(), OracleRequest::new(prompt).with_temperature(0.9)).await
    }

    async fn genre_matrix(&self, genre: &str, full_text: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"The adopted hybrid genre is: "{genre}"

Build a genre contribution matrix showing how each component genre enriches the story.

Respond with ONLY a JSON object:
{{
  "genre_contribution_matrix": {{
    "Genre name": {{
      "conflict_contribution": "...",
      "pacing_contribution": "...",
      "visual_composition_contribution": "...",
      "sound_music_contribution": "...",
      "characters_contribution": "..."
    }}
  }}
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, MATRIX_CONTEXT_CHARS))
            .with_temperature(0.7);
        ask(self.oracle.as_ref(), request).await
    }

    async fn dynamic_tone(&self, genre: &str, full_text: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"The adopted hybrid genre is: "{genre}"

Describe how the tone of the story shifts across its main stages (for example opening, confrontation, resolution).

Respond with ONLY a JSON object:
{{
  "dynamic_tone": {{
    "Stage name": {{
      "visual_atmosphere_described": "...",
      "written_pacing": "...",
      "dialogue_structure": "...",
      "sound_indications_described": "..."
    }}
  }}
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, MATRIX_CONTEXT_CHARS))
            .with_temperature(0.7);
        ask(self.oracle.as_ref(), request).await
    }

    async fn artistic_references(&self, genre: &str, full_text: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"The adopted hybrid genre is: "{genre}"

Suggest existing works whose visual style suits this story, and describe the musical mood that fits it.

Respond with ONLY a JSON object:
{{
  "visual_references": [{{"work": "Title", "reason": "Why it fits"}}],
  "musical_mood": "..."
}}"#
        );
        let request = OracleRequest::new(prompt)
            .with_context(excerpt(full_text, MATRIX_CONTEXT_CHARS))
            .with_temperature(0.8);
        ask(self.oracle.as_ref(), request).await
    }
}

/// Condensed station 1 output handed to every prompt.
fn station1_context(station1: &TextAnalysisOutput) -> String {
    let profiles: Vec<Value> = station1
        .character_analysis
        .iter()
        .map(|(name, analysis)| {
            json!({
                "name": name,
                "traits": analysis.personality_traits,
                "motivations": analysis.motivations_goals,
            })
        })
        .collect();
    let context = json!({
        "major_characters": station1.major_characters,
        "character_profiles": profiles,
        "key_relationships": station1.key_relationships,
        "narrative_style": station1.narrative_style,
    });
    serde_json::to_string_pretty(&context).unwrap_or_else(|_| context.to_string())
}

fn first_or(payload: &Value, key: &str, default: &str) -> String {
    string_list(payload, key)
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn keyed<T: serde::de::DeserializeOwned + Default>(payload: &Value, key: &str) -> BTreeMap<String, T> {
    payload.get(key).map(decode_or_default).unwrap_or_default()
}

#[async_trait]
impl Station for ConceptualStation {
    type Input = ConceptualInput;
    type Output = ConceptualOutput;

    fn number(&self) -> u8 {
        2
    }

    fn name(&self) -> &'static str {
        "Conceptual Analysis"
    }

    async fn process(&self, input: &ConceptualInput) -> Result<ConceptualOutput, StationError> {
        let context = station1_context(&input.station1);
        let text = input.full_text.as_str();

        let (statements, map, genres) = futures::try_join!(
            self.story_statements(&context, text),
            self.story_map(&context, text),
            self.hybrid_genres(&context, text),
        )?;

        let story_statement = first_or(&statements, "story_statement_alternatives", STATEMENT_FALLBACK);
        let hybrid_genre = first_or(&genres, "hybrid_genre_alternatives", GENRE_FALLBACK);

        let (pitch, matrix, tone, references) = futures::try_join!(
            self.elevator_pitch(&story_statement),
            self.genre_matrix(&hybrid_genre, text),
            self.dynamic_tone(&hybrid_genre, text),
            self.artistic_references(&hybrid_genre, text),
        )?;

        let status = payload_status([&statements, &map, &genres, &pitch, &matrix, &tone, &references]);

        Ok(ConceptualOutput {
            story_statement,
            story_map: decode_or_default(&map),
            elevator_pitch: text_or(&pitch, "elevator_pitch", PITCH_FALLBACK),
            hybrid_genre,
            genre_contribution_matrix: keyed(&matrix, "genre_contribution_matrix"),
            dynamic_tone: keyed(&tone, "dynamic_tone"),
            artistic_references: decode_or_default(&references),
            metadata: StageMetadata::new(status),
        })
    }

    fn extract_required_data(&self, input: &ConceptualInput) -> Value {
        json!({
            "characters_count": input.station1.major_characters.len(),
            "text_length": input.full_text.chars().count(),
        })
    }

    fn error_fallback(&self) -> ConceptualOutput {
        ConceptualOutput {
            story_statement: "Error".to_string(),
            story_map: StoryMap::default(),
            elevator_pitch: "Error".to_string(),
            hybrid_genre: "Error".to_string(),
            genre_contribution_matrix: BTreeMap::new(),
            dynamic_tone: BTreeMap::new(),
            artistic_references: ArtisticReferences::default(),
            metadata: StageMetadata::failed(),
        }
    }
}
