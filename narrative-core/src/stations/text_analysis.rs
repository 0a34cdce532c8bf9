//! Station 1: characters, relationships and narrative style from raw text.

use super::{ask, excerpt, payload_status};
use crate::oracle::{object_list, string_list, text_field, Oracle, OracleRequest, NOT_AVAILABLE};
use crate::station::{StageMetadata, Station, StationError};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const CONTEXT_CHARS: usize = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalysisInput {
    pub full_text: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prose_file_path: Option<String>,
}

/// In-depth reading of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterAnalysis {
    pub personality_traits: String,
    pub motivations_goals: String,
    pub key_relationships_brief: String,
    pub narrative_function: String,
    pub potential_arc_observation: String,
}

impl CharacterAnalysis {
    fn from_payload(payload: &Value) -> Self {
        Self {
            personality_traits: text_field(payload, "personality_traits"),
            motivations_goals: text_field(payload, "motivations_goals"),
            key_relationships_brief: text_field(payload, "key_relationships_brief"),
            narrative_function: text_field(payload, "narrative_function"),
            potential_arc_observation: text_field(payload, "potential_arc_observation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRelationship {
    pub characters: Vec<String>,
    pub dynamic: String,
    pub narrative_importance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeStyle {
    pub overall_tone: String,
    pub pacing_analysis: String,
    pub language_style: String,
}

impl NarrativeStyle {
    fn from_payload(payload: &Value) -> Self {
        Self {
            overall_tone: text_field(payload, "overall_tone"),
            pacing_analysis: text_field(payload, "pacing_analysis"),
            language_style: text_field(payload, "language_style"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalysisOutput {
    /// Names in the order the model ranked them.
    pub major_characters: Vec<String>,
    pub character_analysis: BTreeMap<String, CharacterAnalysis>,
    pub key_relationships: Vec<KeyRelationship>,
    pub narrative_style: NarrativeStyle,
    pub metadata: StageMetadata,
}

pub struct TextAnalysisStation {
    oracle: Arc<dyn Oracle>,
}

impl TextAnalysisStation {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    fn request(&self, prompt: String, full_text: &str) -> OracleRequest {
        OracleRequest::new(prompt).with_context(excerpt(full_text, CONTEXT_CHARS))
    }

    async fn identify_major_characters(&self, full_text: &str) -> Result<Value, StationError> {
        let prompt = r#"Read the attached narrative and identify the characters who are most central to the plot and its development. Favour characters with active roles, clear motivations and frequent, consequential appearances.

Return between 3 and 7 characters.

Respond with ONLY a JSON object:
{
  "major_characters": ["Name 1", "Name 2"]
}"#;
        ask(self.oracle.as_ref(), self.request(prompt.to_string(), full_text)).await
    }

    async fn analyze_relationships(&self, full_text: &str) -> Result<Value, StationError> {
        let prompt = r#"Read the attached narrative and identify the key relationships between its characters. Focus on relationships that clearly affect the plot.

Respond with ONLY a JSON object:
{
  "key_relationships": [
    {
      "characters": ["Character 1", "Character 2"],
      "dynamic": "How the relationship works",
      "narrative_importance": "Why it matters to the story"
    }
  ]
}"#;
        ask(self.oracle.as_ref(), self.request(prompt.to_string(), full_text)).await
    }

    async fn analyze_narrative_style(&self, full_text: &str) -> Result<Value, StationError> {
        let prompt = r#"Analyze the narrative style of the attached text:
1. The overall tone (dramatic, comic, tragic, ...)
2. The pacing (fast, slow, varied, ...)
3. The language register (formal, colloquial, poetic, ...)

Respond with ONLY a JSON object:
{
  "overall_tone": "...",
  "pacing_analysis": "...",
  "language_style": "..."
}"#;
        ask(self.oracle.as_ref(), self.request(prompt.to_string(), full_text)).await
    }

    async fn analyze_character(&self, full_text: &str, name: &str) -> Result<Value, StationError> {
        let prompt = format!(
            r#"Using the attached narrative, write a thorough analysis of the character **{name}**.

Cover:
1. Prominent personality traits, positive and negative
2. Core motivations and goals, stated and hidden
3. A brief account of their most important relationships
4. Their main role or function in the story
5. Early observations on their potential arc

Respond with ONLY a JSON object:
{{
  "personality_traits": "...",
  "motivations_goals": "...",
  "key_relationships_brief": "...",
  "narrative_function": "...",
  "potential_arc_observation": "..."
}}"#
        );
        ask(self.oracle.as_ref(), self.request(prompt, full_text)).await
    }
}

fn major_characters(payload: &Value) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in string_list(payload, "major_characters") {
        let name = name.trim().to_string();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn key_relationships(payload: &Value) -> Vec<KeyRelationship> {
    object_list(payload, "key_relationships")
        .into_iter()
        .map(|rel| KeyRelationship {
            characters: string_list(rel, "characters"),
            dynamic: text_field(rel, "dynamic"),
            narrative_importance: text_field(rel, "narrative_importance"),
        })
        .collect()
}

#[async_trait]
impl Station for TextAnalysisStation {
    type Input = TextAnalysisInput;
    type Output = TextAnalysisOutput;

    fn number(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "Text Analysis"
    }

    async fn process(&self, input: &TextAnalysisInput) -> Result<TextAnalysisOutput, StationError> {
        let text = input.full_text.as_str();
        let (characters, relationships, style) = futures::try_join!(
            self.identify_major_characters(text),
            self.analyze_relationships(text),
            self.analyze_narrative_style(text),
        )?;

        let major_characters = major_characters(&characters);
        let analyses = try_join_all(
            major_characters
                .iter()
                .map(|name| self.analyze_character(text, name)),
        )
        .await?;

        let status = payload_status(
            [&characters, &relationships, &style]
                .into_iter()
                .chain(analyses.iter()),
        );

        let character_analysis = major_characters
            .iter()
            .cloned()
            .zip(analyses.iter().map(CharacterAnalysis::from_payload))
            .collect();

        Ok(TextAnalysisOutput {
            major_characters,
            character_analysis,
            key_relationships: key_relationships(&relationships),
            narrative_style: NarrativeStyle::from_payload(&style),
            metadata: StageMetadata::new(status),
        })
    }

    fn extract_required_data(&self, input: &TextAnalysisInput) -> Value {
        json!({
            "project_name": input.project_name,
            "text_length": input.full_text.chars().count(),
        })
    }

    fn error_fallback(&self) -> TextAnalysisOutput {
        TextAnalysisOutput {
            major_characters: Vec::new(),
            character_analysis: BTreeMap::new(),
            key_relationships: Vec::new(),
            narrative_style: NarrativeStyle {
                overall_tone: "Error".to_string(),
                pacing_analysis: "Error".to_string(),
                language_style: "Error".to_string(),
            },
            metadata: StageMetadata::failed(),
        }
    }

    fn validate_input(&self, input: &TextAnalysisInput) -> Result<(), String> {
        if input.full_text.trim().is_empty() {
            return Err("full_text is empty".to_string());
        }
        Ok(())
    }
}

impl TextAnalysisOutput {
    /// Analysis for `name`, if the model produced one.
    pub fn analysis_of(&self, name: &str) -> Option<&CharacterAnalysis> {
        self.character_analysis.get(name)
    }

    /// Whether any character field was left unfilled.
    pub fn has_gaps(&self) -> bool {
        self.character_analysis.values().any(|a| {
            [
                &a.personality_traits,
                &a.motivations_goals,
                &a.narrative_function,
                &a.potential_arc_observation,
            ]
            .iter()
            .any(|field| field.as_str() == NOT_AVAILABLE)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{StageStatus, StationRunner};
    use crate::testing::MockOracle;

    fn input(text: &str) -> TextAnalysisInput {
        TextAnalysisInput {
            full_text: text.to_string(),
            project_name: "Test".to_string(),
            prose_file_path: None,
        }
    }

    #[test]
    fn test_major_characters_are_trimmed_and_unique() {
        let payload = json!({"major_characters": [" King ", "Queen", "King", ""]});
        assert_eq!(major_characters(&payload), vec!["King", "Queen"]);
    }

    #[tokio::test]
    async fn test_process_collects_all_sections() {
        let oracle = MockOracle::new()
            .respond_to("most central", json!({"major_characters": ["Ana", "Ben"]}))
            .respond_to(
                "key relationships",
                json!({"key_relationships": [
                    {"characters": ["Ana", "Ben"], "dynamic": "Rivals"}
                ]}),
            )
            .respond_to("narrative style", json!({"overall_tone": "Tragic"}))
            .respond_to("**Ana**", json!({"personality_traits": "Proud"}))
            .respond_to("**Ben**", json!({"personality_traits": "Loyal"}));
        let oracle = Arc::new(oracle);
        let station = TextAnalysisStation::new(oracle.clone());

        let output = station.process(&input("Ana and Ben quarrel.")).await.unwrap();

        assert_eq!(output.major_characters, vec!["Ana", "Ben"]);
        assert_eq!(output.analysis_of("Ben").unwrap().personality_traits, "Loyal");
        assert_eq!(output.analysis_of("Ana").unwrap().motivations_goals, "N/A");
        assert!(output.has_gaps());
        assert_eq!(output.key_relationships[0].narrative_importance, "N/A");
        assert_eq!(output.narrative_style.overall_tone, "Tragic");
        assert_eq!(output.metadata.status, StageStatus::Success);
        assert_eq!(oracle.call_count(), 5);
    }

    #[tokio::test]
    async fn test_raw_payload_marks_partial() {
        let oracle = MockOracle::new()
            .respond_to("most central", json!({"raw": "I could not decide"}));
        let station = TextAnalysisStation::new(Arc::new(oracle));

        let output = station.process(&input("Text.")).await.unwrap();
        assert!(output.major_characters.is_empty());
        assert_eq!(output.metadata.status, StageStatus::Partial);
    }

    #[tokio::test]
    async fn test_empty_text_falls_back() {
        let runner = StationRunner::new(TextAnalysisStation::new(Arc::new(MockOracle::new())), "mock");
        let run = runner.execute(&input("   ")).await;

        assert!(run.metadata.error_occurred);
        assert_eq!(run.output.metadata.status, StageStatus::Failed);
        assert_eq!(run.output.narrative_style.overall_tone, "Error");
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back() {
        let oracle = MockOracle::new().fail_on("narrative style");
        let runner = StationRunner::new(TextAnalysisStation::new(Arc::new(oracle)), "mock");
        let run = runner.execute(&input("Some story.")).await;

        assert!(run.metadata.error_occurred);
        assert!(run.output.major_characters.is_empty());
    }
}
