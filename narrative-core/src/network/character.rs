//! Character entities.

use super::table::Keyed;
use super::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a character, `char_<n>` when built from text analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id assigned to the character at `index` (zero-based) in a roster.
    pub fn from_roster_index(index: usize) -> Self {
        Self(format!("char_{}", index + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text character profile distilled from the narrative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub personality_traits: String,
    pub motivations_goals: String,
    pub potential_arc: String,
}

/// A character in the conflict network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub description: String,
    pub profile: CharacterProfile,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            profile: CharacterProfile::default(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_profile(mut self, profile: CharacterProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl Keyed for Character {
    type Key = CharacterId;

    fn key(&self) -> &CharacterId {
        &self.id
    }
}
