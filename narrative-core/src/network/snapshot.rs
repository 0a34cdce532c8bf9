//! Network state and point-in-time snapshots.

use super::character::{Character, CharacterId};
use super::conflict::Conflict;
use super::relationship::Relationship;
use super::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three entity collections of a network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkState {
    #[serde(default)]
    pub characters: Table<Character>,
    #[serde(default)]
    pub relationships: Table<Relationship>,
    #[serde(default)]
    pub conflicts: Table<Conflict>,
}

impl NetworkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationships with `character` at either end.
    pub fn relationships_of<'a>(
        &'a self,
        character: &'a CharacterId,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.involves(character))
    }

    /// Conflicts that list `character` as a participant.
    pub fn conflicts_of<'a>(
        &'a self,
        character: &'a CharacterId,
    ) -> impl Iterator<Item = &'a Conflict> + 'a {
        self.conflicts.iter().filter(move |k| k.involves(character))
    }

    /// Total number of characters, relationships and conflicts.
    pub fn element_count(&self) -> usize {
        self.characters.len() + self.relationships.len() + self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }

    /// Relationships over possible character pairs; 0 with fewer than two
    /// characters.
    pub fn relationship_density(&self) -> f64 {
        let n = self.characters.len();
        if n < 2 {
            return 0.0;
        }
        let possible = (n * (n - 1)) as f64 / 2.0;
        self.relationships.len() as f64 / possible
    }
}

/// An immutable copy of the network taken at a moment in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub state: NetworkState,
}

impl NetworkSnapshot {
    pub fn capture(state: &NetworkState, at: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            timestamp: at,
            description: description.into(),
            state: state.clone(),
        }
    }

    pub fn contains_character(&self, character: &CharacterId) -> bool {
        self.state.characters.contains_key(character)
    }
}
