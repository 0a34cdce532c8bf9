//! The conflict network aggregate.

use super::character::{Character, CharacterId};
use super::conflict::{Conflict, ConflictId};
use super::relationship::{Relationship, RelationshipId};
use super::snapshot::{NetworkSnapshot, NetworkState};
use super::table::Table;
use super::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owns every character, relationship and conflict extracted from a text,
/// plus the ordered history of snapshots.
///
/// Relationships and conflicts refer to characters by id only; lookups go
/// through the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictNetwork {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    state: NetworkState,
    #[serde(default)]
    snapshots: Vec<NetworkSnapshot>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ConflictNetwork {
    /// Create an empty network.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: NetworkState::new(),
            snapshots: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// An empty placeholder network, used when building fails.
    pub fn empty() -> Self {
        Self::new("empty", "Empty network")
    }

    // =========================================================================
    // Population
    // =========================================================================

    /// Add or replace a character.
    pub fn add_character(&mut self, character: Character) -> CharacterId {
        let id = character.id.clone();
        self.state.characters.insert(character);
        id
    }

    /// Add or replace a relationship.
    pub fn add_relationship(&mut self, relationship: Relationship) -> RelationshipId {
        let id = relationship.id.clone();
        self.state.relationships.insert(relationship);
        id
    }

    /// Add or replace a conflict.
    pub fn add_conflict(&mut self, conflict: Conflict) -> ConflictId {
        let id = conflict.id.clone();
        self.state.conflicts.insert(conflict);
        id
    }

    /// Capture the current state with the current time.
    pub fn take_snapshot(&mut self, description: impl Into<String>) -> &NetworkSnapshot {
        self.take_snapshot_at(Utc::now(), description)
    }

    /// Capture the current state with an explicit timestamp.
    pub fn take_snapshot_at(
        &mut self,
        at: DateTime<Utc>,
        description: impl Into<String>,
    ) -> &NetworkSnapshot {
        let snapshot = NetworkSnapshot::capture(&self.state, at, description);
        self.snapshots.push(snapshot);
        &self.snapshots[self.snapshots.len() - 1]
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    pub fn characters(&self) -> &Table<Character> {
        &self.state.characters
    }

    pub fn relationships(&self) -> &Table<Relationship> {
        &self.state.relationships
    }

    pub fn conflicts(&self) -> &Table<Conflict> {
        &self.state.conflicts
    }

    pub fn snapshots(&self) -> &[NetworkSnapshot] {
        &self.snapshots
    }

    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.state.characters.get(id)
    }

    /// Find a character by exact display name.
    pub fn find_character_by_name(&self, name: &str) -> Option<&Character> {
        self.state.characters.iter().find(|c| c.name == name)
    }

    pub fn relationships_of<'a>(
        &'a self,
        character: &'a CharacterId,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.state.relationships_of(character)
    }

    pub fn conflicts_of<'a>(
        &'a self,
        character: &'a CharacterId,
    ) -> impl Iterator<Item = &'a Conflict> + 'a {
        self.state.conflicts_of(character)
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl Default for ConflictNetwork {
    fn default() -> Self {
        Self::empty()
    }
}
