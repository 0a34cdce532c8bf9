//! Relationship edges between characters.

use super::character::CharacterId;
use super::label::Label;
use super::table::Keyed;
use super::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a relationship, `rel_<source>_<target>_<millis>_<index>` when
/// inferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(String);

impl RelationshipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesize the id for the `index`-th edge of a batch created at `at`.
    ///
    /// Every edge in one batch shares `at`, so the index keeps parallel
    /// edges between the same pair apart.
    pub fn synthesize(
        source: &CharacterId,
        target: &CharacterId,
        at: DateTime<Utc>,
        index: usize,
    ) -> Self {
        Self(format!("rel_{source}_{target}_{}_{index}", at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of bond a relationship is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Love,
    Rivalry,
    Alliance,
    Family,
    Mentorship,
    Enmity,
    #[default]
    Other,
}

impl Label for RelationshipType {
    const ALL: &'static [Self] = &[
        Self::Love,
        Self::Rivalry,
        Self::Alliance,
        Self::Family,
        Self::Mentorship,
        Self::Enmity,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Love => "LOVE",
            Self::Rivalry => "RIVALRY",
            Self::Alliance => "ALLIANCE",
            Self::Family => "FAMILY",
            Self::Mentorship => "MENTORSHIP",
            Self::Enmity => "ENMITY",
            Self::Other => "OTHER",
        }
    }
}

/// Emotional valence of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipNature {
    Positive,
    Negative,
    #[default]
    Neutral,
    Ambivalent,
    Other,
}

impl Label for RelationshipNature {
    const ALL: &'static [Self] = &[
        Self::Positive,
        Self::Negative,
        Self::Neutral,
        Self::Ambivalent,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
            Self::Neutral => "NEUTRAL",
            Self::Ambivalent => "AMBIVALENT",
            Self::Other => "OTHER",
        }
    }
}

/// Whether a relationship runs one way or both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipDirection {
    Directed,
    #[default]
    Bidirectional,
}

impl Label for RelationshipDirection {
    const ALL: &'static [Self] = &[Self::Directed, Self::Bidirectional];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Directed => "DIRECTED",
            Self::Bidirectional => "BIDIRECTIONAL",
        }
    }
}

/// An edge between two characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source: CharacterId,
    pub target: CharacterId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub nature: RelationshipNature,
    pub direction: RelationshipDirection,
    /// 1 to 10.
    pub strength: u8,
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Relationship {
    pub fn new(
        id: RelationshipId,
        source: CharacterId,
        target: CharacterId,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id,
            source,
            target,
            relationship_type,
            nature: RelationshipNature::default(),
            direction: RelationshipDirection::default(),
            strength: 5,
            description: String::new(),
            triggers: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_nature(mut self, nature: RelationshipNature) -> Self {
        self.nature = nature;
        self
    }

    pub fn with_direction(mut self, direction: RelationshipDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_strength(mut self, strength: u8) -> Self {
        self.strength = strength.clamp(1, 10);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_triggers(mut self, triggers: Vec<String>) -> Self {
        self.triggers = triggers;
        self
    }

    /// Whether this edge touches the given character.
    pub fn involves(&self, character: &CharacterId) -> bool {
        &self.source == character || &self.target == character
    }

    /// The endpoint on the other side of `character`, if it is an endpoint.
    pub fn other_end(&self, character: &CharacterId) -> Option<&CharacterId> {
        if &self.source == character {
            Some(&self.target)
        } else if &self.target == character {
            Some(&self.source)
        } else {
            None
        }
    }

    /// True when both edges connect the same two characters, in either
    /// direction, with the same relationship type.
    pub fn duplicates(&self, other: &Relationship) -> bool {
        let same_pair = (self.source == other.source && self.target == other.target)
            || (self.source == other.target && self.target == other.source);
        same_pair && self.relationship_type == other.relationship_type
    }
}

impl Keyed for Relationship {
    type Key = RelationshipId;

    fn key(&self) -> &RelationshipId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relationship_type() {
        assert_eq!(RelationshipType::parse("love"), RelationshipType::Love);
        assert_eq!(RelationshipType::parse(" Rivalry "), RelationshipType::Rivalry);
        assert_eq!(RelationshipType::parse("un-known"), RelationshipType::Other);
        assert_eq!(RelationshipType::parse(""), RelationshipType::Other);
    }

    #[test]
    fn test_parse_nature_and_direction_fallbacks() {
        assert_eq!(RelationshipNature::parse("ambivalent"), RelationshipNature::Ambivalent);
        assert_eq!(RelationshipNature::parse("bittersweet"), RelationshipNature::Neutral);
        assert_eq!(RelationshipDirection::parse("directed"), RelationshipDirection::Directed);
        assert_eq!(
            RelationshipDirection::parse("sideways"),
            RelationshipDirection::Bidirectional
        );
    }

    #[test]
    fn test_duplicates_ignores_direction() {
        let a = CharacterId::new("char_1");
        let b = CharacterId::new("char_2");
        let forward = Relationship::new(
            RelationshipId::new("r1"),
            a.clone(),
            b.clone(),
            RelationshipType::Rivalry,
        );
        let backward = Relationship::new(RelationshipId::new("r2"), b, a, RelationshipType::Rivalry);
        let other_type = backward.clone();
        let other_type = Relationship {
            relationship_type: RelationshipType::Love,
            ..other_type
        };

        assert!(forward.duplicates(&backward));
        assert!(!forward.duplicates(&other_type));
    }

    #[test]
    fn test_strength_is_clamped() {
        let rel = Relationship::new(
            RelationshipId::new("r"),
            CharacterId::new("a"),
            CharacterId::new("b"),
            RelationshipType::Family,
        )
        .with_strength(42);
        assert_eq!(rel.strength, 10);
    }

    #[test]
    fn test_serialized_type_field() {
        let rel = Relationship::new(
            RelationshipId::new("r"),
            CharacterId::new("a"),
            CharacterId::new("b"),
            RelationshipType::Mentorship,
        );
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "MENTORSHIP");
        assert_eq!(json["direction"], "BIDIRECTIONAL");
    }
}
