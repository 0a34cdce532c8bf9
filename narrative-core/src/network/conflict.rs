//! Conflicts: hyperedges over any number of characters.

use super::character::CharacterId;
use super::label::Label;
use super::relationship::RelationshipId;
use super::table::Keyed;
use super::Metadata;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a conflict, `conflict_<millis>_<random>` when inferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(String);

impl ConflictId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a conflict created at `at`.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("conflict_{}_{suffix:06}", at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a conflict is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSubject {
    Value,
    Material,
    Power,
    Psychological,
    Relationship,
    Informational,
    Survival,
    #[default]
    Other,
}

impl Label for ConflictSubject {
    const ALL: &'static [Self] = &[
        Self::Value,
        Self::Material,
        Self::Power,
        Self::Psychological,
        Self::Relationship,
        Self::Informational,
        Self::Survival,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "VALUE",
            Self::Material => "MATERIAL",
            Self::Power => "POWER",
            Self::Psychological => "PSYCHOLOGICAL",
            Self::Relationship => "RELATIONSHIP",
            Self::Informational => "INFORMATIONAL",
            Self::Survival => "SURVIVAL",
            Self::Other => "OTHER",
        }
    }
}

/// How far a conflict's consequences reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictScope {
    Internal,
    #[default]
    Personal,
    Group,
    Societal,
    Universal,
}

impl Label for ConflictScope {
    const ALL: &'static [Self] = &[
        Self::Internal,
        Self::Personal,
        Self::Group,
        Self::Societal,
        Self::Universal,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "INTERNAL",
            Self::Personal => "PERSONAL",
            Self::Group => "GROUP",
            Self::Societal => "SOCIETAL",
            Self::Universal => "UNIVERSAL",
        }
    }
}

/// Where a conflict sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictPhase {
    Latent,
    #[default]
    Emerging,
    Escalating,
    Stalemate,
    Climax,
    Deescalating,
    Resolution,
    Aftermath,
    Other,
}

impl ConflictPhase {
    /// Baseline likelihood that a conflict in this phase resolves.
    pub fn resolution_baseline(&self) -> f64 {
        match self {
            Self::Resolution => 0.95,
            Self::Deescalating => 0.75,
            Self::Aftermath => 1.0,
            Self::Climax => 0.6,
            Self::Latent => 0.2,
            _ => 0.5,
        }
    }

    /// The phase a conflict would normally move into next.
    pub fn next_phase(&self) -> Self {
        match self {
            Self::Latent => Self::Emerging,
            Self::Emerging | Self::Stalemate => Self::Escalating,
            Self::Escalating => Self::Climax,
            Self::Climax => Self::Deescalating,
            Self::Deescalating => Self::Resolution,
            Self::Resolution | Self::Aftermath => Self::Aftermath,
            Self::Other => Self::Emerging,
        }
    }
}

impl Label for ConflictPhase {
    const ALL: &'static [Self] = &[
        Self::Latent,
        Self::Emerging,
        Self::Escalating,
        Self::Stalemate,
        Self::Climax,
        Self::Deescalating,
        Self::Resolution,
        Self::Aftermath,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Latent => "LATENT",
            Self::Emerging => "EMERGING",
            Self::Escalating => "ESCALATING",
            Self::Stalemate => "STALEMATE",
            Self::Climax => "CLIMAX",
            Self::Deescalating => "DEESCALATING",
            Self::Resolution => "RESOLUTION",
            Self::Aftermath => "AFTERMATH",
            Self::Other => "OTHER",
        }
    }
}

/// A dramatic conflict involving one or more characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub name: String,
    pub description: String,
    pub involved_characters: Vec<CharacterId>,
    pub subject: ConflictSubject,
    pub scope: ConflictScope,
    pub phase: ConflictPhase,
    /// 1 to 10.
    pub strength: u8,
    #[serde(default)]
    pub related_relationships: Vec<RelationshipId>,
    #[serde(default)]
    pub pivot_points: Vec<String>,
    /// Append-only, oldest first.
    #[serde(default)]
    pub timestamps: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Conflict {
    pub fn new(id: ConflictId, name: impl Into<String>, involved: Vec<CharacterId>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            involved_characters: involved,
            subject: ConflictSubject::default(),
            scope: ConflictScope::default(),
            phase: ConflictPhase::default(),
            strength: 5,
            related_relationships: Vec::new(),
            pivot_points: Vec::new(),
            timestamps: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_subject(mut self, subject: ConflictSubject) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_scope(mut self, scope: ConflictScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_phase(mut self, phase: ConflictPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_strength(mut self, strength: u8) -> Self {
        self.strength = strength.clamp(1, 10);
        self
    }

    pub fn with_related_relationships(mut self, related: Vec<RelationshipId>) -> Self {
        self.related_relationships = related;
        self
    }

    pub fn with_pivot_points(mut self, pivots: Vec<String>) -> Self {
        self.pivot_points = pivots;
        self
    }

    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamps.push(at);
        self
    }

    pub fn involves(&self, character: &CharacterId) -> bool {
        self.involved_characters.contains(character)
    }

    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// True when both conflicts share subject and scope and at least one
    /// participant.
    pub fn resembles(&self, other: &Conflict) -> bool {
        self.subject == other.subject
            && self.scope == other.scope
            && self
                .involved_characters
                .iter()
                .any(|c| other.involved_characters.contains(c))
    }
}

impl Keyed for Conflict {
    type Key = ConflictId;

    fn key(&self) -> &ConflictId {
        &self.id
    }
}
