//! Structural efficiency of a conflict network.
//!
//! All metrics are pure functions of the network. Every ratio is 0 when its
//! denominator is empty, and a network with no entities at all scores 0
//! across the board.

use super::stats::{gini, pair_fraction, ratio};
use crate::network::{ConflictNetwork, Relationship};
use serde::{Deserialize, Serialize};
use std::fmt;

const COHESION_WEIGHT: f64 = 0.25;
const BALANCE_WEIGHT: f64 = 0.25;
const EFFICIENCY_WEIGHT: f64 = 0.25;
const DENSITY_WEIGHT: f64 = 0.15;
const REDUNDANCY_WEIGHT: f64 = 0.10;

/// Strength at which a relationship or conflict counts as active.
const ACTIVE_STRENGTH: u8 = 5;

/// Banded verdict on the overall efficiency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl EfficiencyRating {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 85.0 => Self::Excellent,
            s if s >= 70.0 => Self::Good,
            s if s >= 55.0 => Self::Fair,
            s if s >= 40.0 => Self::Poor,
            _ => Self::Critical,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for EfficiencyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How evenly conflict involvement is spread across characters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DramaticBalance {
    pub balance_score: f64,
    pub character_involvement_gini: f64,
}

/// Share of each entity kind that actually does narrative work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeEfficiency {
    pub character_efficiency: f64,
    pub relationship_efficiency: f64,
    pub conflict_efficiency: f64,
}

impl NarrativeEfficiency {
    pub fn average(&self) -> f64 {
        (self.character_efficiency + self.relationship_efficiency + self.conflict_efficiency) / 3.0
    }
}

/// Share of duplicated pairs per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RedundancyMetrics {
    pub character_redundancy: f64,
    pub relationship_redundancy: f64,
    pub conflict_redundancy: f64,
}

impl RedundancyMetrics {
    pub fn average(&self) -> f64 {
        (self.character_redundancy + self.relationship_redundancy + self.conflict_redundancy) / 3.0
    }
}

/// Full efficiency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// 0 to 100.
    pub overall_efficiency_score: f64,
    pub overall_rating: EfficiencyRating,
    pub conflict_cohesion: f64,
    pub dramatic_balance: DramaticBalance,
    pub narrative_efficiency: NarrativeEfficiency,
    pub narrative_density: f64,
    pub redundancy_metrics: RedundancyMetrics,
}

impl EfficiencyMetrics {
    /// Metrics of a network with nothing in it.
    pub fn empty() -> Self {
        Self {
            overall_efficiency_score: 0.0,
            overall_rating: EfficiencyRating::Critical,
            conflict_cohesion: 0.0,
            dramatic_balance: DramaticBalance {
                balance_score: 0.0,
                character_involvement_gini: 0.0,
            },
            narrative_efficiency: NarrativeEfficiency::default(),
            narrative_density: 0.0,
            redundancy_metrics: RedundancyMetrics::default(),
        }
    }

    /// Worst-case metrics reported when analysis could not run.
    pub fn failed() -> Self {
        Self {
            dramatic_balance: DramaticBalance {
                balance_score: 0.0,
                character_involvement_gini: 1.0,
            },
            ..Self::empty()
        }
    }
}

/// Computes [`EfficiencyMetrics`] for a network.
#[derive(Debug, Default, Clone, Copy)]
pub struct EfficiencyAnalyzer;

impl EfficiencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, network: &ConflictNetwork) -> EfficiencyMetrics {
        if network.is_empty() {
            return EfficiencyMetrics::empty();
        }

        let conflict_cohesion = conflict_cohesion(network);
        let dramatic_balance = dramatic_balance(network);
        let narrative_efficiency = narrative_efficiency(network);
        let narrative_density = narrative_density(network);
        let redundancy_metrics = redundancy_metrics(network);

        let score = (conflict_cohesion * COHESION_WEIGHT
            + dramatic_balance.balance_score * BALANCE_WEIGHT
            + narrative_efficiency.average() * EFFICIENCY_WEIGHT
            + narrative_density * DENSITY_WEIGHT
            + (1.0 - redundancy_metrics.average()) * REDUNDANCY_WEIGHT)
            * 100.0;
        // Density is unbounded above when conflicts involve many characters.
        let overall_efficiency_score = score.clamp(0.0, 100.0);

        EfficiencyMetrics {
            overall_efficiency_score,
            overall_rating: EfficiencyRating::from_score(overall_efficiency_score),
            conflict_cohesion,
            dramatic_balance,
            narrative_efficiency,
            narrative_density,
            redundancy_metrics,
        }
    }
}

/// Fraction of conflict pairs that share at least one character.
fn conflict_cohesion(network: &ConflictNetwork) -> f64 {
    pair_fraction(network.conflicts().as_slice(), |a, b| {
        a.involved_characters
            .iter()
            .any(|c| b.involved_characters.contains(c))
    })
}

fn dramatic_balance(network: &ConflictNetwork) -> DramaticBalance {
    let involvement: Vec<f64> = network
        .characters()
        .iter()
        .map(|c| network.conflicts_of(&c.id).count() as f64)
        .collect();
    let g = gini(&involvement);
    DramaticBalance {
        balance_score: 1.0 - g,
        character_involvement_gini: g,
    }
}

fn narrative_efficiency(network: &ConflictNetwork) -> NarrativeEfficiency {
    let active_characters = network
        .characters()
        .iter()
        .filter(|c| {
            network.conflicts_of(&c.id).next().is_some()
                || network.relationships_of(&c.id).next().is_some()
        })
        .count();

    let active_relationships = network
        .relationships()
        .iter()
        .filter(|r| {
            r.strength >= ACTIVE_STRENGTH
                || network
                    .conflicts()
                    .iter()
                    .any(|k| k.related_relationships.contains(&r.id))
        })
        .count();

    let active_conflicts = network
        .conflicts()
        .iter()
        .filter(|k| k.strength >= ACTIVE_STRENGTH && k.involved_characters.len() >= 2)
        .count();

    NarrativeEfficiency {
        character_efficiency: ratio(active_characters, network.characters().len()),
        relationship_efficiency: ratio(active_relationships, network.relationships().len()),
        conflict_efficiency: ratio(active_conflicts, network.conflicts().len()),
    }
}

/// Connections (edges plus conflict memberships) per entity.
fn narrative_density(network: &ConflictNetwork) -> f64 {
    let memberships: usize = network
        .conflicts()
        .iter()
        .map(|k| k.involved_characters.len())
        .sum();
    ratio(
        network.relationships().len() + memberships,
        network.state().element_count(),
    )
}

fn redundancy_metrics(network: &ConflictNetwork) -> RedundancyMetrics {
    RedundancyMetrics {
        character_redundancy: pair_fraction(network.characters().as_slice(), |a, b| {
            a.description == b.description
        }),
        relationship_redundancy: pair_fraction(
            network.relationships().as_slice(),
            Relationship::duplicates,
        ),
        conflict_redundancy: pair_fraction(network.conflicts().as_slice(), |a, b| a.resembles(b)),
    }
}
