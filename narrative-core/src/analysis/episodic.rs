//! Lays conflicts out over a season/episode grid.
//!
//! The layout is deterministic: conflicts are taken strongest first and each
//! claims `ceil(strength / 3)` consecutive episodes from a rolling cursor
//! that wraps back to episode 1.

use super::stats::{mean, variance};
use crate::network::{CharacterId, ConflictId, ConflictNetwork};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EPISODES_PER_SEASON: usize = 10;
const CONFLICTS_PER_EPISODE: f64 = 2.5;
const RECOMMENDED_RUNTIME_MINUTES: u32 = 45;
const MAX_INTENSITY: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStructure {
    pub total_seasons: usize,
    pub episodes_per_season: usize,
    pub total_episodes: usize,
    pub recommended_runtime_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeAssignment {
    pub conflict_id: ConflictId,
    /// 1-based episode numbers in claim order.
    pub episodes: Vec<usize>,
    pub distribution_quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeFunction {
    Setup,
    Development,
    Climax,
    Resolution,
}

impl NarrativeFunction {
    fn from_position(position: f64) -> Self {
        if position < 0.3 {
            Self::Setup
        } else if position < 0.7 {
            Self::Development
        } else if position < 0.9 {
            Self::Climax
        } else {
            Self::Resolution
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub episode_number: usize,
    pub season_number: usize,
    pub title: String,
    pub assigned_conflicts: Vec<ConflictId>,
    pub featured_characters: Vec<CharacterId>,
    pub estimated_intensity: f64,
    pub narrative_function: NarrativeFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDetails {
    pub season_number: usize,
    pub season_title: String,
    pub episodes: Vec<Episode>,
    pub major_conflicts: Vec<ConflictId>,
    pub season_arc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cliffhanger: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicBalanceReport {
    pub overall_balance: f64,
    pub conflict_distribution_score: f64,
    pub character_appearance_balance: f64,
    pub intensity_flow_score: f64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicIntegration {
    pub series_structure: SeriesStructure,
    pub season_breakdown: Vec<SeasonDetails>,
    pub episode_distribution: Vec<EpisodeAssignment>,
    pub balance_report: EpisodicBalanceReport,
}

impl EpisodicIntegration {
    /// Result reported when the integration could not run.
    pub fn failed() -> Self {
        Self {
            series_structure: SeriesStructure {
                total_seasons: 0,
                episodes_per_season: 0,
                total_episodes: 0,
                recommended_runtime_minutes: 0,
            },
            season_breakdown: Vec::new(),
            episode_distribution: Vec::new(),
            balance_report: EpisodicBalanceReport {
                overall_balance: 0.0,
                conflict_distribution_score: 0.0,
                character_appearance_balance: 0.0,
                intensity_flow_score: 0.0,
                recommendations: vec!["Analysis failed".to_string()],
            },
        }
    }

    /// Every episode of every season, in order.
    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.season_breakdown.iter().flat_map(|s| s.episodes.iter())
    }
}

/// Distributes a network's conflicts over episodes.
#[derive(Debug, Clone, Copy)]
pub struct EpisodicIntegrator {
    episodes_per_season: usize,
}

impl Default for EpisodicIntegrator {
    fn default() -> Self {
        Self::new(DEFAULT_EPISODES_PER_SEASON)
    }
}

impl EpisodicIntegrator {
    /// A target of zero is treated as one episode per season.
    pub fn new(episodes_per_season: usize) -> Self {
        Self {
            episodes_per_season: episodes_per_season.max(1),
        }
    }

    pub fn integrate(&self, network: &ConflictNetwork) -> EpisodicIntegration {
        let series_structure = self.create_series_structure(network);
        let episode_distribution = self.distribute_conflicts(network, &series_structure);
        let season_breakdown =
            self.create_season_breakdown(network, &series_structure, &episode_distribution);
        let balance_report = self.evaluate_balance(&season_breakdown);

        EpisodicIntegration {
            series_structure,
            season_breakdown,
            episode_distribution,
            balance_report,
        }
    }

    pub fn create_series_structure(&self, network: &ConflictNetwork) -> SeriesStructure {
        let estimated = (network.conflicts().len() as f64 / CONFLICTS_PER_EPISODE).ceil() as usize;
        let total_episodes = self.episodes_per_season.max(estimated);

        SeriesStructure {
            total_seasons: total_episodes.div_ceil(self.episodes_per_season),
            episodes_per_season: self.episodes_per_season,
            total_episodes,
            recommended_runtime_minutes: RECOMMENDED_RUNTIME_MINUTES,
        }
    }

    pub fn distribute_conflicts(
        &self,
        network: &ConflictNetwork,
        structure: &SeriesStructure,
    ) -> Vec<EpisodeAssignment> {
        let total = structure.total_episodes;
        let mut conflicts: Vec<_> = network.conflicts().iter().collect();
        conflicts.sort_by(|a, b| b.strength.cmp(&a.strength));

        let mut cursor = 1;
        conflicts
            .into_iter()
            .map(|conflict| {
                let span = usize::from(conflict.strength).div_ceil(3).min(total);
                let episodes: Vec<usize> = (0..span)
                    .map(|_| {
                        let episode = cursor;
                        cursor = if cursor >= total { 1 } else { cursor + 1 };
                        episode
                    })
                    .collect();

                EpisodeAssignment {
                    conflict_id: conflict.id.clone(),
                    distribution_quality: distribution_quality(&episodes),
                    episodes,
                }
            })
            .collect()
    }

    pub fn create_season_breakdown(
        &self,
        network: &ConflictNetwork,
        structure: &SeriesStructure,
        assignments: &[EpisodeAssignment],
    ) -> Vec<SeasonDetails> {
        (1..=structure.total_seasons)
            .map(|season| {
                let start = (season - 1) * structure.episodes_per_season + 1;
                let end = (season * structure.episodes_per_season).min(structure.total_episodes);

                let episodes: Vec<Episode> = (start..=end)
                    .map(|number| {
                        let position = if end == start {
                            0.0
                        } else {
                            (number - start) as f64 / (end - start) as f64
                        };
                        build_episode(network, assignments, season, number, position)
                    })
                    .collect();

                let mut major_conflicts: Vec<ConflictId> = Vec::new();
                for id in episodes.iter().flat_map(|e| &e.assigned_conflicts) {
                    if !major_conflicts.contains(id) {
                        major_conflicts.push(id.clone());
                    }
                }

                SeasonDetails {
                    season_number: season,
                    season_title: format!("Season {season}"),
                    season_arc: format!(
                        "Season {season} follows {} conflicts across episodes {start}-{end}",
                        major_conflicts.len()
                    ),
                    cliffhanger: (season < structure.total_seasons)
                        .then(|| format!("Cliffhanger leading into Season {}", season + 1)),
                    episodes,
                    major_conflicts,
                }
            })
            .collect()
    }

    pub fn evaluate_balance(&self, seasons: &[SeasonDetails]) -> EpisodicBalanceReport {
        let episodes: Vec<&Episode> = seasons.iter().flat_map(|s| &s.episodes).collect();

        let conflict_counts: Vec<f64> = episodes
            .iter()
            .map(|e| e.assigned_conflicts.len() as f64)
            .collect();
        let conflict_distribution_score = spread_score(&conflict_counts);

        let mut appearances: Vec<(&CharacterId, usize)> = Vec::new();
        for character in episodes.iter().flat_map(|e| &e.featured_characters) {
            match appearances.iter_mut().find(|(id, _)| *id == character) {
                Some((_, count)) => *count += 1,
                None => appearances.push((character, 1)),
            }
        }
        let appearance_counts: Vec<f64> = appearances.iter().map(|(_, n)| *n as f64).collect();
        let character_appearance_balance = spread_score(&appearance_counts);

        let intensities: Vec<f64> = episodes.iter().map(|e| e.estimated_intensity).collect();
        let intensity_flow_score = intensity_flow(&intensities);

        let overall_balance = conflict_distribution_score * 0.4
            + character_appearance_balance * 0.3
            + intensity_flow_score * 0.3;

        EpisodicBalanceReport {
            recommendations: balance_recommendations(
                conflict_distribution_score,
                character_appearance_balance,
                intensity_flow_score,
                overall_balance,
            ),
            overall_balance,
            conflict_distribution_score,
            character_appearance_balance,
            intensity_flow_score,
        }
    }
}

fn build_episode(
    network: &ConflictNetwork,
    assignments: &[EpisodeAssignment],
    season: usize,
    number: usize,
    position: f64,
) -> Episode {
    let assigned_conflicts: Vec<ConflictId> = assignments
        .iter()
        .filter(|a| a.episodes.contains(&number))
        .map(|a| a.conflict_id.clone())
        .collect();

    let mut featured_characters: Vec<CharacterId> = Vec::new();
    let mut strengths = Vec::new();
    for conflict in assigned_conflicts
        .iter()
        .filter_map(|id| network.conflicts().get(id))
    {
        strengths.push(f64::from(conflict.strength));
        for character in &conflict.involved_characters {
            if !featured_characters.contains(character) {
                featured_characters.push(character.clone());
            }
        }
    }

    Episode {
        episode_number: number,
        season_number: season,
        title: format!("Episode {number}"),
        estimated_intensity: mean(&strengths).min(MAX_INTENSITY),
        narrative_function: NarrativeFunction::from_position(position),
        assigned_conflicts,
        featured_characters,
    }
}

/// `1 / (1 + var(gaps))`; 1 for a single episode, 0 for none.
fn distribution_quality(episodes: &[usize]) -> f64 {
    match episodes.len() {
        0 => 0.0,
        1 => 1.0,
        _ => {
            let gaps: Vec<f64> = episodes
                .windows(2)
                .map(|pair| pair[1] as f64 - pair[0] as f64)
                .collect();
            (1.0 / (1.0 + variance(&gaps))).clamp(0.0, 1.0)
        }
    }
}

/// `1 − var/max`, clamped to `[0, 1]`; 0 when there is nothing to spread.
fn spread_score(counts: &[f64]) -> f64 {
    let max = counts.iter().copied().fold(0.0, f64::max);
    if max == 0.0 {
        return 0.0;
    }
    (1.0 - variance(counts) / max).clamp(0.0, 1.0)
}

fn intensity_flow(intensities: &[f64]) -> f64 {
    if intensities.len() < 2 {
        return 1.0;
    }
    let mut score = 1.0;
    if variance(intensities) < 1.0 {
        score -= 0.3;
    }
    let (first, second) = intensities.split_at(intensities.len() / 2);
    if mean(second) > mean(first) {
        score += 0.2;
    }
    f64::clamp(score, 0.0, 1.0)
}

fn balance_recommendations(
    conflict_distribution: f64,
    character_balance: f64,
    intensity_flow: f64,
    overall: f64,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    if conflict_distribution < 0.6 {
        recommendations
            .push("Consider redistributing conflicts more evenly across episodes".to_string());
    }
    if character_balance < 0.5 {
        recommendations.push(
            "Some characters appear too frequently or too rarely; balance their screen time"
                .to_string(),
        );
    }
    if intensity_flow < 0.5 {
        recommendations
            .push("Intensity flow needs more variation and a clearer build-up".to_string());
    }
    if overall >= 0.8 {
        recommendations.push("Episodic balance is excellent; keep the current structure".to_string());
    }
    recommendations
}
