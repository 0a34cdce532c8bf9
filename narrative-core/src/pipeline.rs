//! Pipeline orchestration.
//!
//! [`Pipeline`] runs the seven stations in order, feeding each one the
//! outputs it needs from the stations before it. A station that fails
//! internally still counts as completed: the runner hands back its fallback
//! output and the run continues. Only a panicking station or an unusable
//! output directory aborts the run.

use crate::analysis::DEFAULT_EPISODES_PER_SEASON;
use crate::oracle::Oracle;
use crate::persist::{prepare_output_dir, PersistError};
use crate::station::{InMemoryCache, Station, StationRun, StationRunner};
use crate::stations::{
    ConceptualInput, ConceptualOutput, ConceptualStation, DynamicsInput, DynamicsOutput,
    DynamicsStation, EfficiencyInput, EfficiencyOutput, EfficiencyStation, FinalizationInput,
    FinalizationOutput, FinalizationStation, NetworkBuilderInput, NetworkBuilderOutput,
    NetworkBuilderStation, TextAnalysisInput, TextAnalysisOutput, TextAnalysisStation,
    TreatmentInput, TreatmentOutput, TreatmentStation,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

const STATION_COUNT: usize = 7;
/// Model name recorded for stations that make no oracle calls.
const NO_MODEL: &str = "none";

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input text is empty")]
    EmptyText,

    #[error("Station {station} ({name}) panicked: {message}")]
    StationPanicked {
        station: u8,
        name: String,
        message: String,
    },

    #[error("Output directory unavailable: {0}")]
    OutputDir(#[from] PersistError),
}

/// Configuration for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving the final artifacts.
    pub output_dir: PathBuf,

    /// Target episodes per season for the episodic layout.
    pub episodes_per_season: usize,

    /// Cache station outputs by input.
    pub cache: bool,

    /// Measure conflict inactivity against this time. Unset means the
    /// start of each run.
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("analysis_output"),
            episodes_per_season: DEFAULT_EPISODES_PER_SEASON,
            cache: false,
            reference_time: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `NARRATIVE_OUTPUT_DIR`, `NARRATIVE_EPISODES_PER_SEASON` and
    /// `NARRATIVE_CACHE`, keeping defaults for anything unset or invalid.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("NARRATIVE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                config.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(raw) = std::env::var("NARRATIVE_EPISODES_PER_SEASON") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.episodes_per_season = n,
                _ => warn!(value = %raw, "Ignoring invalid NARRATIVE_EPISODES_PER_SEASON"),
            }
        }
        if let Ok(raw) = std::env::var("NARRATIVE_CACHE") {
            config.cache = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        config
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_episodes_per_season(mut self, episodes: usize) -> Self {
        self.episodes_per_season = episodes.max(1);
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_reference_time(mut self, at: DateTime<Utc>) -> Self {
        self.reference_time = Some(at);
        self
    }
}

/// Text to analyze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInput {
    pub full_text: String,
    pub project_name: String,
    pub prose_file_path: Option<String>,
}

impl PipelineInput {
    pub fn new(full_text: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            project_name: project_name.into(),
            prose_file_path: None,
        }
    }

    pub fn with_prose_file_path(mut self, path: impl Into<String>) -> Self {
        self.prose_file_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

/// Every station's run, in pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationOutputs {
    pub station1: StationRun<TextAnalysisOutput>,
    pub station2: StationRun<ConceptualOutput>,
    pub station3: StationRun<NetworkBuilderOutput>,
    pub station4: StationRun<EfficiencyOutput>,
    pub station5: StationRun<DynamicsOutput>,
    pub station6: StationRun<TreatmentOutput>,
    pub station7: StationRun<FinalizationOutput>,
}

impl StationOutputs {
    /// Numbers of the stations that returned their fallback output.
    pub fn degraded_stations(&self) -> Vec<u8> {
        [
            self.station1.metadata.error_occurred,
            self.station2.metadata.error_occurred,
            self.station3.metadata.error_occurred,
            self.station4.metadata.error_occurred,
            self.station5.metadata.error_occurred,
            self.station6.metadata.error_occurred,
            self.station7.metadata.error_occurred,
        ]
        .iter()
        .enumerate()
        .filter(|(_, failed)| **failed)
        .map(|(i, _)| i as u8 + 1)
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub stations_completed: usize,
    /// Milliseconds.
    pub total_execution_time: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Time conflict inactivity was measured against.
    pub reference_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub station_outputs: StationOutputs,
    pub pipeline_metadata: PipelineMetadata,
}

/// Runs the seven analysis stations in sequence.
pub struct Pipeline {
    config: PipelineConfig,
    station1: StationRunner<TextAnalysisStation>,
    station2: StationRunner<ConceptualStation>,
    station3: StationRunner<NetworkBuilderStation>,
    station4: StationRunner<EfficiencyStation>,
    station5: StationRunner<DynamicsStation>,
    station6: StationRunner<TreatmentStation>,
    station7: StationRunner<FinalizationStation>,
    status: Mutex<[StationStatus; STATION_COUNT]>,
}

/// Wrap a station, attaching a fresh in-memory cache when enabled.
fn runner<S: Station>(station: S, model: &str, cache: bool) -> StationRunner<S> {
    let runner = StationRunner::new(station, model);
    if cache {
        runner.with_cache(Arc::new(InMemoryCache::<S::Output>::new()))
    } else {
        runner
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Pipeline {
    pub fn new(oracle: Arc<dyn Oracle>, config: PipelineConfig) -> Self {
        let model = oracle.model_name().to_string();
        let cache = config.cache;

        Self {
            station1: runner(TextAnalysisStation::new(oracle.clone()), &model, cache),
            station2: runner(ConceptualStation::new(oracle.clone()), &model, cache),
            station3: runner(NetworkBuilderStation::new(oracle.clone()), &model, cache),
            station4: runner(EfficiencyStation::new(oracle.clone()), &model, cache),
            station5: runner(
                DynamicsStation::new(oracle).with_episodes_per_season(config.episodes_per_season),
                &model,
                cache,
            ),
            station6: runner(TreatmentStation::new(), NO_MODEL, cache),
            station7: runner(FinalizationStation::new(), NO_MODEL, cache),
            status: Mutex::new([StationStatus::Pending; STATION_COUNT]),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Status of every station, keyed `station1` to `station7`.
    pub fn station_status(&self) -> BTreeMap<String, StationStatus> {
        let status = *self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        status
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("station{}", i + 1), *s))
            .collect()
    }

    /// Drop every cached station output.
    pub fn clear_caches(&self) {
        self.station1.clear_cache();
        self.station2.clear_cache();
        self.station3.clear_cache();
        self.station4.clear_cache();
        self.station5.clear_cache();
        self.station6.clear_cache();
        self.station7.clear_cache();
    }

    fn set_status(&self, station: u8, status: StationStatus) {
        let mut all = self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(slot) = all.get_mut(usize::from(station) - 1) {
            *slot = status;
        }
    }

    fn reset_status(&self) {
        *self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            [StationStatus::Pending; STATION_COUNT];
    }

    /// Run one station, turning a panic into a pipeline error.
    async fn run_stage<S: Station>(
        &self,
        runner: &StationRunner<S>,
        input: &S::Input,
    ) -> Result<StationRun<S::Output>, PipelineError> {
        let station = runner.station();
        let number = station.number();
        self.set_status(number, StationStatus::Running);
        info!(station = station.name(), station_number = number, "Starting station");

        match AssertUnwindSafe(runner.execute(input)).catch_unwind().await {
            Ok(run) => {
                self.set_status(number, StationStatus::Completed);
                if run.metadata.error_occurred {
                    warn!(
                        station = station.name(),
                        station_number = number,
                        "Station completed with fallback output"
                    );
                }
                Ok(run)
            }
            Err(payload) => {
                self.set_status(number, StationStatus::Error);
                let message = panic_message(payload.as_ref());
                error!(
                    station = station.name(),
                    station_number = number,
                    error = %message,
                    "Station panicked, aborting pipeline"
                );
                Err(PipelineError::StationPanicked {
                    station: number,
                    name: station.name().to_string(),
                    message,
                })
            }
        }
    }

    /// Run all seven stations over `input`.
    pub async fn run_full_analysis(
        &self,
        input: PipelineInput,
    ) -> Result<PipelineResult, PipelineError> {
        if input.full_text.trim().is_empty() {
            return Err(PipelineError::EmptyText);
        }

        self.reset_status();
        let started = Instant::now();
        let started_at = Utc::now();
        let reference_time = self.config.reference_time.unwrap_or(started_at);
        info!(
            project = %input.project_name,
            text_chars = input.full_text.chars().count(),
            "Starting full analysis"
        );

        let PipelineInput {
            full_text,
            project_name,
            prose_file_path,
        } = input;

        let station1 = self
            .run_stage(
                &self.station1,
                &TextAnalysisInput {
                    full_text: full_text.clone(),
                    project_name: project_name.clone(),
                    prose_file_path,
                },
            )
            .await?;

        let station2 = self
            .run_stage(
                &self.station2,
                &ConceptualInput {
                    station1: station1.output.clone(),
                    full_text: full_text.clone(),
                },
            )
            .await?;

        let station3 = self
            .run_stage(
                &self.station3,
                &NetworkBuilderInput {
                    station1: station1.output.clone(),
                    station2: station2.output.clone(),
                    full_text: full_text.clone(),
                },
            )
            .await?;
        let network = &station3.output.conflict_network;

        let station4 = self
            .run_stage(
                &self.station4,
                &EfficiencyInput {
                    conflict_network: network.clone(),
                },
            )
            .await?;

        let station5 = self
            .run_stage(
                &self.station5,
                &DynamicsInput {
                    conflict_network: network.clone(),
                    station4: station4.output.clone(),
                    full_text,
                },
            )
            .await?;

        let station6 = self
            .run_stage(
                &self.station6,
                &TreatmentInput {
                    conflict_network: network.clone(),
                    station5: station5.output.clone(),
                    reference_time,
                },
            )
            .await?;

        let output_dir = match prepare_output_dir(&self.config.output_dir).await {
            Ok(dir) => dir,
            Err(err) => {
                self.set_status(7, StationStatus::Error);
                error!(
                    output_dir = %self.config.output_dir.display(),
                    error = %err,
                    "Cannot prepare output directory, aborting pipeline"
                );
                return Err(err.into());
            }
        };

        let station7 = self
            .run_stage(
                &self.station7,
                &FinalizationInput {
                    project_name,
                    output_dir,
                    conflict_network: network.clone(),
                    station1: station1.output.clone(),
                    station2: station2.output.clone(),
                    station3: station3.output.clone(),
                    station4: station4.output.clone(),
                    station5: station5.output.clone(),
                    station6: station6.output.clone(),
                },
            )
            .await?;

        let stations_completed = self
            .station_status()
            .values()
            .filter(|s| **s == StationStatus::Completed)
            .count();
        let total_execution_time = started.elapsed().as_millis() as u64;
        info!(
            stations_completed,
            total_execution_time_ms = total_execution_time,
            "Full analysis finished"
        );

        Ok(PipelineResult {
            station_outputs: StationOutputs {
                station1,
                station2,
                station3,
                station4,
                station5,
                station6,
                station7,
            },
            pipeline_metadata: PipelineMetadata {
                stations_completed,
                total_execution_time,
                started_at,
                finished_at: Utc::now(),
                reference_time,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_time, MockOracle};
    use tempfile::TempDir;

    fn pipeline(oracle: MockOracle, dir: &TempDir) -> Pipeline {
        Pipeline::new(
            Arc::new(oracle),
            PipelineConfig::new()
                .with_output_dir(dir.path().join("out"))
                .with_reference_time(sample_time()),
        )
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_output_dir("reports")
            .with_episodes_per_season(0)
            .with_cache(true);
        assert_eq!(config.output_dir, PathBuf::from("reports"));
        assert_eq!(config.episodes_per_season, 1);
        assert!(config.cache);
        assert!(PipelineConfig::default().reference_time.is_none());
    }

    #[test]
    fn test_status_starts_pending() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let statuses = pipeline(MockOracle::new(), &temp_dir).station_status();
        assert_eq!(statuses.len(), 7);
        assert!(statuses.values().all(|s| *s == StationStatus::Pending));
        assert!(statuses.contains_key("station1"));
        assert!(statuses.contains_key("station7"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pipeline = pipeline(MockOracle::new(), &temp_dir);

        let result = pipeline.run_full_analysis(PipelineInput::new("   ", "Blank")).await;

        assert!(matches!(result, Err(PipelineError::EmptyText)));
        assert!(pipeline
            .station_status()
            .values()
            .all(|s| *s == StationStatus::Pending));
    }

    #[tokio::test]
    async fn test_output_dir_failure_aborts_at_station_seven() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let blocked = temp_dir.path().join("blocked");
        std::fs::write(&blocked, "file").expect("Failed to write");
        let pipeline = Pipeline::new(
            Arc::new(MockOracle::for_sample_story()),
            PipelineConfig::new().with_output_dir(&blocked),
        );

        let result = pipeline
            .run_full_analysis(PipelineInput::new("Ana and Ben quarrel.", "Blocked"))
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::OutputDir(PersistError::NotADirectory(_)))
        ));
        let status = pipeline.station_status();
        assert_eq!(status["station6"], StationStatus::Completed);
        assert_eq!(status["station7"], StationStatus::Error);
    }
}
