//! Station execution framework.
//!
//! A station is one step of the analysis pipeline. Each station implements
//! [`Station`]; a [`StationRunner`] wraps it with the behavior every station
//! shares:
//!
//! 1. validate the input
//! 2. serve a cached output when caching is enabled and the input was seen
//! 3. otherwise run [`Station::process`], validate and cache the output
//! 4. on any error, log it and return [`Station::error_fallback`]
//!
//! Errors never cross the runner. The returned [`StationRun`] carries an
//! `error_occurred` flag so callers can tell a fallback from real output.

mod cache;

pub use cache::{InMemoryCache, NoopCache, StationCache};

use crate::oracle::OracleError;
use crate::persist::PersistError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors raised inside a station. The runner turns them into fallbacks.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Could not serialize input for caching: {0}")]
    CacheKey(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Completion status stamped on every station output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Success,
    Partial,
    Failed,
}

/// Status and generation time of a station output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetadata {
    pub status: StageStatus,
    pub generated_at: DateTime<Utc>,
}

impl StageMetadata {
    pub fn new(status: StageStatus) -> Self {
        Self {
            status,
            generated_at: Utc::now(),
        }
    }

    pub fn success() -> Self {
        Self::new(StageStatus::Success)
    }

    pub fn failed() -> Self {
        Self::new(StageStatus::Failed)
    }
}

/// How one execution went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationMetadata {
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub model_used: String,
    pub cache_hit: bool,
    pub error_occurred: bool,
    pub error_details: Option<String>,
}

/// Output of one execution together with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRun<O> {
    pub output: O,
    pub metadata: StationMetadata,
}

/// One step of the pipeline.
#[async_trait]
pub trait Station: Send + Sync {
    type Input: Serialize + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Position in the pipeline, starting at 1.
    fn number(&self) -> u8;

    fn name(&self) -> &'static str;

    /// Do the work.
    async fn process(&self, input: &Self::Input) -> Result<Self::Output, StationError>;

    /// A small, safe projection of the input for log lines.
    fn extract_required_data(&self, input: &Self::Input) -> serde_json::Value;

    /// Output returned when anything goes wrong.
    fn error_fallback(&self) -> Self::Output;

    fn validate_input(&self, _input: &Self::Input) -> Result<(), String> {
        Ok(())
    }

    fn validate_output(&self, _output: &Self::Output) -> Result<(), String> {
        Ok(())
    }
}

/// Runs a [`Station`] with validation, caching, timing and fallback.
pub struct StationRunner<S: Station> {
    station: S,
    cache: Arc<dyn StationCache<S::Output>>,
    cache_enabled: bool,
    model_used: String,
}

impl<S: Station> StationRunner<S> {
    /// Wrap a station with caching disabled.
    pub fn new(station: S, model_used: impl Into<String>) -> Self {
        Self {
            station,
            cache: Arc::new(NoopCache),
            cache_enabled: false,
            model_used: model_used.into(),
        }
    }

    /// Enable caching through the given store.
    pub fn with_cache(mut self, cache: Arc<dyn StationCache<S::Output>>) -> Self {
        self.cache = cache;
        self.cache_enabled = true;
        self
    }

    pub fn station(&self) -> &S {
        &self.station
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Execute the station. Never fails.
    pub async fn execute(&self, input: &S::Input) -> StationRun<S::Output> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let station = self.station.name();
        let station_number = self.station.number();

        let (output, cache_hit, error_details) = match self.try_execute(input).await {
            Ok((output, cache_hit)) => {
                info!(
                    station,
                    station_number,
                    cache_hit,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Station completed"
                );
                (output, cache_hit, None)
            }
            Err(err) => {
                let details = error_chain(&err);
                error!(
                    station,
                    station_number,
                    input = %self.station.extract_required_data(input),
                    error = %details,
                    "Station failed, using fallback output"
                );
                (self.station.error_fallback(), false, Some(details))
            }
        };

        StationRun {
            output,
            metadata: StationMetadata {
                execution_time_ms: started.elapsed().as_millis() as u64,
                timestamp,
                model_used: self.model_used.clone(),
                cache_hit,
                error_occurred: error_details.is_some(),
                error_details,
            },
        }
    }

    async fn try_execute(&self, input: &S::Input) -> Result<(S::Output, bool), StationError> {
        self.station
            .validate_input(input)
            .map_err(StationError::InvalidInput)?;

        let key = if self.cache_enabled {
            Some(serde_json::to_string(input)?)
        } else {
            None
        };

        if let Some(cached) = key.as_deref().and_then(|k| self.cache.get(k)) {
            debug!(station = self.station.name(), "Serving cached output");
            return Ok((cached, true));
        }

        let output = self.station.process(input).await?;
        self.station
            .validate_output(&output)
            .map_err(StationError::InvalidOutput)?;

        if let Some(key) = key {
            self.cache.set(key, output.clone());
        }
        Ok((output, false))
    }
}

/// The error and every source below it, joined with `": "`. Sources whose
/// text already shows up in the message are skipped.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut details = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !details.contains(&text) {
            details.push_str(": ");
            details.push_str(&text);
        }
        source = cause.source();
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Doubler {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Doubler {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Station for Doubler {
        type Input = i64;
        type Output = i64;

        fn number(&self) -> u8 {
            1
        }

        fn name(&self) -> &'static str {
            "Doubler"
        }

        async fn process(&self, input: &i64) -> Result<i64, StationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StationError::Oracle(OracleError::Rejected("nope".into())));
            }
            Ok(input * 2)
        }

        fn extract_required_data(&self, input: &i64) -> serde_json::Value {
            json!({ "value": input })
        }

        fn error_fallback(&self) -> i64 {
            -1
        }

        fn validate_input(&self, input: &i64) -> Result<(), String> {
            if *input < 0 {
                return Err("negative input".to_string());
            }
            Ok(())
        }

        fn validate_output(&self, output: &i64) -> Result<(), String> {
            if *output > 100 {
                return Err("output too large".to_string());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_successful_run() {
        let runner = StationRunner::new(Doubler::new(false), "mock");
        let run = runner.execute(&21).await;

        assert_eq!(run.output, 42);
        assert!(!run.metadata.error_occurred);
        assert!(!run.metadata.cache_hit);
        assert_eq!(run.metadata.model_used, "mock");
    }

    #[tokio::test]
    async fn test_invalid_input_falls_back() {
        let runner = StationRunner::new(Doubler::new(false), "mock");
        let run = runner.execute(&-3).await;

        assert_eq!(run.output, -1);
        assert!(run.metadata.error_occurred);
        assert!(run
            .metadata
            .error_details
            .as_deref()
            .is_some_and(|d| d.contains("negative input")));
        assert_eq!(runner.station().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_output_falls_back() {
        let runner = StationRunner::new(Doubler::new(false), "mock");
        let run = runner.execute(&60).await;
        assert_eq!(run.output, -1);
        assert!(run.metadata.error_occurred);
    }

    #[tokio::test]
    async fn test_process_error_falls_back_with_details() {
        let runner = StationRunner::new(Doubler::new(true), "mock");
        let run = runner.execute(&1).await;

        assert_eq!(run.output, -1);
        let details = run.metadata.error_details.unwrap();
        assert!(details.contains("Oracle error"));
        assert!(details.contains("nope"));
    }

    #[derive(Debug, Error)]
    #[error("quota exceeded")]
    struct Quota;

    #[derive(Debug, Error)]
    #[error("write refused")]
    struct Refused {
        #[source]
        source: Quota,
    }

    fn refused_write() -> StationError {
        let io = std::io::Error::other(Refused { source: Quota });
        StationError::Persist(PersistError::Io(io))
    }

    struct Unwritable;

    #[async_trait]
    impl Station for Unwritable {
        type Input = ();
        type Output = String;

        fn number(&self) -> u8 {
            7
        }

        fn name(&self) -> &'static str {
            "Unwritable"
        }

        async fn process(&self, _input: &()) -> Result<String, StationError> {
            Err(refused_write())
        }

        fn extract_required_data(&self, _input: &()) -> serde_json::Value {
            json!({})
        }

        fn error_fallback(&self) -> String {
            String::new()
        }
    }

    #[test]
    fn test_error_chain_skips_repeated_sources() {
        let err = StationError::Oracle(OracleError::Rejected("nope".into()));
        assert_eq!(
            error_chain(&err),
            "Oracle error: Response rejected by validator: nope"
        );
    }

    #[tokio::test]
    async fn test_error_details_include_hidden_sources() {
        let runner = StationRunner::new(Unwritable, "mock");
        let run = runner.execute(&()).await;

        assert!(run.metadata.error_occurred);
        assert_eq!(
            run.metadata.error_details.as_deref(),
            Some("Persistence error: IO error: write refused: quota exceeded")
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_processing() {
        let runner = StationRunner::new(Doubler::new(false), "mock")
            .with_cache(Arc::new(InMemoryCache::<i64>::new()));

        let first = runner.execute(&5).await;
        let second = runner.execute(&5).await;

        assert!(!first.metadata.cache_hit);
        assert!(second.metadata.cache_hit);
        assert_eq!(second.output, 10);
        assert_eq!(runner.station().calls.load(Ordering::SeqCst), 1);

        runner.clear_cache();
        let third = runner.execute(&5).await;
        assert!(!third.metadata.cache_hit);
        assert_eq!(runner.station().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let runner = StationRunner::new(Doubler::new(true), "mock")
            .with_cache(Arc::new(InMemoryCache::<i64>::new()));

        runner.execute(&5).await;
        let again = runner.execute(&5).await;
        assert!(!again.metadata.cache_hit);
        assert_eq!(runner.station().calls.load(Ordering::SeqCst), 2);
    }
}
