//! Conflict-network analysis for narrative prose.
//!
//! This crate provides:
//! - A seven-station pipeline from raw text to a final report
//! - A typed network of characters, relationships and conflicts
//! - Deterministic efficiency, diagnostic, evolution and episodic analysis
//! - A Gemini-backed oracle for the interpretive stages
//!
//! # Quick Start
//!
//! ```ignore
//! use narrative_core::{GeminiOracle, Pipeline, PipelineConfig, PipelineInput};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let oracle = Arc::new(GeminiOracle::from_env()?);
//!     let pipeline = Pipeline::new(oracle, PipelineConfig::new().with_output_dir("out"));
//!
//!     let text = std::fs::read_to_string("novel.txt")?;
//!     let result = pipeline
//!         .run_full_analysis(PipelineInput::new(text, "My Novel"))
//!         .await?;
//!
//!     let report = &result.station_outputs.station7.output.final_report;
//!     println!("{}", report.executive_summary);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod network;
pub mod oracle;
pub mod persist;
pub mod pipeline;
pub mod station;
pub mod stations;
pub mod testing;

pub use gemini::Model;

// Primary public API
pub use network::{Character, Conflict, ConflictNetwork, Relationship};
pub use oracle::{GeminiOracle, Oracle, OracleConfig, OracleError, OracleRequest, OracleResponse};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineInput, PipelineMetadata, PipelineResult,
    StationOutputs, StationStatus,
};
pub use station::{Station, StationRun, StationRunner};
pub use testing::MockOracle;
