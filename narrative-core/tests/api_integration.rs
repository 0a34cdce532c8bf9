//! Integration tests that call the real Gemini API.
//!
//! These tests require GEMINI_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p narrative-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (API calls take seconds)

use narrative_core::oracle::{is_raw, string_list};
use narrative_core::station::StageStatus;
use narrative_core::{
    GeminiOracle, Model, Oracle, OracleConfig, OracleRequest, Pipeline, PipelineConfig,
    PipelineInput,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const STORY: &str = "Queen Mara lay dying, and her two children circled the throne. \
Elias, the elder, had the army's loyalty; Wren had the treasury and the ear of the \
priests. Their old tutor Sable tried to keep the peace between them, but Elias \
suspected her of favouring Wren. When Mara died, Wren sealed the treasury and Elias \
marched on the capital. Sable rode out alone to meet him at the river crossing.";

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("GEMINI_API_KEY").is_ok_and(|key| !key.trim().is_empty())
}

fn flash_oracle() -> GeminiOracle {
    let key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY checked above");
    GeminiOracle::new(
        key,
        OracleConfig::default()
            .with_primary_model(Model::Flash)
            .with_fallback_model(None)
            .with_max_tokens(2048)
            .with_timeout(Duration::from_secs(90)),
    )
}

#[tokio::test]
#[ignore] // Run with: cargo test -p narrative-core --test api_integration -- --ignored
async fn test_oracle_returns_structured_content() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GEMINI_API_KEY not set");
        return;
    }

    let oracle = flash_oracle();
    let response = oracle
        .generate(
            OracleRequest::new(
                "List the named characters in this story. Respond with JSON: \
                 {\"characters\": [\"name\", ...]}",
            )
            .with_context(STORY),
        )
        .await
        .expect("oracle should respond");

    assert!(response.model.starts_with(Model::Flash.as_str()));
    assert!(!is_raw(&response.content), "content should parse: {}", response.content);
    let characters = string_list(&response.content, "characters");
    assert!(
        characters.iter().any(|c| c.contains("Elias")),
        "expected Elias among {characters:?}"
    );
    assert!(response.usage.total_tokens > 0);
}

#[tokio::test]
#[ignore] // Run with: cargo test -p narrative-core --test api_integration -- --ignored
async fn test_full_pipeline_against_live_model() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GEMINI_API_KEY not set");
        return;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let pipeline = Pipeline::new(
        Arc::new(flash_oracle()),
        PipelineConfig::new().with_output_dir(temp_dir.path()),
    );

    let result = pipeline
        .run_full_analysis(PipelineInput::new(STORY, "The Crossing"))
        .await
        .expect("pipeline should finish");

    let outputs = &result.station_outputs;
    assert_ne!(outputs.station1.output.metadata.status, StageStatus::Failed);
    assert!(
        !outputs.station3.output.conflict_network.is_empty(),
        "live model should produce a network"
    );
    assert_eq!(outputs.station7.output.exported_files.len(), 2);
    for path in &outputs.station7.output.exported_files {
        assert!(path.exists(), "{} should exist", path.display());
    }
}
