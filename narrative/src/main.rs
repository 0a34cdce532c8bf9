//! Narrative conflict-network analyzer.
//!
//! Reads a prose file, runs the seven-station pipeline and writes
//! `final_report.json` and `visualization.json` to the output directory.
//!
//! ```bash
//! cargo run -p narrative -- novel.txt --project "My Novel" --output out
//! ```

use clap::Parser;
use narrative_core::{
    GeminiOracle, Model, OracleConfig, Pipeline, PipelineConfig, PipelineInput, PipelineResult,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "narrative", version, about = "Analyze the conflict network of a story")]
struct Args {
    /// Prose file to analyze
    file: PathBuf,

    /// Project name used in reports (defaults to the file stem)
    #[arg(long)]
    project: Option<String>,

    /// Directory for the generated artifacts
    #[arg(long)]
    output: Option<PathBuf>,

    /// Target episodes per season
    #[arg(long)]
    episodes_per_season: Option<usize>,

    /// Cache station outputs for repeated inputs
    #[arg(long)]
    cache: bool,

    /// Primary model (`pro`, `flash` or a full identifier)
    #[arg(long)]
    model: Option<String>,

    /// Fallback model, or `none` to disable fallback
    #[arg(long)]
    fallback_model: Option<String>,
}

impl Args {
    fn project_name(&self) -> String {
        self.project.clone().unwrap_or_else(|| {
            self.file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        })
    }

    fn oracle_config(&self) -> OracleConfig {
        let mut config = OracleConfig::from_env();
        if let Some(model) = &self.model {
            config = config.with_primary_model(Model::parse(model));
        }
        if let Some(model) = &self.fallback_model {
            config = config.with_fallback_model(match model.trim() {
                "" | "none" => None,
                name => Some(Model::parse(name)),
            });
        }
        config
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env().with_cache(self.cache);
        if let Some(dir) = &self.output {
            config = config.with_output_dir(dir);
        }
        if let Some(episodes) = self.episodes_per_season {
            config = config.with_episodes_per_season(episodes);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let api_key = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("Error: GEMINI_API_KEY environment variable not set.");
            eprintln!("Please set it in .env file or with: export GEMINI_API_KEY=your_key_here");
            return ExitCode::FAILURE;
        }
    };

    let full_text = match tokio::fs::read_to_string(&args.file).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let oracle = Arc::new(GeminiOracle::new(api_key, args.oracle_config()));
    let pipeline = Pipeline::new(oracle, args.pipeline_config());
    let input = PipelineInput::new(full_text, args.project_name())
        .with_prose_file_path(args.file.display().to_string());

    info!(
        file = %args.file.display(),
        output_dir = %pipeline.config().output_dir.display(),
        "Running analysis"
    );

    match pipeline.run_full_analysis(input).await {
        Ok(result) => {
            print_summary(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Analysis aborted");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(result: &PipelineResult) {
    let finalization = &result.station_outputs.station7.output;
    let report = &finalization.final_report;
    let assessment = &report.overall_assessment;

    println!("Project: {}", report.project_name);
    println!(
        "Overall: {:.1} ({})",
        assessment.overall_score,
        assessment.rating.name()
    );
    println!();
    println!("{}", report.executive_summary);

    let degraded = result.station_outputs.degraded_stations();
    if !degraded.is_empty() {
        let list: Vec<String> = degraded.iter().map(|n| n.to_string()).collect();
        println!();
        println!("Stations with fallback output: {}", list.join(", "));
    }

    println!();
    println!(
        "Completed {} stations in {} ms",
        result.pipeline_metadata.stations_completed, result.pipeline_metadata.total_execution_time
    );
    for path in &finalization.exported_files {
        println!("Wrote {}", path.display());
    }
}
