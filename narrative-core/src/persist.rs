//! Artifact persistence.
//!
//! Analysis artifacts are written as pretty-printed UTF-8 JSON so they can
//! be read by people and diffed between runs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// File name of the final report inside the output directory.
pub const FINAL_REPORT_FILE: &str = "final_report.json";

/// File name of the visualization payload inside the output directory.
pub const VISUALIZATION_FILE: &str = "visualization.json";

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Create the output directory (and parents) if needed.
pub async fn prepare_output_dir(dir: impl AsRef<Path>) -> Result<PathBuf, PersistError> {
    let dir = dir.as_ref();
    if fs::try_exists(dir).await? && !fs::metadata(dir).await?.is_dir() {
        return Err(PersistError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).await?;
    Ok(dir.to_path_buf())
}

/// Write `value` to `path` as pretty-printed JSON.
pub async fn save_json<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), PersistError> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Read a JSON artifact back.
pub async fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, PersistError> {
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}
