use anyhow::{Context, Result};
use std::{env, fs, path::PathBuf};

/// Runtime directory configuration, read from environment variables with
/// sensible defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for cached table payloads.
    pub cache_dir: PathBuf,
    /// Directory for processed CSV / spreadsheet outputs.
    pub outputs_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        let cache_dir = env::var("LOADMETRICS_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("runtime_cache/dataframes"));
        let outputs_dir = env::var("LOADMETRICS_OUTPUTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("outputs"));
        Settings {
            cache_dir,
            outputs_dir,
        }
    }

    /// Create the configured directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for d in [&self.cache_dir, &self.outputs_dir] {
            fs::create_dir_all(d)
                .with_context(|| format!("creating directory {}", d.display()))?;
        }
        Ok(())
    }
}
