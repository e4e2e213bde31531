pub mod evaluate;
pub mod pipeline;
pub mod reformulate;
pub mod retrieve;

use requery_core::ExperimentConfig;
use std::path::Path;

/// Load the experiment config, falling back to built-in defaults when the
/// file is absent.
pub fn load_config(path: &Path) -> anyhow::Result<ExperimentConfig> {
    if path.exists() {
        Ok(ExperimentConfig::load(path)?)
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        Ok(ExperimentConfig::default())
    }
}
