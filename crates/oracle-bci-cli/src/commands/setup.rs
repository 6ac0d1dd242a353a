use std::path::Path;

use colored::Colorize;

use oracle_bci::{LinearModel, PipelineConfig, PipelineError, PipelineResult};

// ─── Init Model ─────────────────────────────────────────────────────────

pub fn cmd_init_model(path: &Path, force: bool) -> PipelineResult<()> {
    if path.exists() && !force {
        return Err(PipelineError::ConfigError {
            reason: format!(
                "'{}' already exists; pass --force to overwrite",
                path.display()
            ),
        });
    }
    LinearModel::lateralization().save(path)?;
    println!(
        "{} Wrote lateralization model to {}",
        "Done.".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}

// ─── Config ─────────────────────────────────────────────────────────────

pub fn cmd_config(config: &PipelineConfig) -> PipelineResult<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
