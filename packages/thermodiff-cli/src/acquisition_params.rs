use crate::cli::AcquisitionArgs;
use anyhow::{Context, Result};
use std::path::PathBuf;
use thermodiff::AcquisitionConfig;

/// Merge the optional config file with command-line overrides and validate.
pub fn build_config(args: &AcquisitionArgs) -> Result<AcquisitionConfig> {
    let mut config = match &args.config {
        Some(path) => AcquisitionConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => AcquisitionConfig::default(),
    };

    if let Some(duration) = args.duration {
        config.duration_secs = duration;
    }
    if let Some(warmup) = args.warmup {
        config.warmup_samples = warmup;
    }
    if let Some(mode) = args.mode {
        config.mode = mode.into();
        // Columns from the file may belong to the other mode
        if args.columns.is_none() {
            config.columns = None;
        }
    }
    if let Some(columns) = &args.columns {
        config.columns = Some(columns.clone());
    }
    if let Some(coefficients) = &args.coefficients {
        config.coefficients = coefficients.clone();
    }

    config.validate().context("Invalid acquisition configuration")?;
    Ok(config)
}

/// `<local time>-thermodiff.csv` in the working directory
pub fn default_output_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    PathBuf::from(format!("{}-thermodiff.csv", stamp))
}
