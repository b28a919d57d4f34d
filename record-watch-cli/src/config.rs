//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use record_watch_core::{FieldValue, WatchConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from a scenario TOML file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub watch: WatchConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted input of a replay
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// The record source pushes a snapshot
    Record {
        /// Record the snapshot belongs to (default: the watched record)
        #[serde(default)]
        id: Option<String>,
        /// Field value; absent means null
        #[serde(default)]
        value: Option<FieldValue>,
        /// Deliver the snapshot without the watched field
        #[serde(default)]
        missing_field: bool,
    },
    /// The record source reports an error
    SourceError { message: String },
    /// A change event is published on the watched object's channel
    ChangeEvent {
        #[serde(default)]
        record_ids: Vec<String>,
        /// Raw JSON message, used instead of `record_ids` when present
        #[serde(default)]
        raw: Option<String>,
    },
    /// Move the virtual clock forward
    Advance { ms: u64 },
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate(&config).with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if !config.watch.is_enabled() {
        log::warn!("Watch has no object or record id; nothing will be compared");
    }
    config.watch.validate()?;

    for (idx, step) in config.steps.iter().enumerate() {
        if let Step::ChangeEvent { raw: Some(raw), .. } = step {
            serde_json::from_str::<serde_json::Value>(raw)
                .with_context(|| format!("Step {}: raw change event is not valid JSON", idx + 1))?;
        }
        if let Step::Record { value: Some(_), missing_field: true, .. } = step {
            bail!("Step {}: a record step cannot have both a value and missing_field", idx + 1);
        }
    }

    Ok(())
}
