// Configuration - JSON settings file for conversion, export and transport
// Every field has a default, so partial files are fine

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::{ExportOptions, RawOptions, ReconstructOptions};
use crate::fretboard::{FretboardMapper, Tuning, DEFAULT_MAX_FRETS};
use crate::stream::PERCUSSION_CHANNEL;
use crate::transport::TransportOptions;

const CONFIG_DIR: &str = "fretmap";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Highest playable fret
    pub max_frets: u8,

    /// Open notes, string 1 first
    pub tuning: Tuning,

    /// 0-based channel treated as drums
    pub percussion_channel: u8,

    pub raw: RawOptions,
    pub reconstruct: ReconstructOptions,
    pub transport: TransportOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_frets: DEFAULT_MAX_FRETS,
            tuning: Tuning::standard(),
            percussion_channel: PERCUSSION_CHANNEL,
            raw: RawOptions::default(),
            reconstruct: ReconstructOptions::default(),
            transport: TransportOptions::default(),
        }
    }
}

impl Config {
    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.percussion_channel > 15 {
            return Err(ConfigError::Invalid(format!(
                "percussion_channel {} is not a MIDI channel (0-15)",
                self.percussion_channel
            )));
        }
        if self.transport.ack_token.is_empty() {
            return Err(ConfigError::Invalid("transport.ack_token is empty".to_string()));
        }
        if self.reconstruct.ticks_per_quarter == 0 || self.reconstruct.ticks_per_quarter > 0x7FFF {
            return Err(ConfigError::Invalid(
                "reconstruct.ticks_per_quarter must be 1-32767".to_string(),
            ));
        }
        if !(self.reconstruct.bpm.is_finite() && self.reconstruct.bpm > 0.0) {
            return Err(ConfigError::Invalid("reconstruct.bpm must be positive".to_string()));
        }
        if self.reconstruct.velocity == 0 || self.reconstruct.velocity > 127 {
            return Err(ConfigError::Invalid("reconstruct.velocity must be 1-127".to_string()));
        }
        Ok(())
    }

    /// Assignment engine settings
    pub fn mapper(&self) -> FretboardMapper {
        FretboardMapper {
            tuning: self.tuning,
            max_frets: self.max_frets,
            percussion_channel: self.percussion_channel,
        }
    }

    /// Serializer settings
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            raw: self.raw,
            reconstruct: self.reconstruct.clone(),
            tuning: self.tuning,
        }
    }
}

/// `<config dir>/fretmap/config.json`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load and validate a config file
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: Config = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load the default config file, falling back to defaults when it does not exist
pub fn load_default_config() -> Result<Config, ConfigError> {
    match default_config_path() {
        Some(path) if path.exists() => {
            log::debug!("Loading config from {}", path.display());
            load_config(path)
        }
        _ => Ok(Config::default()),
    }
}
