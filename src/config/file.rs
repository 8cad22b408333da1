//! TOML configuration file loading
//!
//! Supports `~/.config/voice-helper/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct HelperConfigFile {
    /// Assistant name (e.g. "Helper")
    pub name: Option<String>,

    /// Memory file location
    pub memory_path: Option<String>,

    /// Periodic memory save interval in seconds
    pub autosave_secs: Option<u64>,

    /// Maximum cached responses
    pub cache_capacity: Option<usize>,

    /// Generation backend configuration
    #[serde(default)]
    pub generation: GenerationFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Generation backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    /// Ollama base URL
    pub url: Option<String>,

    /// Model name (e.g. "tinyllama")
    pub model: Option<String>,

    /// Pull the model before the session starts
    pub pull_on_startup: Option<bool>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub enabled: Option<bool>,
    pub listen_timeout_secs: Option<f64>,
    pub phrase_limit_secs: Option<f64>,
    pub energy_threshold: Option<f32>,
    pub stt_url: Option<String>,
    pub stt_model: Option<String>,
    pub tts_url: Option<String>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_speed: Option<f64>,
    pub filler_probability: Option<f64>,
    pub fillers: Option<Vec<String>>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> Result<HelperConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `HelperConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> HelperConfigFile {
    let Some(path) = config_file_path() else {
        return HelperConfigFile::default();
    };

    if !path.exists() {
        return HelperConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                HelperConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            HelperConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-helper/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-helper").join("config.toml"))
}
