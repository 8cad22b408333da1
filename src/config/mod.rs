//! Configuration management for the voice helper
//!
//! Every setting resolves as env > TOML file > default.

pub mod file;

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use self::file::HelperConfigFile;
use crate::cache::DEFAULT_CAPACITY;
use crate::generation::ollama::DEFAULT_URL;
use crate::{Error, Result};

/// Voice helper configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant name, used in the greeting and printed replies
    pub name: String,

    /// Memory snapshot file
    pub memory_path: PathBuf,

    /// Periodic memory save interval; off when unset
    pub autosave_secs: Option<u64>,

    /// Maximum cached responses
    pub cache_capacity: NonZeroUsize,

    /// Generation backend configuration
    pub generation: GenerationConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Generation backend configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Ollama base URL
    pub url: String,

    /// Model name
    pub model: String,

    /// Pull the model before the session starts
    pub pull_on_startup: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Use microphone and speakers; text mode otherwise
    pub enabled: bool,

    /// Seconds to wait for speech to start
    pub listen_timeout_secs: f64,

    /// Longest phrase in seconds
    pub phrase_limit_secs: f64,

    /// RMS level above which audio counts as speech
    pub energy_threshold: f32,

    /// OpenAI-compatible STT base URL
    pub stt_url: String,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// OpenAI-compatible TTS base URL
    pub tts_url: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Chance of a filler before a reply
    pub filler_probability: f64,

    /// Filler words
    pub fillers: Vec<String>,
}

impl VoiceConfig {
    /// Listen timeout as a duration
    #[must_use]
    pub fn listen_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.listen_timeout_secs).unwrap_or(Duration::from_secs(3))
    }

    /// Phrase limit as a duration
    #[must_use]
    pub fn phrase_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.phrase_limit_secs).unwrap_or(Duration::from_secs(5))
    }
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (for Whisper and TTS)
    pub openai: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok(), disable_voice)
    }

    /// Assemble configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range
    pub fn from_sources(
        fc: HelperConfigFile,
        env: impl Fn(&str) -> Option<String>,
        disable_voice: bool,
    ) -> Result<Self> {
        let parsed = |key: &str| env(key).and_then(|s| s.parse::<u64>().ok());

        let name = env("HELPER_NAME")
            .or(fc.name)
            .unwrap_or_else(|| "Helper".to_string());

        let memory_path = env("HELPER_MEMORY_PATH")
            .or(fc.memory_path)
            .map_or_else(default_memory_path, PathBuf::from);

        let autosave_secs = parsed("HELPER_AUTOSAVE_SECS")
            .or(fc.autosave_secs)
            .filter(|s| *s > 0);

        let capacity = env("HELPER_CACHE_CAPACITY")
            .and_then(|s| s.parse().ok())
            .or(fc.cache_capacity)
            .unwrap_or(DEFAULT_CAPACITY);
        let cache_capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::Config("cache capacity must be at least 1".to_string()))?;

        let generation = GenerationConfig {
            url: env("OLLAMA_HOST")
                .or(fc.generation.url)
                .map_or_else(|| DEFAULT_URL.to_string(), |u| normalize_host(&u)),
            model: env("HELPER_MODEL")
                .or(fc.generation.model)
                .unwrap_or_else(|| "tinyllama".to_string()),
            pull_on_startup: env("HELPER_PULL_MODEL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.generation.pull_on_startup)
                .unwrap_or(true),
            timeout_secs: parsed("HELPER_GENERATION_TIMEOUT")
                .or(fc.generation.timeout_secs)
                .unwrap_or(120),
        };

        let fv = fc.voice;
        let voice = VoiceConfig {
            enabled: !disable_voice && fv.enabled.unwrap_or(true),
            listen_timeout_secs: fv.listen_timeout_secs.unwrap_or(3.0),
            phrase_limit_secs: fv.phrase_limit_secs.unwrap_or(5.0),
            energy_threshold: fv.energy_threshold.unwrap_or(0.01),
            stt_url: env("HELPER_STT_URL")
                .or(fv.stt_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            stt_model: env("HELPER_STT_MODEL")
                .or(fv.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_url: env("HELPER_TTS_URL")
                .or(fv.tts_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            tts_model: env("HELPER_TTS_MODEL")
                .or(fv.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: fv.tts_voice.unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fv.tts_speed.unwrap_or(1.0),
            filler_probability: fv.filler_probability.unwrap_or(0.2),
            fillers: fv
                .fillers
                .unwrap_or_else(|| ["ok", "hmm", "ah"].map(String::from).to_vec()),
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled, using text mode");
        }

        if voice.listen_timeout_secs <= 0.0 || voice.phrase_limit_secs <= 0.0 {
            return Err(Error::Config(
                "listen timeout and phrase limit must be positive".to_string(),
            ));
        }

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
        };

        Ok(Self {
            name,
            memory_path,
            autosave_secs,
            cache_capacity,
            generation,
            voice,
            api_keys,
        })
    }
}

/// Default memory file: `~/.local/share/voice-helper/assistant_memory.json`
fn default_memory_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("assistant_memory.json"),
        |d| d.data_dir().join("voice-helper").join("assistant_memory.json"),
    )
}

/// `OLLAMA_HOST` may be a bare `host:port`
fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(HelperConfigFile::default(), env_of(&[]), false).unwrap();

        assert_eq!(config.name, "Helper");
        assert_eq!(config.cache_capacity.get(), 100);
        assert_eq!(config.generation.url, DEFAULT_URL);
        assert_eq!(config.generation.model, "tinyllama");
        assert!(config.generation.pull_on_startup);
        assert!(config.voice.enabled);
        assert_eq!(config.voice.listen_timeout(), Duration::from_secs(3));
        assert_eq!(config.voice.phrase_limit(), Duration::from_secs(5));
        assert_eq!(config.voice.fillers, ["ok", "hmm", "ah"]);
        assert!(config.autosave_secs.is_none());
        assert!(config.memory_path.ends_with("assistant_memory.json"));
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config(
            r#"
            name = "FromFile"
            [generation]
            model = "llama3"
            url = "http://gpu-box:11434"
            "#,
        )
        .unwrap();
        let env = env_of(&[("HELPER_MODEL", "phi3"), ("HELPER_MEMORY_PATH", "/tmp/mem.json")]);

        let config = Config::from_sources(fc, env, false).unwrap();

        assert_eq!(config.name, "FromFile");
        assert_eq!(config.generation.model, "phi3");
        assert_eq!(config.generation.url, "http://gpu-box:11434");
        assert_eq!(config.memory_path, PathBuf::from("/tmp/mem.json"));
    }

    #[test]
    fn test_bare_ollama_host() {
        let env = env_of(&[("OLLAMA_HOST", "127.0.0.1:11434")]);
        let config = Config::from_sources(HelperConfigFile::default(), env, false).unwrap();
        assert_eq!(config.generation.url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let env = env_of(&[("HELPER_CACHE_CAPACITY", "0")]);
        let err = Config::from_sources(HelperConfigFile::default(), env, false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_disable_voice_wins() {
        let config = Config::from_sources(HelperConfigFile::default(), env_of(&[]), true).unwrap();
        assert!(!config.voice.enabled);
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let env = env_of(&[("OPENAI_API_KEY", "sk-secret")]);
        let config = Config::from_sources(HelperConfigFile::default(), env, false).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert_eq!(config.api_keys.openai.as_deref(), Some("sk-secret"));
    }
}
