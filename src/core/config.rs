//! Configuration management for Kinesis
//!
//! Supports environment variables, config files, and runtime overrides.
//! The extraction caps and resolver timings live here so there is a single
//! authoritative set of values.
//!
//! Config file location: ~/.config/kinesis/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{KinesisError, Result};
use crate::core::types::BackendMode;

/// Main configuration for Kinesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which backend a new session drives
    pub backend: BackendMode,
    /// Whether to show debug output
    #[serde(default)]
    pub debug: bool,
    /// Translation service configuration
    pub translator: TranslatorConfig,
    /// Structural (browser) backend configuration
    pub browser: BrowserConfig,
    /// Pixel (OS automation) backend configuration
    pub pixel: PixelConfig,
    /// State extraction and prompt bounding caps
    #[serde(default)]
    pub state: StateConfig,
}

/// Translation service configuration (OpenAI-compatible endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// Model used for command translation
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Ceiling on a single translation call in seconds
    pub timeout_secs: u64,
    /// Sampling temperature for translation
    pub temperature: f32,
}

/// Structural backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Session name for agent-browser isolation
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Ceiling on waiting for an element to become visible/attached in ms
    pub element_timeout_ms: u64,
    /// Ceiling on a navigation in ms
    pub navigate_timeout_ms: u64,
    /// Ceiling on waiting for the page load signal in ms
    pub load_timeout_ms: u64,
    /// Settle delay after a click in ms
    pub settle_ms: u64,
    /// Settle delay after a scroll in ms
    pub scroll_settle_ms: u64,
}

/// Pixel backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelConfig {
    /// Directory holding pre-registered template images
    pub template_dir: PathBuf,
    /// Similarity threshold for template matching (0.0 - 1.0)
    pub match_confidence: f64,
    /// Wall-clock ceiling on one target resolution in seconds
    pub find_timeout_secs: u64,
    /// Sleep between template-match retries in ms
    pub retry_interval_ms: u64,
    /// Settle delay after most actions in ms
    pub action_delay_ms: u64,
    /// Heuristic wait after navigation in seconds (no load signal exists)
    pub load_delay_secs: u64,
    /// Fixed scroll magnitude in wheel ticks
    pub scroll_amount: i32,
    /// Window-title substrings counted as evidence a browser is on screen
    pub window_titles: Vec<String>,
    /// Browser executable; falls back to platform defaults when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_path: Option<PathBuf>,
    /// Proxy passed to the spawned browser (e.g. "socks5://host:port")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Unpacked extension directories loaded into the spawned browser
    #[serde(default)]
    pub extensions: Vec<String>,
    /// When set, captured frames are also dumped here for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_dir: Option<PathBuf>,
}

/// State extraction and prompt bounding caps
///
/// These are the authoritative values; earlier revisions of the system
/// carried several diverging sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Hard cap on elements harvested per extraction
    pub max_elements: usize,
    /// Cap on elements serialized into the translation prompt
    pub max_prompt_elements: usize,
    /// Cap on visible-text characters sent to the translator
    pub max_visible_text: usize,
    /// Per-element visibility probe ceiling in ms
    pub visibility_probe_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: match env::var("KINESIS_BACKEND").as_deref() {
                Ok("pixel") | Ok("os") => BackendMode::Pixel,
                _ => BackendMode::Structural,
            },
            translator: TranslatorConfig::default(),
            browser: BrowserConfig::default(),
            pixel: PixelConfig::default(),
            state: StateConfig::default(),
            debug: env::var("KINESIS_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("KINESIS_TRANSLATOR_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            model: env::var("KINESIS_TRANSLATOR_MODEL")
                .unwrap_or_else(|_| "llama3-70b-8192".to_string()),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 180,
            temperature: 0.1,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            session_name: env::var("KINESIS_BROWSER_SESSION")
                .unwrap_or_else(|_| "kinesis".to_string()),
            headed: env::var("KINESIS_HEADED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            element_timeout_ms: 10_000,
            navigate_timeout_ms: 30_000,
            load_timeout_ms: 10_000,
            settle_ms: 1_000,
            scroll_settle_ms: 500,
        }
    }
}

impl Default for PixelConfig {
    fn default() -> Self {
        Self {
            template_dir: env::var("KINESIS_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Config::config_dir().join("templates")),
            match_confidence: 0.8,
            find_timeout_secs: 7,
            retry_interval_ms: 500,
            action_delay_ms: 500,
            load_delay_secs: 3,
            scroll_amount: 10,
            window_titles: vec![
                "chrome".to_string(),
                "chromium".to_string(),
                "firefox".to_string(),
                "edge".to_string(),
                "safari".to_string(),
            ],
            browser_path: None,
            proxy: None,
            extensions: Vec::new(),
            screenshot_dir: None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_elements: 30,
            max_prompt_elements: 25,
            max_visible_text: 2000,
            visibility_probe_ms: 500,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kinesis")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(KinesisError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| KinesisError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| KinesisError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| KinesisError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| KinesisError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| KinesisError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

impl TranslatorConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        env::var(&self.api_key_env).map_err(|_| {
            KinesisError::config(format!(
                "translation API key not set; export {}",
                self.api_key_env
            ))
        })
    }

    /// Translation call ceiling as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn navigate_timeout(&self) -> Duration {
        Duration::from_millis(self.navigate_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

impl PixelConfig {
    pub fn find_timeout(&self) -> Duration {
        Duration::from_secs(self.find_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn load_delay(&self) -> Duration {
        Duration::from_secs(self.load_delay_secs)
    }
}

impl StateConfig {
    pub fn visibility_probe(&self) -> Duration {
        Duration::from_millis(self.visibility_probe_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.translator.model, "llama3-70b-8192");
        assert_eq!(config.translator.timeout_secs, 180);
        assert_eq!(config.state.max_elements, 30);
        assert_eq!(config.state.max_prompt_elements, 25);
        assert_eq!(config.state.max_visible_text, 2000);
        assert_eq!(config.pixel.find_timeout_secs, 7);
        assert!((config.pixel.match_confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("translator"));
        assert!(toml_str.contains("max_elements"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.state.max_elements, config.state.max_elements);
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("kinesis"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.browser.element_timeout(), Duration::from_secs(10));
        assert_eq!(config.pixel.retry_interval(), Duration::from_millis(500));
        assert_eq!(config.state.visibility_probe(), Duration::from_millis(500));
    }
}
