use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the subtitle exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fetch scheduling and provider settings
    pub fetch: FetchConfig,

    /// Output and file naming settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of simultaneous in-flight transcript requests
    pub max_concurrent: usize,

    /// Lower bound of the randomized pre-request delay (seconds)
    pub min_delay_secs: f64,

    /// Upper bound of the randomized pre-request delay (seconds)
    pub max_delay_secs: f64,

    /// Maximum retries on throttling signals
    pub retry_count: u32,

    /// Base delay for exponential backoff between retries (seconds)
    pub backoff_base_secs: f64,

    /// Subtitle language preference order
    pub languages: Vec<String>,

    /// Request a server-side translated track into this language when no
    /// preferred language is natively available (None = first preference)
    pub translate_to: Option<String>,

    /// Cap on enumerated videos per run (0 = unlimited)
    pub max_videos: usize,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination directory; derived from the input when unset
    pub dir: Option<PathBuf>,

    /// Maximum length of a sanitized filename, in characters
    pub max_filename_len: usize,
}

impl FetchConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs_f64(self.min_delay_secs.max(0.0))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay_secs.max(self.min_delay_secs).max(0.0))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_base_secs.max(0.0))
    }
}

impl Config {
    /// Load configuration from the first readable config file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "ytsub.toml",
            "config/ytsub.toml",
            "~/.config/ytsub/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment variables
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(workers) = std::env::var("YTSUB_MAX_CONCURRENT") {
            config.fetch.max_concurrent = workers.parse().unwrap_or(config.fetch.max_concurrent);
        }

        if let Ok(retries) = std::env::var("YTSUB_RETRY_COUNT") {
            config.fetch.retry_count = retries.parse().unwrap_or(config.fetch.retry_count);
        }

        if let Ok(langs) = std::env::var("YTSUB_LANGUAGES") {
            let langs: Vec<String> = langs
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !langs.is_empty() {
                config.fetch.languages = langs;
            }
        }

        if let Ok(dir) = std::env::var("YTSUB_OUTPUT_DIR") {
            config.output.dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent == 0 {
            return Err(anyhow!("max_concurrent must be greater than 0"));
        }

        if self.fetch.min_delay_secs < 0.0 || self.fetch.max_delay_secs < 0.0 {
            return Err(anyhow!("delay bounds must be non-negative"));
        }

        if self.fetch.max_delay_secs < self.fetch.min_delay_secs {
            return Err(anyhow!("max_delay_secs must be >= min_delay_secs"));
        }

        if self.fetch.languages.is_empty() {
            return Err(anyhow!("at least one subtitle language is required"));
        }

        if self.output.max_filename_len == 0 {
            return Err(anyhow!("max_filename_len must be greater than 0"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig {
                max_concurrent: 3,
                min_delay_secs: 0.5,
                max_delay_secs: 2.0,
                retry_count: 3,
                backoff_base_secs: 1.0,
                languages: vec![
                    "zh-TW".to_string(),
                    "zh-Hant".to_string(),
                    "zh-HK".to_string(),
                    "en".to_string(),
                ],
                translate_to: None,
                max_videos: 0,
                request_timeout_secs: 30,
            },
            output: OutputConfig {
                dir: None,
                max_filename_len: 150,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.fetch.max_concurrent = max_concurrent;
        self
    }

    pub fn with_delay_range(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.config.fetch.min_delay_secs = min_secs;
        self.config.fetch.max_delay_secs = max_secs;
        self
    }

    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.config.fetch.retry_count = retries;
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.config.fetch.languages = languages;
        self
    }

    pub fn with_translate_to(mut self, language: Option<String>) -> Self {
        self.config.fetch.translate_to = language;
        self
    }

    pub fn with_max_videos(mut self, max_videos: usize) -> Self {
        self.config.fetch.max_videos = max_videos;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.dir = Some(dir);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.max_concurrent, 3);
        assert_eq!(config.fetch.retry_count, 3);
        assert_eq!(config.output.max_filename_len, 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_max_concurrent(5)
            .with_delay_range(0.1, 0.3)
            .with_languages(vec!["en".to_string()])
            .with_max_videos(50)
            .build();

        assert_eq!(config.fetch.max_concurrent, 5);
        assert_eq!(config.fetch.min_delay_secs, 0.1);
        assert_eq!(config.fetch.languages, vec!["en"]);
        assert_eq!(config.fetch.max_videos, 50);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.fetch.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.max_delay_secs = 0.1;
        config.fetch.min_delay_secs = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.languages.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delay_accessors_clamp() {
        let mut config = Config::default();
        config.fetch.min_delay_secs = -1.0;
        assert_eq!(config.fetch.min_delay(), Duration::from_secs(0));
        assert!(config.fetch.max_delay() >= config.fetch.min_delay());
    }
}
