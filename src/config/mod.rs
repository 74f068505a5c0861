use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{CrawlError, Result};
use crate::sources::SiteConfig;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// User-defined sites, crawled under the `custom` category
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub categories: Vec<String>,
    pub articles_per_site: usize,
    pub max_concurrent_sites: usize,
    pub retry_attempts: u32,
    pub request_timeout: String, // "30s"
    pub fetch_delay_ms: (u64, u64),
    pub article_delay_ms: (u64, u64),
    pub min_words: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub proxy_url: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
    pub accept_invalid_certs: bool,
    pub randomize_user_agents: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub enabled: bool,
    pub headless: bool,
    pub page_timeout: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub summarizer: String, // "extractive", "huggingface"
    pub translator: String, // "huggingface", "none"
    pub summarization_model: String,
    pub translation_model: String,
    pub inference_url: String,
    pub api_token_env: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub format: String, // "json", "jsonl", "csv"
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            articles_per_site: 2,
            max_concurrent_sites: 4,
            retry_attempts: 3,
            request_timeout: "30s".to_string(),
            fetch_delay_ms: (1000, 3000),
            article_delay_ms: (2000, 4000),
            min_words: 30,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            accept_invalid_certs: true,
            randomize_user_agents: true,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            page_timeout: "30s".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            summarizer: "extractive".to_string(),
            translator: "huggingface".to_string(),
            summarization_model: "sshleifer/distilbart-cnn-12-6".to_string(),
            translation_model: "Helsinki-NLP/opus-mt-en-zh".to_string(),
            inference_url: "https://api-inference.huggingface.co/models".to_string(),
            api_token_env: "HF_API_TOKEN".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            file_name: "ai_news_summary".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Result<Duration> {
        FileConfigManager::parse_time_to_duration(&self.crawl.request_timeout)
    }

    pub fn page_timeout(&self) -> Result<Duration> {
        FileConfigManager::parse_time_to_duration(&self.browser.page_timeout)
    }

    /// Inference API token from the environment, if set and non-empty.
    pub fn api_token(&self) -> Option<String> {
        std::env::var(&self.models.api_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        let crawl = &config.crawl;
        if crawl.articles_per_site == 0 || crawl.articles_per_site > 50 {
            return Err(CrawlError::ConfigError("articles_per_site must be between 1 and 50".to_string()).into());
        }
        if crawl.max_concurrent_sites == 0 || crawl.max_concurrent_sites > 32 {
            return Err(CrawlError::ConfigError("max_concurrent_sites must be between 1 and 32".to_string()).into());
        }
        if crawl.retry_attempts > 10 {
            return Err(CrawlError::ConfigError("retry_attempts cannot exceed 10".to_string()).into());
        }
        Self::validate_delay_range("fetch_delay_ms", crawl.fetch_delay_ms)?;
        Self::validate_delay_range("article_delay_ms", crawl.article_delay_ms)?;

        if !Self::is_valid_time_format(&crawl.request_timeout) {
            return Err(CrawlError::ConfigError(format!("Invalid request_timeout format '{}', expected format like '30s', '1m'", crawl.request_timeout)).into());
        }
        if !Self::is_valid_time_format(&config.browser.page_timeout) {
            return Err(CrawlError::ConfigError(format!("Invalid page_timeout format '{}', expected format like '30s', '1m'", config.browser.page_timeout)).into());
        }

        // checking proxy if provided
        if let Some(ref proxy) = config.network.proxy_url {
            let valid_schemes = ["http://", "https://", "socks5://"];
            if !valid_schemes.iter().any(|scheme| proxy.starts_with(scheme)) {
                return Err(CrawlError::ConfigError(format!("Invalid proxy '{}', expected http://, https:// or socks5:// URL", proxy)).into());
            }
        }

        let valid_summarizers = ["extractive", "huggingface"];
        if !valid_summarizers.contains(&config.models.summarizer.as_str()) {
            return Err(CrawlError::ConfigError(format!("Invalid summarizer '{}', must be one of: {:?}", config.models.summarizer, valid_summarizers)).into());
        }
        let valid_translators = ["huggingface", "none"];
        if !valid_translators.contains(&config.models.translator.as_str()) {
            return Err(CrawlError::ConfigError(format!("Invalid translator '{}', must be one of: {:?}", config.models.translator, valid_translators)).into());
        }

        let valid_formats = ["json", "jsonl", "csv"];
        if !valid_formats.contains(&config.output.format.as_str()) {
            return Err(CrawlError::ConfigError(format!("Invalid output format '{}', must be one of: {:?}", config.output.format, valid_formats)).into());
        }
        if config.output.file_name.trim().is_empty() {
            return Err(CrawlError::ConfigError("output file_name cannot be empty".to_string()).into());
        }

        for (name, site) in &config.sites {
            if url::Url::parse(&site.url).is_err() {
                return Err(CrawlError::ConfigError(format!("Site '{}' has an invalid url '{}'", name, site.url)).into());
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to serialize default config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| CrawlError::ConfigError(format!("Failed to create config directory: {}", e)))?;
            }
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }

    fn validate_delay_range(field: &str, range: (u64, u64)) -> Result<()> {
        if range.0 > range.1 {
            return Err(CrawlError::ConfigError(format!("{} minimum must not exceed maximum", field)).into());
        }
        if range.1 > 60000 {
            return Err(CrawlError::ConfigError(format!("{} maximum cannot exceed 60 seconds", field)).into());
        }
        Ok(())
    }

    /// Validate time format (e.g., "30s", "5m", "1h")
    fn is_valid_time_format(time_str: &str) -> bool {
        Self::parse_time_to_duration(time_str).is_ok()
    }

    /// Parse time string to duration
    pub fn parse_time_to_duration(time_str: &str) -> Result<Duration> {
        let time_str = time_str.trim().to_lowercase();
        let multipliers: [(&str, u64); 4] = [
            ("s", 1),
            ("m", 60),
            ("h", 3600),
            ("d", 86400),
        ];

        for (suffix, multiplier) in &multipliers {
            if let Some(number_part) = time_str.strip_suffix(suffix) {
                let number: u64 = number_part.parse()
                    .map_err(|_| CrawlError::ConfigError(format!("Invalid time format: {}", time_str)))?;
                let seconds = number
                    .checked_mul(*multiplier)
                    .ok_or_else(|| CrawlError::ConfigError(format!("Time value too large: {}", time_str)))?;
                return Ok(Duration::from_secs(seconds));
            }
        }

        Err(CrawlError::ConfigError(format!("Invalid time format: {}", time_str)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = FileConfigManager::new(config_path.clone());

        let config = manager.load_config().await.unwrap();

        assert!(config.crawl.categories.is_empty());
        assert_eq!(config.crawl.articles_per_site, 2);
        assert_eq!(config.crawl.retry_attempts, 3);
        assert_eq!(config.output.format, "json");
        assert_eq!(config.models.translation_model, "Helsinki-NLP/opus-mt-en-zh");
        assert!(config_path.exists());
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[crawl]
categories = ["ai", "arxiv"]
articles_per_site = 5

[sites."Example Blog"]
url = "https://blog.example.com/"
article_selector = "article"
title_selector = "h2"
link_selector = "h2 a"
content_selector = ".post-body"
"#,
        )
        .unwrap();

        let config = FileConfigManager::new(config_path).load_config().await.unwrap();
        assert_eq!(config.crawl.categories, vec!["ai", "arxiv"]);
        assert_eq!(config.crawl.articles_per_site, 5);
        assert_eq!(config.crawl.max_concurrent_sites, 4);
        assert_eq!(config.models.summarizer, "extractive");
        assert_eq!(config.sites["Example Blog"].content_selector, ".post-body");
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = FileConfigManager::new(config_path);

        let mut config = Config::default();
        config.crawl.categories = vec!["web3".to_string()];
        config.output.format = "csv".to_string();
        manager.save_config(&config).await.unwrap();

        let reloaded = manager.load_config().await.unwrap();
        assert_eq!(reloaded.crawl.categories, vec!["web3"]);
        assert_eq!(reloaded.output.format, "csv");
    }

    #[tokio::test]
    async fn test_config_validation() {
        let manager = FileConfigManager::new(PathBuf::from("test.toml"));

        assert!(manager.validate_config(&Config::default()).is_ok());

        let mut invalid = Config::default();
        invalid.crawl.articles_per_site = 0;
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.crawl.max_concurrent_sites = 100;
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.crawl.fetch_delay_ms = (5000, 1000);
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.crawl.article_delay_ms = (0, 120_000);
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.network.proxy_url = Some("proxy.example.com:8010".to_string());
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.models.summarizer = "gpt".to_string();
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.output.format = "xml".to_string();
        assert!(manager.validate_config(&invalid).is_err());

        let mut invalid = Config::default();
        invalid.crawl.request_timeout = "soon".to_string();
        assert!(manager.validate_config(&invalid).is_err());

        // equal bounds mean a fixed delay
        let mut fixed = Config::default();
        fixed.crawl.article_delay_ms = (0, 0);
        assert!(manager.validate_config(&fixed).is_ok());
    }

    #[test]
    fn test_parse_time_to_duration() {
        assert_eq!(FileConfigManager::parse_time_to_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(FileConfigManager::parse_time_to_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(FileConfigManager::parse_time_to_duration("1H").unwrap(), Duration::from_secs(3600));
        assert_eq!(FileConfigManager::parse_time_to_duration("1d").unwrap(), Duration::from_secs(86400));
        assert!(FileConfigManager::parse_time_to_duration("invalid").is_err());
        assert!(FileConfigManager::parse_time_to_duration("100").is_err());

        let err = FileConfigManager::parse_time_to_duration("300000000000000d").unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_api_token_from_env() {
        let mut config = Config::default();
        config.models.api_token_env = "AI_NEWS_DIGEST_TEST_TOKEN".to_string();
        std::env::remove_var("AI_NEWS_DIGEST_TEST_TOKEN");
        assert!(config.api_token().is_none());

        std::env::set_var("AI_NEWS_DIGEST_TEST_TOKEN", "hf_abc");
        assert_eq!(config.api_token().as_deref(), Some("hf_abc"));
        std::env::remove_var("AI_NEWS_DIGEST_TEST_TOKEN");
    }
}
