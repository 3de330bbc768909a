use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::club_names::ClubNameMapping;
use crate::types::FinishedStrategy;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_CACHE_FILE: &str = "sent_results_cache.txt";

const PRODUCTION_API_URL: &str = "https://domingoasdez.com/api";
const DEVELOPMENT_API_URL: &str = "http://127.0.0.1:8000/api";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "prod" | "production" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_API_URL,
            Environment::Development => DEVELOPMENT_API_URL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScrapingConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub finished_strategy: FinishedStrategy,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://afpbarcelos.pt/".to_string(),
            request_timeout_secs: 10,
            min_delay_ms: 500,
            max_delay_ms: 1000,
            finished_strategy: FinishedStrategy::DetailPage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub active_sleep_secs: u64,
    pub idle_sleep_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            active_sleep_secs: 30,
            idle_sleep_secs: 600,
        }
    }
}

/// Contents of the JSON config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub club_names_map: Option<Vec<ClubNameMapping>>,
    pub domingo_as_dez_api_key: Option<String>,
    pub environment: Option<String>,
    pub reference_api_url: Option<String>,
    pub cache_file: Option<String>,
    pub scraping: Option<ScrapingConfig>,
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlerConfig {
    pub environment: Environment,
    pub reference_api_url: Option<String>,
    pub api_key: Option<String>,
    pub club_names_map: Option<Vec<ClubNameMapping>>,
    pub cache_file: String,
    pub scraping: ScrapingConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            reference_api_url: None,
            api_key: None,
            club_names_map: None,
            cache_file: DEFAULT_CACHE_FILE.to_string(),
            scraping: ScrapingConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Builds the config from the JSON file (when present) and then the environment,
    /// with environment variables taking precedence.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let explicit = config_path
            .map(Path::to_path_buf)
            .or_else(|| env::var("CRAWLER_CONFIG_FILE").ok().map(Into::into));

        let file = match explicit {
            Some(path) => Some(ConfigFile::read(&path)?),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Some(ConfigFile::read(Path::new(DEFAULT_CONFIG_FILE))?)
            }
            None => None,
        };

        let mut config = Self::default();
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_env();
        Ok(config)
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if file.club_names_map.is_some() {
            self.club_names_map = file.club_names_map;
        }
        if let Some(key) = file.domingo_as_dez_api_key {
            self.api_key = Some(key);
        }
        if let Some(environment) = file.environment {
            self.environment = Environment::from_name(&environment);
        }
        if let Some(url) = file.reference_api_url {
            self.reference_api_url = Some(url);
        }
        if let Some(cache_file) = file.cache_file {
            self.cache_file = cache_file;
        }
        if let Some(scraping) = file.scraping {
            self.scraping = scraping;
        }
        if let Some(scheduler) = file.scheduler {
            self.scheduler = scheduler;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(name) = env::var("CRAWLER_ENV").or_else(|_| env::var("NODE_ENV")) {
            self.environment = Environment::from_name(&name);
        }
        if let Ok(url) = env::var("REFERENCE_API_URL") {
            self.reference_api_url = Some(url);
        }
        if let Ok(key) = env::var("DOMINGO_AS_DEZ_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(cache_file) = env::var("SENT_CACHE_FILE") {
            self.cache_file = cache_file;
        }
        if let Ok(base_url) = env::var("SCRAPER_BASE_URL") {
            self.scraping.base_url = base_url;
        }
        if let Some(timeout) = env_u64("SCRAPER_TIMEOUT_SECS") {
            self.scraping.request_timeout_secs = timeout;
        }
        if let Some(secs) = env_u64("ACTIVE_SLEEP_SECS") {
            self.scheduler.active_sleep_secs = secs;
        }
        if let Some(secs) = env_u64("IDLE_SLEEP_SECS") {
            self.scheduler.idle_sleep_secs = secs;
        }
    }

    pub fn api_base_url(&self) -> String {
        self.reference_api_url
            .clone()
            .unwrap_or_else(|| self.environment.api_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|value| value.parse::<u64>().ok())
}
