use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("sync.state_files cannot be empty when sync is enabled")]
    NoStateFiles,
    #[error("invalid state file name '{0}': must be a plain .json file name")]
    InvalidStateFile(String),
    #[error("sync.images_dir must be a single folder name, got '{0}'")]
    InvalidImagesDir(String),
    #[error("sync.remote_root must be empty or start with '/', got '{0}'")]
    InvalidRemoteRoot(String),
    #[error("at least one metadata provider must be enabled")]
    NoProviders,
}

/// Which metadata providers are queried and how hard we may hit them
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_true")]
    pub anilist: bool,
    #[serde(default = "default_true")]
    pub shikimori: bool,
    #[serde(default = "default_true")]
    pub jikan: bool,
    /// TMDB also needs an API key in the credential store
    #[serde(default = "default_true")]
    pub tmdb: bool,
    #[serde(default = "default_tmdb_language")]
    pub tmdb_language: String,
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Remote folder the library is mirrored into ("" is the app folder root)
    #[serde(default)]
    pub remote_root: String,
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    #[serde(default = "default_state_files")]
    pub state_files: Vec<String>,
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: i64,
    #[serde(default = "default_upload_pause_ms")]
    pub upload_pause_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Cron expression (with seconds field) for the bulk episode-update scan
    #[serde(default = "default_update_check_schedule")]
    pub update_check_schedule: String,
    #[serde(default = "default_sync_schedule")]
    pub sync_schedule: String,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_true() -> bool {
    true
}

fn default_tmdb_language() -> String {
    "en-US".to_string()
}

fn default_rate_limit_delay_ms() -> u64 {
    1200
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_images_dir() -> String {
    "images".to_string()
}

pub fn default_state_files() -> Vec<String> {
    vec![
        "titles.json".to_string(),
        "pending_updates.json".to_string(),
        "ignored_updates.json".to_string(),
    ]
}

fn default_tolerance_ms() -> i64 {
    5000
}

fn default_upload_pause_ms() -> u64 {
    250
}

fn default_debounce_ms() -> u64 {
    3000
}

fn default_update_check_schedule() -> String {
    "0 0 */12 * * *".to_string() // Every 12 hours
}

fn default_sync_schedule() -> String {
    "0 */30 * * * *".to_string() // Every 30 minutes
}

pub fn default_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        update_check_schedule: default_update_check_schedule(),
        sync_schedule: default_sync_schedule(),
        run_on_startup: default_true(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anilist: true,
            shikimori: true,
            jikan: true,
            tmdb: true,
            tmdb_language: default_tmdb_language(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_root: String::new(),
            images_dir: default_images_dir(),
            state_files: default_state_files(),
            tolerance_ms: default_tolerance_ms(),
            upload_pause_ms: default_upload_pause_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file, falling back to defaults when it does not exist yet
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let providers = &self.providers;
        if !(providers.anilist || providers.shikimori || providers.jikan || providers.tmdb) {
            return Err(ConfigError::NoProviders);
        }
        if providers.request_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("providers.request_timeout_secs"));
        }

        let sync = &self.sync;
        if sync.tolerance_ms < 0 {
            return Err(ConfigError::NotPositive("sync.tolerance_ms"));
        }
        if sync.enabled && sync.state_files.is_empty() {
            return Err(ConfigError::NoStateFiles);
        }
        for name in &sync.state_files {
            if name.contains('/') || name.contains('\\') || !name.ends_with(".json") {
                return Err(ConfigError::InvalidStateFile(name.clone()));
            }
        }
        if sync.images_dir.is_empty() || sync.images_dir.contains('/') || sync.images_dir.contains('\\') {
            return Err(ConfigError::InvalidImagesDir(sync.images_dir.clone()));
        }
        if !sync.remote_root.is_empty() && !sync.remote_root.starts_with('/') {
            return Err(ConfigError::InvalidRemoteRoot(sync.remote_root.clone()));
        }

        Ok(())
    }

    /// Names of the enabled providers in resolution order
    pub fn enabled_providers(&self) -> Vec<&'static str> {
        let mut providers = Vec::new();
        if self.providers.anilist {
            providers.push("anilist");
        }
        if self.providers.shikimori {
            providers.push("shikimori");
        }
        if self.providers.jikan {
            providers.push("jikan");
        }
        if self.providers.tmdb {
            providers.push("tmdb");
        }
        providers
    }
}
