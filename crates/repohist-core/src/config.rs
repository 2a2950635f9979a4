use crate::constants;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API token, sent as a bearer credential. Empty means unauthenticated.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_page_window")]
    pub page_window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_per_page() -> u32 {
    constants::PER_PAGE
}
fn default_page_window() -> u32 {
    constants::PAGE_WINDOW
}
fn default_data_dir() -> String {
    "~/.repohist".into()
}
fn default_busy_timeout() -> u32 {
    5000
}
fn default_cache_size() -> i32 {
    -64000
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: String::new(),
            per_page: default_per_page(),
            page_window: default_page_window(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            busy_timeout_ms: default_busy_timeout(),
            cache_size: default_cache_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with layered precedence:
    /// 1. Explicit config file (from `--config` flag, highest priority)
    /// 2. Project config: `<project_root>/.repohist/config.toml`
    /// 3. Global config: `~/.repohist/config.toml`
    /// 4. Built-in defaults (lowest priority)
    ///
    /// Only fields explicitly set in a higher-priority file override lower
    /// layers. `REPOHIST_*` environment variables override everything.
    pub fn load(project_root: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_file(project_root, None)
    }

    pub fn load_with_file(
        project_root: Option<&Path>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(constants::DEFAULT_DATA_DIR).join("config.toml");
            if global_path.exists() {
                let raw = load_toml_value(&global_path)?;
                merge_toml_values(&mut merged, &raw);
            }
        }

        if let Some(root) = project_root {
            let project_path = root.join(constants::PROJECT_CONFIG_FILE);
            if project_path.exists() {
                let raw = load_toml_value(&project_path)?;
                merge_toml_values(&mut merged, &raw);
            }
        }

        if let Some(cf) = config_file {
            if !cf.exists() {
                return Err(ConfigError::NotFound {
                    path: cf.display().to_string(),
                });
            }
            let raw = load_toml_value(cf)?;
            merge_toml_values(&mut merged, &raw);
        }

        let config_str =
            toml::to_string(&merged).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let mut config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        apply_env_overrides(&mut config);

        if config.provider.per_page == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provider.per_page".into(),
                reason: "must be at least 1".into(),
            });
        }
        if config.provider.page_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provider.page_window".into(),
                reason: "must be at least 1".into(),
            });
        }

        config.storage.data_dir = expand_tilde(&config.storage.data_dir);

        Ok(config)
    }

    /// Path of the SQLite database under the data directory.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("repohist.db")
    }
}

fn load_toml_value(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    content
        .parse::<toml::Value>()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Deep-merge `overlay` into `base`. Only keys present in `overlay` are written.
fn merge_toml_values(base: &mut toml::Value, overlay: &toml::Value) {
    if let (toml::Value::Table(base_map), toml::Value::Table(overlay_map)) = (base, overlay) {
        for (key, overlay_val) in overlay_map {
            if let Some(base_val) = base_map.get_mut(key) {
                if base_val.is_table() && overlay_val.is_table() {
                    merge_toml_values(base_val, overlay_val);
                } else {
                    *base_val = overlay_val.clone();
                }
            } else {
                base_map.insert(key.clone(), overlay_val.clone());
            }
        }
    }
}

/// Environment overrides, convention: REPOHIST_<SECTION>_<KEY>.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("REPOHIST_PROVIDER_API_BASE") {
        config.provider.api_base = v;
    }
    if let Ok(v) = std::env::var("REPOHIST_PROVIDER_TOKEN") {
        config.provider.token = v;
    }
    if let Ok(v) = std::env::var("REPOHIST_PROVIDER_PER_PAGE")
        && let Ok(n) = v.parse()
    {
        config.provider.per_page = n;
    }
    if let Ok(v) = std::env::var("REPOHIST_STORAGE_DATA_DIR") {
        config.storage.data_dir = v;
    }
    if let Ok(v) = std::env::var("REPOHIST_LOGGING_LEVEL") {
        config.logging.level = v;
    }
}

fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped).display().to_string();
    }
    path.to_string()
}
