//! Configuration for vidscribe.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VIDSCRIBE_HOME, VIDSCRIBE_DB, YOUTUBE_API_KEY,
//!    VIDSCRIBE_WORKER_URL)
//! 2. Config file (.vidscribe/config.yaml)
//! 3. Defaults (~/.vidscribe)
//!
//! Config file discovery:
//! - Searches current directory and parents for .vidscribe/config.yaml
//! - Paths in config file are relative to the .vidscribe/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::youtube::DEFAULT_API_BASE;
use crate::domain::QuotaDefaults;
use crate::library::DEFAULT_PAGE_SIZE;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".vidscribe";
const DEFAULT_WORKER_URL: &str = "http://localhost:8000";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub catalog: Option<CatalogConfig>,
    #[serde(default)]
    pub quota: Option<QuotaDefaults>,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .vidscribe/)
    pub home: Option<String>,
    /// SQLite database file (relative to .vidscribe/)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub page_size: Option<u32>,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub worker_url: Option<String>,
    pub batch_size: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Catalog settings
    pub catalog: CatalogSettings,
    /// Quota allowances
    pub quota: QuotaDefaults,
    /// Pipeline settings
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub page_size: u32,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            api_base_url: DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub worker_url: String,
    pub batch_size: usize,
    pub timeout_seconds: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_url: DEFAULT_WORKER_URL.to_string(),
            batch_size: 5,
            timeout_seconds: 900,
        }
    }
}

impl CatalogSettings {
    fn merge(file: Option<CatalogConfig>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else {
            return defaults;
        };

        Self {
            page_size: file.page_size.unwrap_or(defaults.page_size),
            api_base_url: file.api_base_url.unwrap_or(defaults.api_base_url),
            api_key: file.api_key,
            timeout_seconds: file.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        }
    }
}

impl PipelineSettings {
    fn merge(file: Option<PipelineConfig>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else {
            return defaults;
        };

        Self {
            worker_url: file.worker_url.unwrap_or(defaults.worker_url),
            batch_size: file.batch_size.unwrap_or(defaults.batch_size).max(1),
            timeout_seconds: file.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        }
    }
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Build the resolved config from an optional config file plus environment
fn resolve(config_file: Option<PathBuf>) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let file = config_file.as_deref().map(load_config_file).transpose()?;
    // Paths in the file are relative to .vidscribe/
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let (paths, catalog, quota, pipeline) = match file {
        Some(file) => (file.paths, file.catalog, file.quota, file.pipeline),
        None => (PathsConfig::default(), None, None, None),
    };

    let home = if let Some(env_home) = env_var("VIDSCRIBE_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = paths.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let database = if let Some(env_db) = env_var("VIDSCRIBE_DB") {
        PathBuf::from(env_db)
    } else if let Some(ref db_path) = paths.database {
        resolve_path(config_dir, db_path)
    } else {
        home.join("vidscribe.db")
    };

    let mut catalog = CatalogSettings::merge(catalog);
    if let Some(key) = env_var("YOUTUBE_API_KEY") {
        catalog.api_key = Some(key);
    }

    let mut pipeline = PipelineSettings::merge(pipeline);
    if let Some(url) = env_var("VIDSCRIBE_WORKER_URL") {
        pipeline.worker_url = url;
    }

    let mut quota = quota.unwrap_or_default();
    quota.reset_period_days = quota.period_days();

    Ok(ResolvedConfig {
        home,
        database,
        config_file,
        catalog,
        quota,
        pipeline,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    resolve(find_config_file(&cwd))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
