use crate::search::{SearchBuilder, SearchDomain};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_domain: SearchDomain,
    pub wildcard_search: bool,
    pub case_sensitive: bool,
    pub show_all_assembly_parts: bool,
    pub chunk_size: usize,
    pub parallel_jobs: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_domain: SearchDomain::PartMark,
            wildcard_search: false,
            case_sensitive: false,
            show_all_assembly_parts: false,
            chunk_size: 1000,
            parallel_jobs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_regex_cache_size")]
    pub regex_cache_size: usize,
    #[serde(default = "default_refresh_retries")]
    pub refresh_retries: usize,
}

fn default_regex_cache_size() -> usize {
    100
}
fn default_refresh_retries() -> usize {
    3
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            regex_cache_size: default_regex_cache_size(),
            refresh_retries: default_refresh_retries(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_timing: bool,
    pub show_summary: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_timing: true,
            show_summary: true,
        }
    }
}

/// Overrides every other config location when set.
pub const CONFIG_ENV: &str = "DRAWING_SEARCH_CONFIG";
const CONFIG_DIR: &str = "drawing-search";
const CONFIG_FILE: &str = "config.toml";
const DOTFILE: &str = ".drawing-search.toml";

impl Config {
    pub fn load() -> Result<Self> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read drawing-search config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;
        config
            .check()
            .with_context(|| format!("Rejected config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Values a search or the cache cannot work with.
    fn check(&self) -> Result<()> {
        if self.search.chunk_size == 0 {
            bail!("search.chunk_size must be at least 1");
        }
        if self.search.parallel_jobs == Some(0) {
            bail!("search.parallel_jobs must be at least 1 when set");
        }
        if self.cache.regex_cache_size == 0 {
            bail!("cache.regex_cache_size must be at least 1");
        }
        Ok(())
    }

    /// Config locations in lookup order: `$DRAWING_SEARCH_CONFIG`, the user
    /// config dir, a dotfile in the home dir, then the working directory.
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = env::var_os(CONFIG_ENV).map(PathBuf::from).into_iter().collect();
        paths.extend(dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE)));
        paths.extend(dirs::home_dir().map(|home| home.join(DOTFILE)));
        paths.push(PathBuf::from(DOTFILE));
        paths
    }

    fn find_config_path() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|path| path.is_file())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.check()?;
        let content = toml::to_string_pretty(self).context("Cannot serialize drawing-search config")?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        fs::write(path, content).with_context(|| format!("Cannot write {}", path.display()))
    }

    /// Search builder preloaded with the configured defaults.
    pub fn search_builder(&self) -> SearchBuilder {
        SearchBuilder::new()
            .with_domain(self.search.default_domain)
            .with_wildcard(self.search.wildcard_search)
            .with_case_sensitivity(self.search.case_sensitive)
            .show_all_assembly_parts(self.search.show_all_assembly_parts)
    }

    pub fn worker_threads(&self) -> usize {
        self.search.parallel_jobs.unwrap_or_else(num_cpus::get).max(1)
    }
}
