use crate::query::QueryOptions;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API base URL baked in at build time, overridable by config or `--base-url`
pub const DEFAULT_BASE_URL: &str = match option_env!("DEXTERM_API_BASE_URL") {
  Some(url) => url,
  None => "https://pokeapi.co/api/v2",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  /// Entries per page, for both listings
  pub page_size: PageSize,
  pub queries: QueriesConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub struct PageSize(u32);

impl PageSize {
  pub fn get(self) -> u32 {
    self.0
  }
}

impl Default for PageSize {
  fn default() -> Self {
    PageSize(20)
  }
}

impl TryFrom<u32> for PageSize {
  type Error = String;

  fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
    if value == 0 {
      Err("page_size must be at least 1".to_string())
    } else {
      Ok(PageSize(value))
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout_secs: 15,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueriesConfig {
  /// Retries after the first failed attempt
  pub retry_count: u32,
  pub list: QueryTiming,
  pub detail: QueryTiming,
}

impl Default for QueriesConfig {
  fn default() -> Self {
    Self {
      retry_count: 2,
      list: QueryTiming {
        stale_time_secs: 5 * 60,
        idle_evict_secs: 10 * 60,
      },
      // Details are less likely to change
      detail: QueryTiming {
        stale_time_secs: 10 * 60,
        idle_evict_secs: 30 * 60,
      },
    }
  }
}

impl QueriesConfig {
  pub fn list_options(&self) -> QueryOptions {
    self.list.options(self.retry_count)
  }

  pub fn detail_options(&self) -> QueryOptions {
    self.detail.options(self.retry_count)
  }

  /// Exact-match search: a miss is an expected answer, never retried
  pub fn search_options(&self) -> QueryOptions {
    QueryOptions {
      retryable: false,
      ..self.detail_options()
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueryTiming {
  pub stale_time_secs: u64,
  pub idle_evict_secs: u64,
}

impl QueryTiming {
  fn options(&self, retry_count: u32) -> QueryOptions {
    QueryOptions {
      stale_time: Duration::from_secs(self.stale_time_secs),
      idle_evict: Duration::from_secs(self.idle_evict_secs),
      retry_count,
      ..QueryOptions::default()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter directive when RUST_LOG is unset
  pub level: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./dexterm.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dexterm/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("dexterm.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dexterm").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }
}
