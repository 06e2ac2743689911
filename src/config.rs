use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound for any configured duration, in seconds (ten years)
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL serving `/todos`
  pub jsonplaceholder_url: String,
  /// Base URL serving `/posts/search` and `/users`
  pub dummyjson_url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      jsonplaceholder_url: "https://jsonplaceholder.typicode.com".to_string(),
      dummyjson_url: "https://dummyjson.com".to_string(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Stale time for queries without a specific setting
  pub stale_time_secs: u64,
  /// Stale time for a single todo
  pub todo_stale_time_secs: u64,
  /// Stale time for user profiles
  pub user_stale_time_secs: u64,
  /// How long unwatched entries are kept
  pub gc_time_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: 0,
      todo_stale_time_secs: 5 * 60,
      user_stale_time_secs: 30,
      gc_time_secs: 5 * 60,
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> chrono::Duration {
    seconds(self.stale_time_secs)
  }

  pub fn todo_stale_time(&self) -> chrono::Duration {
    seconds(self.todo_stale_time_secs)
  }

  pub fn user_stale_time(&self) -> chrono::Duration {
    seconds(self.user_stale_time_secs)
  }

  pub fn gc_time(&self) -> chrono::Duration {
    seconds(self.gc_time_secs)
  }
}

fn seconds(secs: u64) -> chrono::Duration {
  chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  /// Quiet period before typed search text is applied
  pub debounce_ms: u64,
  /// Posts per page when `--limit` is not given
  pub page_size: u32,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      debounce_ms: 1000,
      page_size: crate::pagination::DEFAULT_LIMIT,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./querydeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/querydeck/config.yaml
  ///
  /// Without any file the built-in defaults are used.
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
      None => {
        debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("querydeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("querydeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    debug!(path = %path.display(), "config loaded");
    Ok(config)
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.jsonplaceholder_url, "https://jsonplaceholder.typicode.com");
    assert_eq!(config.cache.stale_time(), chrono::Duration::zero());
    assert_eq!(config.cache.todo_stale_time(), chrono::Duration::minutes(5));
    assert_eq!(config.cache.user_stale_time(), chrono::Duration::seconds(30));
    assert_eq!(config.search.debounce_ms, 1000);
    assert_eq!(config.search.page_size, 4);
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::from_yaml(
      r#"
api:
  dummyjson_url: http://localhost:3000
cache:
  user_stale_time_secs: 120
"#,
    )
    .unwrap();

    assert_eq!(config.api.dummyjson_url, "http://localhost:3000");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.user_stale_time(), chrono::Duration::minutes(2));
    assert_eq!(config.cache.todo_stale_time_secs, 300);
    assert_eq!(config.search.page_size, 4);
  }

  #[test]
  fn test_invalid_yaml_is_error() {
    assert!(Config::from_yaml("cache: [1, 2").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/querydeck.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_huge_durations_are_clamped() {
    let cache = CacheConfig {
      gc_time_secs: u64::MAX,
      ..CacheConfig::default()
    };
    assert_eq!(cache.gc_time(), chrono::Duration::seconds(MAX_DURATION_SECS as i64));
  }
}
