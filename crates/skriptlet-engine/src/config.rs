//! Engine configuration.
//!
//! [`EngineConfig`] controls unresolved-expression logging, the size of the
//! most-recently-used lists and the thread count used by [`Engine::resolve_all`].
//!
//! # Config file: `skriptlet.toml`
//!
//! - **Global**: `~/.skriptlet.toml`, applies everywhere
//! - **Local**: `skriptlet.toml` or `.skriptlet/config.toml`, found by walking up from
//!   the start directory; overrides global
//!
//! ```toml
//! log_unresolved = false
//! mru_capacity = 64
//! max_parallel_threads = 4
//! ```
//!
//! All fields are optional. The `SKRIPTLET_MRU_CAPACITY` environment variable
//! overrides `mru_capacity` after both files are read.
//!
//! [`Engine::resolve_all`]: crate::Engine::resolve_all

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MRU_CAPACITY_ENV: &str = "SKRIPTLET_MRU_CAPACITY";

/// TOML-friendly intermediate representation (all fields optional).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    log_unresolved: Option<bool>,
    /// Entries kept per recency list (0 = unbounded).
    mru_capacity: Option<usize>,
    /// Max threads for batch resolution (0 = all cores).
    max_parallel_threads: Option<usize>,
}

impl ConfigFile {
    fn apply(self, config: &mut EngineConfig) {
        if let Some(log) = self.log_unresolved {
            config.log_unresolved = log;
        }
        if let Some(capacity) = self.mru_capacity {
            config.mru_capacity = capacity;
        }
        if let Some(threads) = self.max_parallel_threads {
            config.max_parallel_threads = threads;
        }
    }
}

/// # Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | `log_unresolved` | `true` |
/// | `mru_capacity` | `0` (unbounded) |
/// | `max_parallel_threads` | `0` (= use all available cores) |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Emit a warning when a top-level resolution finds nothing.
    pub log_unresolved: bool,
    /// Capacity of each recency list. Evicted entries fall back to registration
    /// order; `0` keeps every entry.
    pub mru_capacity: usize,
    /// Maximum number of threads for [`crate::Engine::resolve_all`].
    pub max_parallel_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_unresolved: true,
            mru_capacity: 0,
            max_parallel_threads: 0,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration by merging the global and local config files, then the
    /// environment override.
    ///
    /// Returns `EngineConfig::default()` if no config files are found.
    pub fn load(start_dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::find_global_config() {
            if let Ok(global_config) = Self::from_file(&global_path) {
                config = global_config;
            }
        }

        if let Some(local_path) = Self::find_local_config(start_dir) {
            let content = std::fs::read_to_string(&local_path)
                .with_context(|| format!("Failed to read config file: {}", local_path.display()))?;
            let local_file: ConfigFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", local_path.display()))?;
            local_file.apply(&mut config);
        }

        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(toml_str: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(toml_str).context("Failed to parse config")?;
        let mut config = Self::default();
        file.apply(&mut config);
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(capacity) = std::env::var(MRU_CAPACITY_ENV)
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            self.mru_capacity = capacity;
        }
    }

    fn find_global_config() -> Option<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".skriptlet.toml"))
            .filter(|p| p.is_file())
    }

    /// Walks up from `start_dir` looking for `skriptlet.toml` or
    /// `.skriptlet/config.toml`.
    fn find_local_config(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
        let mut dir = start_dir.as_ref().to_path_buf();
        if let Ok(abs) = dir.canonicalize() {
            dir = abs;
        }

        loop {
            let file = dir.join("skriptlet.toml");
            if file.is_file() {
                return Some(file);
            }
            let nested = dir.join(".skriptlet").join("config.toml");
            if nested.is_file() {
                return Some(nested);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    pub fn with_log_unresolved(mut self, log: bool) -> Self {
        self.log_unresolved = log;
        self
    }

    /// Builder: bound each recency list (`0` = unbounded).
    pub fn with_mru_capacity(mut self, capacity: usize) -> Self {
        self.mru_capacity = capacity;
        self
    }

    /// Builder: limit parallel threads (`0` = all cores).
    pub fn with_max_parallel_threads(mut self, n: usize) -> Self {
        self.max_parallel_threads = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert!(cfg.log_unresolved);
        assert_eq!(cfg.mru_capacity, 0);
        assert_eq!(cfg.max_parallel_threads, 0);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            log_unresolved = false
            mru_capacity = 16
            max_parallel_threads = 4
        "#;
        let cfg = EngineConfig::from_str(toml).unwrap();
        assert!(!cfg.log_unresolved);
        assert_eq!(cfg.mru_capacity, 16);
        assert_eq!(cfg.max_parallel_threads, 4);
    }

    #[test]
    fn test_parse_partial_config() {
        let cfg = EngineConfig::from_str("mru_capacity = 3").unwrap();
        assert_eq!(cfg.mru_capacity, 3);
        // rest stays default
        assert!(cfg.log_unresolved);
        assert_eq!(cfg.max_parallel_threads, 0);
    }

    #[test]
    fn test_parse_empty_config() {
        let cfg = EngineConfig::from_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(EngineConfig::from_str("mru_capacity = \"many\"").is_err());
    }

    #[test]
    fn test_merge_configs() {
        let global = r#"
            log_unresolved = false
            max_parallel_threads = 4
        "#;
        let mut cfg = EngineConfig::from_str(global).unwrap();

        let local: ConfigFile =
            toml::from_str("max_parallel_threads = 2\nmru_capacity = 8").unwrap();
        local.apply(&mut cfg);

        assert!(!cfg.log_unresolved); // from global
        assert_eq!(cfg.max_parallel_threads, 2); // overridden
        assert_eq!(cfg.mru_capacity, 8); // added by local
    }

    #[test]
    fn test_find_local_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(dir.path().join(".skriptlet")).unwrap();
        std::fs::write(
            dir.path().join(".skriptlet").join("config.toml"),
            "max_parallel_threads = 3",
        )
        .unwrap();

        let found = EngineConfig::find_local_config(&nested).unwrap();
        assert!(found.ends_with(".skriptlet/config.toml"));

        let cfg = EngineConfig::from_file(&found).unwrap();
        assert_eq!(cfg.max_parallel_threads, 3);
    }

    #[test]
    fn test_plain_file_wins_over_nested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".skriptlet")).unwrap();
        std::fs::write(dir.path().join(".skriptlet").join("config.toml"), "").unwrap();
        std::fs::write(dir.path().join("skriptlet.toml"), "").unwrap();

        let found = EngineConfig::find_local_config(dir.path()).unwrap();
        assert!(found.ends_with("skriptlet.toml"));
    }

    #[test]
    fn test_builder_methods() {
        let cfg = EngineConfig::new()
            .with_log_unresolved(false)
            .with_mru_capacity(10)
            .with_max_parallel_threads(2);
        assert!(!cfg.log_unresolved);
        assert_eq!(cfg.mru_capacity, 10);
        assert_eq!(cfg.max_parallel_threads, 2);
    }
}
