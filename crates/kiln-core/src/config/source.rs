use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{KilnError, Result};

/// Name of the per-project configuration file
pub const PROJECT_FILE: &str = "kiln.toml";

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// `<config_dir>/kiln/config.toml` or `$KILN_HOME/config.toml`
    Global,
    /// The nearest `kiln.toml`
    Project,
    /// From environment variable
    Environment(String),
    /// Set on the command line
    Command,
    Unknown,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Global => "global",
            ConfigSource::Project => "project",
            ConfigSource::Environment(var) => var,
            ConfigSource::Command => "command",
            ConfigSource::Unknown => "unknown",
        }
    }
}

/// One configuration file as written on disk
///
/// ```toml
/// repos = ["~/recipes", "./local"]
///
/// [config]
/// prefer-oldest = false
/// cost-order = ["deprecated", "version-age", "variant-defaults"]
///
/// [config.preferred-versions]
/// zlib = "1.2"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<IndexMap<String, toml::Value>>,

    /// File the values were read from, for resolving relative paths
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// Reads configuration files and `KILN_*` variables
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
    home: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self {
            use_environment,
            home: None,
        }
    }

    /// Use `home` instead of the platform configuration directory
    pub fn with_home<P: AsRef<Path>>(mut self, home: P) -> Self {
        self.home = Some(home.as_ref().to_path_buf());
        self
    }

    /// Get a KILN_* environment variable, ignoring empty values
    pub fn get_kiln_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Directory holding the global `config.toml`
    pub fn get_kiln_home(&self) -> PathBuf {
        if let Some(home) = &self.home {
            return home.clone();
        }
        if let Some(home) = self.get_kiln_env("KILN_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "kiln") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(base) = directories::BaseDirs::new() {
            base.home_dir().join(".kiln")
        } else {
            PathBuf::from(".kiln")
        }
    }

    /// Load a TOML configuration file; a missing file is empty
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| KilnError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut config: RawConfig = toml::from_str(&contents)
            .map_err(|e| KilnError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.path = Some(path.to_path_buf());

        Ok(config)
    }

    pub fn load_global_config(&self) -> Result<RawConfig> {
        self.load_config_file(self.get_kiln_home().join("config.toml"))
    }

    /// Nearest `kiln.toml` in `start` or one of its ancestors
    pub fn find_project_config<P: AsRef<Path>>(&self, start: P) -> Option<PathBuf> {
        start
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE))
            .find(|candidate| candidate.is_file())
    }

    pub fn load_project_config<P: AsRef<Path>>(&self, project_dir: P) -> Result<RawConfig> {
        match self.find_project_config(project_dir) {
            Some(path) => {
                log::debug!("Using project configuration {}", path.display());
                self.load_config_file(path)
            }
            None => Ok(RawConfig::default()),
        }
    }

    /// Converts "foo-bar" to "KILN_FOO_BAR"
    pub fn env_var_name(key: &str) -> String {
        format!("KILN_{}", key.replace('-', "_").to_uppercase())
    }

    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_kiln_env(&Self::env_var_name(key))
    }

    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key)
            .map(|val| !matches!(val.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
    }

    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    /// Path list in the platform's `PATH` syntax
    pub fn get_env_paths(&self, key: &str) -> Option<Vec<PathBuf>> {
        self.get_env_config(key).map(|val| env::split_paths(&val).collect())
    }
}
