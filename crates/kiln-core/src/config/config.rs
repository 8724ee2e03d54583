use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use kiln_version::VersionConstraint;

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::{KilnError, Result};
use crate::solver::{CostCategory, Policy, SolverOptions};

/// Effective configuration after layering every source
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Recipe repositories, highest priority first
    pub repos: Vec<PathBuf>,
    pub allow_deprecated: bool,
    pub prefer_oldest: bool,
    /// Cost categories, most significant first
    pub cost_order: Vec<CostCategory>,
    pub preferred_versions: BTreeMap<String, String>,
    pub max_iterations: u64,
    pub minimize_explanations: bool,
    pub explain_max_rules: usize,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        let options = SolverOptions::default();
        Self {
            repos: Vec::new(),
            allow_deprecated: false,
            prefer_oldest: false,
            cost_order: CostCategory::DEFAULT_ORDER.to_vec(),
            preferred_versions: BTreeMap::new(),
            max_iterations: options.max_iterations,
            minimize_explanations: options.minimize_explanations,
            explain_max_rules: options.explain_max_rules,
            sources: HashMap::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from defaults, the global file, the nearest
    /// project file and the environment, in that order
    pub fn build<P: AsRef<Path>>(project_dir: Option<P>, use_environment: bool) -> Result<Self> {
        Self::build_with(&ConfigLoader::new(use_environment), project_dir, use_environment)
    }

    pub fn build_with<P: AsRef<Path>>(
        loader: &ConfigLoader,
        project_dir: Option<P>,
        use_environment: bool,
    ) -> Result<Self> {
        let mut config = Self::default();

        for key in Self::config_keys() {
            config.sources.insert(key.to_string(), ConfigSource::Default);
        }

        // 1. Global config.toml
        let global_config = loader.load_global_config()?;
        config.merge_raw_config(global_config, ConfigSource::Global)?;

        // 2. Project kiln.toml
        if let Some(project_dir) = &project_dir {
            let project_config = loader.load_project_config(project_dir)?;
            config.merge_raw_config(project_config, ConfigSource::Project)?;
        }

        // 3. Environment variable overrides
        if use_environment {
            config.apply_env_overrides(loader)?;
        }

        Ok(config)
    }

    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Set a value from the command line
    pub fn set(&mut self, key: &str, value: toml::Value) -> Result<()> {
        self.merge_config_value(key, value, ConfigSource::Command, None)
    }

    /// Put repositories given on the command line in front
    pub fn prepend_repos(&mut self, repos: impl IntoIterator<Item = PathBuf>) {
        let mut merged: Vec<PathBuf> = repos.into_iter().collect();
        if merged.is_empty() {
            return;
        }
        merged.extend(self.repos.drain(..));
        self.repos = merged;
        self.sources.insert("repos".to_string(), ConfigSource::Command);
    }

    pub fn policy(&self) -> Result<Policy> {
        let mut policy = Policy::new()
            .allow_deprecated(self.allow_deprecated)
            .prefer_oldest(self.prefer_oldest)
            .cost_order(self.cost_order.clone());
        for (package, versions) in &self.preferred_versions {
            let constraint = VersionConstraint::parse(versions)?;
            policy = policy.with_preferred_version(package, constraint);
        }
        Ok(policy)
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            max_iterations: self.max_iterations,
            minimize_explanations: self.minimize_explanations,
            explain_max_rules: self.explain_max_rules,
            ..SolverOptions::default()
        }
    }

    /// Every key with its current value rendered for display, and its source
    pub fn entries(&self) -> Vec<(&'static str, String, &str)> {
        let join = |items: Vec<String>| items.join(", ");
        Self::config_keys()
            .into_iter()
            .map(|key| {
                let value = match key {
                    "repos" => join(self.repos.iter().map(|p| p.display().to_string()).collect()),
                    "allow-deprecated" => self.allow_deprecated.to_string(),
                    "prefer-oldest" => self.prefer_oldest.to_string(),
                    "cost-order" => join(self.cost_order.iter().map(ToString::to_string).collect()),
                    "preferred-versions" => join(
                        self.preferred_versions
                            .iter()
                            .map(|(name, versions)| format!("{}@{}", name, versions))
                            .collect(),
                    ),
                    "max-iterations" => self.max_iterations.to_string(),
                    "minimize-explanations" => self.minimize_explanations.to_string(),
                    "explain-max-rules" => self.explain_max_rules.to_string(),
                    _ => String::new(),
                };
                let source = self.get_source(key).map_or("unknown", ConfigSource::as_str);
                (key, value, source)
            })
            .collect()
    }

    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        let base = raw.path.as_deref().and_then(Path::parent).map(Path::to_path_buf);
        if let Some(repos) = raw.repos {
            let value = toml::Value::Array(repos.into_iter().map(toml::Value::String).collect());
            self.merge_config_value("repos", value, source.clone(), base.as_deref())?;
        }
        if let Some(config_map) = raw.config {
            for (key, value) in config_map {
                self.merge_config_value(&key, value, source.clone(), base.as_deref())?;
            }
        }
        Ok(())
    }

    fn merge_config_value(
        &mut self,
        key: &str,
        value: toml::Value,
        source: ConfigSource,
        base: Option<&Path>,
    ) -> Result<()> {
        let invalid = |expected: &str| {
            KilnError::Config(format!("{} must be {} ({})", key, expected, source.as_str()))
        };
        match key {
            "repos" => {
                let items = value.as_array().ok_or_else(|| invalid("a list of paths"))?;
                let mut repos = Vec::with_capacity(items.len());
                for item in items {
                    let path = item.as_str().ok_or_else(|| invalid("a list of paths"))?;
                    repos.push(resolve_path(path, base));
                }
                self.repos = repos;
            }
            "allow-deprecated" => {
                self.allow_deprecated = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "prefer-oldest" => {
                self.prefer_oldest = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "minimize-explanations" => {
                self.minimize_explanations = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "max-iterations" => {
                let n = value
                    .as_integer()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid("a positive integer"))?;
                self.max_iterations = n as u64;
            }
            "explain-max-rules" => {
                let n = value
                    .as_integer()
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| invalid("a non-negative integer"))?;
                self.explain_max_rules = n as usize;
            }
            "cost-order" => {
                let items = value.as_array().ok_or_else(|| invalid("a list of cost categories"))?;
                let mut order = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(|| invalid("a list of cost categories"))?;
                    order.push(name.parse::<CostCategory>().map_err(KilnError::Config)?);
                }
                self.cost_order = order;
            }
            "preferred-versions" => {
                let expected = "a table of version constraints";
                let table = value.as_table().ok_or_else(|| invalid(expected))?;
                for (package, versions) in table {
                    let versions = versions.as_str().ok_or_else(|| invalid(expected))?;
                    VersionConstraint::parse(versions)?;
                    self.preferred_versions.insert(package.clone(), versions.to_string());
                }
            }
            _ => {
                log::warn!("Ignoring unknown configuration key {} ({})", key, source.as_str());
                return Ok(());
            }
        }
        self.sources.insert(key.to_string(), source);
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<()> {
        let env_source = |key: &str| ConfigSource::Environment(ConfigLoader::env_var_name(key));

        if let Some(repos) = loader.get_env_paths("repos") {
            self.repos = repos
                .iter()
                .map(|p| resolve_path(&p.to_string_lossy(), None))
                .collect();
            self.sources.insert("repos".to_string(), env_source("repos"));
        }

        for key in ["allow-deprecated", "prefer-oldest", "minimize-explanations"] {
            if let Some(flag) = loader.get_env_bool(key) {
                self.merge_config_value(key, toml::Value::Boolean(flag), env_source(key), None)?;
            }
        }

        for key in ["max-iterations", "explain-max-rules"] {
            if let Some(n) = loader.get_env_u64(key) {
                let n = i64::try_from(n)
                    .map_err(|_| KilnError::Config(format!("{} is out of range", key)))?;
                self.merge_config_value(key, toml::Value::Integer(n), env_source(key), None)?;
            }
        }

        // Comma-separated list
        if let Some(order) = loader.get_env_config("cost-order") {
            let items = order
                .split(',')
                .map(|s| toml::Value::String(s.trim().to_string()))
                .collect();
            let source = env_source("cost-order");
            self.merge_config_value("cost-order", toml::Value::Array(items), source, None)?;
        }

        Ok(())
    }

    fn config_keys() -> Vec<&'static str> {
        vec![
            "repos",
            "allow-deprecated",
            "prefer-oldest",
            "cost-order",
            "preferred-versions",
            "max-iterations",
            "minimize-explanations",
            "explain-max-rules",
        ]
    }
}

/// Expand `~` and resolve relative paths against the file that named them
fn resolve_path(path: &str, base: Option<&Path>) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path).into_owned());
    match base {
        Some(base) if expanded.is_relative() => base.join(expanded),
        _ => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn loader(home: &Path) -> ConfigLoader {
        ConfigLoader::new(false).with_home(home)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.repos.is_empty());
        assert!(!config.allow_deprecated);
        assert_eq!(config.cost_order, CostCategory::DEFAULT_ORDER.to_vec());
        assert_eq!(config.max_iterations, SolverOptions::default().max_iterations);
    }

    #[test]
    fn test_layering_and_sources() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "repos = [\"/srv/recipes\"]\n[config]\nprefer-oldest = true\nmax-iterations = 500\n",
        )
        .unwrap();
        fs::write(
            project.path().join("kiln.toml"),
            concat!(
                "repos = [\"local\"]\n[config]\nmax-iterations = 900\n",
                "[config.preferred-versions]\nzlib = \"1.2\"\n",
            ),
        )
        .unwrap();

        let config = Config::build_with(&loader(home.path()), Some(project.path()), false).unwrap();
        assert_eq!(config.repos, vec![project.path().join("local")]);
        assert!(config.prefer_oldest);
        assert_eq!(config.max_iterations, 900);
        assert_eq!(config.preferred_versions.get("zlib").map(String::as_str), Some("1.2"));

        assert_eq!(config.get_source("prefer-oldest"), Some(&ConfigSource::Global));
        assert_eq!(config.get_source("max-iterations"), Some(&ConfigSource::Project));
        assert_eq!(config.get_source("allow-deprecated"), Some(&ConfigSource::Default));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[config]\ncost-order = [\"speed\"]\n").unwrap();
        let result = Config::build_with(&loader(home.path()), None::<&Path>, false);
        assert!(matches!(result, Err(KilnError::Config(_))));

        fs::write(home.path().join("config.toml"), "[config]\nprefer-oldest = \"yes\"\n").unwrap();
        let result = Config::build_with(&loader(home.path()), None::<&Path>, false);
        assert!(matches!(result, Err(KilnError::Config(_))));
    }

    #[test]
    fn test_policy_and_options() {
        let mut config = Config::default();
        let order = toml::Value::Array(vec![toml::Value::String("node-count".into())]);
        config.set("cost-order", order).unwrap();
        config.set("explain-max-rules", toml::Value::Integer(12)).unwrap();
        config.preferred_versions.insert("zlib".to_string(), "1.2".to_string());
        assert_eq!(config.get_source("cost-order"), Some(&ConfigSource::Command));

        let policy = config.policy().unwrap();
        assert_eq!(policy.cost_order, vec![CostCategory::NodeCount]);
        assert!(policy.preferred_versions.contains_key("zlib"));
        assert_eq!(config.solver_options().explain_max_rules, 12);
    }

    #[test]
    fn test_prepend_repos() {
        let mut config = Config::default();
        config.repos = vec![PathBuf::from("/b")];
        config.prepend_repos(vec![PathBuf::from("/a")]);
        assert_eq!(config.repos, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(config.get_source("repos"), Some(&ConfigSource::Command));
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/abs", Some(Path::new("/base"))), PathBuf::from("/abs"));
        assert_eq!(resolve_path("rel", Some(Path::new("/base"))), PathBuf::from("/base/rel"));
    }
}
