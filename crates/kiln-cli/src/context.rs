//! Options shared by every command, and loading of config and recipes.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use kiln_core::config::{Config, ConfigLoader, ConfigSource};
use kiln_core::recipe::load_repositories;
use kiln_core::solver::Request;
use kiln_core::spec::Spec;
use kiln_core::Registry;

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Recipe repository to search first (can be used multiple times)
    #[arg(
        short = 'r',
        long = "repo",
        value_name = "DIR",
        global = true,
        action = clap::ArgAction::Append
    )]
    pub repos: Vec<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Allow deprecated versions without naming them
    #[arg(long, global = true)]
    pub allow_deprecated: bool,

    /// Prefer the oldest versions instead of the newest
    #[arg(long, global = true)]
    pub prefer_oldest: bool,

    /// Ignore KILN_* environment variables
    #[arg(long, global = true)]
    pub no_env: bool,
}

/// Layered configuration with command-line flags applied last
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    load_config_with(global, &ConfigLoader::new(!global.no_env), &cwd)
}

fn load_config_with(global: &GlobalArgs, loader: &ConfigLoader, cwd: &Path) -> Result<Config> {
    let mut config = Config::build_with(loader, Some(cwd), !global.no_env)
        .context("Failed to load configuration")?;

    let repos = global
        .repos
        .iter()
        .map(|repo| if repo.is_relative() { cwd.join(repo) } else { repo.clone() });
    config.prepend_repos(repos);
    if global.allow_deprecated {
        config.set("allow-deprecated", toml::Value::Boolean(true))?;
    }
    if global.prefer_oldest {
        config.set("prefer-oldest", toml::Value::Boolean(true))?;
    }
    Ok(config)
}

pub fn load_registry(config: &Config) -> Result<Registry> {
    if config.repos.is_empty() {
        bail!("No recipe repositories configured; pass --repo or set `repos` in kiln.toml");
    }
    let registry = load_repositories(&config.repos).context("Failed to load recipe repositories")?;
    log::info!("Loaded {} recipes from {} repositories", registry.len(), config.repos.len());
    Ok(registry)
}

/// Request-wide switches shared by `spec` and `solve`
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Constrain a package wherever it appears in the graph (can be used multiple times)
    #[arg(long = "pin", value_name = "SPEC", action = clap::ArgAction::Append)]
    pub pins: Vec<String>,

    /// Let build-only dependencies on a package resolve to a separate node
    #[arg(long = "split", value_name = "NAME", action = clap::ArgAction::Append)]
    pub split: Vec<String>,

    /// Include test dependencies of the requested packages
    #[arg(long)]
    pub tests: bool,
}

impl RequestArgs {
    pub fn build<S: AsRef<str>>(&self, specs: &[S]) -> Result<Request> {
        let mut request = Request::parse(specs).context("Invalid spec")?;
        for pin in &self.pins {
            let spec = Spec::parse(pin).with_context(|| format!("Invalid pin \"{}\"", pin))?;
            request.pin(spec)?;
        }
        for name in &self.split {
            request.allow_split(name.clone());
        }
        request.with_test_deps(self.tests);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_args() {
        let args = RequestArgs {
            pins: vec!["zlib@1.2".to_string()],
            split: vec!["cmake".to_string()],
            tests: true,
        };
        let request = args.build(&["hdf5 +mpi"]).unwrap();
        assert_eq!(request.roots.len(), 1);
        assert!(request.pins.contains_key("zlib"));
        assert!(request.is_split("cmake"));
        assert!(request.include_test_deps);
    }

    #[test]
    fn test_invalid_pin() {
        let args = RequestArgs {
            pins: vec!["@@".to_string()],
            ..Default::default()
        };
        assert!(args.build(&["zlib"]).is_err());
    }

    #[test]
    fn test_flags_override_project_config() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join("kiln.toml"),
            "repos = [\"recipes\"]\n\n[config]\nprefer-oldest = false\n",
        )
        .unwrap();
        let nested = project.path().join("src");
        std::fs::create_dir(&nested).unwrap();

        let global = GlobalArgs {
            repos: vec![PathBuf::from("local")],
            prefer_oldest: true,
            no_env: true,
            ..Default::default()
        };
        let loader = ConfigLoader::new(false).with_home(home.path());
        let config = load_config_with(&global, &loader, &nested).unwrap();

        assert_eq!(config.repos, vec![nested.join("local"), project.path().join("recipes")]);
        assert!(config.prefer_oldest);
        assert_eq!(config.get_source("prefer-oldest"), Some(&ConfigSource::Command));
        assert_eq!(config.get_source("repos"), Some(&ConfigSource::Command));
    }

    #[test]
    fn test_no_repositories() {
        let config = Config::default();
        assert!(load_registry(&config).is_err());
    }
}
