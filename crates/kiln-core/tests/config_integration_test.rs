/// Integration tests for the configuration system
///
/// These tests load configuration from files and environment variables
/// and check that the result drives concretization.

use kiln_core::config::{Config, ConfigLoader, ConfigSource};
use kiln_core::solver::CostCategory;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_config_loader_env_enabled() {
    env::set_var("KILN_PREFER_OLDEST", "1");
    env::set_var("KILN_EXPLAIN_MAX_RULES", "77");
    env::set_var("KILN_COST_ORDER", "version-age, deprecated");

    let home = TempDir::new().unwrap();
    let loader = ConfigLoader::new(true).with_home(home.path());
    assert_eq!(loader.get_env_bool("prefer-oldest"), Some(true));

    let config = Config::build_with(&loader, None::<&Path>, true).unwrap();
    assert!(config.prefer_oldest);
    assert_eq!(config.explain_max_rules, 77);
    assert_eq!(config.cost_order, vec![CostCategory::VersionAge, CostCategory::Deprecated]);
    assert_eq!(
        config.get_source("explain-max-rules"),
        Some(&ConfigSource::Environment("KILN_EXPLAIN_MAX_RULES".to_string()))
    );

    env::remove_var("KILN_PREFER_OLDEST");
    env::remove_var("KILN_EXPLAIN_MAX_RULES");
    env::remove_var("KILN_COST_ORDER");
}

#[test]
fn test_project_overrides_global() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let nested = project.path().join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();

    fs::write(
        home.path().join("config.toml"),
        r#"
repos = ["/opt/kiln/recipes"]

[config]
allow-deprecated = true
cost-order = ["node-count", "version-age"]
"#,
    )
    .unwrap();
    fs::write(
        project.path().join("kiln.toml"),
        r#"
[config]
cost-order = ["deprecated", "version-age"]
minimize-explanations = false
"#,
    )
    .unwrap();

    let loader = ConfigLoader::new(false).with_home(home.path());
    let config = Config::build_with(&loader, Some(&nested), false).unwrap();

    assert_eq!(config.repos, vec![PathBuf::from("/opt/kiln/recipes")]);
    assert!(config.allow_deprecated);
    assert!(!config.minimize_explanations);
    assert_eq!(config.cost_order, vec![CostCategory::Deprecated, CostCategory::VersionAge]);
    assert_eq!(config.get_source("repos"), Some(&ConfigSource::Global));
    assert_eq!(config.get_source("cost-order"), Some(&ConfigSource::Project));

    let keys: Vec<&str> = config.entries().iter().map(|(key, _, _)| *key).collect();
    assert!(keys.contains(&"preferred-versions"));
}

#[test]
fn test_unknown_keys_are_ignored() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("config.toml"), "[config]\ncolor = \"always\"\n").unwrap();

    let loader = ConfigLoader::new(false).with_home(home.path());
    let config = Config::build_with(&loader, None::<&Path>, false).unwrap();
    assert_eq!(config.get_source("color"), None);
}

#[test]
fn test_preferred_versions_reach_the_policy() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("config.toml"),
        "[config.preferred-versions]\nzlib = \"1.2\"\n",
    )
    .unwrap();

    let loader = ConfigLoader::new(false).with_home(home.path());
    let config = Config::build_with(&loader, None::<&Path>, false).unwrap();
    let policy = config.policy().unwrap();
    assert!(policy.preferred_versions.contains_key("zlib"));
}
