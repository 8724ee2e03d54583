//! Loading recipe repositories from disk
//!
//! ```text
//! <repo>/
//!   repo.toml            compilers and architectures
//!   packages/<name>.toml one recipe per file
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kiln_version::Version;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{KilnError, Result};
use crate::spec::{ArchSpec, CompilerSpec, Condition, DepTypes, DependencyEdge, Spec};

use super::recipe::{BuildHook, ConflictRule, Recipe, VariantDecl, VersionDecl};
use super::registry::{Registry, RegistryBuilder};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RepoFile {
    #[serde(default)]
    repository: RepoSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RepoSection {
    name: Option<String>,
    #[serde(default)]
    compilers: Vec<String>,
    #[serde(default)]
    architectures: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RecipeFile {
    name: String,
    description: Option<String>,
    build_system: Option<String>,
    #[serde(default)]
    hooks: BTreeSet<BuildHook>,
    #[serde(default = "default_true")]
    needs_compiler: bool,
    #[serde(default)]
    versions: Vec<VersionEntry>,
    #[serde(default)]
    variants: Vec<VariantEntry>,
    #[serde(default)]
    dependencies: Vec<DependencyEntry>,
    #[serde(default)]
    conflicts: Vec<ConflictEntry>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VersionEntry {
    version: String,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    preferred: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DefaultValue {
    Bool(bool),
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VariantEntry {
    name: String,
    default: DefaultValue,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    multi: bool,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DependencyEntry {
    spec: String,
    #[serde(rename = "type")]
    deptypes: Option<DepTypes>,
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConflictEntry {
    spec: String,
    when: Option<String>,
    msg: Option<String>,
}

impl VariantEntry {
    fn into_decl(self) -> std::result::Result<VariantDecl, String> {
        let decl = match (&self.default, self.values.is_empty(), self.multi) {
            (DefaultValue::Bool(default), true, false) => {
                VariantDecl::boolean(&self.name, *default)
            }
            (DefaultValue::Bool(_), _, _) => {
                return Err(format!("boolean variant \"{}\" cannot list values", self.name))
            }
            (_, true, _) => return Err(format!("variant \"{}\" must list its values", self.name)),
            (default, false, multi) => {
                let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
                let defaults: Vec<String> = match default {
                    DefaultValue::One(value) => {
                        value.split(',').map(|v| v.trim().to_string()).collect()
                    }
                    DefaultValue::Many(values) => values.clone(),
                    DefaultValue::Bool(_) => Vec::new(),
                };
                let defaults: Vec<&str> = defaults.iter().map(String::as_str).collect();
                if multi {
                    VariantDecl::multi(&self.name, &values, &defaults)
                } else if let [single] = defaults.as_slice() {
                    VariantDecl::single(&self.name, &values, single)
                } else {
                    return Err(format!("variant \"{}\" needs exactly one default", self.name));
                }
            }
        };

        Ok(match self.description {
            Some(description) => decl.with_description(description),
            None => decl,
        })
    }
}

impl RecipeFile {
    fn into_recipe(self) -> std::result::Result<Recipe, String> {
        let mut recipe = Recipe::new(&self.name);
        recipe.description = self.description;
        recipe.build_system = self.build_system;
        recipe.hooks = self.hooks;
        recipe.needs_compiler = self.needs_compiler;

        for entry in self.versions {
            let version = Version::parse(&entry.version).map_err(|e| e.to_string())?;
            recipe.versions.push(VersionDecl {
                version,
                deprecated: entry.deprecated,
                preferred: entry.preferred,
            });
        }

        for entry in self.variants {
            recipe.variants.push(entry.into_decl()?);
        }

        for entry in self.dependencies {
            let spec = Spec::parse(&entry.spec).map_err(|e| e.to_string())?;
            let mut edge = DependencyEdge::new(spec, entry.deptypes.unwrap_or(DepTypes::DEFAULT));
            if let Some(when) = entry.when {
                edge = edge.when(Condition::parse(&when).map_err(|e| e.to_string())?);
            }
            recipe.dependencies.push(edge);
        }

        for entry in self.conflicts {
            let trigger = Spec::parse(&entry.spec).map_err(|e| e.to_string())?;
            let mut conflict = ConflictRule::new(trigger);
            if let Some(when) = entry.when {
                conflict = conflict.when(Condition::parse(&when).map_err(|e| e.to_string())?);
            }
            if let Some(msg) = entry.msg {
                conflict = conflict.with_message(msg);
            }
            recipe.conflicts.push(conflict);
        }

        recipe.validate()?;
        Ok(recipe)
    }
}

/// Parse a single recipe from TOML text
pub fn parse_recipe(content: &str, path: &Path) -> Result<Recipe> {
    let file: RecipeFile = toml::from_str(content).map_err(|e| KilnError::Recipe {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    file.into_recipe().map_err(|message| KilnError::Recipe {
        path: path.to_path_buf(),
        message,
    })
}

/// Reads recipe repositories into a [`RegistryBuilder`]
#[derive(Debug, Default)]
pub struct RepositoryLoader {
    builder: RegistryBuilder,
    loaded: Vec<PathBuf>,
}

impl RepositoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one repository directory. Recipes already provided by an
    /// earlier repository are skipped.
    pub fn load(&mut self, root: &Path) -> Result<&mut Self> {
        if !root.is_dir() {
            return Err(KilnError::Config(format!(
                "recipe repository {} does not exist",
                root.display()
            )));
        }

        let repo_file = root.join("repo.toml");
        let repo: RepoFile = if repo_file.exists() {
            let content = std::fs::read_to_string(&repo_file)?;
            toml::from_str(&content).map_err(|e| KilnError::Recipe {
                path: repo_file.clone(),
                message: e.to_string(),
            })?
        } else {
            RepoFile::default()
        };

        for compiler in &repo.repository.compilers {
            self.builder.add_compiler(CompilerSpec::parse(compiler)?);
        }
        for arch in &repo.repository.architectures {
            self.builder.add_architecture(ArchSpec::parse(arch)?);
        }

        let packages = root.join("packages");
        let mut added = 0usize;
        if packages.is_dir() {
            for entry in WalkDir::new(&packages).sort_by_file_name() {
                let entry = entry.map_err(|e| KilnError::Io(e.into()))?;
                let path = entry.path();
                let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
                if !entry.file_type().is_file() || !is_toml {
                    continue;
                }
                let content = std::fs::read_to_string(path)?;
                let recipe = parse_recipe(&content, path)?;
                if self.builder.add_recipe(recipe) {
                    added += 1;
                }
            }
        }

        log::debug!(
            "Loaded {} recipes from repository {} ({})",
            added,
            repo.repository.name.as_deref().unwrap_or("unnamed"),
            root.display()
        );
        self.loaded.push(root.to_path_buf());
        Ok(self)
    }

    pub fn loaded(&self) -> &[PathBuf] {
        &self.loaded
    }

    pub fn finish(self) -> Result<Registry> {
        self.builder.build()
    }
}

/// Load and layer several repositories, earlier ones taking precedence
pub fn load_repositories(roots: &[PathBuf]) -> Result<Registry> {
    let mut loader = RepositoryLoader::new();
    for root in roots {
        loader.load(root)?;
    }
    loader.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{RecipeRepository, VariantKind};
    use crate::spec::VariantValue;

    const KAKOUNE: &str = r#"
name = "kakoune"
description = "mawww's experiment for a better code editor."
build-system = "makefile"
hooks = ["edit", "build", "install"]

[[versions]]
version = "2023.08.05"

[[versions]]
version = "2021.11.08"

[[dependencies]]
spec = "ncurses"

[[conflicts]]
spec = "%gcc@:8"
when = "@2021.11.08"
msg = "GCC version must be at least 9.0!"
"#;

    #[test]
    fn test_parse_recipe() {
        let recipe = parse_recipe(KAKOUNE, Path::new("kakoune.toml")).unwrap();
        assert_eq!(recipe.name, "kakoune");
        assert_eq!(recipe.versions.len(), 2);
        assert_eq!(recipe.dependencies[0].deptypes, DepTypes::DEFAULT);
        assert_eq!(
            recipe.conflicts[0].message.as_deref(),
            Some("GCC version must be at least 9.0!")
        );
        assert!(recipe.hooks.contains(&BuildHook::Edit));
    }

    #[test]
    fn test_parse_variants() {
        let content = r#"
name = "libiconv"
[[versions]]
version = "1.17"
[[variants]]
name = "libs"
default = "shared,static"
values = ["shared", "static"]
multi = true
[[variants]]
name = "pic"
default = true
[[variants]]
name = "build_type"
default = "Release"
values = ["Release", "Debug"]
"#;
        let recipe = parse_recipe(content, Path::new("libiconv.toml")).unwrap();
        let libs = recipe.variant("libs").unwrap();
        assert_eq!(libs.kind, VariantKind::Multi);
        assert_eq!(libs.defaults().len(), 2);
        assert_eq!(recipe.variant("pic").unwrap().default_value(), VariantValue::Bool(true));
        assert_eq!(recipe.variant("build_type").unwrap().kind, VariantKind::Single);
    }

    #[test]
    fn test_parse_recipe_errors() {
        let bad_spec = concat!(
            "name = \"a\"\n[[versions]]\nversion = \"1.0\"\n",
            "[[dependencies]]\nspec = \"b@@\"\n",
        );
        assert!(matches!(
            parse_recipe(bad_spec, Path::new("a.toml")),
            Err(KilnError::Recipe { .. })
        ));

        let no_versions = "name = \"a\"\n";
        assert!(parse_recipe(no_versions, Path::new("a.toml")).is_err());
    }

    #[test]
    fn test_load_layered_repositories() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        std::fs::write(
            first.path().join("repo.toml"),
            concat!(
                "[repository]\nname = \"site\"\ncompilers = [\"gcc@=12.3.0\"]\n",
                "architectures = [\"linux-ubuntu22.04-x86_64\"]\n",
            ),
        )
        .unwrap();
        std::fs::create_dir(first.path().join("packages")).unwrap();
        std::fs::write(
            first.path().join("packages/ncurses.toml"),
            "name = \"ncurses\"\n[[versions]]\nversion = \"6.4\"\n",
        )
        .unwrap();

        std::fs::create_dir(second.path().join("packages")).unwrap();
        std::fs::write(
            second.path().join("packages/ncurses.toml"),
            "name = \"ncurses\"\n[[versions]]\nversion = \"6.5\"\n",
        )
        .unwrap();
        std::fs::write(second.path().join("packages/kakoune.toml"), KAKOUNE).unwrap();

        let registry =
            load_repositories(&[first.path().to_path_buf(), second.path().to_path_buf()]).unwrap();
        assert_eq!(registry.len(), 2);
        let ncurses = registry.list_versions("ncurses").unwrap();
        assert_eq!(ncurses[0].version.as_str(), "6.4");
        assert_eq!(registry.compilers().len(), 1);
    }

    #[test]
    fn test_missing_repository() {
        let mut loader = RepositoryLoader::new();
        assert!(loader.load(Path::new("/nonexistent/kiln/repo")).is_err());
    }
}
