use std::collections::BTreeMap;

use crate::error::{KilnError, Result};
use crate::spec::{ArchSpec, CompilerSpec, DependencyEdge, Spec, Tri};

use super::recipe::{ConflictRule, Recipe, VariantDecl, VersionDecl};

/// A recipe dependency edge that may apply to a partially known spec
#[derive(Debug, Clone, Copy)]
pub struct ApplicableDependency<'a> {
    /// Position of the edge in the recipe
    pub index: usize,
    pub edge: &'a DependencyEdge,
    /// Verdict of the edge condition; never `Violated`
    pub verdict: Tri,
}

/// Read-only recipe source queried during concretization
pub trait RecipeRepository: Send + Sync {
    /// Look up a recipe by package name
    fn get_recipe(&self, name: &str) -> Option<&Recipe>;

    /// Available compilers, most preferred first
    fn compilers(&self) -> &[CompilerSpec];

    /// Available architectures, most preferred first
    fn architectures(&self) -> &[ArchSpec];

    /// All package names, sorted
    fn package_names(&self) -> Vec<&str>;

    /// Like `get_recipe`, but an unknown name is an error
    fn recipe(&self, name: &str) -> Result<&Recipe> {
        self.get_recipe(name).ok_or_else(|| KilnError::UnknownPackage {
            name: name.to_string(),
            required_by: None,
        })
    }

    /// Declared versions of a package
    fn list_versions(&self, name: &str) -> Result<&[VersionDecl]> {
        Ok(&self.recipe(name)?.versions)
    }

    /// Declared variants of a package
    fn list_variants(&self, name: &str) -> Result<&[VariantDecl]> {
        Ok(&self.recipe(name)?.variants)
    }

    /// Dependency edges whose condition is not already violated by `partial`
    fn dependencies_of(&self, name: &str, partial: &Spec) -> Result<Vec<ApplicableDependency<'_>>> {
        let recipe = self.recipe(name)?;
        Ok(recipe
            .dependencies
            .iter()
            .enumerate()
            .filter_map(|(index, edge)| {
                let verdict = edge
                    .when
                    .as_ref()
                    .map_or(Tri::Satisfied, |when| when.evaluate(partial));
                (!verdict.is_violated()).then_some(ApplicableDependency { index, edge, verdict })
            })
            .collect())
    }

    /// Conflict rules of a package
    fn conflicts_of(&self, name: &str) -> Result<&[ConflictRule]> {
        Ok(&self.recipe(name)?.conflicts)
    }
}

/// Immutable in-memory recipe registry
#[derive(Debug, Clone, Default)]
pub struct Registry {
    recipes: BTreeMap<String, Recipe>,
    compilers: Vec<CompilerSpec>,
    architectures: Vec<ArchSpec>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }
}

impl RecipeRepository for Registry {
    fn get_recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(name)
    }

    fn compilers(&self) -> &[CompilerSpec] {
        &self.compilers
    }

    fn architectures(&self) -> &[ArchSpec] {
        &self.architectures
    }

    fn package_names(&self) -> Vec<&str> {
        self.recipes.keys().map(String::as_str).collect()
    }
}

/// Collects recipes, compilers and architectures into a [`Registry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    recipes: BTreeMap<String, Recipe>,
    compilers: Vec<CompilerSpec>,
    architectures: Vec<ArchSpec>,
}

impl RegistryBuilder {
    /// Add a recipe. Returns false and keeps the existing one when the
    /// name is already taken.
    pub fn add_recipe(&mut self, recipe: Recipe) -> bool {
        if self.recipes.contains_key(&recipe.name) {
            log::debug!("Recipe {} already defined, skipping", recipe.name);
            return false;
        }
        self.recipes.insert(recipe.name.clone(), recipe);
        true
    }

    pub fn has_recipe(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    pub fn add_compiler(&mut self, compiler: CompilerSpec) -> &mut Self {
        if !self.compilers.contains(&compiler) {
            self.compilers.push(compiler);
        }
        self
    }

    pub fn add_architecture(&mut self, architecture: ArchSpec) -> &mut Self {
        if !self.architectures.contains(&architecture) {
            self.architectures.push(architecture);
        }
        self
    }

    /// Chaining form of [`add_recipe`](Self::add_recipe) for tests and small setups
    pub fn recipe(mut self, recipe: Recipe) -> Self {
        self.add_recipe(recipe);
        self
    }

    pub fn compiler(mut self, compiler: CompilerSpec) -> Self {
        self.add_compiler(compiler);
        self
    }

    pub fn architecture(mut self, architecture: ArchSpec) -> Self {
        self.add_architecture(architecture);
        self
    }

    /// Validate and freeze the registry
    pub fn build(self) -> Result<Registry> {
        for recipe in self.recipes.values() {
            recipe.validate().map_err(|message| KilnError::InvalidRecipe {
                name: recipe.name.clone(),
                message,
            })?;
        }

        for compiler in &self.compilers {
            if compiler.concrete_version().is_none() {
                return Err(KilnError::Config(format!(
                    "compiler {} must name an exact version",
                    compiler
                )));
            }
        }
        if self.compilers.is_empty() && self.recipes.values().any(|r| r.needs_compiler) {
            return Err(KilnError::Config("no compilers are configured".to_string()));
        }

        if let Some(arch) = self.architectures.iter().find(|a| !a.is_complete()) {
            return Err(KilnError::Config(format!(
                "architecture {} must name platform, os and target",
                arch
            )));
        }
        if self.architectures.is_empty() && !self.recipes.is_empty() {
            return Err(KilnError::Config("no architectures are configured".to_string()));
        }

        log::debug!(
            "Registry built with {} recipes, {} compilers, {} architectures",
            self.recipes.len(),
            self.compilers.len(),
            self.architectures.len()
        );

        Ok(Registry {
            recipes: self.recipes,
            compilers: self.compilers,
            architectures: self.architectures,
        })
    }
}
