//! Package recipes and the registry that serves them

mod loader;
mod recipe;
mod registry;

pub use loader::{load_repositories, parse_recipe, RepositoryLoader};
pub use recipe::{BuildHook, ConflictRule, Recipe, VariantDecl, VariantKind, VersionDecl};
pub use registry::{ApplicableDependency, RecipeRepository, Registry, RegistryBuilder};
