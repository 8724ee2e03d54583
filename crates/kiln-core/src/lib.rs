pub mod concretizer;
pub mod config;
pub mod error;
pub mod graph;
pub mod recipe;
pub mod solver;
pub mod spec;

pub use concretizer::Concretizer;
pub use config::{Config, ConfigSource};
pub use error::{KilnError, Result};
pub use graph::{ConcreteGraph, ConcreteNode, TraversalOrder};
pub use recipe::{load_repositories, Recipe, RecipeRepository, Registry};
pub use solver::{CancelToken, Policy, Problem, Request, SolverOptions};
pub use spec::{Condition, DepTypes, Spec, Tri};
