use std::path::PathBuf;

use thiserror::Error;

use crate::solver::Problem;
use crate::spec::ParseError;

#[derive(Error, Debug)]
pub enum KilnError {
    // Concretization errors
    #[error(
        "Unknown package: {name}{}",
        required_by.as_ref().map(|by| format!(" (required by {})", by)).unwrap_or_default()
    )]
    UnknownPackage { name: String, required_by: Option<String> },

    #[error("Unsatisfiable constraints:\n{problem}")]
    Unsatisfiable { problem: Problem },

    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Package {name} appears more than once in the graph")]
    DuplicateNode { name: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Concretization was cancelled")]
    Cancelled,

    #[error("Solver gave up after {iterations} iterations")]
    ResourceLimit { iterations: u64 },

    #[error("Concrete graph failed verification: {0}")]
    Verification(String),

    // Parsing errors
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid version: {0}")]
    Version(#[from] kiln_version::VersionError),

    // Recipe and repository errors
    #[error("Invalid recipe {}: {message}", path.display())]
    Recipe { path: PathBuf, message: String },

    #[error("Invalid recipe for {name}: {message}")]
    InvalidRecipe { name: String, message: String },

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KilnError>;
