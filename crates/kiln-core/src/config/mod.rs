//! Configuration for kiln
//!
//! Values are layered from several sources, later ones overriding earlier
//! ones, and each key remembers where its value came from.
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Command-line flags
//! 2. Environment variables (`KILN_*`)
//! 3. Project `kiln.toml`, found by searching upward from the working directory
//! 4. Global `config.toml` in the platform configuration directory (or `$KILN_HOME`)
//! 5. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::build(Some(Path::new("/path/to/project")), true).unwrap();
//! let policy = config.policy().unwrap();
//! println!("Repositories: {:?}", config.repos);
//! println!("Cost order: {:?}", policy.cost_order);
//! ```

mod config;
mod source;

pub use config::Config;
pub use source::{ConfigLoader, ConfigSource, RawConfig, PROJECT_FILE};
