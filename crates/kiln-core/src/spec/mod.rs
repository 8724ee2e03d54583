//! Spec data model
//!
//! A [`Spec`] describes one package build, either abstractly (constraints
//! from a request or recipe) or concretely (every choice made).

mod condition;
mod deptypes;
mod parser;
mod spec;
mod variant;

pub use condition::{Condition, Tri};
pub use deptypes::DepTypes;
pub use parser::{ParseError, SpecParser};
pub use spec::{ArchSpec, CompilerSpec, DependencyEdge, Spec};
pub use variant::VariantValue;
