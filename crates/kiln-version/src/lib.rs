//! Version ordering and range algebra for kiln recipes
//!
//! Versions are split into numeric and alphabetic components. Numeric
//! components compare numerically, plain words sort below numbers, and a
//! small set of branch names (`develop`, `main`, `master`, `head`, `trunk`,
//! `stable`) sort above every released version.
//!
//! Constraints use the recipe syntax: `1.2` (1.2 and every 1.2.x), `=1.2`
//! (exactly 1.2), `1.2:1.4`, `:1.4`, `1.2:` and comma separated lists.

mod constraint;
mod error;
mod range;
mod version;

pub use constraint::{VersionConstraint, VersionItem};
pub use error::VersionError;
pub use range::VersionRange;
pub use version::{Component, Version};
