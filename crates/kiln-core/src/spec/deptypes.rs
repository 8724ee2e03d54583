//! Dependency type sets

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Set of dependency types carried by an edge: build, link, run, test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DepTypes(u8);

const NAMES: [(&str, DepTypes); 4] = [
    ("build", DepTypes::BUILD),
    ("link", DepTypes::LINK),
    ("run", DepTypes::RUN),
    ("test", DepTypes::TEST),
];

impl DepTypes {
    pub const NONE: DepTypes = DepTypes(0);
    pub const BUILD: DepTypes = DepTypes(1);
    pub const LINK: DepTypes = DepTypes(1 << 1);
    pub const RUN: DepTypes = DepTypes(1 << 2);
    pub const TEST: DepTypes = DepTypes(1 << 3);
    pub const ALL: DepTypes = DepTypes(0b1111);
    /// Default for recipe edges that do not name a type
    pub const DEFAULT: DepTypes = DepTypes(0b0011);
    pub const LINK_RUN: DepTypes = DepTypes(0b0110);

    pub fn contains(self, other: DepTypes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: DepTypes) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn without(self, other: DepTypes) -> DepTypes {
        DepTypes(self.0 & !other.0)
    }

    /// Edges that are only needed while building the dependent
    pub fn is_build_only(self) -> bool {
        self == DepTypes::BUILD
    }

    pub fn is_link_or_run(self) -> bool {
        self.intersects(DepTypes::LINK_RUN)
    }

    pub fn names(self) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(_, t)| self.contains(*t))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Parse a comma separated list such as `build,link`
    pub fn parse(input: &str) -> Result<DepTypes, String> {
        let mut types = DepTypes::NONE;
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            types = types | DepTypes::from_name(part)?;
        }
        Ok(types)
    }

    fn from_name(name: &str) -> Result<DepTypes, String> {
        if name == "all" {
            return Ok(DepTypes::ALL);
        }
        NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
            .ok_or_else(|| format!("unknown dependency type \"{}\"", name))
    }
}

impl BitOr for DepTypes {
    type Output = DepTypes;

    fn bitor(self, rhs: DepTypes) -> DepTypes {
        DepTypes(self.0 | rhs.0)
    }
}

impl TryFrom<Vec<String>> for DepTypes {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names
            .iter()
            .try_fold(DepTypes::NONE, |acc, name| Ok(acc | DepTypes::from_name(name)?))
    }
}

impl From<DepTypes> for Vec<String> {
    fn from(types: DepTypes) -> Self {
        types.names().into_iter().map(String::from).collect()
    }
}

impl fmt::Display for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}
