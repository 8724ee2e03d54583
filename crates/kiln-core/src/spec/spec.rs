//! Abstract and concrete specs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kiln_version::{Version, VersionConstraint};

use super::condition::Condition;
use super::deptypes::DepTypes;
use super::parser::{ParseError, SpecParser};
use super::variant::VariantValue;
use crate::error::{KilnError, Result};

/// Compiler constraint, `%gcc@12:`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilerSpec {
    pub name: String,
    pub versions: VersionConstraint,
}

impl CompilerSpec {
    pub fn new(name: impl Into<String>, versions: VersionConstraint) -> Self {
        CompilerSpec {
            name: name.into(),
            versions,
        }
    }

    /// Parse `gcc@12.3.0` (without the leading `%`)
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let spec = SpecParser::new(&format!("%{}", input.trim())).parse()?;
        spec.compiler
            .ok_or_else(|| ParseError::new(input, 0, "expected a compiler"))
    }

    pub fn concrete_version(&self) -> Option<&Version> {
        self.versions.concrete()
    }

    pub fn satisfies(&self, other: &CompilerSpec) -> bool {
        self.name == other.name && versions_satisfy(&self.versions, &other.versions)
    }

    pub fn intersects(&self, other: &CompilerSpec) -> bool {
        self.name == other.name && self.versions.intersects(&other.versions)
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(v) = self.versions.concrete() {
            write!(f, "@{}", v)
        } else if !self.versions.is_any() {
            write!(f, "@{}", self.versions)
        } else {
            Ok(())
        }
    }
}

/// Target architecture as a `platform-os-target` triple. Any part may be
/// left open in an abstract spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArchSpec {
    pub platform: Option<String>,
    pub os: Option<String>,
    pub target: Option<String>,
}

impl ArchSpec {
    /// Parse `linux-ubuntu22.04-x86_64`
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let input = input.trim();
        let shape = "architecture must be platform-os-target";
        let (platform, rest) = input
            .split_once('-')
            .ok_or_else(|| ParseError::new(input, 0, shape))?;
        let (os, target) = rest
            .rsplit_once('-')
            .ok_or_else(|| ParseError::new(input, platform.len(), shape))?;
        if platform.is_empty() || os.is_empty() || target.is_empty() {
            return Err(ParseError::new(input, 0, "architecture has an empty part"));
        }
        Ok(ArchSpec {
            platform: Some(platform.to_string()),
            os: Some(os.to_string()),
            target: Some(target.to_string()),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.platform.is_some() && self.os.is_some() && self.target.is_some()
    }

    pub fn satisfies(&self, other: &ArchSpec) -> bool {
        field_satisfies(&self.platform, &other.platform)
            && field_satisfies(&self.os, &other.os)
            && field_satisfies(&self.target, &other.target)
    }

    pub fn intersects(&self, other: &ArchSpec) -> bool {
        field_intersects(&self.platform, &other.platform)
            && field_intersects(&self.os, &other.os)
            && field_intersects(&self.target, &other.target)
    }

    fn merge(&mut self, other: &ArchSpec) {
        if self.platform.is_none() {
            self.platform = other.platform.clone();
        }
        if self.os.is_none() {
            self.os = other.os.clone();
        }
        if self.target.is_none() {
            self.target = other.target.clone();
        }
    }
}

fn field_satisfies(mine: &Option<String>, theirs: &Option<String>) -> bool {
    match theirs {
        None => true,
        Some(want) => mine.as_deref() == Some(want.as_str()),
    }
}

fn field_intersects(mine: &Option<String>, theirs: &Option<String>) -> bool {
    match (mine, theirs) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

impl fmt::Display for ArchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(platform), Some(os), Some(target)) = (&self.platform, &self.os, &self.target) {
            return write!(f, "arch={}-{}-{}", platform, os, target);
        }
        let mut parts = Vec::new();
        if let Some(platform) = &self.platform {
            parts.push(format!("platform={}", platform));
        }
        if let Some(os) = &self.os {
            parts.push(format!("os={}", os));
        }
        if let Some(target) = &self.target {
            parts.push(format!("target={}", target));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Edge from a spec to one of its dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub spec: Spec,
    pub deptypes: DepTypes,
    /// Edge only applies when the depending spec meets this condition
    pub when: Option<Condition>,
}

impl DependencyEdge {
    pub fn new(spec: Spec, deptypes: DepTypes) -> Self {
        DependencyEdge {
            spec,
            deptypes,
            when: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }
}

/// A package spec.
///
/// Abstract specs constrain some attributes and leave the rest open. A
/// concrete spec pins an exact version, compiler and architecture and binds
/// every variant the recipe declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Spec {
    pub name: Option<String>,
    pub versions: VersionConstraint,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: Option<CompilerSpec>,
    pub architecture: Option<ArchSpec>,
    pub dependencies: Vec<DependencyEdge>,
}

fn versions_satisfy(mine: &VersionConstraint, theirs: &VersionConstraint) -> bool {
    match mine.concrete() {
        Some(version) => theirs.contains(version),
        None => mine.is_subset_of(theirs),
    }
}

impl Spec {
    pub fn named(name: impl Into<String>) -> Self {
        Spec {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Parse a spec expression such as `zlib@1.2: +shared %gcc ^cmake@3.20:`
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        SpecParser::new(input).parse()
    }

    pub fn with_versions(mut self, versions: VersionConstraint) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_variant(mut self, name: impl Into<String>, value: VariantValue) -> Self {
        self.variants.insert(name.into(), value);
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerSpec) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_architecture(mut self, architecture: ArchSpec) -> Self {
        self.architecture = Some(architecture);
        self
    }

    pub fn with_dependency(mut self, spec: Spec) -> Self {
        self.dependencies.push(DependencyEdge::new(spec, DepTypes::ALL));
        self
    }

    /// Package name, empty for anonymous specs
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    pub fn version(&self) -> Option<&Version> {
        self.versions.concrete()
    }

    /// Node-level concreteness: exact version, exact compiler when one is set,
    /// complete architecture
    pub fn is_concrete(&self) -> bool {
        self.name.is_some()
            && self.versions.concrete().is_some()
            && self
                .compiler
                .as_ref()
                .map_or(true, |c| c.concrete_version().is_some())
            && self.architecture.as_ref().is_some_and(ArchSpec::is_complete)
    }

    /// Find a dependency by name anywhere below this spec
    pub fn find_dependency(&self, name: &str) -> Option<&Spec> {
        for edge in &self.dependencies {
            if edge.spec.name.as_deref() == Some(name) {
                return Some(&edge.spec);
            }
        }
        self.dependencies
            .iter()
            .find_map(|edge| edge.spec.find_dependency(name))
    }

    /// Whether every constraint in `other` holds for `self`
    pub fn satisfies(&self, other: &Spec) -> bool {
        if let Some(name) = &other.name {
            if self.name.as_ref() != Some(name) {
                return false;
            }
        }
        if !versions_satisfy(&self.versions, &other.versions) {
            return false;
        }
        for (name, wanted) in &other.variants {
            match self.variants.get(name) {
                Some(value) if value.satisfies(wanted) => {}
                _ => return false,
            }
        }
        if let Some(wanted) = &other.compiler {
            match &self.compiler {
                Some(compiler) if compiler.satisfies(wanted) => {}
                _ => return false,
            }
        }
        if let Some(wanted) = &other.architecture {
            match &self.architecture {
                Some(arch) if arch.satisfies(wanted) => {}
                _ => return false,
            }
        }
        other.dependencies.iter().all(|edge| {
            self.find_dependency(edge.spec.name())
                .is_some_and(|dep| dep.satisfies(&edge.spec))
        })
    }

    /// Whether some concrete spec could satisfy both `self` and `other`
    pub fn intersects(&self, other: &Spec) -> bool {
        if let (Some(a), Some(b)) = (&self.name, &other.name) {
            if a != b {
                return false;
            }
        }
        if !self.versions.intersects(&other.versions) {
            return false;
        }
        for (name, value) in &other.variants {
            if let Some(mine) = self.variants.get(name) {
                if !mine.intersects(value) {
                    return false;
                }
            }
        }
        if let (Some(a), Some(b)) = (&self.compiler, &other.compiler) {
            if !a.intersects(b) {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (&self.architecture, &other.architecture) {
            if !a.intersects(b) {
                return false;
            }
        }
        other.dependencies.iter().all(|edge| {
            self.find_dependency(edge.spec.name())
                .map_or(true, |dep| dep.intersects(&edge.spec))
        })
    }

    /// Merge the constraints of `other` into `self`. Returns whether anything
    /// changed and fails when the two cannot hold together.
    pub fn constrain(&mut self, other: &Spec) -> Result<bool> {
        if !self.intersects(other) {
            return Err(KilnError::InvalidRequest(format!(
                "{} conflicts with {}",
                self, other
            )));
        }
        let before = self.clone();

        if self.name.is_none() {
            self.name = other.name.clone();
        }
        self.versions = self.versions.intersection(&other.versions);

        for (name, value) in &other.variants {
            match self.variants.get_mut(name) {
                None => {
                    self.variants.insert(name.clone(), value.clone());
                }
                Some(mine) if mine.is_multi() || value.is_multi() => {
                    let mut merged = mine.values();
                    merged.extend(value.values());
                    *mine = VariantValue::Multi(merged);
                }
                Some(_) => {}
            }
        }

        match (&mut self.compiler, &other.compiler) {
            (None, Some(theirs)) => self.compiler = Some(theirs.clone()),
            (Some(mine), Some(theirs)) => {
                mine.versions = mine.versions.intersection(&theirs.versions);
            }
            _ => {}
        }

        match (&mut self.architecture, &other.architecture) {
            (None, Some(theirs)) => self.architecture = Some(theirs.clone()),
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            _ => {}
        }

        for edge in &other.dependencies {
            let existing = self
                .dependencies
                .iter_mut()
                .find(|mine| mine.spec.name == edge.spec.name);
            match existing {
                Some(mine) => {
                    mine.spec.constrain(&edge.spec)?;
                    mine.deptypes = mine.deptypes | edge.deptypes;
                }
                None => self.dependencies.push(edge.clone()),
            }
        }

        Ok(*self != before)
    }

    /// Render only this node's attributes, without `^` dependencies
    pub fn format_node(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str(name);
        }
        if !self.versions.is_any() {
            out.push('@');
            out.push_str(&self.versions.to_string());
        }
        if let Some(compiler) = &self.compiler {
            out.push('%');
            out.push_str(&compiler.to_string());
        }

        let (flags, pairs): (Vec<_>, Vec<_>) = self
            .variants
            .iter()
            .partition(|(_, value)| matches!(value, VariantValue::Bool(_)));
        for (name, value) in flags {
            out.push_str(&value.format(name));
        }
        for (name, value) in pairs {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&value.format(name));
        }

        if let Some(arch) = &self.architecture {
            let arch = arch.to_string();
            if !arch.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&arch);
            }
        }
        out
    }
}

impl FromStr for Spec {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Spec::parse(s)
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_node())?;
        for edge in &self.dependencies {
            write!(f, " ^{}", edge.spec)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> Spec {
        Spec::parse(s).unwrap()
    }

    fn concrete() -> Spec {
        spec("zlib@=1.3.1 %gcc@=12.3.0 +shared+pic arch=linux-ubuntu22.04-x86_64")
    }

    #[test]
    fn test_concrete_detection() {
        assert!(concrete().is_concrete());
        assert!(!spec("zlib@1.3").is_concrete());
        assert!(!spec("zlib@=1.3.1 %gcc@12:").is_concrete());
        assert!(!spec("zlib@=1.3.1 %gcc@=12.3.0 target=x86_64").is_concrete());
    }

    #[test]
    fn test_satisfies() {
        let node = concrete();
        assert!(node.satisfies(&spec("zlib")));
        assert!(node.satisfies(&spec("zlib@1.3")));
        assert!(node.satisfies(&spec("zlib@1.2:")));
        assert!(node.satisfies(&spec("+shared")));
        assert!(node.satisfies(&spec("%gcc@12")));
        assert!(node.satisfies(&spec("target=x86_64")));
        assert!(!node.satisfies(&spec("zlib@:1.2")));
        assert!(!node.satisfies(&spec("~shared")));
        assert!(!node.satisfies(&spec("+optimize")));
        assert!(!node.satisfies(&spec("%clang")));
        assert!(!node.satisfies(&spec("libz")));
    }

    #[test]
    fn test_satisfies_dependencies() {
        let node = concrete().with_dependency(spec("cmake@=3.27.9"));
        assert!(node.satisfies(&spec("zlib ^cmake@3.20:")));
        assert!(!node.satisfies(&spec("zlib ^cmake@:3.19")));
        assert!(!node.satisfies(&spec("zlib ^ninja")));
    }

    #[test]
    fn test_intersects() {
        assert!(spec("a@1:2").intersects(&spec("a@1.5:")));
        assert!(!spec("a@:1").intersects(&spec("a@2:")));
        assert!(!spec("a+x").intersects(&spec("a~x")));
        assert!(!spec("a").intersects(&spec("b")));
        assert!(spec("a libs=shared").intersects(&spec("a libs=static,shared")));
    }

    #[test]
    fn test_constrain() {
        let mut a = spec("a@1:3 +x");
        assert!(a.constrain(&spec("a@2: %gcc ^b@1")).unwrap());
        assert_eq!(a.versions, VersionConstraint::parse("2:3").unwrap());
        assert_eq!(a.compiler.as_ref().map(|c| c.name.as_str()), Some("gcc"));
        assert!(a.find_dependency("b").is_some());
        assert!(!a.clone().constrain(&spec("a@2:")).unwrap());
        assert!(a.constrain(&spec("a~x")).is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let text = "zlib@1.2:%gcc@12+pic~shared libs=static ^cmake@3.20:";
        let parsed = spec(text);
        assert_eq!(parsed.to_string(), text);
        assert_eq!(spec(&parsed.to_string()), parsed);
    }
}
