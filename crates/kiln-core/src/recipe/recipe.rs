//! Recipe model: what a package can be built as

use std::collections::BTreeSet;
use std::fmt;

use kiln_version::Version;
use serde::{Deserialize, Serialize};

use crate::spec::{Condition, DependencyEdge, Spec, VariantValue};

/// A declared version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecl {
    pub version: Version,
    pub deprecated: bool,
    /// Preferred over newer versions when choosing
    pub preferred: bool,
}

impl VersionDecl {
    pub fn new(version: Version) -> Self {
        VersionDecl {
            version,
            deprecated: false,
            preferred: false,
        }
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// `+name` / `~name`
    Bool,
    /// Exactly one value out of a fixed list
    Single,
    /// Any non-empty subset of a fixed list
    Multi,
}

/// A declared build option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDecl {
    pub name: String,
    pub kind: VariantKind,
    values: Vec<String>,
    defaults: BTreeSet<String>,
    pub description: Option<String>,
}

impl VariantDecl {
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        VariantDecl {
            name: name.into(),
            kind: VariantKind::Bool,
            values: vec!["true".to_string(), "false".to_string()],
            defaults: BTreeSet::from([default.to_string()]),
            description: None,
        }
    }

    pub fn single(name: impl Into<String>, values: &[&str], default: &str) -> Self {
        VariantDecl {
            name: name.into(),
            kind: VariantKind::Single,
            values: values.iter().map(|v| v.to_string()).collect(),
            defaults: BTreeSet::from([default.to_string()]),
            description: None,
        }
    }

    pub fn multi(name: impl Into<String>, values: &[&str], defaults: &[&str]) -> Self {
        VariantDecl {
            name: name.into(),
            kind: VariantKind::Multi,
            values: values.iter().map(|v| v.to_string()).collect(),
            defaults: defaults.iter().map(|v| v.to_string()).collect(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Every value the variant can take, in declaration order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn defaults(&self) -> &BTreeSet<String> {
        &self.defaults
    }

    pub fn is_default(&self, value: &str) -> bool {
        self.defaults.contains(value)
    }

    pub fn default_value(&self) -> VariantValue {
        self.to_value(self.defaults.clone())
    }

    /// Build the spec value for a set of selected values
    pub fn to_value(&self, selected: BTreeSet<String>) -> VariantValue {
        match self.kind {
            VariantKind::Bool => VariantValue::Bool(selected.contains("true")),
            VariantKind::Single => {
                VariantValue::Single(selected.into_iter().next().unwrap_or_default())
            }
            VariantKind::Multi => VariantValue::Multi(selected),
        }
    }

    /// Values that a requirement forces to be selected, or why the
    /// requirement does not fit this variant
    pub fn required_values(&self, wanted: &VariantValue) -> Result<BTreeSet<String>, String> {
        let values = wanted.values();
        if self.kind != VariantKind::Multi && values.len() != 1 {
            return Err(format!("variant \"{}\" takes a single value", self.name));
        }
        if self.kind != VariantKind::Bool && matches!(wanted, VariantValue::Bool(_)) {
            return Err(format!("variant \"{}\" is not a boolean", self.name));
        }
        for value in &values {
            if !self.values.contains(value) {
                return Err(format!(
                    "invalid value \"{}\" for variant \"{}\" (expected one of {})",
                    value,
                    self.name,
                    self.values.join(", ")
                ));
            }
        }
        Ok(values)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.values.is_empty() {
            return Err(format!("variant \"{}\" has no values", self.name));
        }
        if self.defaults.is_empty() {
            return Err(format!("variant \"{}\" has no default", self.name));
        }
        if self.kind != VariantKind::Multi && self.defaults.len() != 1 {
            return Err(format!("variant \"{}\" must have exactly one default", self.name));
        }
        if let Some(bad) = self.defaults.iter().find(|d| !self.values.contains(d)) {
            return Err(format!(
                "default \"{}\" of variant \"{}\" is not an allowed value",
                bad, self.name
            ));
        }
        Ok(())
    }
}

/// A recipe conflict: the package cannot be built when it matches both
/// `trigger` and `when`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRule {
    pub trigger: Spec,
    pub when: Option<Condition>,
    pub message: Option<String>,
}

impl ConflictRule {
    pub fn new(trigger: Spec) -> Self {
        ConflictRule {
            trigger,
            when: None,
            message: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trigger)?;
        if let Some(when) = &self.when {
            write!(f, " when {}", when)?;
        }
        Ok(())
    }
}

/// Build phases a recipe implements. Carried as data for the build layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildHook {
    Autoreconf,
    Configure,
    Cmake,
    Meson,
    Edit,
    Build,
    Check,
    Install,
    InstallCheck,
}

/// Package recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    pub description: Option<String>,
    pub versions: Vec<VersionDecl>,
    pub variants: Vec<VariantDecl>,
    pub dependencies: Vec<DependencyEdge>,
    pub conflicts: Vec<ConflictRule>,
    pub build_system: Option<String>,
    pub hooks: BTreeSet<BuildHook>,
    /// Packages without compiled code skip compiler selection
    pub needs_compiler: bool,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Recipe {
            name: name.into(),
            description: None,
            versions: Vec::new(),
            variants: Vec::new(),
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            build_system: None,
            hooks: BTreeSet::new(),
            needs_compiler: true,
        }
    }

    pub fn with_version(mut self, version: VersionDecl) -> Self {
        self.versions.push(version);
        self
    }

    pub fn with_variant(mut self, variant: VariantDecl) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_dependency(mut self, edge: DependencyEdge) -> Self {
        self.dependencies.push(edge);
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictRule) -> Self {
        self.conflicts.push(conflict);
        self
    }

    pub fn without_compiler(mut self) -> Self {
        self.needs_compiler = false;
        self
    }

    pub fn variant(&self, name: &str) -> Option<&VariantDecl> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn has_version(&self, version: &Version) -> bool {
        self.versions.iter().any(|v| &v.version == version)
    }

    /// Check internal consistency of the recipe
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("recipe has no name".to_string());
        }
        if self.versions.is_empty() {
            return Err(format!("recipe {} declares no versions", self.name));
        }

        let mut seen = BTreeSet::new();
        for decl in &self.versions {
            if !seen.insert(decl.version.clone()) {
                return Err(format!("version {} of {} is declared twice", decl.version, self.name));
            }
        }

        let mut names = BTreeSet::new();
        for variant in &self.variants {
            if !names.insert(variant.name.as_str()) {
                return Err(format!("variant {} of {} is declared twice", variant.name, self.name));
            }
            variant.validate()?;
        }

        for edge in &self.dependencies {
            if edge.spec.is_anonymous() {
                return Err(format!("{} has a dependency without a package name", self.name));
            }
            if edge.deptypes.is_empty() {
                return Err(format!(
                    "{} depends on {} with no dependency type",
                    self.name,
                    edge.name()
                ));
            }
            if edge.spec.name() == self.name {
                return Err(format!("{} depends on itself", self.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_variant_required_values() {
        let libs = VariantDecl::multi("libs", &["shared", "static"], &["shared", "static"]);
        assert_eq!(
            libs.required_values(&VariantValue::Single("shared".into())).unwrap(),
            BTreeSet::from(["shared".to_string()])
        );
        assert!(libs.required_values(&VariantValue::Single("dynamic".into())).is_err());

        let cuda = VariantDecl::boolean("cuda", false);
        assert!(cuda.required_values(&VariantValue::Bool(true)).is_ok());
        assert!(cuda.required_values(&VariantValue::Single("yes".into())).is_err());

        let build_type = VariantDecl::single("build_type", &["Release", "Debug"], "Release");
        assert!(build_type.required_values(&VariantValue::Bool(true)).is_err());
        assert!(build_type
            .required_values(&VariantValue::from_assignment("Release,Debug"))
            .is_err());
    }

    #[test]
    fn test_variant_default_value() {
        assert_eq!(VariantDecl::boolean("x", true).default_value(), VariantValue::Bool(true));
        assert_eq!(
            VariantDecl::single("bt", &["a", "b"], "b").default_value(),
            VariantValue::Single("b".into())
        );
    }

    #[test]
    fn test_validate() {
        let ok = Recipe::new("kakoune").with_version(VersionDecl::new(v("2023.08.05")));
        assert!(ok.validate().is_ok());

        assert!(Recipe::new("empty").validate().is_err());

        let twice = Recipe::new("a")
            .with_version(VersionDecl::new(v("1.0")))
            .with_version(VersionDecl::new(v("1.0.0")).deprecated())
            .with_version(VersionDecl::new(v("1.0")));
        assert!(twice.validate().is_err());

        let bad_default = Recipe::new("a")
            .with_version(VersionDecl::new(v("1.0")))
            .with_variant(VariantDecl::single("mode", &["fast"], "slow"));
        assert!(bad_default.validate().is_err());
    }
}
