use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::{KilnError, Result};
use crate::spec::Spec;

/// A concretization request.
///
/// Roots are concretized together into one graph.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Requested specs, in request order
    pub roots: Vec<Spec>,

    /// Constraints applied to a package whenever it appears in the graph
    /// (name -> constraint). Keeps insertion order for stable rule numbering.
    pub pins: IndexMap<String, Spec>,

    /// Packages whose build-only dependents may use a separate instance
    pub split_build: BTreeSet<String>,

    /// Follow test dependencies of the roots
    pub include_test_deps: bool,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request from spec expressions, e.g. `["hdf5@1.14 +mpi", "zlib"]`
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut request = Request::new();
        for spec in specs {
            request.require(Spec::parse(spec.as_ref())?);
        }
        Ok(request)
    }

    pub fn require(&mut self, spec: Spec) -> &mut Self {
        self.roots.push(spec);
        self
    }

    /// Pin a package. Repeated pins of one name are merged.
    pub fn pin(&mut self, spec: Spec) -> Result<&mut Self> {
        let name = spec.name.clone().ok_or_else(|| {
            KilnError::InvalidRequest(format!("pin \"{}\" has no package name", spec))
        })?;
        match self.pins.get_mut(&name) {
            Some(existing) => {
                existing.constrain(&spec)?;
            }
            None => {
                self.pins.insert(name, spec);
            }
        }
        Ok(self)
    }

    pub fn allow_split(&mut self, name: impl Into<String>) -> &mut Self {
        self.split_build.insert(name.into());
        self
    }

    pub fn with_test_deps(&mut self, include: bool) -> &mut Self {
        self.include_test_deps = include;
        self
    }

    pub fn is_split(&self, name: &str) -> bool {
        self.split_build.contains(name)
    }

    pub fn root_names(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(Spec::name)
    }

    /// Everything the request says about one package: root specs, `^dep`
    /// constraints below them and pins
    pub fn constraints_on(&self, name: &str) -> Vec<&Spec> {
        let mut found = Vec::new();
        for root in &self.roots {
            if root.name.as_deref() == Some(name) {
                found.push(root);
            }
            collect_dependency_constraints(root, name, &mut found);
        }
        if let Some(pin) = self.pins.get(name) {
            found.push(pin);
        }
        found
    }

    /// The request's view of one package, merged into a single spec
    pub fn partial_spec(&self, name: &str) -> Spec {
        let mut partial = Spec::named(name);
        for spec in self.constraints_on(name) {
            let mut node = spec.clone();
            node.name = Some(name.to_string());
            // Contradictions surface as unsatisfiable rules later
            if partial.constrain(&node).is_err() {
                log::debug!("Request constraints on {} contradict each other", name);
            }
        }
        partial
    }

    /// Check the request is well formed
    pub fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(KilnError::InvalidRequest("nothing to concretize".to_string()));
        }
        for root in &self.roots {
            if root.is_anonymous() {
                return Err(KilnError::InvalidRequest(format!(
                    "\"{}\" does not name a package",
                    root
                )));
            }
        }
        Ok(())
    }
}

fn collect_dependency_constraints<'a>(spec: &'a Spec, name: &str, found: &mut Vec<&'a Spec>) {
    for edge in &spec.dependencies {
        if edge.spec.name.as_deref() == Some(name) {
            found.push(&edge.spec);
        }
        collect_dependency_constraints(&edge.spec, name, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_constraints() {
        let mut request = Request::parse(&["a@2: ^b+x", "c ^b@1"]).unwrap();
        request.pin(Spec::parse("b~y").unwrap()).unwrap();

        assert_eq!(request.root_names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(request.constraints_on("b").len(), 3);
        assert_eq!(request.constraints_on("a").len(), 1);

        let partial = request.partial_spec("b");
        assert!(partial.satisfies(&Spec::parse("b+x~y").unwrap()));
        assert_eq!(partial.versions.to_string(), "1");
    }

    #[test]
    fn test_pins_merge() {
        let mut request = Request::new();
        request.pin(Spec::parse("zlib@1.2:").unwrap()).unwrap();
        request.pin(Spec::parse("zlib+pic").unwrap()).unwrap();
        assert_eq!(request.pins.len(), 1);
        assert!(request.pin(Spec::parse("zlib@:1.1").unwrap()).is_err());
        assert!(request.pin(Spec::parse("+pic").unwrap()).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Request::new().validate().is_err());
        assert!(Request::parse(&["@1.0"]).unwrap().validate().is_err());
        assert!(Request::parse(&["a"]).unwrap().validate().is_ok());
    }
}
