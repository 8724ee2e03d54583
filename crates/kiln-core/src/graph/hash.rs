//! Content hashes of concrete nodes.
//!
//! A node's hash covers its own attributes plus the hashes of what it
//! depends on, serialized as canonical JSON and digested with SHA-256.
//! Link/run dependencies contribute their full DAG hash; build-only
//! dependencies contribute only their link/run hash, so swapping a build
//! tool's own build dependencies does not change its dependents.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::spec::{DepTypes, Spec};

#[derive(Serialize)]
struct NodeAttributes<'a> {
    name: &'a str,
    version: String,
    compiler: Option<String>,
    architecture: Option<String>,
    variants: BTreeMap<&'a str, Vec<String>>,
}

#[derive(Serialize)]
struct HashInput<'a> {
    node: NodeAttributes<'a>,
    /// Split build instances never share an identity with the main node
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    build_instance: bool,
    /// (name, deptypes, hash), sorted
    dependencies: Vec<(&'a str, DepTypes, &'a str)>,
}

fn attributes(spec: &Spec) -> NodeAttributes<'_> {
    NodeAttributes {
        name: spec.name(),
        version: spec.versions.to_string(),
        compiler: spec.compiler.as_ref().map(ToString::to_string),
        architecture: spec.architecture.as_ref().map(ToString::to_string),
        variants: spec
            .variants
            .iter()
            .map(|(name, value)| (name.as_str(), value.values().into_iter().collect()))
            .collect(),
    }
}

/// SHA-256 of the node and the given dependency hashes, as lowercase hex
pub fn node_hash(
    spec: &Spec,
    build_instance: bool,
    dependencies: &[(&str, DepTypes, &str)],
) -> Result<String> {
    let mut dependencies = dependencies.to_vec();
    dependencies.sort();
    let input = HashInput {
        node: attributes(spec),
        build_instance,
        dependencies,
    };
    let canonical = serde_json::to_vec(&input)?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> Spec {
        Spec::parse(s).unwrap()
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let zlib = spec("zlib@=1.3.1 +pic %gcc@=12.3.0 arch=linux-ubuntu22.04-x86_64");
        let first = node_hash(&zlib, false, &[]).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, node_hash(&zlib, false, &[]).unwrap());

        let other = spec("zlib@=1.3.1 ~pic %gcc@=12.3.0 arch=linux-ubuntu22.04-x86_64");
        assert_ne!(first, node_hash(&other, false, &[]).unwrap());
    }

    #[test]
    fn test_dependency_order_does_not_matter() {
        let app = spec("app@=1.0 arch=linux-ubuntu22.04-x86_64");
        let lib = ("b", DepTypes::LINK, "1111");
        let tool = ("a", DepTypes::BUILD, "2222");
        let a = node_hash(&app, false, &[lib, tool]).unwrap();
        let b = node_hash(&app, false, &[tool, lib]).unwrap();
        assert_eq!(a, b);
        let c = node_hash(&app, false, &[("a", DepTypes::BUILD, "3333"), lib]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_build_instance_has_its_own_hash() {
        let tool = spec("tool@=2.0 %gcc@=12.3.0 arch=linux-ubuntu22.04-x86_64");
        let main = node_hash(&tool, false, &[]).unwrap();
        let build = node_hash(&tool, true, &[]).unwrap();
        assert_ne!(main, build);
    }
}
