//! Parser for spec expressions
//!
//! ```text
//! spec    := node ('^' node)*
//! node    := [name] item*
//! item    := '@' versions
//!          | '+' ident | '~' ident | '-' ident
//!          | '%' ident ['@' versions]
//!          | ident '=' value
//! ```
//!
//! `arch=`, `platform=`, `os=` and `target=` set the architecture; every
//! other `key=value` is a variant.

use kiln_version::VersionConstraint;
use thiserror::Error;

use super::deptypes::DepTypes;
use super::spec::{ArchSpec, CompilerSpec, DependencyEdge, Spec};
use super::variant::VariantValue;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position} in \"{input}\"")]
pub struct ParseError {
    pub input: String,
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(input: &str, position: usize, message: impl Into<String>) -> Self {
        ParseError {
            input: input.to_string(),
            position,
            message: message.into(),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '=' | ',')
}

pub struct SpecParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SpecParser<'a> {
    pub fn new(input: &'a str) -> Self {
        SpecParser { input, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Spec, ParseError> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(self.error("empty spec"));
        }

        let mut root = self.parse_node()?;
        while !self.at_end() {
            match self.peek() {
                Some('^') => {
                    self.bump();
                    self.skip_whitespace();
                    let start = self.pos;
                    let dep = self.parse_node()?;
                    if dep.name.is_none() {
                        let message = "dependency needs a package name";
                        return Err(ParseError::new(self.input, start, message));
                    }
                    root.dependencies.push(DependencyEdge::new(dep, DepTypes::ALL));
                }
                _ => return Err(self.error("unexpected input")),
            }
        }
        Ok(root)
    }

    fn parse_node(&mut self) -> Result<Spec, ParseError> {
        let mut spec = Spec::default();

        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            match c {
                '^' => break,
                '@' => {
                    self.bump();
                    if !spec.versions.is_any() {
                        return Err(self.error("version given twice"));
                    }
                    spec.versions = self.parse_versions()?;
                }
                '+' | '~' => {
                    self.bump();
                    let name = self.take_ident("variant name")?;
                    spec.variants.insert(name, VariantValue::Bool(c == '+'));
                }
                '-' => {
                    self.bump();
                    let name = self.take_ident("variant name")?;
                    spec.variants.insert(name, VariantValue::Bool(false));
                }
                '%' => {
                    self.bump();
                    if spec.compiler.is_some() {
                        return Err(self.error("compiler given twice"));
                    }
                    let name = self.take_ident("compiler name")?;
                    let versions = if self.peek() == Some('@') {
                        self.bump();
                        self.parse_versions()?
                    } else {
                        VersionConstraint::Any
                    };
                    spec.compiler = Some(CompilerSpec::new(name, versions));
                }
                c if is_ident_char(c) => {
                    let start = self.pos;
                    let ident = self.take_ident("name")?;
                    if self.peek() == Some('=') {
                        self.bump();
                        let value = self.take_value()?;
                        self.apply_assignment(&mut spec, start, &ident, &value)?;
                    } else if spec.name.is_none() && spec == Spec::default() {
                        spec.name = Some(ident);
                    } else {
                        let message = format!("unexpected name \"{}\"", ident);
                        return Err(ParseError::new(self.input, start, message));
                    }
                }
                other => return Err(self.error(format!("unexpected character '{}'", other))),
            }
        }

        Ok(spec)
    }

    fn apply_assignment(
        &self,
        spec: &mut Spec,
        start: usize,
        key: &str,
        value: &str,
    ) -> Result<(), ParseError> {
        match key {
            "arch" | "architecture" => {
                let arch = ArchSpec::parse(value)
                    .map_err(|e| ParseError::new(self.input, start, e.message))?;
                spec.architecture = Some(arch);
            }
            "platform" => {
                let arch = spec.architecture.get_or_insert_with(ArchSpec::default);
                arch.platform = Some(value.to_string());
            }
            "os" => {
                let arch = spec.architecture.get_or_insert_with(ArchSpec::default);
                arch.os = Some(value.to_string());
            }
            "target" => {
                let arch = spec.architecture.get_or_insert_with(ArchSpec::default);
                arch.target = Some(value.to_string());
            }
            _ => {
                spec.variants
                    .insert(key.to_string(), VariantValue::from_assignment(value));
            }
        }
        Ok(())
    }

    fn parse_versions(&mut self) -> Result<VersionConstraint, ParseError> {
        let start = self.pos;
        let text = self.take_while(is_version_char);
        if text.is_empty() {
            return Err(ParseError::new(self.input, start, "expected a version after '@'"));
        }
        VersionConstraint::parse(text)
            .map_err(|e| ParseError::new(self.input, start, e.to_string()))
    }

    fn take_ident(&mut self, what: &str) -> Result<String, ParseError> {
        let start = self.pos;
        let ident = self.take_while(is_ident_char);
        if ident.is_empty() {
            return Err(ParseError::new(self.input, start, format!("expected {}", what)));
        }
        Ok(ident.to_string())
    }

    fn take_value(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let value = self.take_while(|c| !c.is_whitespace() && c != '^' && c != '%');
        if value.is_empty() {
            return Err(ParseError::new(self.input, start, "expected a value after '='"));
        }
        Ok(value.to_string())
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.input, self.pos, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_version::Version;

    fn parse(s: &str) -> Spec {
        SpecParser::new(s).parse().unwrap()
    }

    #[test]
    fn test_name_and_version() {
        let spec = parse("hsa-rocr-dev@6.0.2");
        assert_eq!(spec.name(), "hsa-rocr-dev");
        assert!(spec.versions.contains(&Version::parse("6.0.2").unwrap()));
    }

    #[test]
    fn test_variants() {
        let spec = parse("llvm+cuda~rocm -shared build_type=Release libs=shared,static");
        assert_eq!(spec.variants["cuda"], VariantValue::Bool(true));
        assert_eq!(spec.variants["rocm"], VariantValue::Bool(false));
        assert_eq!(spec.variants["shared"], VariantValue::Bool(false));
        assert_eq!(spec.variants["build_type"], VariantValue::Single("Release".into()));
        assert!(spec.variants["libs"].is_multi());
    }

    #[test]
    fn test_compiler() {
        let spec = parse("mfem %gcc@:8");
        let compiler = spec.compiler.unwrap();
        assert_eq!(compiler.name, "gcc");
        assert!(compiler.versions.contains(&Version::parse("7.5").unwrap()));
    }

    #[test]
    fn test_architecture() {
        let spec = parse("zlib arch=linux-ubuntu22.04-x86_64");
        let arch = spec.architecture.unwrap();
        assert_eq!(arch.platform.as_deref(), Some("linux"));
        assert_eq!(arch.os.as_deref(), Some("ubuntu22.04"));
        assert_eq!(arch.target.as_deref(), Some("x86_64"));

        let partial = parse("zlib target=aarch64");
        assert_eq!(partial.architecture.unwrap().target.as_deref(), Some("aarch64"));
        assert!(parse("zlib +shared").architecture.is_none());
    }

    #[test]
    fn test_dependencies() {
        let spec = parse("py-jaxlib@0.4.14: ^py-jax@0.4.14: +cuda ^cmake");
        assert_eq!(spec.dependencies.len(), 2);
        assert_eq!(spec.dependencies[0].name(), "py-jax");
        assert_eq!(spec.dependencies[0].spec.variants.len(), 1);
        assert_eq!(spec.dependencies[1].name(), "cmake");
    }

    #[test]
    fn test_anonymous() {
        let spec = parse("@2021.11.08 +cuda");
        assert!(spec.is_anonymous());
        assert_eq!(parse("^hip@6:").dependencies.len(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(SpecParser::new("").parse().is_err());
        assert!(SpecParser::new("zlib@").parse().is_err());
        assert!(SpecParser::new("zlib openssl").parse().is_err());
        assert!(SpecParser::new("zlib@1@2").parse().is_err());
        assert!(SpecParser::new("zlib ^ +x").parse().is_err());
        assert!(SpecParser::new("zlib arch=linux").parse().is_err());
        let err = SpecParser::new("zlib $x").parse().unwrap_err();
        assert_eq!(err.position, 5);
    }
}
