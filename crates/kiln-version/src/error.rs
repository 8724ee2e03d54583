use thiserror::Error;

/// Error type for version and constraint parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Version component \"{component}\" in \"{version}\" is too large")]
    ComponentOverflow { version: String, component: String },
    #[error("Could not parse version constraint \"{constraint}\": {reason}")]
    InvalidConstraint { constraint: String, reason: String },
}
