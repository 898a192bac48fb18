//! Error types for the credential chain and the credentials store.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Stage of a chain run, used to report where a run aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    IdentityResolution,
    SessionEstablishment,
    RoleAssumption,
    Flush,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentityResolution => "identity resolution",
            Self::SessionEstablishment => "session establishment",
            Self::RoleAssumption => "role assumption",
            Self::Flush => "credentials store write",
        };
        f.write_str(name)
    }
}

/// Failure of a chain run. Every variant aborts the run before the
/// destination store is written.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Missing or unresolvable profile or role reference
    #[error("{stage}: configuration error: {message}")]
    Configuration { stage: Stage, message: String },

    /// MFA code rejected by STS
    #[error("{stage}: authentication failed: {message}")]
    Authentication { stage: Stage, message: String },

    /// Network or provider-side failure
    #[error("{stage}: request to AWS STS failed: {message}")]
    Transport { stage: Stage, message: String },

    /// A single role assumption failed; wraps the underlying error
    #[error("could not assume role {name}: {source}")]
    Role {
        name: String,
        #[source]
        source: Box<ChainError>,
    },

    /// Destination store could not be written
    #[error("failed to write credentials store '{path}': {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChainError {
    pub fn configuration(stage: Stage, message: impl Into<String>) -> Self {
        Self::Configuration {
            stage,
            message: message.into(),
        }
    }

    pub fn authentication(stage: Stage, message: impl Into<String>) -> Self {
        Self::Authentication {
            stage,
            message: message.into(),
        }
    }

    pub fn transport(stage: Stage, message: impl Into<String>) -> Self {
        Self::Transport {
            stage,
            message: message.into(),
        }
    }

    pub fn role(name: impl Into<String>, source: ChainError) -> Self {
        Self::Role {
            name: name.into(),
            source: Box::new(source),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Stage at which the run aborted
    pub fn stage(&self) -> Stage {
        match self {
            Self::Configuration { stage, .. }
            | Self::Authentication { stage, .. }
            | Self::Transport { stage, .. } => *stage,
            Self::Role { .. } => Stage::RoleAssumption,
            Self::Persistence { .. } => Stage::Flush,
        }
    }

    /// Name of the role whose assumption failed, if any
    pub fn role_name(&self) -> Option<&str> {
        match self {
            Self::Role { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Failure to read a profile back out of a credentials store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credentials store '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials store: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("profile '{0}' not found in credentials store")]
    ProfileNotFound(String),

    #[error("{key} not found in profile '{profile}'")]
    MissingKey { profile: String, key: &'static str },

    #[error("timestamp parse error in profile '{profile}': '{value}': {source}")]
    InvalidExpiration {
        profile: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("profile '{profile}' has {present} without {missing}")]
    IncompleteSession {
        profile: String,
        present: &'static str,
        missing: &'static str,
    },
}
