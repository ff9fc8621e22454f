use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the bundler core.
///
/// Failures inside one entry's traversal are wrapped in [`BuildError::Graph`]
/// and abort only that entry; configuration problems fail the build before
/// any artifact is written.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A specifier could not be mapped to an existing module.
    #[error("cannot resolve '{specifier}' (requested from {from})")]
    Resolution { specifier: String, from: String },

    /// A resolved module's content could not be read or its dependency
    /// list could not be extracted.
    #[error("cannot load module {}: {reason}", id.display())]
    Load { id: PathBuf, reason: String },

    /// First resolution/load failure encountered while traversing one
    /// entry's module graph.
    #[error("failed to build module graph for entry '{entry}': {source}")]
    Graph {
        entry: String,
        /// The module whose import triggered the failure.
        module: PathBuf,
        /// The offending specifier, when the failure happened at an import site.
        specifier: Option<String>,
        #[source]
        source: Box<BuildError>,
    },

    /// A dependency identity referenced by a module is missing from the
    /// graph. This is an internal invariant violation, not a user error.
    #[error("module table is missing {} (referenced from {})", id.display(), referenced_from.display())]
    Assembly {
        id: PathBuf,
        referenced_from: PathBuf,
    },

    /// Invalid configuration: output path collision, malformed naming
    /// template, empty entry map, and similar.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The artifact sink rejected a write.
    #[error("failed to write artifact {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    /// Stable machine-readable kind, used in build reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::Load { .. } => "load",
            Self::Graph { .. } => "graph",
            Self::Assembly { .. } => "assembly",
            Self::Configuration(_) => "configuration",
            Self::Write { .. } => "write",
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
