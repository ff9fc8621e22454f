//! Artifact finalization and emission: naming-template evaluation, the
//! production minification pass and the actual filesystem writes.
//!
//! Planning and persisting are separate steps so the orchestrator can check
//! all target paths for collisions before a single byte lands on disk.

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Mode, OutputConfig};
use crate::error::BuildError;
use crate::minify::minify;
use crate::util::normalize_line_endings;

/// A finished bundle ready to be written. Immutable once planned: the
/// relative path already reflects the final bytes, including any hash token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub entry_name: String,
    /// Target path relative to the output directory.
    pub relative_path: PathBuf,
    pub content: String,
}

impl OutputArtifact {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Turns rendered bundles into named artifacts and persists them.
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    template: String,
    mode: Mode,
}

impl OutputWriter {
    pub fn new(output: &OutputConfig, mode: Mode) -> Self {
        Self {
            dir: output.dir.clone(),
            template: output.filename.clone(),
            mode,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Finalize one rendered bundle without touching the filesystem.
    ///
    /// Line endings are normalized before minification and hashing, so the
    /// same input produces byte-identical artifacts on every platform.
    pub fn plan(&self, entry_name: &str, bundle: String) -> Result<OutputArtifact, BuildError> {
        let normalized = normalize_line_endings(bundle);
        let content = if self.mode.is_production() {
            let minified = minify(&normalized);
            debug!(
                "Minified '{}': {} -> {} bytes",
                entry_name,
                normalized.len(),
                minified.len()
            );
            minified.into_owned()
        } else {
            normalized
        };

        let file_name = evaluate_template(&self.template, entry_name, &content)?;
        Ok(OutputArtifact {
            entry_name: entry_name.to_string(),
            relative_path: PathBuf::from(file_name),
            content,
        })
    }

    /// Write one planned artifact under the output directory.
    pub fn persist(&self, artifact: &OutputArtifact) -> Result<PathBuf, BuildError> {
        let target = self.dir.join(&artifact.relative_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Write {
                path: target.clone(),
                source,
            })?;
        }
        fs::write(&target, &artifact.content).map_err(|source| BuildError::Write {
            path: target.clone(),
            source,
        })?;

        info!(
            "Emitted '{}' -> {} ({} bytes)",
            artifact.entry_name,
            target.display(),
            artifact.len()
        );
        Ok(target)
    }
}

/// Substitute `[name]` and `[hash]` in the naming template.
///
/// An unrecognized `[token]` is a configuration error; a lone `[` without a
/// closing bracket is treated as literal text.
fn evaluate_template(
    template: &str,
    entry_name: &str,
    content: &str,
) -> Result<String, BuildError> {
    let mut result = String::with_capacity(template.len() + entry_name.len());
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find(']') else {
            result.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let token = &after_open[..close];
        match token {
            "name" => result.push_str(entry_name),
            "hash" => result.push_str(&content_hash(content)),
            _ => {
                return Err(BuildError::Configuration(format!(
                    "unknown token '[{token}]' in output template '{template}'"
                )));
            }
        }
        rest = &after_open[close + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

/// First 16 hex characters of the blake3 hash of the final artifact bytes.
fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex()[..16].to_string()
}
