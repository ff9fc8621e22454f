//! Build coordination: configuration validation, concurrent per-entry
//! builds, the pre-write collision check and failure aggregation.

use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

use crate::config::BundleConfig;
use crate::dependency_graph::GraphBuilder;
use crate::emit::BundleAssembler;
use crate::error::BuildError;
use crate::loader::ModuleLoader;
use crate::output::{OutputArtifact, OutputWriter};
use crate::resolver::ModuleResolver;

/// One entry that did not produce an artifact, with the error that stopped it.
#[derive(Debug)]
pub struct EntryFailure {
    pub entry: String,
    pub error: BuildError,
}

/// Outcome of a build: the artifacts that were written plus every per-entry
/// failure. Configuration problems never reach a report; they fail the build
/// as a whole before anything is written.
#[derive(Debug)]
pub struct BuildReport {
    pub artifacts: Vec<OutputArtifact>,
    pub failures: Vec<EntryFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One line per failed entry, naming the entry, the error kind and the
    /// full error chain.
    pub fn describe_failures(&self) -> String {
        self.failures
            .iter()
            .map(|failure| {
                format!(
                    "entry '{}' failed ({}): {}",
                    failure.entry,
                    failure.error.kind(),
                    failure.error
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Drives the full pipeline for every configured entry.
///
/// Entries build concurrently; the resolver and loader are shared so a
/// module imported by several entries is read and lowered once. Each entry
/// still gets its own graph and bundle.
#[derive(Debug)]
pub struct BuildOrchestrator {
    config: BundleConfig,
}

impl BuildOrchestrator {
    pub fn new(config: BundleConfig) -> Self {
        Self { config }
    }

    pub fn build(&self) -> Result<BuildReport, BuildError> {
        self.config.validate()?;
        let resolver = ModuleResolver::new(&self.config)?;
        let loader = ModuleLoader::new();
        let writer = OutputWriter::new(&self.config.output, self.config.mode);

        info!(
            "Building {} entries in {} mode",
            self.config.entries.len(),
            self.config.mode
        );

        let entries: Vec<(&String, &String)> = self.config.entries.iter().collect();
        let outcomes: Vec<(String, Result<OutputArtifact, BuildError>)> = entries
            .par_iter()
            .map(|(name, specifier)| {
                let outcome = self.build_entry(name, specifier, &resolver, &loader, &writer);
                ((*name).clone(), outcome)
            })
            .collect();

        let mut planned: Vec<OutputArtifact> = Vec::new();
        let mut failures: Vec<EntryFailure> = Vec::new();
        for (entry, outcome) in outcomes {
            match outcome {
                Ok(artifact) => planned.push(artifact),
                Err(error) => {
                    if error.kind() == "assembly" {
                        // Graph construction invariants were violated; this is
                        // a bundler defect, not a problem with the input.
                        log::error!("Entry '{}' hit an internal error: {}", entry, error);
                    } else {
                        warn!("Entry '{}' failed: {}", entry, error);
                    }
                    failures.push(EntryFailure { entry, error });
                }
            }
        }

        // Every target path must be distinct before anything is persisted;
        // otherwise one entry's artifact would silently overwrite another's.
        check_collisions(&planned)?;

        let mut artifacts = Vec::with_capacity(planned.len());
        for artifact in planned {
            match writer.persist(&artifact) {
                Ok(_) => artifacts.push(artifact),
                Err(error) => failures.push(EntryFailure {
                    entry: artifact.entry_name.clone(),
                    error,
                }),
            }
        }

        info!(
            "Build finished: {} artifacts, {} failures, {} modules loaded",
            artifacts.len(),
            failures.len(),
            loader.loaded_count()
        );
        Ok(BuildReport {
            artifacts,
            failures,
        })
    }

    fn build_entry(
        &self,
        name: &str,
        specifier: &str,
        resolver: &ModuleResolver,
        loader: &ModuleLoader,
        writer: &OutputWriter,
    ) -> Result<OutputArtifact, BuildError> {
        debug!("Building entry '{}' from '{}'", name, specifier);
        let entry_id = resolver.resolve(specifier, None)?;
        let graph = GraphBuilder::new(resolver, loader).build(name, &entry_id)?;

        for cycle in graph.cycle_groups() {
            let members: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            info!(
                "Entry '{}' contains an import cycle: {}",
                name,
                members.join(" <-> ")
            );
        }

        let unit = BundleAssembler::assemble(&graph, name)?;
        writer.plan(name, unit.render())
    }
}

/// Reject builds where two entries map to the same output path.
fn check_collisions(artifacts: &[OutputArtifact]) -> Result<(), BuildError> {
    let mut by_path: FxHashMap<&PathBuf, Vec<&str>> = FxHashMap::default();
    for artifact in artifacts {
        by_path
            .entry(&artifact.relative_path)
            .or_default()
            .push(&artifact.entry_name);
    }

    let mut collisions: Vec<String> = by_path
        .into_iter()
        .filter(|(_, entries)| entries.len() > 1)
        .map(|(path, entries)| format!("{} <- entries {}", path.display(), entries.join(", ")))
        .collect();
    if collisions.is_empty() {
        return Ok(());
    }
    collisions.sort();
    Err(BuildError::Configuration(format!(
        "output path collision: {}",
        collisions.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, OutputConfig};
    use indexmap::IndexMap;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn config(dir: &TempDir, entries: &[(&str, &str)], template: &str) -> BundleConfig {
        let mut map = IndexMap::new();
        for (name, specifier) in entries {
            map.insert((*name).to_string(), (*specifier).to_string());
        }
        BundleConfig {
            entries: map,
            output: OutputConfig {
                dir: dir.path().join("dist"),
                filename: template.to_string(),
            },
            mode: Mode::Development,
            project_root: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_every_entry_into_its_own_artifact() {
        let dir = project(&[
            ("a.js", "const b = require('./b.js');\nmodule.exports = b;"),
            ("b.js", "module.exports = 'shared';"),
        ]);
        let config = config(&dir, &[("main", "./a.js"), ("other", "./b.js")], "[name].bundle.js");

        let report = BuildOrchestrator::new(config).build().unwrap();
        assert!(report.is_success());
        assert_eq!(report.artifacts.len(), 2);

        let main = fs::read_to_string(dir.path().join("dist/main.bundle.js")).unwrap();
        let other = fs::read_to_string(dir.path().join("dist/other.bundle.js")).unwrap();
        assert!(main.contains("'shared'"));
        assert!(main.contains("require('./b.js')"));
        // The 'other' bundle contains only b.js.
        assert!(other.contains("'shared'"));
        assert!(!other.contains("require('./b.js')"));
    }

    #[test]
    fn failing_entry_does_not_block_independent_entries() {
        let dir = project(&[
            ("good.js", "module.exports = 1;"),
            ("bad.js", "require('./missing.js');"),
        ]);
        let config = config(
            &dir,
            &[("good", "./good.js"), ("bad", "./bad.js")],
            "[name].js",
        );

        let report = BuildOrchestrator::new(config).build().unwrap();
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entry, "bad");
        assert_eq!(report.failures[0].error.kind(), "graph");
        assert!(report.describe_failures().contains("./missing.js"));
        assert!(dir.path().join("dist/good.js").exists());
    }

    #[test]
    fn unresolvable_entry_specifier_is_a_per_entry_failure() {
        let dir = project(&[("a.js", "")]);
        let config = config(&dir, &[("main", "./nope.js")], "[name].js");

        let report = BuildOrchestrator::new(config).build().unwrap();
        assert!(report.artifacts.is_empty());
        assert_eq!(report.failures[0].error.kind(), "resolution");
    }

    #[test]
    fn colliding_output_paths_fail_before_anything_is_written() {
        // Identical module content under a hash-only template collides.
        let dir = project(&[("a.js", "module.exports = 1;"), ("b.js", "module.exports = 1;")]);
        let config = config(&dir, &[("main", "./a.js"), ("other", "./b.js")], "[hash].js");

        let err = BuildOrchestrator::new(config).build().unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("collision"));
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn invalid_configuration_fails_the_whole_build() {
        let dir = project(&[]);
        let config = config(&dir, &[], "[name].js");
        let err = BuildOrchestrator::new(config).build().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn rebuilding_produces_byte_identical_artifacts() {
        let dir = project(&[
            ("a.js", "import b from './b.js';\nexport default b;\n"),
            ("b.js", "export default 42;\n"),
        ]);
        let make = || config(&dir, &[("main", "./a.js")], "[name].[hash].js");

        let first = BuildOrchestrator::new(make()).build().unwrap();
        let second = BuildOrchestrator::new(make()).build().unwrap();
        assert_eq!(first.artifacts[0].relative_path, second.artifacts[0].relative_path);
        assert_eq!(first.artifacts[0].content, second.artifacts[0].content);
    }
}
