//! Bundle assembly: turns a module graph into one self-contained IIFE.
//!
//! Every module becomes an entry in an in-bundle table, `[factory, map]`,
//! where `map` translates that module's own specifiers to table indices.
//! Module sources are embedded verbatim, so no index rewriting ever touches
//! user code.

use indexmap::IndexMap;
use log::{debug, info};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::dependency_graph::ModuleGraph;
use crate::error::BuildError;
use crate::loader::LoadedModule;
use crate::resolver::ModuleId;
use crate::util::js_string_escape;

/// One module as it appears in the bundle table.
#[derive(Debug)]
struct AssembledModule {
    module: Arc<LoadedModule>,
    /// Declared specifier -> local index of the module it resolves to.
    specifier_map: IndexMap<String, usize>,
}

/// A fully cross-referenced bundle for one entry, ready to render.
#[derive(Debug)]
pub struct BundleUnit {
    entry_name: String,
    modules: Vec<AssembledModule>,
    index_of: FxHashMap<ModuleId, usize>,
    entry_index: usize,
}

impl BundleUnit {
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Local index assigned to a module, when it is part of this bundle.
    pub fn index_of(&self, id: &ModuleId) -> Option<usize> {
        self.index_of.get(id).copied()
    }

    /// Render the executable bundle text.
    ///
    /// The loader registers a module's exports object in the cache before
    /// running its factory, so a cyclic import observes a partially
    /// initialized exports object instead of recursing forever.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("(function () {\n\"use strict\";\n");
        out.push_str("var __modules__ = [\n");
        for assembled in &self.modules {
            out.push_str("[function (module, exports, require) {\n");
            out.push_str(&assembled.module.source);
            if !assembled.module.source.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("}, {");
            for (position, (specifier, index)) in assembled.specifier_map.iter().enumerate() {
                if position > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "\"{}\": {}", js_string_escape(specifier), index);
            }
            out.push_str("}],\n");
        }
        out.push_str("];\n");
        out.push_str(concat!(
            "var __cache__ = new Array(__modules__.length);\n",
            "function __sheaf_interop__(m) {\n",
            "return m && m.__esModule ? m[\"default\"] : m;\n",
            "}\n",
            "function __load__(index) {\n",
            "var cached = __cache__[index];\n",
            "if (cached) {\n",
            "return cached.exports;\n",
            "}\n",
            "var module = { exports: {} };\n",
            "__cache__[index] = module;\n",
            "var map = __modules__[index][1];\n",
            "var require = function (specifier) {\n",
            "return __load__(map[specifier]);\n",
            "};\n",
            "require.async = function (specifier) {\n",
            "return Promise.resolve().then(function () {\n",
            "return __load__(map[specifier]);\n",
            "});\n",
            "};\n",
            "__modules__[index][0](module, module.exports, require);\n",
            "return module.exports;\n",
            "}\n",
        ));
        let _ = writeln!(out, "__load__({});", self.entry_index);
        out.push_str("})();\n");
        out
    }
}

/// Assigns local indices by emission order and cross-references every
/// declared specifier against the graph.
#[derive(Debug)]
pub struct BundleAssembler;

impl BundleAssembler {
    pub fn assemble(graph: &ModuleGraph, entry_name: &str) -> Result<BundleUnit, BuildError> {
        let order = graph.emission_order();

        let mut index_of: FxHashMap<ModuleId, usize> = FxHashMap::default();
        for (index, id) in order.iter().enumerate() {
            index_of.insert(id.clone(), index);
        }

        let mut modules = Vec::with_capacity(order.len());
        for id in order {
            let record = graph.record(id).ok_or_else(|| BuildError::Assembly {
                id: id.to_path_buf(),
                referenced_from: graph.entry().to_path_buf(),
            })?;

            let mut specifier_map = IndexMap::with_capacity(record.dependencies.len());
            for (specifier, dependency) in record
                .module
                .specifiers
                .iter()
                .zip(&record.dependencies)
            {
                let Some(local) = index_of.get(dependency) else {
                    // A dependency outside the emission order means the graph
                    // handed us an inconsistent snapshot.
                    return Err(BuildError::Assembly {
                        id: dependency.to_path_buf(),
                        referenced_from: id.to_path_buf(),
                    });
                };
                specifier_map.insert(specifier.clone(), *local);
            }
            debug!(
                "Bundled {} as index {} ({} edges)",
                id,
                index_of[id],
                specifier_map.len()
            );
            modules.push(AssembledModule {
                module: Arc::clone(&record.module),
                specifier_map,
            });
        }

        let entry_index = index_of
            .get(graph.entry())
            .copied()
            .ok_or_else(|| BuildError::Assembly {
                id: graph.entry().to_path_buf(),
                referenced_from: graph.entry().to_path_buf(),
            })?;

        info!(
            "Assembled entry '{}': {} modules",
            entry_name,
            modules.len()
        );
        Ok(BundleUnit {
            entry_name: entry_name.to_string(),
            modules,
            index_of,
            entry_index,
        })
    }
}
