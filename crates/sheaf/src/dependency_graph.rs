use indexmap::IndexMap;
use log::debug;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::error::BuildError;
use crate::loader::{LoadedModule, ModuleLoader};
use crate::resolver::{ModuleId, ModuleResolver};

/// Traversal state of one module during graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// One module in the graph: loaded content plus its resolved dependencies,
/// parallel to the declared specifier list.
#[derive(Debug)]
pub struct ModuleRecord {
    pub module: Arc<LoadedModule>,
    /// Resolved identity for each outgoing specifier, in declaration order.
    pub dependencies: Vec<ModuleId>,
    state: VisitState,
}

impl ModuleRecord {
    pub fn state(&self) -> VisitState {
        self.state
    }
}

/// The module graph reachable from one entry point, with its emission order.
#[derive(Debug)]
pub struct ModuleGraph {
    records: IndexMap<ModuleId, ModuleRecord>,
    graph: DiGraph<ModuleId, ()>,
    node_indices: FxHashMap<ModuleId, NodeIndex>,
    emission: Vec<ModuleId>,
    entry: ModuleId,
}

impl ModuleGraph {
    pub fn entry(&self) -> &ModuleId {
        &self.entry
    }

    /// Modules in emission order: dependency-before-dependent where the
    /// graph is acyclic, first-discovery order breaking cycles.
    pub fn emission_order(&self) -> &[ModuleId] {
        &self.emission
    }

    pub fn record(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if the graph has cycles
    pub fn has_cycles(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    /// Strongly connected components with more than one member, for
    /// diagnostics. Cycles are legal; they are only ever logged.
    pub fn cycle_groups(&self) -> Vec<Vec<ModuleId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }

    /// Swap one resolved dependency for a fabricated identity, so assembly
    /// can be exercised against an inconsistent graph.
    #[cfg(test)]
    pub(crate) fn replace_dependency_for_tests(
        &mut self,
        id: &ModuleId,
        position: usize,
        replacement: ModuleId,
    ) {
        if let Some(record) = self.records.get_mut(id) {
            record.dependencies[position] = replacement;
        }
    }

    /// Direct dependencies of a module (modules it imports).
    pub fn dependencies_of(&self, id: &ModuleId) -> Option<Vec<&ModuleId>> {
        let index = self.node_indices.get(id)?;
        Some(
            self.graph
                .neighbors_directed(*index, petgraph::Direction::Outgoing)
                .map(|neighbor| &self.graph[neighbor])
                .collect(),
        )
    }
}

/// Explicit DFS frame; the traversal never recurses, so arbitrarily deep
/// dependency chains cannot overflow the call stack.
struct Frame {
    id: ModuleId,
    next_dependency: usize,
}

/// Builds the module graph for one entry by depth-first traversal.
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    resolver: &'a ModuleResolver,
    loader: &'a ModuleLoader,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: &'a ModuleResolver, loader: &'a ModuleLoader) -> Self {
        Self { resolver, loader }
    }

    /// Traverse from `entry_id`, producing the graph and emission order.
    ///
    /// The first resolution/load failure aborts this entry's traversal and
    /// is wrapped in a graph error naming the module and specifier at fault.
    /// An `InProgress` dependency is a cycle and is legal: the edge is
    /// recorded and descent skipped, so every module is emitted exactly once.
    pub fn build(&self, entry_name: &str, entry_id: &ModuleId) -> Result<ModuleGraph, BuildError> {
        let mut records: IndexMap<ModuleId, ModuleRecord> = IndexMap::new();
        let mut emission: Vec<ModuleId> = Vec::new();

        self.discover(entry_name, entry_id, None, &mut records)?;
        if let Some(record) = records.get_mut(entry_id) {
            record.state = VisitState::InProgress;
        }
        let mut stack = vec![Frame {
            id: entry_id.clone(),
            next_dependency: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let next = records
                .get(&frame.id)
                .and_then(|record| record.dependencies.get(frame.next_dependency).cloned());

            let Some(dependency) = next else {
                // All dependencies visited: emit in post-order.
                let finished = frame.id.clone();
                if let Some(record) = records.get_mut(&finished) {
                    record.state = VisitState::Done;
                }
                emission.push(finished);
                stack.pop();
                continue;
            };
            let requester = frame.id.clone();
            frame.next_dependency += 1;

            let state = match records.get(&dependency) {
                Some(record) => record.state,
                None => {
                    self.discover(entry_name, &dependency, Some(&requester), &mut records)?;
                    VisitState::Unvisited
                }
            };

            match state {
                VisitState::Unvisited => {
                    if let Some(record) = records.get_mut(&dependency) {
                        record.state = VisitState::InProgress;
                    }
                    stack.push(Frame {
                        id: dependency,
                        next_dependency: 0,
                    });
                }
                VisitState::InProgress => {
                    // Cycle: the dependency will be emitted by the frame
                    // already on the stack. At runtime the consumer sees a
                    // partially initialized exports object, per CommonJS.
                    debug!("Cycle detected: {} -> {}", requester, dependency);
                }
                VisitState::Done => {}
            }
        }

        debug!(
            "Entry '{}': {} modules, emission order fixed",
            entry_name,
            emission.len()
        );

        Ok(Self::finish(records, emission, entry_id.clone()))
    }

    /// Load a newly discovered module and resolve all of its specifiers.
    fn discover(
        &self,
        entry_name: &str,
        id: &ModuleId,
        requester: Option<&ModuleId>,
        records: &mut IndexMap<ModuleId, ModuleRecord>,
    ) -> Result<(), BuildError> {
        let module = self.loader.load(id).map_err(|err| BuildError::Graph {
            entry: entry_name.to_string(),
            module: requester.unwrap_or(id).to_path_buf(),
            specifier: None,
            source: Box::new(err),
        })?;

        let mut dependencies = Vec::with_capacity(module.specifiers.len());
        for specifier in &module.specifiers {
            let resolved =
                self.resolver
                    .resolve(specifier, Some(id))
                    .map_err(|err| BuildError::Graph {
                        entry: entry_name.to_string(),
                        module: id.to_path_buf(),
                        specifier: Some(specifier.clone()),
                        source: Box::new(err),
                    })?;
            dependencies.push(resolved);
        }

        records.insert(
            id.clone(),
            ModuleRecord {
                module,
                dependencies,
                state: VisitState::Unvisited,
            },
        );
        Ok(())
    }

    /// Materialize the petgraph edge structure once traversal is complete.
    fn finish(
        records: IndexMap<ModuleId, ModuleRecord>,
        emission: Vec<ModuleId>,
        entry: ModuleId,
    ) -> ModuleGraph {
        let mut graph = DiGraph::new();
        let mut node_indices = FxHashMap::default();
        for id in records.keys() {
            let index = graph.add_node(id.clone());
            node_indices.insert(id.clone(), index);
        }
        for (id, record) in &records {
            let from = node_indices[id];
            for dependency in &record.dependencies {
                let to = node_indices[dependency];
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        ModuleGraph {
            records,
            graph,
            node_indices,
            emission,
            entry,
        }
    }
}
