use dashmap::DashMap;
use log::debug;
use std::fs;
use std::sync::Arc;

use crate::error::BuildError;
use crate::lower::lower_module;
use crate::resolver::ModuleId;
use crate::util::normalize_line_endings;

/// One loaded module: lowered source plus its declared outgoing specifiers
/// in declaration order.
#[derive(Debug)]
pub struct LoadedModule {
    pub id: ModuleId,
    pub source: String,
    pub specifiers: Vec<String>,
}

/// Retrieves module content, memoized per identity.
///
/// Exactly one filesystem read happens per distinct identity per build;
/// concurrent traversals requesting the same identity share the cached
/// result through the map's atomic insert-or-get entry API.
#[derive(Debug, Default)]
pub struct ModuleLoader {
    cache: DashMap<ModuleId, Arc<LoadedModule>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, id: &ModuleId) -> Result<Arc<LoadedModule>, BuildError> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(Arc::clone(&cached));
        }

        // Populate under the entry lock so a racing traversal either finds
        // the finished value or waits here, never reads the file twice.
        let entry = self
            .cache
            .entry(id.clone())
            .or_try_insert_with(|| read_module(id).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    /// Number of distinct identities loaded so far.
    pub fn loaded_count(&self) -> usize {
        self.cache.len()
    }
}

fn read_module(id: &ModuleId) -> Result<LoadedModule, BuildError> {
    debug!("Loading module: {}", id);
    let raw = fs::read_to_string(id.as_path()).map_err(|err| BuildError::Load {
        id: id.to_path_buf(),
        reason: err.to_string(),
    })?;

    let normalized = normalize_line_endings(raw);
    let lowered = lower_module(&normalized).map_err(|err| BuildError::Load {
        id: id.to_path_buf(),
        reason: format!("malformed module: {err}"),
    })?;

    debug!(
        "Loaded {} ({} outgoing specifiers)",
        id,
        lowered.specifiers.len()
    );
    Ok(LoadedModule {
        id: id.clone(),
        source: lowered.source,
        specifiers: lowered.specifiers,
    })
}
