use dashmap::DashMap;
use log::debug;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::BundleConfig;
use crate::error::BuildError;

/// Canonical identity of a module: its canonicalized filesystem path.
///
/// Two specifiers denoting the same physical file always resolve to an equal
/// `ModuleId`, regardless of the requesting module's location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.0.clone()
    }

    /// Directory the module's relative imports resolve against.
    fn parent_dir(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Wrap an arbitrary path without canonicalization, to fabricate
    /// identities the resolver would never produce.
    #[cfg(test)]
    pub(crate) fn from_raw(path: PathBuf) -> Self {
        Self(path)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

/// Maps a specifier plus the requesting module's identity to a canonical
/// [`ModuleId`]. Resolution is pure for a fixed filesystem snapshot: bare
/// specifiers are served from an index built once at construction, and
/// every result is memoized.
#[derive(Debug)]
pub struct ModuleResolver {
    project_root: PathBuf,
    /// Bare specifier name -> module file, discovered from the configured
    /// module roots at construction time.
    bare_index: FxHashMap<String, PathBuf>,
    /// Memoized (requesting directory, specifier) pairs. Purely a cache;
    /// resolution is deterministic with or without it.
    cache: DashMap<(PathBuf, String), ModuleId>,
}

/// Extensions probed, in order, when a specifier does not name a file directly.
const PROBE_SUFFIXES: &[&str] = &[".js", "/index.js"];

impl ModuleResolver {
    pub fn new(config: &BundleConfig) -> Result<Self, BuildError> {
        let project_root = canonicalize_or_keep(&config.project_root);

        let mut bare_index = FxHashMap::default();
        for root in &config.module_roots {
            let root = if root.is_absolute() {
                root.clone()
            } else {
                project_root.join(root)
            };
            index_module_root(&root, &mut bare_index);
        }
        debug!(
            "Discovered {} bare-resolvable modules across {} module roots",
            bare_index.len(),
            config.module_roots.len()
        );

        Ok(Self {
            project_root,
            bare_index,
            cache: DashMap::new(),
        })
    }

    /// Resolve `specifier` as requested by `from`. Entry specifiers pass
    /// `None` and resolve against the project root.
    pub fn resolve(
        &self,
        specifier: &str,
        from: Option<&ModuleId>,
    ) -> Result<ModuleId, BuildError> {
        let base_dir = from.map_or(self.project_root.as_path(), ModuleId::parent_dir);
        let cache_key = (base_dir.to_path_buf(), specifier.to_string());
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let resolved = self.resolve_uncached(specifier, base_dir).ok_or_else(|| {
            BuildError::Resolution {
                specifier: specifier.to_string(),
                from: from.map_or_else(|| "<entry>".to_string(), ToString::to_string),
            }
        })?;

        debug!("Resolved '{}' -> {}", specifier, resolved);
        self.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(&self, specifier: &str, base_dir: &Path) -> Option<ModuleId> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return probe(&base_dir.join(specifier));
        }
        if let Some(project_relative) = specifier.strip_prefix('/') {
            // Absolute specifiers are anchored at the project root, so a
            // build tree can be relocated without rewriting imports.
            return probe(&self.project_root.join(project_relative));
        }
        self.resolve_bare(specifier)
    }

    /// Bare specifiers are looked up in the snapshot index: `pkg` matches
    /// `<root>/pkg.js` or `<root>/pkg/index.js`, `pkg/util` matches
    /// `<root>/pkg/util.js` or `<root>/pkg/util/index.js`.
    fn resolve_bare(&self, specifier: &str) -> Option<ModuleId> {
        self.bare_index
            .get(specifier)
            .map(|path| ModuleId(path.clone()))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

/// Probe `candidate` as a file, then with each suffix appended.
fn probe(candidate: &Path) -> Option<ModuleId> {
    if candidate.is_file() {
        return Some(ModuleId(canonicalize_or_keep(candidate)));
    }
    let raw = candidate.as_os_str().to_string_lossy();
    for suffix in PROBE_SUFFIXES {
        let probed = PathBuf::from(format!("{raw}{suffix}"));
        if probed.is_file() {
            return Some(ModuleId(canonicalize_or_keep(&probed)));
        }
    }
    None
}

/// Scan one module root and record every `.js` file under it by its bare name.
fn index_module_root(root: &Path, index: &mut FxHashMap<String, PathBuf>) {
    if !root.exists() {
        debug!("Module root does not exist, skipping: {:?}", root);
        return;
    }

    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok());

    for entry in entries {
        let path = entry.path();
        if !is_js_file(path) {
            continue;
        }
        if let Some(name) = path_to_bare_name(root, path) {
            let canonical = canonicalize_or_keep(path);
            // First root wins on conflicts; roots are indexed in configured order.
            index.entry(name).or_insert(canonical);
        }
    }
}

fn is_js_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("js"))
}

/// Convert a file under a module root into its bare specifier name,
/// stripping the `.js` extension and collapsing `<name>/index.js` to `<name>`.
fn path_to_bare_name(root: &Path, file_path: &Path) -> Option<String> {
    let relative = file_path.strip_prefix(root).ok()?;
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let last = parts.last_mut()?;
    if let Some(stem) = last.strip_suffix(".js") {
        *last = stem.to_owned();
    }
    if last == "index" {
        parts.pop();
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn canonicalize_or_keep(path: &Path) -> PathBuf {
    // Fall back to the lexical path when canonicalization fails (e.g. the
    // path does not exist yet); probing rejects nonexistent files anyway.
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
