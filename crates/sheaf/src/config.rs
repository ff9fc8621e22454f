use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::combine::Combine;
use crate::dirs::{system_config_file, user_sheaf_config_dir};
use crate::error::BuildError;

/// Build mode, toggling the output optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Favor fidelity to the original module structure.
    #[default]
    Development,
    /// Apply the semantics-preserving size-reduction transform.
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(anyhow::anyhow!(
                "Invalid mode '{}'. Supported modes: development, production",
                value
            )),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Output artifact destination and naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the produced artifacts.
    pub dir: PathBuf,

    /// Naming template. `[name]` substitutes the entry name, `[hash]` the
    /// content hash of the finished bundle.
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dist"),
            filename: "[name].bundle.js".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Entry name to entry specifier, e.g. `main = "./src/main.js"`.
    pub entries: IndexMap<String, String>,

    /// Output directory and naming template.
    pub output: OutputConfig,

    /// Build mode
    pub mode: Mode,

    /// Directory that entry specifiers and absolute specifiers resolve against.
    pub project_root: PathBuf,

    /// Directories searched, in order, for bare specifiers.
    pub module_roots: Vec<PathBuf>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            output: OutputConfig::default(),
            mode: Mode::Development,
            project_root: PathBuf::from("."),
            module_roots: vec![PathBuf::from("node_modules")],
        }
    }
}

impl Combine for BundleConfig {
    fn combine(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            // For collections, higher precedence (self) completely replaces lower
            // precedence (other) if self has non-default values, otherwise use other
            entries: if self.entries.is_empty() {
                other.entries
            } else {
                self.entries
            },
            output: if self.output != defaults.output {
                self.output
            } else {
                other.output
            },
            module_roots: if self.module_roots != defaults.module_roots {
                self.module_roots
            } else {
                other.module_roots
            },
            // For scalars, self always takes precedence
            mode: self.mode,
            project_root: if self.project_root != defaults.project_root {
                self.project_root
            } else {
                other.project_root
            },
        }
    }
}

/// Configuration values from environment variables with SHEAF_ prefix
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub mode: Option<Mode>,
    pub output_dir: Option<PathBuf>,
    pub filename: Option<String>,
    pub project_root: Option<PathBuf>,
    pub module_roots: Option<Vec<PathBuf>>,
}

impl EnvConfig {
    /// Load configuration from environment variables with SHEAF_ prefix
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // SHEAF_MODE - "development" or "production"
        if let Ok(mode_str) = env::var("SHEAF_MODE") {
            config.mode = Mode::from_str(&mode_str).ok();
        }

        // SHEAF_OUTPUT_DIR - output directory for artifacts
        if let Ok(dir) = env::var("SHEAF_OUTPUT_DIR") {
            if !dir.is_empty() {
                config.output_dir = Some(PathBuf::from(dir));
            }
        }

        // SHEAF_FILENAME - output naming template
        if let Ok(filename) = env::var("SHEAF_FILENAME") {
            if !filename.is_empty() {
                config.filename = Some(filename);
            }
        }

        // SHEAF_PROJECT_ROOT - directory entry specifiers resolve against
        if let Ok(root) = env::var("SHEAF_PROJECT_ROOT") {
            if !root.is_empty() {
                config.project_root = Some(PathBuf::from(root));
            }
        }

        // SHEAF_MODULE_ROOTS - comma-separated list of bare specifier roots
        if let Ok(roots_str) = env::var("SHEAF_MODULE_ROOTS") {
            let roots: Vec<PathBuf> = roots_str
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if !roots.is_empty() {
                config.module_roots = Some(roots);
            }
        }

        config
    }

    /// Apply environment config to base config
    pub fn apply_to(self, mut config: BundleConfig) -> BundleConfig {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(output_dir) = self.output_dir {
            config.output.dir = output_dir;
        }
        if let Some(filename) = self.filename {
            config.output.filename = filename;
        }
        if let Some(project_root) = self.project_root {
            config.project_root = project_root;
        }
        if let Some(module_roots) = self.module_roots {
            config.module_roots = module_roots;
        }
        config
    }
}

impl BundleConfig {
    /// Load a single config file from a path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration with hierarchical precedence:
    /// 1. CLI-provided config path (highest precedence)
    /// 2. Environment variables (SHEAF_*)
    /// 3. Project config (sheaf.toml in current directory)
    /// 4. User config (~/.config/sheaf/sheaf.toml)
    /// 5. System config (/etc/sheaf/sheaf.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        // Start with default configuration
        let mut config = Self::default();

        // 1. Load system config (lowest precedence) - combine into defaults
        if let Some(system_config_path) = system_config_file() {
            if system_config_path.exists() {
                log::debug!("Loading system config from: {:?}", system_config_path);
                let system_config =
                    Self::load_from_file(&system_config_path).with_context(|| {
                        format!("Failed to load system config from {:?}", system_config_path)
                    })?;
                config = system_config.combine(config); // system takes precedence over defaults
            }
        }

        // 2. Load user config
        if let Some(user_config_dir) = user_sheaf_config_dir() {
            let user_config_path = user_config_dir.join("sheaf.toml");
            if user_config_path.exists() {
                log::debug!("Loading user config from: {:?}", user_config_path);
                let user_config = Self::load_from_file(&user_config_path).with_context(|| {
                    format!("Failed to load user config from {:?}", user_config_path)
                })?;
                config = user_config.combine(config); // user takes precedence over system
            }
        }

        // 3. Load project config (sheaf.toml in current directory)
        let project_config_path = PathBuf::from("sheaf.toml");
        if project_config_path.exists() {
            log::debug!("Loading project config from: {:?}", project_config_path);
            let project_config = Self::load_from_file(&project_config_path).with_context(|| {
                format!(
                    "Failed to load project config from {:?}",
                    project_config_path
                )
            })?;
            config = project_config.combine(config); // project takes precedence over user
        }

        // 4. Apply environment variables
        let env_config = EnvConfig::from_env();
        config = env_config.apply_to(config);

        // 5. Load CLI-provided config (highest precedence)
        if let Some(cli_config_path) = cli_config_path {
            log::debug!("Loading CLI config from: {:?}", cli_config_path);
            let cli_config = Self::load_from_file(cli_config_path)
                .with_context(|| format!("Failed to load CLI config from {:?}", cli_config_path))?;
            config = cli_config.combine(config); // CLI takes precedence over everything
        }

        Ok(config)
    }

    /// Validate the configuration before a build starts.
    ///
    /// Catches problems that would otherwise surface after traversal work has
    /// been done: an empty entry map, an empty naming template, and templates
    /// that cannot produce distinct paths for multi-entry builds.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.entries.is_empty() {
            return Err(BuildError::Configuration(
                "no entry points configured".to_string(),
            ));
        }

        for (name, specifier) in &self.entries {
            if name.is_empty() {
                return Err(BuildError::Configuration(
                    "entry names must be non-empty".to_string(),
                ));
            }
            if specifier.is_empty() {
                return Err(BuildError::Configuration(format!(
                    "entry '{}' has an empty specifier",
                    name
                )));
            }
        }

        if self.output.filename.is_empty() {
            return Err(BuildError::Configuration(
                "output filename template must be non-empty".to_string(),
            ));
        }

        // A multi-entry template without a substitution token maps every
        // entry onto the same path. Fail now rather than after traversal.
        if self.entries.len() > 1
            && !self.output.filename.contains("[name]")
            && !self.output.filename.contains("[hash]")
        {
            return Err(BuildError::Configuration(format!(
                "template '{}' cannot produce distinct paths for {} entries",
                self.output.filename,
                self.entries.len()
            )));
        }

        Ok(())
    }
}
