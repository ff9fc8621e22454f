pub mod combine;
pub mod config;
pub mod dependency_graph;
pub mod dirs;
pub mod emit;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod output;
pub mod resolver;
pub mod util;

mod lower;
mod minify;
mod scan;

pub use config::{BundleConfig, Mode};
pub use error::BuildError;
pub use orchestrator::{BuildOrchestrator, BuildReport};
