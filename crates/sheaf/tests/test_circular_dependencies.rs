use indexmap::IndexMap;
use std::fs;
use tempfile::TempDir;

use sheaf::config::{BundleConfig, Mode, OutputConfig};
use sheaf::orchestrator::BuildOrchestrator;

fn bundle_project(files: &[(&str, &str)], entry: &str) -> anyhow::Result<String> {
    let dir = TempDir::new()?;
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(path, content)?;
    }

    let mut entries = IndexMap::new();
    entries.insert("main".to_string(), entry.to_string());
    let config = BundleConfig {
        entries,
        output: OutputConfig {
            dir: dir.path().join("dist"),
            filename: "[name].js".to_string(),
        },
        mode: Mode::Development,
        project_root: dir.path().to_path_buf(),
        ..Default::default()
    };

    let report = BuildOrchestrator::new(config).build()?;
    anyhow::ensure!(report.is_success(), report.describe_failures());
    Ok(fs::read_to_string(dir.path().join("dist/main.js"))?)
}

#[test]
fn two_module_cycle_bundles_each_module_once() {
    let bundle = bundle_project(
        &[
            (
                "a.js",
                "const b = require('./b.js');\nmodule.exports.marker_a = 'module a body';\n",
            ),
            (
                "b.js",
                "const a = require('./a.js');\nmodule.exports.marker_b = 'module b body';\n",
            ),
        ],
        "./a.js",
    )
    .unwrap();

    assert_eq!(bundle.matches("module a body").count(), 1);
    assert_eq!(bundle.matches("module b body").count(), 1);
    // Both edges are wired in the module table.
    assert!(bundle.contains("\"./a.js\""));
    assert!(bundle.contains("\"./b.js\""));
}

#[test]
fn three_module_cycle_completes() {
    let bundle = bundle_project(
        &[
            ("a.js", "require('./b.js');\nmodule.exports = 'A';\n"),
            ("b.js", "require('./c.js');\nmodule.exports = 'B';\n"),
            ("c.js", "require('./a.js');\nmodule.exports = 'C';\n"),
        ],
        "./a.js",
    )
    .unwrap();

    for marker in ["'A'", "'B'", "'C'"] {
        assert_eq!(bundle.matches(marker).count(), 1, "exactly one {marker}");
    }
}

#[test]
fn cycle_observes_partial_initialization_at_runtime() {
    // The shim registers a module's exports before running its factory, so a
    // cyclic require returns the partially built exports object instead of
    // recursing. The structural guarantee: registration precedes execution.
    let bundle = bundle_project(
        &[
            (
                "a.js",
                "module.exports.early = 'set before the cycle';\nconst b = require('./b.js');\nmodule.exports.late = 'set after the cycle';\n",
            ),
            ("b.js", "const a = require('./a.js');\nmodule.exports.seen = a.early;\n"),
        ],
        "./a.js",
    )
    .unwrap();

    let register = bundle.find("__cache__[index] = module;").unwrap();
    let execute = bundle
        .find("__modules__[index][0](module, module.exports, require);")
        .unwrap();
    assert!(register < execute);
}

#[test]
fn cycle_mixed_with_es_syntax_still_bundles() {
    let bundle = bundle_project(
        &[
            (
                "a.js",
                "import { fromB } from './b.js';\nexport const fromA = 'a value';\n",
            ),
            (
                "b.js",
                "import { fromA } from './a.js';\nexport const fromB = 'b value';\n",
            ),
        ],
        "./a.js",
    )
    .unwrap();

    assert!(bundle.contains("module.exports.fromA = fromA;"));
    assert!(bundle.contains("module.exports.fromB = fromB;"));
    assert_eq!(bundle.matches("'a value'").count(), 1);
    assert_eq!(bundle.matches("'b value'").count(), 1);
}
