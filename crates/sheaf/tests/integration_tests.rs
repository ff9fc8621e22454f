use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use sheaf::config::{BundleConfig, Mode, OutputConfig};
use sheaf::orchestrator::BuildOrchestrator;

fn write_project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn config_for(
    dir: &TempDir,
    entries: &[(&str, &str)],
    template: &str,
    mode: Mode,
) -> BundleConfig {
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
        mode,
        project_root: dir.path().to_path_buf(),
        ..Default::default()
    }
}

fn read(dir: &TempDir, rel: &str) -> String {
    fs::read_to_string(dir.path().join(rel)).unwrap()
}

#[test]
fn two_entry_production_build_produces_both_bundles() {
    let _ = env_logger::try_init();

    let dir = write_project(&[
        (
            "src/a.js",
            "// entry module\nconst message = require('./b.js');\nconsole.log(message);\n",
        ),
        ("src/b.js", "module.exports = 'hello from b';\n"),
    ]);
    let config = config_for(
        &dir,
        &[("main", "./src/a.js"), ("other", "./src/b.js")],
        "[name].bundle.js",
        Mode::Production,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());
    assert_eq!(report.artifacts.len(), 2);

    let main = read(&dir, "dist/main.bundle.js");
    let other = read(&dir, "dist/other.bundle.js");

    // The main bundle carries both modules, wired by specifier.
    assert!(main.contains("'hello from b'"));
    assert!(main.contains("console.log(message)"));
    assert!(main.contains("\"./b.js\": 0"));
    // Production mode stripped the comment but left string contents alone.
    assert!(!main.contains("entry module"));

    // The other bundle carries only b.js.
    assert!(other.contains("'hello from b'"));
    assert!(!other.contains("console.log"));
}

#[test]
fn rebuild_is_byte_identical() {
    let dir = write_project(&[
        ("src/a.js", "import api from './b.js';\napi();\n"),
        ("src/b.js", "export default function api() {}\n"),
    ]);
    let make = || {
        config_for(
            &dir,
            &[("main", "./src/a.js")],
            "[name].[hash].js",
            Mode::Production,
        )
    };

    let first = BuildOrchestrator::new(make()).build().unwrap();
    let second = BuildOrchestrator::new(make()).build().unwrap();

    assert_eq!(
        first.artifacts[0].relative_path,
        second.artifacts[0].relative_path
    );
    let path = Path::new("dist").join(&first.artifacts[0].relative_path);
    let bytes = fs::read(dir.path().join(&path)).unwrap();
    assert_eq!(bytes, first.artifacts[0].content.as_bytes());
    assert_eq!(first.artifacts[0].content, second.artifacts[0].content);
}

#[test]
fn es_module_syntax_is_lowered_into_the_bundle() {
    let dir = write_project(&[
        (
            "src/main.js",
            "import greet, { shout } from './words.js';\nimport * as math from './math.js';\ngreet(shout(math.twice(2)));\n",
        ),
        (
            "src/words.js",
            "export default function greet(w) { return w; }\nexport function shout(w) { return w + '!'; }\n",
        ),
        ("src/math.js", "export const twice = (n) => n * 2;\n"),
    ]);
    let config = config_for(
        &dir,
        &[("main", "./src/main.js")],
        "[name].js",
        Mode::Development,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());

    let bundle = read(&dir, "dist/main.js");
    assert!(bundle.contains("__sheaf_interop__(require(\"./words.js\"))"));
    assert!(bundle.contains("const { shout } = require(\"./words.js\");"));
    assert!(bundle.contains("const math = require(\"./math.js\");"));
    assert!(bundle.contains("module.exports.shout = shout;"));
    assert!(bundle.contains("module.exports.twice = twice;"));
    // No raw ES module syntax survives into the bundle.
    assert!(!bundle.contains("import greet"));
    assert!(!bundle.contains("export default"));
    assert!(!bundle.contains("export const"));
}

#[test]
fn extension_probing_and_bare_specifiers_resolve() {
    let dir = write_project(&[
        (
            "src/main.js",
            "require('./helper');\nrequire('./store');\nrequire('leftpad');\nrequire('router/matcher');\n",
        ),
        ("src/helper.js", "module.exports = 'helper';\n"),
        ("src/store/index.js", "module.exports = 'store';\n"),
        ("node_modules/leftpad.js", "module.exports = 'leftpad';\n"),
        ("node_modules/router/matcher.js", "module.exports = 'matcher';\n"),
    ]);
    let config = config_for(
        &dir,
        &[("main", "./src/main.js")],
        "[name].js",
        Mode::Development,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());

    let bundle = read(&dir, "dist/main.js");
    for marker in ["'helper'", "'store'", "'leftpad'", "'matcher'"] {
        assert!(bundle.contains(marker), "bundle should include {marker}");
    }
}

#[test]
fn dynamic_import_becomes_a_static_edge() {
    let dir = write_project(&[
        (
            "src/main.js",
            "button = () => import('./lazy.js').then((m) => m.run());\n",
        ),
        ("src/lazy.js", "export function run() { return 'lazy'; }\n"),
    ]);
    let config = config_for(
        &dir,
        &[("main", "./src/main.js")],
        "[name].js",
        Mode::Development,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());

    let bundle = read(&dir, "dist/main.js");
    // The lazily imported module is in the table and served via the
    // promise-returning loader.
    assert!(bundle.contains("require.async('./lazy.js')"));
    assert!(bundle.contains("'lazy'"));
    assert!(bundle.contains("require.async = function (specifier)"));
}

#[test]
fn shared_module_is_included_once_per_bundle() {
    let dir = write_project(&[
        ("src/main.js", "require('./left.js');\nrequire('./right.js');\n"),
        ("src/left.js", "require('./shared.js');\n"),
        ("src/right.js", "require('./shared.js');\n"),
        ("src/shared.js", "module.exports = 'the one shared module';\n"),
    ]);
    let config = config_for(
        &dir,
        &[("main", "./src/main.js")],
        "[name].js",
        Mode::Development,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());

    let bundle = read(&dir, "dist/main.js");
    assert_eq!(bundle.matches("the one shared module").count(), 1);
}

#[test]
fn failed_entry_reports_module_and_specifier_while_others_build() {
    let dir = write_project(&[
        ("src/ok.js", "module.exports = 'fine';\n"),
        ("src/broken.js", "require('./does-not-exist.js');\n"),
    ]);
    let config = config_for(
        &dir,
        &[("good", "./src/ok.js"), ("bad", "./src/broken.js")],
        "[name].js",
        Mode::Development,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.failures.len(), 1);

    let description = report.describe_failures();
    assert!(description.contains("bad"));
    assert!(description.contains("graph"));
    assert!(description.contains("./does-not-exist.js"));
    assert!(dir.path().join("dist/good.js").exists());
    assert!(!dir.path().join("dist/bad.js").exists());
}

#[test]
fn colliding_templates_write_nothing() {
    let dir = write_project(&[
        ("src/a.js", "module.exports = 0;\n"),
        ("src/b.js", "module.exports = 0;\n"),
    ]);
    // Identical sources produce identical bundles, so a hash-only template
    // maps both entries to one path.
    let config = config_for(
        &dir,
        &[("main", "./src/a.js"), ("other", "./src/b.js")],
        "[hash].js",
        Mode::Development,
    );

    let err = BuildOrchestrator::new(config).build().unwrap_err();
    assert_eq!(err.kind(), "configuration");
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn single_module_bundle_embeds_the_module_verbatim() {
    let source = "const value = 6 * 7;\nmodule.exports = value;\n";
    let dir = write_project(&[("src/only.js", source)]);
    let config = config_for(
        &dir,
        &[("main", "./src/only.js")],
        "[name].js",
        Mode::Development,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());

    // Extracting module 0 from the table recovers the original content.
    let bundle = read(&dir, "dist/main.js");
    let open = "[function (module, exports, require) {\n";
    let close = "\n}, {}],";
    let start = bundle.find(open).unwrap() + open.len();
    let end = bundle.find(close).unwrap();
    assert_eq!(format!("{}\n", &bundle[start..end]), source);
    assert!(bundle.contains("__load__(0);"));
}

#[test]
fn minified_bundle_preserves_string_contents() {
    let dir = write_project(&[(
        "src/main.js",
        "const banner = 'spaced   out // not a comment';\n// drop me\nconsole.log( banner );\n",
    )]);
    let config = config_for(
        &dir,
        &[("main", "./src/main.js")],
        "[name].js",
        Mode::Production,
    );

    let report = BuildOrchestrator::new(config).build().unwrap();
    assert!(report.is_success(), "{}", report.describe_failures());

    let bundle = read(&dir, "dist/main.js");
    assert!(bundle.contains("'spaced   out // not a comment'"));
    assert!(!bundle.contains("drop me"));
    assert!(bundle.contains("console.log(banner);") || bundle.contains("console.log( banner );"));
}
