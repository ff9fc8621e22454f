//! Lowering of ES module syntax to the CommonJS form executed inside a
//! bundle, plus extraction of the declared outgoing specifiers.
//!
//! This is the single transform point of the loader. The supported subset
//! is deliberately statement-level and single-line: `import`/`export ...
//! from` declarations, `export default`, `export` of a local declaration or
//! binding list, plain `require(...)` calls and dynamic `import(...)`
//! expressions. Everything else passes through untouched; a full syntax
//! pipeline is out of scope.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::scan::{ScanError, scan};

/// Source after lowering, with outgoing specifiers in declaration order.
#[derive(Debug, Clone)]
pub(crate) struct LoweredModule {
    pub source: String,
    pub specifiers: Vec<String>,
}

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bimport\s*\(").unwrap());

static IMPORT_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)import\s*\*\s*as\s+([A-Za-z_$][\w$]*)\s+from\s*(['"])(.*?)['"]\s*;?\s*$"#)
        .unwrap()
});
static IMPORT_DEFAULT_AND_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\s*)import\s+([A-Za-z_$][\w$]*)\s*,\s*\{([^}]*)\}\s*from\s*(['"])(.*?)['"]\s*;?\s*$"#,
    )
    .unwrap()
});
static IMPORT_DEFAULT_AND_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\s*)import\s+([A-Za-z_$][\w$]*)\s*,\s*\*\s*as\s+([A-Za-z_$][\w$]*)\s+from\s*(['"])(.*?)['"]\s*;?\s*$"#,
    )
    .unwrap()
});
static IMPORT_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)import\s*\{([^}]*)\}\s*from\s*(['"])(.*?)['"]\s*;?\s*$"#).unwrap()
});
static IMPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)import\s+([A-Za-z_$][\w$]*)\s+from\s*(['"])(.*?)['"]\s*;?\s*$"#).unwrap()
});
static IMPORT_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\s*)import\s*(['"])(.*?)['"]\s*;?\s*$"#).unwrap());

static EXPORT_NAMED_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)export\s*\{([^}]*)\}\s*from\s*(['"])(.*?)['"]\s*;?\s*$"#).unwrap()
});
static EXPORT_STAR_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\s*)export\s*\*\s*from\s*(['"])(.*?)['"]\s*;?\s*$"#).unwrap());
static EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)export\s+default\s+(.*)$").unwrap());
static EXPORT_NAMED_LOCAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)export\s*\{([^}]*)\}\s*;?\s*$").unwrap());
static EXPORT_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\s*)export\s+(const|let|var|async\s+function|function|class)\s+([A-Za-z_$][\w$]*)(.*)$",
    )
    .unwrap()
});

/// Matches a quoted specifier argument of `require(...)` / `require.async(...)`
/// in a masked source, where quoted content has been blanked to spaces.
static REQUIRE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\brequire(?:\.async)?\s*\(\s*(['"][^'"\n]*['"])"#).unwrap());

/// Lower one module's source and collect its outgoing specifiers.
pub(crate) fn lower_module(source: &str) -> Result<LoweredModule, ScanError> {
    // Dynamic import() becomes require.async() so the bundle shim can serve
    // it from the in-bundle module table.
    let source = rewrite_dynamic_imports(source)?;

    // Statement-level import/export lowering, gated on the masked source so
    // lines inside template literals are never rewritten.
    let scanned = scan(&source)?;
    let mut lowered_lines: Vec<String> = Vec::new();
    let mut deferred_exports: IndexSet<String> = IndexSet::new();
    let mut uses_es_syntax = false;

    for (raw_line, masked_line) in source.lines().zip(scanned.masked.lines()) {
        let trimmed = masked_line.trim_start();
        if trimmed.starts_with("import") || trimmed.starts_with("export") {
            if let Some(lowered) = lower_statement(raw_line, &mut deferred_exports) {
                uses_es_syntax = true;
                lowered_lines.push(lowered);
                continue;
            }
        }
        lowered_lines.push(raw_line.to_string());
    }

    let mut result = String::new();
    if uses_es_syntax {
        // Marks the module for default-import interop at runtime.
        result.push_str(
            "Object.defineProperty(module.exports, \"__esModule\", { value: true });\n",
        );
    }
    result.push_str(&lowered_lines.join("\n"));
    if source.ends_with('\n') {
        result.push('\n');
    }
    for name in &deferred_exports {
        // Emitted after the module body so function/class declarations are
        // fully initialized; cycles observe these bindings late, matching
        // CommonJS rather than live-binding semantics.
        result.push_str(&format!("module.exports.{name} = {name};\n"));
    }

    let specifiers = extract_specifiers(&result)?;
    Ok(LoweredModule {
        source: result,
        specifiers,
    })
}

fn rewrite_dynamic_imports(source: &str) -> Result<String, ScanError> {
    let scanned = scan(source)?;
    let mut rewritten = String::with_capacity(source.len());
    let mut last = 0;
    for m in DYNAMIC_IMPORT.find_iter(&scanned.masked) {
        rewritten.push_str(&source[last..m.start()]);
        rewritten.push_str("require.async(");
        last = m.end();
    }
    rewritten.push_str(&source[last..]);
    Ok(rewritten)
}

/// Lower a single import/export statement line; returns None when the line
/// is not part of the supported subset.
fn lower_statement(line: &str, deferred_exports: &mut IndexSet<String>) -> Option<String> {
    if let Some(caps) = IMPORT_DEFAULT_AND_NAMED.captures(line) {
        let (indent, default, named, spec) = (&caps[1], &caps[2], &caps[3], &caps[5]);
        let destructure = named_imports_to_destructure(named);
        return Some(format!(
            "{indent}const {default} = __sheaf_interop__(require(\"{spec}\")); const {{ {destructure} }} = require(\"{spec}\");"
        ));
    }
    if let Some(caps) = IMPORT_DEFAULT_AND_NAMESPACE.captures(line) {
        let (indent, default, ns, spec) = (&caps[1], &caps[2], &caps[3], &caps[5]);
        return Some(format!(
            "{indent}const {ns} = require(\"{spec}\"); const {default} = __sheaf_interop__({ns});"
        ));
    }
    if let Some(caps) = IMPORT_NAMESPACE.captures(line) {
        let (indent, ns, spec) = (&caps[1], &caps[2], &caps[4]);
        return Some(format!("{indent}const {ns} = require(\"{spec}\");"));
    }
    if let Some(caps) = IMPORT_NAMED.captures(line) {
        let (indent, named, spec) = (&caps[1], &caps[2], &caps[4]);
        let destructure = named_imports_to_destructure(named);
        return Some(format!(
            "{indent}const {{ {destructure} }} = require(\"{spec}\");"
        ));
    }
    if let Some(caps) = IMPORT_DEFAULT.captures(line) {
        let (indent, default, spec) = (&caps[1], &caps[2], &caps[4]);
        return Some(format!(
            "{indent}const {default} = __sheaf_interop__(require(\"{spec}\"));"
        ));
    }
    if let Some(caps) = IMPORT_BARE.captures(line) {
        let (indent, spec) = (&caps[1], &caps[3]);
        return Some(format!("{indent}require(\"{spec}\");"));
    }
    if let Some(caps) = EXPORT_NAMED_FROM.captures(line) {
        let (indent, named, spec) = (&caps[1], &caps[2], &caps[4]);
        let assignments: Vec<String> = parse_binding_list(named)
            .into_iter()
            .map(|(local, exported)| {
                format!("module.exports.{exported} = require(\"{spec}\").{local};")
            })
            .collect();
        return Some(format!("{indent}{}", assignments.join(" ")));
    }
    if let Some(caps) = EXPORT_STAR_FROM.captures(line) {
        let (indent, spec) = (&caps[1], &caps[3]);
        return Some(format!(
            "{indent}Object.assign(module.exports, require(\"{spec}\"));"
        ));
    }
    if let Some(caps) = EXPORT_DEFAULT.captures(line) {
        let (indent, rest) = (&caps[1], &caps[2]);
        return Some(format!("{indent}module.exports.default = {rest}"));
    }
    if let Some(caps) = EXPORT_NAMED_LOCAL.captures(line) {
        let (indent, named) = (&caps[1], &caps[2]);
        let assignments: Vec<String> = parse_binding_list(named)
            .into_iter()
            .map(|(local, exported)| format!("module.exports.{exported} = {local};"))
            .collect();
        return Some(format!("{indent}{}", assignments.join(" ")));
    }
    if let Some(caps) = EXPORT_DECLARATION.captures(line) {
        let (indent, keyword, name, rest) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        deferred_exports.insert(name.to_string());
        return Some(format!("{indent}{keyword} {name}{rest}"));
    }
    None
}

/// `a, b as c, default as d` -> `a, b: c, default: d`
fn named_imports_to_destructure(list: &str) -> String {
    parse_binding_list(list)
        .into_iter()
        .map(|(source, local)| {
            if source == local {
                source
            } else {
                format!("{source}: {local}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse `a, b as c` into `(source_name, bound_name)` pairs.
fn parse_binding_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            if let Some((source, bound)) = item.split_once(" as ") {
                (source.trim().to_string(), bound.trim().to_string())
            } else {
                (item.to_string(), item.to_string())
            }
        })
        .collect()
}

/// Collect outgoing specifiers in declaration order, deduplicated.
pub(crate) fn extract_specifiers(source: &str) -> Result<Vec<String>, ScanError> {
    let scanned = scan(source)?;
    let mut specifiers: IndexSet<String> = IndexSet::new();
    for caps in REQUIRE_CALL.captures_iter(&scanned.masked) {
        let quoted = caps.get(1).expect("quoted group always present");
        // Offsets into the masked copy are valid in the original source; the
        // raw slice between the quotes is the specifier text.
        let raw = &source[quoted.start() + 1..quoted.end() - 1];
        specifiers.insert(raw.to_string());
    }
    Ok(specifiers.into_iter().collect())
}
