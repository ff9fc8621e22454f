use cow_utils::CowUtils;

/// Normalize line endings to LF (\n) for cross-platform consistency.
/// This ensures reproducible artifacts regardless of the platform where bundling occurs.
pub fn normalize_line_endings(content: String) -> String {
    content
        .cow_replace("\r\n", "\n")
        .cow_replace('\r', "\n")
        .into_owned()
}

/// Escape a string for embedding inside a double-quoted JavaScript literal.
pub fn js_string_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
