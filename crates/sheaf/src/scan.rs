//! Lexical scanning of JavaScript source, shared by import extraction and
//! minification.
//!
//! The scanner classifies every byte of the source as executable code,
//! quoted content (string, template or regex literal) or comment. Import
//! extraction runs its regexes over a masked copy where quoted content and
//! comments are blanked out, so a `require(...)` inside a string or comment
//! is never mistaken for a dependency edge. The minifier uses the same
//! classification to strip comments while leaving quoted content byte-exact.

use std::fmt;

/// Classification of a single source byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteKind {
    /// Executable code, including string/template/regex delimiters.
    Code,
    /// Content between string, template or regex delimiters.
    Quoted,
    /// Comment bytes, including the `//` and `/* */` delimiters.
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScanError {
    UnterminatedString { line: usize },
    UnterminatedTemplate { line: usize },
    UnterminatedRegex { line: usize },
    UnterminatedComment { line: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString { line } => {
                write!(f, "unterminated string literal starting on line {line}")
            }
            Self::UnterminatedTemplate { line } => {
                write!(f, "unterminated template literal starting on line {line}")
            }
            Self::UnterminatedRegex { line } => {
                write!(f, "unterminated regular expression starting on line {line}")
            }
            Self::UnterminatedComment { line } => {
                write!(f, "unterminated block comment starting on line {line}")
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Scan result: a same-length masked copy plus the per-byte classification.
///
/// In the masked copy, quoted content and comments are replaced by spaces
/// (newlines are preserved so line/offset arithmetic stays valid). Byte
/// offsets into the masked copy are therefore valid offsets into the
/// original source.
#[derive(Debug)]
pub(crate) struct ScannedSource {
    pub masked: String,
    pub kinds: Vec<ByteKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    LineComment,
    BlockComment { start_line: usize },
    Single { start_line: usize },
    Double { start_line: usize },
    Template { start_line: usize },
    Regex { start_line: usize, in_class: bool },
}

/// Words after which a `/` starts a regular expression rather than division.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "case", "do", "else",
    "yield", "await", "throw",
];

/// Decide whether a `/` in code position starts a regex literal.
///
/// Classic heuristic: a regex can only appear where an expression is
/// expected, i.e. after an operator, an opening bracket, a statement
/// boundary, or one of a handful of keywords. After an identifier, a
/// closing bracket or a literal, `/` is division.
fn slash_starts_regex(prev_code_char: Option<char>, prev_word: &str) -> bool {
    match prev_code_char {
        None => true,
        Some(ch) => {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                REGEX_PRECEDING_KEYWORDS.contains(&prev_word)
            } else {
                !matches!(ch, ')' | ']' | '}' | '.')
            }
        }
    }
}

/// Classify every byte of `source`.
pub(crate) fn scan(source: &str) -> Result<ScannedSource, ScanError> {
    let bytes = source.as_bytes();
    let mut kinds = vec![ByteKind::Code; bytes.len()];
    let mut state = State::Normal;
    let mut line = 1usize;
    // Last non-whitespace code character and the identifier word ending at it,
    // used for the regex/division decision.
    let mut prev_code_char: Option<char> = None;
    let mut prev_word = String::new();
    let mut last_was_space = true;
    let mut escaped = false;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            line += 1;
        }

        match state {
            State::Normal => match b {
                b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                    kinds[i] = ByteKind::Comment;
                    kinds[i + 1] = ByteKind::Comment;
                    i += 2;
                    state = State::LineComment;
                    continue;
                }
                b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                    kinds[i] = ByteKind::Comment;
                    kinds[i + 1] = ByteKind::Comment;
                    i += 2;
                    state = State::BlockComment { start_line: line };
                    continue;
                }
                b'/' if slash_starts_regex(prev_code_char, &prev_word) => {
                    state = State::Regex {
                        start_line: line,
                        in_class: false,
                    };
                    escaped = false;
                    prev_word.clear();
                    last_was_space = false;
                }
                b'\'' => {
                    state = State::Single { start_line: line };
                    escaped = false;
                    prev_word.clear();
                    last_was_space = false;
                }
                b'"' => {
                    state = State::Double { start_line: line };
                    escaped = false;
                    prev_word.clear();
                    last_was_space = false;
                }
                b'`' => {
                    state = State::Template { start_line: line };
                    escaped = false;
                    prev_word.clear();
                    last_was_space = false;
                }
                _ => {
                    let ch = b as char;
                    if ch.is_ascii_whitespace() {
                        // Keep prev_word across the gap: `return /re/` must
                        // still see the keyword.
                        last_was_space = true;
                    } else {
                        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                            let continues_word = !last_was_space
                                && prev_code_char
                                    .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
                            if !continues_word {
                                prev_word.clear();
                            }
                            prev_word.push(ch);
                        } else {
                            prev_word.clear();
                        }
                        prev_code_char = Some(ch);
                        last_was_space = false;
                    }
                }
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                    // Newline stays code so line structure survives masking.
                } else {
                    kinds[i] = ByteKind::Comment;
                }
            }
            State::BlockComment { .. } => {
                kinds[i] = ByteKind::Comment;
                if b == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    kinds[i + 1] = ByteKind::Comment;
                    i += 2;
                    state = State::Normal;
                    continue;
                }
            }
            State::Single { start_line } => {
                if b == b'\n' && !escaped {
                    return Err(ScanError::UnterminatedString { line: start_line });
                }
                if escaped {
                    kinds[i] = ByteKind::Quoted;
                    escaped = false;
                } else if b == b'\\' {
                    kinds[i] = ByteKind::Quoted;
                    escaped = true;
                } else if b == b'\'' {
                    // A closed literal ends an expression; a following slash
                    // is division, not a regex.
                    prev_code_char = Some(')');
                    state = State::Normal;
                } else {
                    kinds[i] = ByteKind::Quoted;
                }
            }
            State::Double { start_line } => {
                if b == b'\n' && !escaped {
                    return Err(ScanError::UnterminatedString { line: start_line });
                }
                if escaped {
                    kinds[i] = ByteKind::Quoted;
                    escaped = false;
                } else if b == b'\\' {
                    kinds[i] = ByteKind::Quoted;
                    escaped = true;
                } else if b == b'"' {
                    prev_code_char = Some(')');
                    state = State::Normal;
                } else {
                    kinds[i] = ByteKind::Quoted;
                }
            }
            State::Template { .. } => {
                // Interpolation contents are treated as quoted as well; import
                // edges inside template interpolations are not supported.
                if escaped {
                    kinds[i] = ByteKind::Quoted;
                    escaped = false;
                } else if b == b'\\' {
                    kinds[i] = ByteKind::Quoted;
                    escaped = true;
                } else if b == b'`' {
                    prev_code_char = Some(')');
                    state = State::Normal;
                } else {
                    kinds[i] = ByteKind::Quoted;
                }
            }
            State::Regex {
                start_line,
                in_class,
            } => {
                if b == b'\n' {
                    return Err(ScanError::UnterminatedRegex { line: start_line });
                }
                if escaped {
                    kinds[i] = ByteKind::Quoted;
                    escaped = false;
                } else if b == b'\\' {
                    kinds[i] = ByteKind::Quoted;
                    escaped = true;
                } else if in_class {
                    kinds[i] = ByteKind::Quoted;
                    if b == b']' {
                        state = State::Regex {
                            start_line,
                            in_class: false,
                        };
                    }
                } else if b == b'[' {
                    kinds[i] = ByteKind::Quoted;
                    state = State::Regex {
                        start_line,
                        in_class: true,
                    };
                } else if b == b'/' {
                    prev_code_char = Some(')');
                    state = State::Normal;
                } else {
                    kinds[i] = ByteKind::Quoted;
                }
            }
        }

        i += 1;
    }

    match state {
        State::Normal | State::LineComment => {}
        State::BlockComment { start_line } => {
            return Err(ScanError::UnterminatedComment { line: start_line });
        }
        State::Single { start_line } | State::Double { start_line } => {
            return Err(ScanError::UnterminatedString { line: start_line });
        }
        State::Template { start_line } => {
            return Err(ScanError::UnterminatedTemplate { line: start_line });
        }
        State::Regex { start_line, .. } => {
            return Err(ScanError::UnterminatedRegex { line: start_line });
        }
    }

    let masked: String = bytes
        .iter()
        .zip(kinds.iter())
        .map(|(&b, &kind)| match kind {
            ByteKind::Code => b as char,
            ByteKind::Quoted | ByteKind::Comment => {
                if b == b'\n' {
                    '\n'
                } else {
                    ' '
                }
            }
        })
        .collect();

    // Non-ASCII code bytes map through `b as char` incorrectly above, so
    // rebuild those spans from the original source. Cheap second pass that
    // only runs for non-ASCII input.
    let masked = if source.is_ascii() {
        masked
    } else {
        remask_non_ascii(source, &kinds)
    };

    Ok(ScannedSource { masked, kinds })
}

fn remask_non_ascii(source: &str, kinds: &[ByteKind]) -> String {
    let mut masked = String::with_capacity(source.len());
    for (idx, ch) in source.char_indices() {
        match kinds[idx] {
            ByteKind::Code => masked.push(ch),
            ByteKind::Quoted | ByteKind::Comment => {
                if ch == '\n' {
                    masked.push('\n');
                } else {
                    // Pad to the original byte length so offsets keep lining up.
                    for _ in 0..ch.len_utf8() {
                        masked.push(' ');
                    }
                }
            }
        }
    }
    masked
}
