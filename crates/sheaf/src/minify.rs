//! Whitespace/comment minifier used for production bundles.
//!
//! Works on the scanner's byte classification: comments are dropped,
//! quoted content (strings, templates, regexes) is kept byte-exact, and
//! code whitespace is collapsed. Newlines between statements survive as
//! single newlines, so automatic semicolon insertion behaves exactly as in
//! the unminified source. Identifier renaming is out of scope.

use log::warn;
use std::borrow::Cow;

use crate::scan::{ByteKind, scan};

pub(crate) fn minify(source: &str) -> Cow<'_, str> {
    match scan(source) {
        Ok(scanned) => Cow::Owned(compact(source, &scanned.kinds)),
        Err(err) => {
            // The loader rejects unscannable modules, so this only triggers
            // for input that never went through it. Verbatim output is the
            // safe answer.
            warn!("minifier fell back to verbatim output: {err}");
            Cow::Borrowed(source)
        }
    }
}

fn compact(source: &str, kinds: &[ByteKind]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(source.len());
    let mut pending_space = false;
    let mut pending_newline = false;

    let flush = |out: &mut Vec<u8>, pending_space: &mut bool, pending_newline: &mut bool| {
        if !out.is_empty() {
            if *pending_newline {
                out.push(b'\n');
            } else if *pending_space && out.last() != Some(&b'\n') {
                out.push(b' ');
            }
        }
        *pending_space = false;
        *pending_newline = false;
    };

    for (&byte, &kind) in source.as_bytes().iter().zip(kinds) {
        match kind {
            ByteKind::Comment => {
                // A dropped comment still separates tokens; block comments
                // spanning lines keep one newline for ASI.
                if byte == b'\n' {
                    pending_newline = true;
                } else {
                    pending_space = true;
                }
            }
            ByteKind::Quoted => {
                flush(&mut out, &mut pending_space, &mut pending_newline);
                out.push(byte);
            }
            ByteKind::Code => match byte {
                b'\n' => pending_newline = true,
                b' ' | b'\t' | b'\r' => pending_space = true,
                _ => {
                    flush(&mut out, &mut pending_space, &mut pending_newline);
                    out.push(byte);
                }
            },
        }
    }
    if pending_newline && !out.is_empty() {
        out.push(b'\n');
    }

    // Only whole whitespace and comment bytes were dropped, so the result is
    // still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}
