// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Streaming placeholder resolution
//
// Model output references URLs, identifiers and function names through
// opaque placeholder keys (URL1, ID2, FUNCTION). Tokens arrive in fragments
// that never line up with key boundaries, so a key can be split across any
// number of fragments. The resolver holds back the trailing run that could
// still grow and releases everything else, substituted, immediately.
//
// The carried buffer is a plain value: the caller threads it from one call
// into the next. There is no hidden state, so independent streams can be
// resolved in parallel without coordination.

mod table;

pub use table::{is_placeholder_key, PlaceholderTable};

/// Output of one [`resolve`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveResult {
    /// Text that is final and safe to emit now.
    pub content: String,
    /// Pending run to pass back as `buffer` on the next call. Empty when
    /// nothing is ambiguous.
    pub buffer: String,
}

/// Resolve one incoming fragment against the carried-over buffer.
///
/// `buffer + fragment` is scanned for placeholder-candidate runs. A run that
/// is followed by a character that cannot extend it is closed: it is
/// replaced by its table value, or copied literally if it is not a key. A
/// run that reaches the end of the combined text is open and becomes the new
/// buffer untouched.
///
/// Total over its input: unknown runs are never dropped, only passed through
/// once closed.
pub fn resolve(fragment: &str, buffer: &str, table: &PlaceholderTable) -> ResolveResult {
    let mut combined = String::with_capacity(buffer.len() + fragment.len());
    combined.push_str(buffer);
    combined.push_str(fragment);

    let mut content = String::with_capacity(combined.len());
    let mut rest = combined.as_str();

    while let Some((start, end)) = next_run(rest) {
        content.push_str(&rest[..start]);
        let run = &rest[start..end];

        if end == rest.len() {
            return ResolveResult {
                content,
                buffer: run.to_string(),
            };
        }

        push_closed_run(&mut content, run, table);
        rest = &rest[end..];
    }

    content.push_str(rest);
    ResolveResult {
        content,
        buffer: String::new(),
    }
}

/// Close out a stream: the end of input terminates any pending run.
///
/// Call once after the last fragment with the final buffer. A buffered key
/// resolves to its value; anything else is returned literally.
pub fn flush(buffer: &str, table: &PlaceholderTable) -> String {
    let mut content = String::with_capacity(buffer.len());
    let mut rest = buffer;

    while let Some((start, end)) = next_run(rest) {
        content.push_str(&rest[..start]);
        push_closed_run(&mut content, &rest[start..end], table);
        rest = &rest[end..];
    }

    content.push_str(rest);
    content
}

/// Resolve a complete, already-assembled text in one call.
pub fn resolve_all(text: &str, table: &PlaceholderTable) -> String {
    let ResolveResult { mut content, buffer } = resolve(text, "", table);
    content.push_str(&flush(&buffer, table));
    content
}

fn push_closed_run(content: &mut String, run: &str, table: &PlaceholderTable) {
    match table.get(run) {
        Some(value) => {
            tracing::debug!(key = run, "placeholder resolved");
            content.push_str(value);
        }
        None => content.push_str(run),
    }
}

/// Byte range of the first placeholder-candidate run in `text`: one or more
/// uppercase ASCII letters, then zero or more ASCII digits.
///
/// All boundaries fall on ASCII bytes, so the returned offsets are always
/// valid char boundaries.
fn next_run(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_uppercase)?;

    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_uppercase() {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    Some((start, end))
}
