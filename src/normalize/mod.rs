// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Type erasure and await normalization of generated code
//
// Models often write TypeScript where plain script is required, and often
// forget to await the asynchronous work they start. The sandbox caller needs
// a single top-level completion signal, so this pass:
//
// 1. Erases interface/type declarations and simple `: T` annotations
// 2. Wraps or awaits the four common "unawaited call" shapes
// 3. Drops `!` / `?` punctuation that only made sense with types
//
// Every step is a pattern rewrite over the source text. There is no parser.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Cap on named-function call rewrites. Bounded so repeated or degenerate
/// call patterns always produce the same output.
pub const MAX_NAMED_CALL_PASSES: usize = 4;

// ---------------------------------------------------------------------------
// Trait: Normalizer
// ---------------------------------------------------------------------------

/// Pure string normalizer. Implementations must be Send + Sync so they can be
/// shared across async tasks.
pub trait Normalizer: Send + Sync {
    /// Normalize a snippet. For well-formed input the result is a fixed
    /// point: `normalize(normalize(x)) == normalize(x)`.
    fn normalize(&self, input: &str) -> String;
}

// ---------------------------------------------------------------------------
// Implementation: CodeNormalizer
// ---------------------------------------------------------------------------

/// Normalizer bound to the action names of one response.
#[derive(Debug, Clone, Default)]
pub struct CodeNormalizer {
    action_names: Vec<String>,
    known_type_names: Vec<String>,
}

impl CodeNormalizer {
    pub fn new<I, S>(action_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut action_names: Vec<String> = action_names.into_iter().map(Into::into).collect();
        action_names.sort();
        action_names.dedup();
        Self {
            action_names,
            known_type_names: Vec::new(),
        }
    }

    /// Type names declared outside the snippet (for example in the action
    /// signatures shown to the model) whose annotations should be erased too.
    pub fn with_type_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_type_names = names.into_iter().map(Into::into).collect();
        self
    }
}

impl Normalizer for CodeNormalizer {
    fn normalize(&self, input: &str) -> String {
        let code = strip_typescript_types(input, &self.known_type_names);
        let code = await_unwrapped_function(code);
        let code = await_wrapped_functions(code);
        let code = await_named_function_calls(code);
        let code = await_function_variable_calls(code);
        let code = await_then_chains(code, &self.action_names);
        strip_type_punctuation(&code)
    }
}

/// Normalize `code` for the given set of action names.
pub fn normalize(code: &str, action_names: &HashSet<String>) -> String {
    CodeNormalizer::new(action_names.iter().cloned()).normalize(code)
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

fn interface_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:export )?interface\s+(\w+)\s*\{[^}]+\}").expect("interface"))
}

fn type_alias_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:export )?type\s*(\w+)\s*=\s*\w+;?").expect("type alias"))
}

const BUILTIN_TYPES: &str = r"any\[\]|string\[\]|number\[\]|null\[\]|boolean\[\]|object\[\]|any|string|number|null|boolean|object|Record<string,\s*(?:any|string|number|null|boolean|object)>";

/// Remove interface declarations, simple type aliases and `: T` annotations
/// naming builtin types or any declared type, including their array forms.
///
/// `known_type_names` seeds the declared names with types defined outside
/// the snippet.
pub fn strip_typescript_types(code: &str, known_type_names: &[String]) -> String {
    let mut declared: Vec<String> = known_type_names.to_vec();

    declared.extend(
        interface_regex()
            .captures_iter(code)
            .map(|caps| caps[1].to_string()),
    );
    let code = interface_regex().replace_all(code, "");

    declared.extend(
        type_alias_regex()
            .captures_iter(&code)
            .map(|caps| caps[1].to_string()),
    );
    let code = type_alias_regex().replace_all(&code, "");

    let declared_alternatives: String = declared
        .iter()
        .map(|name| format!(r"{}\b|", regex::escape(name)))
        .collect();
    let pattern = format!(r": (?:{declared_alternatives}{BUILTIN_TYPES})(?:\[\])?");

    match Regex::new(&pattern) {
        Ok(annotation) => annotation.replace_all(&code, "").into_owned(),
        Err(e) => {
            tracing::error!(error = %e, "type annotation pattern failed to compile");
            code.into_owned()
        }
    }
}

// ---------------------------------------------------------------------------
// Await rewrites
// ---------------------------------------------------------------------------

const AWAIT_PREFIX: &str = "await ";

fn unwrapped_fn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^async\s*(\([^)]*\)\s*=>|function\([^)]*\))\s?\{([\s\S]+?)\}$")
            .expect("unwrapped fn")
    })
}

fn wrapped_fn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(async\s*(\([^)]*\)\s*=>|function\([^)]*\))\s?\{([\s\S]+)\}\n?\s*\)\(\);")
            .expect("wrapped fn")
    })
}

fn named_fn_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"async function (\w+)\([^)]*\)\s*\{").expect("named fn"))
}

fn fn_variable_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:const|let|var) (\w+)\s*=\s*async\s*\([^)]*\)\s*=>\s*\{").expect("fn var")
    })
}

/// A whole snippet that is one anonymous async function is wrapped and
/// invoked with an await.
fn await_unwrapped_function(code: String) -> String {
    if unwrapped_fn_regex().is_match(&code) {
        tracing::debug!("awaiting unwrapped anonymous async function");
        format!("await ({code})();")
    } else {
        code
    }
}

/// Immediately-invoked async functions get an await unless they already
/// have one.
fn await_wrapped_functions(mut code: String) -> String {
    let calls: Vec<String> = matches_not_preceded_by(wrapped_fn_regex(), &code, AWAIT_PREFIX)
        .into_iter()
        .map(|(start, end)| code[start..end].to_string())
        .collect();

    for call in calls {
        tracing::debug!("awaiting immediately-invoked async function");
        code = code.replacen(&call, &format!("{AWAIT_PREFIX}{call}"), 1);
    }
    code
}

/// A named async function followed later by a bare `name(...)` statement:
/// the first such call is replaced by an awaited one, up to
/// [`MAX_NAMED_CALL_PASSES`] times.
///
/// The first pass matches the call together with its leading newline; later
/// passes match the call text alone and rewrite its first occurrence in the
/// snippet.
fn await_named_function_calls(mut code: String) -> String {
    let mut call = find_named_function_call(&code, true);
    let mut passes = 0;

    while let Some(text) = call {
        if passes >= MAX_NAMED_CALL_PASSES {
            break;
        }
        passes += 1;

        tracing::debug!(call = text.trim(), "awaiting named async function call");
        code = code.replacen(&text, &format!("\n{AWAIT_PREFIX}{}", text.trim()), 1);
        call = find_named_function_call(&code, false);
    }
    code
}

/// Text of the first bare call to a named async function defined earlier in
/// the snippet.
fn find_named_function_call(code: &str, with_newline: bool) -> Option<String> {
    named_fn_header_regex().captures_iter(code).find_map(|caps| {
        let name = caps.get(1)?.as_str();
        let body_end = body_close(code, caps.get(0)?.end())?;
        let (start, end) = bare_call_after(code, name, body_end)?;
        // The match includes the newline that starts the call line.
        let start = if with_newline { start } else { start + 1 };
        Some(code[start..end].to_string())
    })
}

/// An async arrow function assigned to a variable and later invoked as a
/// bare statement: await the first such invocation.
fn await_function_variable_calls(mut code: String) -> String {
    let headers: Vec<(String, usize)> = fn_variable_header_regex()
        .captures_iter(&code)
        .filter_map(|caps| Some((caps.get(1)?.as_str().to_string(), caps.get(0)?.end())))
        .collect();

    // Insert from the back so earlier offsets stay valid.
    let mut inserts: Vec<usize> = headers
        .iter()
        .filter_map(|(name, header_end)| {
            let body_end = body_close(&code, *header_end)?;
            let (start, _) = bare_call_after(&code, name, body_end)?;
            tracing::debug!(name = name.as_str(), "awaiting async function variable call");
            Some(start + 1)
        })
        .collect();
    inserts.sort_unstable();
    inserts.dedup();

    for at in inserts.into_iter().rev() {
        code.insert_str(at, AWAIT_PREFIX);
    }
    code
}

/// Action calls chained with `.then(` or `.catch(` get an await before the
/// chain, once per action.
fn await_then_chains(mut code: String, action_names: &[String]) -> String {
    for action in action_names {
        let pattern = format!(r"{}\([^)]*\)\.(?:then|catch)\(", regex::escape(action));
        let chain = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::error!(action = action.as_str(), error = %e, "then-chain pattern failed to compile");
                continue;
            }
        };
        if let Some(&(start, _)) = matches_not_preceded_by(&chain, &code, AWAIT_PREFIX).first() {
            tracing::debug!(action = action.as_str(), "awaiting then-chained action call");
            code.insert_str(start, AWAIT_PREFIX);
        }
    }
    code
}

/// Byte offset just past the `\n}` closing a body that starts at
/// `body_start`. The body holds at least one character.
fn body_close(code: &str, body_start: usize) -> Option<usize> {
    let first_len = code[body_start..].chars().next()?.len_utf8();
    let search_from = body_start + first_len;
    code[search_from..]
        .find("\n}")
        .map(|offset| search_from + offset + 2)
}

/// Range of the first bare `\nname(...)` statement starting at or after
/// `from`. The range includes the leading newline and an optional `;`.
fn bare_call_after(code: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let pattern = format!(r"\n{}\([^)]*\);?", regex::escape(name));
    let call = Regex::new(&pattern).ok()?;
    call.find_at(code, from).map(|m| (m.start(), m.end()))
}

/// Non-overlapping matches of `re` whose text is not immediately preceded by
/// `prefix`. A match rejected for its prefix is retried from the next
/// character, so a later start inside it can still match.
fn matches_not_preceded_by(re: &Regex, text: &str, prefix: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos <= text.len() {
        let Some(m) = re.find_at(text, pos) else {
            break;
        };
        if text[..m.start()].ends_with(prefix) {
            pos = next_char_boundary(text, m.start());
            continue;
        }
        found.push((m.start(), m.end()));
        pos = if m.end() > m.start() {
            m.end()
        } else {
            next_char_boundary(text, m.end())
        };
    }
    found
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| at + c.len_utf8())
}

// ---------------------------------------------------------------------------
// Punctuation
// ---------------------------------------------------------------------------

fn non_null_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\w)\]])!([.)}\[\]\s])").expect("non-null"))
}

fn optional_chain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\w)\]])\?([.\[])").expect("optional chain"))
}

/// Remove non-null assertions (`x!.y`) and optional chaining (`x?.y`).
///
/// Applies to the whole snippet, string literals included: `"Done!"` +
/// whitespace loses its `!`. Known limitation, kept as is.
pub fn strip_type_punctuation(code: &str) -> String {
    let code = non_null_regex().replace_all(code, "${1}${2}");
    optional_chain_regex()
        .replace_all(&code, "${1}${2}")
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
