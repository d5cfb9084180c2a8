// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Static safety validation of generated code
//
// Responsibilities:
// - Short-circuit the model's own `throw new Error("...")` failure report
// - Strip comments so text inside them cannot trigger or hide anything
// - Reject capability escapes (network fetch, eval, dynamic Function,
//   WebAssembly) by denylist pattern
// - Require every `await NAME(` target to be a known action, a helper the
//   snippet defines itself, or Promise.all
//
// Recognition is pattern based. Anything ambiguous is rejected rather than
// let through.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{default_denylist, CompiledPattern};
use crate::outcome::ValidationOutcome;

/// Always a valid await target.
pub const PROMISE_ALL: &str = "Promise.all";

// ---------------------------------------------------------------------------
// Interface and types
// ---------------------------------------------------------------------------

/// Why a snippet was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The model reported its own failure with a single `throw`.
    #[error("{0}")]
    SelfReported(String),
    /// A denylisted capability was used.
    #[error("illegal code found by /{pattern}/")]
    Denylisted { pattern: String },
    /// An awaited call target is neither an action nor defined locally.
    #[error("function with name {name} is awaited, yet is not defined or an action name")]
    UnknownAwaitTarget { name: String },
    /// Nothing but comments and whitespace.
    #[error("no code left after removing comments")]
    Empty,
}

impl Rejection {
    /// Whether the caller should ask for another generation instead of
    /// reporting an error.
    pub fn is_retry(&self) -> bool {
        matches!(self, Rejection::UnknownAwaitTarget { .. } | Rejection::Empty)
    }

    pub fn into_outcome(self) -> ValidationOutcome {
        if self.is_retry() {
            ValidationOutcome::Retry
        } else {
            ValidationOutcome::Error(self.to_string())
        }
    }
}

/// Validates generated code before it reaches the sandbox.
///
/// On success returns the code with comments stripped, which is what every
/// later stage operates on.
pub trait CodeValidator: Send + Sync {
    fn validate(&self, code: &str, allowed_names: &HashSet<String>) -> Result<String, Rejection>;
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

/// Default validator: denylist patterns plus await-target checking.
pub struct StaticValidator {
    denylist: Vec<CompiledPattern>,
    always_awaitable: Vec<String>,
}

impl StaticValidator {
    pub fn new(denylist: Vec<CompiledPattern>, always_awaitable: Vec<String>) -> Self {
        Self {
            denylist,
            always_awaitable,
        }
    }
}

impl Default for StaticValidator {
    fn default() -> Self {
        Self::new(default_denylist(), Vec::new())
    }
}

impl CodeValidator for StaticValidator {
    fn validate(&self, code: &str, allowed_names: &HashSet<String>) -> Result<String, Rejection> {
        if let Some(message) = self_reported_error(code) {
            return Err(Rejection::SelfReported(message));
        }

        let code = strip_comments(code);
        if code.is_empty() {
            tracing::warn!("no code (possibly only comments) in generated code");
            return Err(Rejection::Empty);
        }

        for pattern in &self.denylist {
            if pattern.is_match(&code) {
                tracing::warn!(pattern = %pattern.pattern, "illegal code found");
                return Err(Rejection::Denylisted {
                    pattern: pattern.pattern.clone(),
                });
            }
        }

        let defined = defined_async_names(&code);
        for name in awaited_names(&code) {
            let known = name == PROMISE_ALL
                || allowed_names.contains(name)
                || defined.contains(name)
                || self.always_awaitable.iter().any(|n| n == name);
            if !known {
                tracing::warn!(
                    name,
                    "function is awaited, yet is not defined or an action name"
                );
                return Err(Rejection::UnknownAwaitTarget {
                    name: name.to_string(),
                });
            }
        }

        Ok(code)
    }
}

// ---------------------------------------------------------------------------
// Pattern helpers
// ---------------------------------------------------------------------------

fn throw_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*throw new Error\((.*)\);?\s*$").expect("throw"))
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(//.*|/\*([^*]|[\r\n]|(\*+([^*/]|[\r\n])))*\*+/)").expect("comment")
    })
}

fn defined_fn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"async function (\w+)\(|(?:const|let|var) (\w+)\s*=\s*async\s*\(")
            .expect("defined fn")
    })
}

fn awaited_fn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"await (\S+?)\(").expect("awaited fn"))
}

/// The message of a snippet that is nothing but `throw new Error(<msg>);`,
/// with the quotes around `<msg>` removed.
pub fn self_reported_error(code: &str) -> Option<String> {
    let caps = throw_regex().captures(code)?;
    let quoted = caps.get(1)?.as_str();
    let mut chars = quoted.chars();
    chars.next();
    chars.next_back();
    Some(chars.as_str().to_string())
}

/// Remove comments that start a line (after optional indentation), then
/// trim.
pub fn strip_comments(code: &str) -> String {
    comment_regex().replace_all(code, "").trim().to_string()
}

/// Names the snippet defines as `async function NAME(` or as
/// `const|let|var NAME = async (`.
pub fn defined_async_names(code: &str) -> HashSet<&str> {
    defined_fn_regex()
        .captures_iter(code)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
        .collect()
}

/// Every `NAME` in an `await NAME(` call, in source order.
pub fn awaited_names(code: &str) -> Vec<&str> {
    awaited_fn_regex()
        .captures_iter(code)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn validator() -> StaticValidator {
        StaticValidator::default()
    }

    // -------------------------------------------------------------------
    // Self-reported errors
    // -------------------------------------------------------------------

    #[test]
    fn single_throw_is_reported_with_quotes_removed() {
        let result = validator().validate(
            "\nthrow new Error(\"No action can list invoices\");",
            &names(&[]),
        );
        assert_eq!(
            result,
            Err(Rejection::SelfReported("No action can list invoices".into()))
        );
        assert_eq!(
            result.unwrap_err().into_outcome(),
            ValidationOutcome::Error("No action can list invoices".into())
        );
    }

    #[test]
    fn throw_with_trailing_newline_still_counts() {
        assert_eq!(
            self_reported_error("throw new Error('nope')\n"),
            Some("nope".to_string())
        );
    }

    #[test]
    fn throw_inside_larger_snippet_is_not_self_reported() {
        let code = "const a = 1;\nthrow new Error(\"x\");";
        assert_eq!(self_reported_error(code), None);
        assert!(validator().validate(code, &names(&[])).is_ok());
    }

    // -------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------

    #[test]
    fn comments_are_stripped_and_code_trimmed() {
        let code = "// get data\nconst a = 1;\n  /* block\n  comment */\nconsole.log(a);\n";
        assert_eq!(strip_comments(code), "const a = 1;\n\nconsole.log(a);");
    }

    #[test]
    fn comment_only_snippet_is_retry() {
        let rejection = validator()
            .validate("// nothing here\n/* or here */", &names(&[]))
            .unwrap_err();
        assert_eq!(rejection, Rejection::Empty);
        assert_eq!(rejection.into_outcome(), ValidationOutcome::Retry);
    }

    #[test]
    fn denylisted_call_inside_comment_is_ignored() {
        let code = "// do not use fetch(url) here\nconsole.log(1);";
        assert_eq!(
            validator().validate(code, &names(&[])),
            Ok("console.log(1);".to_string())
        );
    }

    // -------------------------------------------------------------------
    // Denylist
    // -------------------------------------------------------------------

    #[test]
    fn denylist_rejects_capability_escapes() {
        let cases = [
            "const r = await fetch(\"https://evil.example\");",
            "const r = fetch ( url );",
            "eval(\"1 + 1\");",
            "const v = eval (code);",
            "const f = new Function(\"return 1\");",
            "const f = new  Function (\"return 1\");",
            "const m = WebAssembly.instantiate(bytes);",
            "const m = WebAssembly .compile(bytes);",
            "// leading comment\nconst r = fetch(url);\n/* trailing */",
            "const r = fetch/**/(\"https://evil.example\");",
            "const v = eval/* x */(\"1+1\");",
            "const f = new Function/**/(\"return 1\");",
            "const m = WebAssembly/**/.compile(b);",
            "const f = new/**/Function(\"return 1\");",
            "const r = fetch // call it\n(url);",
            "const m = WebAssembly /* a */ /* b */ .compile(b);",
        ];
        for code in cases {
            let rejection = validator().validate(code, &names(&[])).unwrap_err();
            assert!(
                matches!(rejection, Rejection::Denylisted { .. }),
                "{code:?} gave {rejection:?}"
            );
            assert!(matches!(
                rejection.into_outcome(),
                ValidationOutcome::Error(_)
            ));
        }
    }

    #[test]
    fn names_containing_denylisted_words_are_allowed() {
        let code = "const prefetch = 1;\nconst evaluate = prefetch + 1;\nconsole.log(evaluate);";
        assert!(validator().validate(code, &names(&[])).is_ok());
    }

    #[test]
    fn denylist_reports_triggering_pattern() {
        let rejection = validator()
            .validate("eval(\"1\");", &names(&[]))
            .unwrap_err();
        match rejection {
            Rejection::Denylisted { pattern } => assert!(pattern.starts_with("eval")),
            other => panic!("unexpected rejection {other:?}"),
        }
    }

    #[test]
    fn custom_denylist_pattern_applies() {
        let validator = StaticValidator::new(
            vec![CompiledPattern::compile(r"document\.cookie").unwrap()],
            Vec::new(),
        );
        assert!(validator
            .validate("console.log(document.cookie);", &names(&[]))
            .is_err());
        assert!(validator.validate("eval(\"1\");", &names(&[])).is_ok());
    }

    // -------------------------------------------------------------------
    // Await targets
    // -------------------------------------------------------------------

    #[test]
    fn unknown_await_target_is_retry() {
        let code = "const orders = await getInvoices();";
        let rejection = validator().validate(code, &names(&["getOrders"])).unwrap_err();
        assert_eq!(
            rejection,
            Rejection::UnknownAwaitTarget {
                name: "getInvoices".into()
            }
        );
        assert_eq!(rejection.into_outcome(), ValidationOutcome::Retry);

        assert!(validator()
            .validate(code, &names(&["getOrders", "getInvoices"]))
            .is_ok());
    }

    #[test]
    fn promise_all_and_local_helpers_are_awaitable() {
        let code = "async function load(id) {\n  return await getOrder(id);\n}\nconst total = async (xs) => xs.length;\nconst all = await Promise.all([1, 2].map(load));\nawait load(1);\nawait total(all);";
        assert!(validator().validate(code, &names(&["getOrder"])).is_ok());
    }

    #[test]
    fn configured_awaitable_names_are_accepted() {
        let validator = StaticValidator::new(default_denylist(), vec!["sleep".into()]);
        assert!(validator.validate("await sleep(10);", &names(&[])).is_ok());
    }

    #[test]
    fn method_call_on_unknown_object_is_retry() {
        let rejection = validator()
            .validate("await api.getOrders();", &names(&["getOrders"]))
            .unwrap_err();
        assert!(rejection.is_retry());
    }

    #[test]
    fn defined_and_awaited_name_extraction() {
        let code = "async function a(x) {}\nlet b = async (y) => y;\nvar c=async(z)=>z;\nawait a(1); await b(2);";
        let defined = defined_async_names(code);
        assert_eq!(defined, ["a", "b", "c"].into_iter().collect());
        assert_eq!(awaited_names(code), vec!["a", "b"]);
    }
}
