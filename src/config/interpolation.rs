// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::error::ConfigError;

fn variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable"))
}

/// Replace every `${VAR}` in `input` with the value of environment variable
/// `VAR`. An unset variable is an error. Anything that is not a well-formed
/// reference (`${}`, `${1X}`, a lone `$`) is kept literally.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    resolve_with(input, |name| std::env::var(name).ok())
}

/// [`resolve_variables`] over an arbitrary lookup.
pub fn resolve_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;
    let resolved = variable_regex().replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        match lookup(name) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::UndefinedVariable { name }),
        None => Ok(resolved.into_owned()),
    }
}
