// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Action registry glue
//
// Callers register actions under snake_case names (`get_orders`). Generated
// code calls them by their camelCase function names (`getOrders`), so those
// are the names that are awaitable.

use std::collections::HashSet;

use serde::Deserialize;

/// An action the generated code may call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Function name used to call this action from generated code.
    pub fn fn_name(&self) -> String {
        snake_to_camel(&self.name)
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Action::new(name)
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Action::new(name)
    }
}

/// `get_orders` -> `getOrders`. `-` is treated like `_`.
///
/// A separator followed by a letter is dropped and the letter uppercased.
/// Other characters, including separators not followed by a letter, are
/// kept as they are.
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '_' || ch == '-' {
            if let Some(next) = chars.peek().copied().filter(|c| c.is_alphabetic()) {
                out.extend(next.to_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Awaitable function names for a list of actions.
pub fn fn_names(actions: &[Action]) -> HashSet<String> {
    actions.iter().map(Action::fn_name).collect()
}
