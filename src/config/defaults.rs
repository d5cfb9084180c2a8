// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use super::pattern::CompiledPattern;

/// Built-in capability denylist, embedded at compile time.
const DEFAULT_DENYLIST_YAML: &str = include_str!("../../schema/default_denylist.yaml");

#[derive(Deserialize)]
struct DefaultDenylistYaml {
    denylist: Vec<String>,
}

/// Parse and compile the built-in denylist.
/// Panics on invalid YAML or regex (these are our own patterns).
pub fn default_denylist() -> Vec<CompiledPattern> {
    let raw: DefaultDenylistYaml =
        serde_yaml::from_str(DEFAULT_DENYLIST_YAML).expect("default denylist YAML is invalid");

    raw.denylist
        .iter()
        .map(|p| {
            CompiledPattern::compile(p)
                .unwrap_or_else(|e| panic!("default denylist pattern failed to compile: {e}"))
        })
        .collect()
}
