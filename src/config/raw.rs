// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML shapes. Kept apart from the typed config because compiled
// regexes are not Deserialize, and interpolation/validation happen in
// between.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub scriptguard: String,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    /// If false, the built-in denylist is not loaded. Default: true.
    pub use_default_denylist: Option<bool>,
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(default)]
    pub awaitable: Vec<String>,
    pub stream: Option<RawStreamConfig>,
    pub environment: Option<String>,
}

/// An action given either as a bare name or with a description.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawAction {
    Name(String),
    Full {
        name: String,
        description: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStreamConfig {
    pub provider: Option<String>,
    pub stop_at_closing_fence: Option<bool>,
    pub max_response_bytes: Option<usize>,
    pub chunk_timeout_ms: Option<u64>,
}
