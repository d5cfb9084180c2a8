// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use crate::action::{fn_names, Action};

use super::pattern::CompiledPattern;

// ---------------------------------------------------------------------------
// Top-level config (policy + runtime)
// ---------------------------------------------------------------------------

/// Parsed and validated scriptguard config.
#[derive(Debug)]
pub struct Config {
    /// What generated code may do. Hashed into `contract_hash`.
    pub policy: PolicyConfig,
    /// How responses are streamed. Varies by deployment, not hashed.
    pub runtime: RuntimeConfig,
    /// SHA256 of the canonical policy: "sha256:{hex}".
    pub contract_hash: String,
}

impl Config {
    pub fn version(&self) -> &str {
        &self.policy.version
    }
}

// ---------------------------------------------------------------------------
// Policy config: hashed
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PolicyConfig {
    /// Always "v1".
    pub version: String,
    /// Default actions used when a request names none.
    pub actions: Vec<Action>,
    /// Built-in patterns (unless disabled) followed by configured ones.
    pub denylist: Vec<CompiledPattern>,
    /// Extra names that are always valid await targets.
    pub awaitable: Vec<String>,
}

impl PolicyConfig {
    /// camelCase names of the configured actions.
    pub fn action_fn_names(&self) -> HashSet<String> {
        fn_names(&self.actions)
    }
}

// ---------------------------------------------------------------------------
// Runtime config: not hashed
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RuntimeConfig {
    pub stream: StreamConfig,
    /// Environment label (e.g. "staging", "production").
    pub environment: String,
}

/// Wire format of the upstream completion stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamProvider {
    /// OpenAI chat-completions SSE (`choices[0].delta.content`).
    #[default]
    OpenAi,
    /// Anthropic messages SSE (`content_block_delta` text deltas).
    Anthropic,
    /// Raw UTF-8 text, no framing.
    Text,
}

impl StreamProvider {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Text => "text",
        }
    }
}

pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 30_000;

/// Stream processing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub provider: StreamProvider,
    /// Cut the upstream stream once the code block has closed.
    pub stop_at_closing_fence: bool,
    /// Upper bound on the raw response size.
    pub max_response_bytes: usize,
    /// Upper bound on the gap between two upstream chunks.
    pub chunk_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            provider: StreamProvider::default(),
            stop_at_closing_fence: true,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            chunk_timeout_ms: DEFAULT_CHUNK_TIMEOUT_MS,
        }
    }
}
