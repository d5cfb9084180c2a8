// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Sanitizer pipeline
//
// One entry point per response: extract the code block, validate it, then
// normalize it. Every failure is mapped to an outcome the sandbox caller can
// act on. Nothing here returns Err or panics on model output.

use std::collections::HashSet;
use std::sync::Arc;

use crate::action::{fn_names, Action};
use crate::config::Config;
use crate::extract::extract_code;
use crate::normalize::{CodeNormalizer, Normalizer};
use crate::outcome::ValidationOutcome;
use crate::validate::{CodeValidator, StaticValidator};

/// A snippet together with the names it may await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub code: String,
    pub allowed_names: HashSet<String>,
}

impl CodeBlock {
    pub fn new(code: impl Into<String>, actions: &[Action]) -> Self {
        Self {
            code: code.into(),
            allowed_names: fn_names(actions),
        }
    }
}

/// Extract, validate and normalize generated code.
#[derive(Clone)]
pub struct Sanitizer {
    validator: Arc<dyn CodeValidator>,
    known_type_names: Vec<String>,
}

impl Sanitizer {
    pub fn new(validator: Arc<dyn CodeValidator>) -> Self {
        Self {
            validator,
            known_type_names: Vec::new(),
        }
    }

    /// Sanitizer using the configured denylist and awaitable names.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(StaticValidator::new(
            config.policy.denylist.clone(),
            config.policy.awaitable.clone(),
        )))
    }

    /// Type names defined outside the snippet whose annotations are erased.
    pub fn with_type_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_type_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sanitize a full (or early-cut) model response.
    pub fn parse_response(&self, output: &str, actions: &[Action]) -> ValidationOutcome {
        match extract_code(output) {
            Some(code) => self.parse_generated_code(&code, actions),
            None => ValidationOutcome::Retry,
        }
    }

    /// Sanitize an already-extracted snippet.
    pub fn parse_generated_code(&self, raw_code: &str, actions: &[Action]) -> ValidationOutcome {
        let block = CodeBlock::new(raw_code, actions);

        let code = match self.validator.validate(&block.code, &block.allowed_names) {
            Ok(code) => code,
            Err(rejection) => {
                tracing::warn!(
                    reason = %rejection,
                    retry = rejection.is_retry(),
                    "generated code rejected"
                );
                return rejection.into_outcome();
            }
        };

        let normalizer = CodeNormalizer::new(block.allowed_names.iter().cloned())
            .with_type_names(self.known_type_names.iter().cloned());
        let normalized = normalizer.normalize(&code).trim().to_string();

        if normalized.is_empty() {
            tracing::warn!("no code left after normalization");
            return ValidationOutcome::Retry;
        }

        tracing::debug!(code_len = normalized.len(), "generated code accepted");
        ValidationOutcome::Code(normalized)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(Arc::new(StaticValidator::default()))
    }
}
