// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while loading a config file or a placeholder table.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {source_name}: {error}")]
    Io {
        source_name: String,
        error: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid regex pattern \"{pattern}\": {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("undefined variable ${{{name}}} (not set in environment)")]
    UndefinedVariable { name: String },
}
