// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::action::Action;
use crate::placeholder::PlaceholderTable;

use super::defaults::default_denylist;
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::pattern::CompiledPattern;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a scriptguard config.
///
/// Steps:
/// 1. Read raw YAML from the source
/// 2. Parse into raw deserialization types
/// 3. Validate version, action names and stream limits
/// 4. Resolve `${VAR}` in `environment`
/// 5. Compile denylist patterns (built-in first, then configured)
/// 6. Hash the canonical policy into `contract_hash`
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.scriptguard != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.scriptguard
        )));
    }

    let actions = raw
        .actions
        .into_iter()
        .map(build_action)
        .collect::<Result<Vec<_>, _>>()?;

    let mut denylist = if raw.use_default_denylist != Some(false) {
        default_denylist()
    } else {
        Vec::new()
    };
    denylist.extend(CompiledPattern::compile_all(&raw.denylist)?);

    for name in &raw.awaitable {
        if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "awaitable name \"{name}\" must be a non-empty identifier"
            )));
        }
    }

    let stream = build_stream_config(raw.stream)?;
    let environment = match raw.environment {
        Some(env) => resolve_variables(&env)?,
        None => String::new(),
    };

    let policy = PolicyConfig {
        version: raw.scriptguard,
        actions,
        denylist,
        awaitable: raw.awaitable,
    };
    let contract_hash = compute_hash(&canonical_policy(&policy));

    tracing::debug!(
        source = %source.describe(),
        actions = policy.actions.len(),
        denylist = policy.denylist.len(),
        contract_hash = %contract_hash,
        "config loaded"
    );

    Ok(Config {
        policy,
        runtime: RuntimeConfig {
            stream,
            environment,
        },
        contract_hash,
    })
}

/// Config used when no file is given: no default actions, built-in
/// denylist, default stream settings.
pub fn default_config() -> Config {
    let policy = PolicyConfig {
        version: "v1".to_string(),
        actions: Vec::new(),
        denylist: default_denylist(),
        awaitable: Vec::new(),
    };
    let contract_hash = compute_hash(&canonical_policy(&policy));
    Config {
        policy,
        runtime: RuntimeConfig::default(),
        contract_hash,
    }
}

/// Load a placeholder table: a flat mapping of key to value.
///
/// Values may reference `${VAR}`. Keys without placeholder shape can never
/// be produced by the resolver; they are kept but logged.
pub fn load_placeholder_table(source: &dyn ConfigSource) -> Result<PlaceholderTable, ConfigError> {
    let raw_yaml = source.load()?;
    let raw: Option<HashMap<String, String>> = if raw_yaml.trim().is_empty() {
        None
    } else {
        serde_yaml::from_str(&raw_yaml)?
    };

    let mut entries = HashMap::new();
    for (key, value) in raw.unwrap_or_default() {
        entries.insert(key, resolve_variables(&value)?);
    }
    let table = PlaceholderTable::from(entries);

    let malformed = table.malformed_keys();
    if !malformed.is_empty() {
        tracing::warn!(
            source = %source.describe(),
            keys = ?malformed,
            "placeholder keys must be uppercase letters followed by digits; these never match"
        );
    }
    Ok(table)
}

/// Stable text form of the policy. Reordering YAML keys, comments, or
/// runtime settings leave it unchanged.
fn canonical_policy(policy: &PolicyConfig) -> String {
    let actions: Vec<&str> = policy.actions.iter().map(|a| a.name.as_str()).collect();
    let denylist: Vec<&str> = policy.denylist.iter().map(|p| p.pattern.as_str()).collect();
    json!({
        "version": policy.version,
        "actions": actions,
        "denylist": denylist,
        "awaitable": policy.awaitable,
    })
    .to_string()
}

pub fn compute_hash(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

fn build_action(raw: raw::RawAction) -> Result<Action, ConfigError> {
    let (name, description) = match raw {
        raw::RawAction::Name(name) => (name, None),
        raw::RawAction::Full { name, description } => (name, description),
    };
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ConfigError::Validation(format!(
            "invalid action name \"{name}\", expected letters, digits, '_' or '-'"
        )));
    }
    Ok(Action { name, description })
}

fn build_stream_config(raw: Option<raw::RawStreamConfig>) -> Result<StreamConfig, ConfigError> {
    let defaults = StreamConfig::default();
    let Some(raw) = raw else {
        return Ok(defaults);
    };

    let provider = match raw.provider.as_deref() {
        None => defaults.provider,
        Some(name) => StreamProvider::parse(name).ok_or_else(|| {
            ConfigError::Validation(format!(
                "unknown stream provider \"{name}\", expected \"openai\", \"anthropic\", or \"text\""
            ))
        })?,
    };

    let max_response_bytes = raw.max_response_bytes.unwrap_or(defaults.max_response_bytes);
    if max_response_bytes == 0 {
        return Err(ConfigError::Validation(
            "stream max_response_bytes must be > 0".into(),
        ));
    }
    let chunk_timeout_ms = raw.chunk_timeout_ms.unwrap_or(defaults.chunk_timeout_ms);
    if chunk_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "stream chunk_timeout_ms must be > 0".into(),
        ));
    }

    Ok(StreamConfig {
        provider,
        stop_at_closing_fence: raw
            .stop_at_closing_fence
            .unwrap_or(defaults.stop_at_closing_fence),
        max_response_bytes,
        chunk_timeout_ms,
    })
}
