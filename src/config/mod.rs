// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Config loading: YAML policy file and placeholder tables

mod defaults;
mod error;
mod interpolation;
mod loader;
mod pattern;
mod raw;
mod source;
mod types;

pub use defaults::default_denylist;
pub use error::ConfigError;
pub use interpolation::{resolve_variables, resolve_with};
pub use loader::{compute_hash, default_config, load_config, load_placeholder_table};
pub use pattern::CompiledPattern;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{
    Config, PolicyConfig, RuntimeConfig, StreamConfig, StreamProvider,
    DEFAULT_CHUNK_TIMEOUT_MS, DEFAULT_MAX_RESPONSE_BYTES,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE_YAML: &str = r#"
scriptguard: v1

actions:
  - get_orders
  - name: list_customers
    description: All customers

use_default_denylist: true
denylist:
  - 'document\.cookie'

awaitable: [sleep]

stream:
  provider: anthropic
  stop_at_closing_fence: false
  max_response_bytes: 4096
  chunk_timeout_ms: 500

environment: "staging"
"#;

    fn make_source(yaml: &str) -> StringSource {
        StringSource::new(yaml)
    }

    // ---------------------------------------------------------------
    // 1. Full config
    // ---------------------------------------------------------------

    #[test]
    fn valid_config_parses_all_key_fields() {
        let config = load_config(&make_source(EXAMPLE_YAML)).unwrap();

        assert_eq!(config.version(), "v1");
        assert_eq!(config.policy.actions.len(), 2);
        assert_eq!(config.policy.actions[0].name, "get_orders");
        assert_eq!(
            config.policy.actions[1].description.as_deref(),
            Some("All customers")
        );
        assert!(config.policy.action_fn_names().contains("listCustomers"));

        let builtin = default_denylist().len();
        assert_eq!(config.policy.denylist.len(), builtin + 1);
        assert_eq!(
            config.policy.denylist.last().unwrap().pattern,
            r"document\.cookie"
        );
        assert_eq!(config.policy.awaitable, vec!["sleep"]);

        let stream = &config.runtime.stream;
        assert_eq!(stream.provider, StreamProvider::Anthropic);
        assert!(!stream.stop_at_closing_fence);
        assert_eq!(stream.max_response_bytes, 4096);
        assert_eq!(stream.chunk_timeout_ms, 500);
        assert_eq!(config.runtime.environment, "staging");
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load_config(&make_source("scriptguard: v1\n")).unwrap();
        assert!(config.policy.actions.is_empty());
        assert_eq!(config.policy.denylist, default_denylist());
        assert_eq!(config.runtime.stream, StreamConfig::default());
        assert_eq!(config.runtime.stream.max_response_bytes, 1024 * 1024);
        assert_eq!(config.runtime.environment, "");
    }

    #[test]
    fn default_denylist_can_be_disabled() {
        let yaml = "scriptguard: v1\nuse_default_denylist: false\ndenylist: ['localStorage']\n";
        let config = load_config(&make_source(yaml)).unwrap();
        assert_eq!(config.policy.denylist.len(), 1);
        assert!(config.policy.denylist[0].is_match("localStorage.getItem('k')"));
    }

    #[test]
    fn builtin_denylist_covers_capability_escapes() {
        let denylist = default_denylist();
        for code in ["fetch(u)", "eval (x)", "new Function(\"\")", "WebAssembly.Module"] {
            assert!(
                denylist.iter().any(|p| p.is_match(code)),
                "{code} should be denied"
            );
        }
        assert!(!denylist.iter().any(|p| p.is_match("await getOrders();")));
    }

    // ---------------------------------------------------------------
    // 2. Validation errors
    // ---------------------------------------------------------------

    #[test]
    fn unsupported_version_rejected() {
        let err = load_config(&make_source("scriptguard: v2\n")).unwrap_err();
        assert!(err.to_string().contains("v2"), "{err}");
    }

    #[test]
    fn missing_version_rejected() {
        let err = load_config(&make_source("actions: [a]\n")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)), "{err}");
        assert!(err.to_string().contains("scriptguard"), "{err}");
    }

    #[test]
    fn unknown_field_rejected() {
        let err = load_config(&make_source("scriptguard: v1\ndenylsit: []\n")).unwrap_err();
        assert!(err.to_string().contains("denylsit"), "{err}");
    }

    #[test]
    fn invalid_denylist_regex_fails_at_load_time() {
        let err = load_config(&make_source("scriptguard: v1\ndenylist: ['fetch(']\n")).unwrap_err();
        match err {
            ConfigError::InvalidRegex { pattern, .. } => assert_eq!(pattern, "fetch("),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_rejected() {
        let yaml = "scriptguard: v1\nstream:\n  provider: banana\n";
        let msg = load_config(&make_source(yaml)).unwrap_err().to_string();
        assert!(msg.contains("banana"), "{msg}");
        assert!(msg.contains("unknown stream provider"), "{msg}");
    }

    #[test]
    fn zero_limits_rejected() {
        for field in ["max_response_bytes", "chunk_timeout_ms"] {
            let yaml = format!("scriptguard: v1\nstream:\n  {field}: 0\n");
            let msg = load_config(&make_source(&yaml)).unwrap_err().to_string();
            assert!(msg.contains(field), "{msg}");
        }
    }

    #[test]
    fn invalid_action_name_rejected() {
        let msg = load_config(&make_source("scriptguard: v1\nactions: ['get orders']\n"))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("get orders"), "{msg}");
    }

    #[test]
    fn blank_awaitable_name_rejected() {
        let err = load_config(&make_source("scriptguard: v1\nawaitable: ['']\n")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn undefined_environment_variable_fails_with_clear_error() {
        let yaml = "scriptguard: v1\nenvironment: \"${SCRIPTGUARD_TEST_UNDEFINED_98765}\"\n";
        let msg = load_config(&make_source(yaml)).unwrap_err().to_string();
        assert!(msg.contains("SCRIPTGUARD_TEST_UNDEFINED_98765"), "{msg}");
        assert!(msg.contains("undefined variable"), "{msg}");
    }

    // ---------------------------------------------------------------
    // 3. Contract hash
    // ---------------------------------------------------------------

    #[test]
    fn contract_hash_is_deterministic() {
        let a = load_config(&make_source(EXAMPLE_YAML)).unwrap();
        let b = load_config(&make_source(EXAMPLE_YAML)).unwrap();
        assert_eq!(a.contract_hash, b.contract_hash);
        assert!(a.contract_hash.starts_with("sha256:"));
        assert_eq!(a.contract_hash.len(), 7 + 64);
    }

    #[test]
    fn policy_change_changes_hash() {
        let a = load_config(&make_source("scriptguard: v1\nactions: [a]\n")).unwrap();
        let b = load_config(&make_source("scriptguard: v1\nactions: [b]\n")).unwrap();
        assert_ne!(a.contract_hash, b.contract_hash);
    }

    #[test]
    fn runtime_and_formatting_changes_keep_hash() {
        let a = load_config(&make_source("scriptguard: v1\nactions: [a]\n")).unwrap();
        let b = load_config(&make_source(
            "# comment\nstream:\n  chunk_timeout_ms: 10\nactions:\n  - a\nscriptguard: v1\nenvironment: prod\n",
        ))
        .unwrap();
        assert_eq!(a.contract_hash, b.contract_hash);
    }

    #[test]
    fn default_config_matches_minimal_file() {
        let loaded = load_config(&make_source("scriptguard: v1\n")).unwrap();
        assert_eq!(default_config().contract_hash, loaded.contract_hash);
    }

    // ---------------------------------------------------------------
    // 4. Sources and placeholder tables
    // ---------------------------------------------------------------

    #[test]
    fn file_source_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE_YAML.as_bytes()).unwrap();

        let config = load_config(&FileSource::new(file.path())).unwrap();
        assert_eq!(config.policy.actions.len(), 2);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load_config(&FileSource::new(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.yaml"), "{err}");
    }

    #[test]
    fn placeholder_table_loads_flat_mapping() {
        let table = load_placeholder_table(&make_source(
            "URL1: https://a.example/\nID2: ff3a5\nFUNCTION: function\n",
        ))
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("URL1"), Some("https://a.example/"));
        assert!(table.malformed_keys().is_empty());
    }

    #[test]
    fn placeholder_table_keeps_malformed_keys() {
        let table = load_placeholder_table(&make_source("url1: x\nURL1: y\n")).unwrap();
        assert_eq!(table.malformed_keys(), vec!["url1"]);
    }

    #[test]
    fn placeholder_values_are_interpolated() {
        let err = load_placeholder_table(&make_source(
            "URL1: \"${SCRIPTGUARD_TEST_UNDEFINED_54321}/x\"\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedVariable { .. }));
    }

    #[test]
    fn empty_placeholder_file_is_empty_table() {
        let table = load_placeholder_table(&make_source("")).unwrap();
        assert!(table.is_empty());
    }
}
