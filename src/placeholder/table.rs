// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use serde::Deserialize;

/// Immutable mapping from placeholder key (`URL1`, `ID2`, `FUNCTION`) to the
/// value substituted for it.
///
/// Supplied once per response by the prompt-construction layer and never
/// mutated afterwards, so a single table can be shared by reference across
/// every `resolve` call of that response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderTable {
    entries: HashMap<String, String>,
}

impl PlaceholderTable {
    /// An empty table. Every run passes through literally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value for an exact key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Keys that do not have placeholder shape. The resolver can never
    /// produce such a run, so these entries are dead weight.
    pub fn malformed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .keys()
            .filter(|k| !is_placeholder_key(k))
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl<K, V> FromIterator<(K, V)> for PlaceholderTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for PlaceholderTable {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Whether `key` has placeholder shape: one or more uppercase ASCII letters
/// followed by zero or more decimal digits.
pub fn is_placeholder_key(key: &str) -> bool {
    let letters = key.bytes().take_while(u8::is_ascii_uppercase).count();
    letters > 0 && key.bytes().skip(letters).all(|b| b.is_ascii_digit())
}
