// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Result handed to the sandbox caller for one generated snippet

use serde::Serialize;

/// Outcome of sanitizing one model response.
///
/// - `Code`: normalized code, safe to hand to the sandbox
/// - `Error`: user-facing message (the model's own failure report, or a
///   denylisted capability)
/// - `Retry`: ask the model for another generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Code(String),
    Error(String),
    Retry,
}

impl ValidationOutcome {
    pub fn is_code(&self) -> bool {
        matches!(self, ValidationOutcome::Code(_))
    }

    /// The normalized code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Code(code) => Some(code),
            _ => None,
        }
    }

    /// Short label used in logs and eval reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationOutcome::Code(_) => "code",
            ValidationOutcome::Error(_) => "error",
            ValidationOutcome::Retry => "retry",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_tagged_kind() {
        assert_eq!(
            serde_json::to_value(ValidationOutcome::Code("await f();".into())).unwrap(),
            json!({"kind": "code", "value": "await f();"})
        );
        assert_eq!(
            serde_json::to_value(ValidationOutcome::Error("nope".into())).unwrap(),
            json!({"kind": "error", "value": "nope"})
        );
        assert_eq!(
            serde_json::to_value(ValidationOutcome::Retry).unwrap(),
            json!({"kind": "retry"})
        );
    }

    #[test]
    fn accessors() {
        let code = ValidationOutcome::Code("x".into());
        assert!(code.is_code());
        assert_eq!(code.code(), Some("x"));
        assert_eq!(ValidationOutcome::Retry.code(), None);
        assert_eq!(ValidationOutcome::Error("e".into()).kind(), "error");
    }
}
