// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Eval harness: replays recorded model responses through the sanitizer and
// reports per-outcome precision/recall/F1.
//
// Each case names the outcome a careful reviewer would expect (code, error,
// retry). Code cases can also pin fragments the normalized code must
// contain, so rewrites are checked and not just the verdict.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::outcome::ValidationOutcome;
use crate::pipeline::Sanitizer;

// ---------------------------------------------------------------------------
// Dataset types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    Code,
    Error,
    Retry,
}

impl ExpectedOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedOutcome::Code => "code",
            ExpectedOutcome::Error => "error",
            ExpectedOutcome::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Full model response, as streamed.
    pub response: String,
    /// Action names for this case. Empty means the config's actions.
    #[serde(default)]
    pub actions: Vec<String>,
    pub expect: ExpectedOutcome,
    /// Fragments the normalized code must contain.
    #[serde(default)]
    pub code_contains: Vec<String>,
    /// Fragment the error message must contain.
    #[serde(default)]
    pub error_contains: Option<String>,
}

// ---------------------------------------------------------------------------
// Eval result and report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct EvalResult {
    pub case_id: String,
    pub expected: String,
    pub actual: String,
    pub correct: bool,
    pub detail: String,
}

#[derive(Debug, Default, Serialize)]
pub struct OutcomeMetrics {
    pub outcome: String,
    pub tp: usize,
    pub fp: usize,
    pub fn_count: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Cases expecting this outcome.
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalReport {
    pub outcomes: Vec<OutcomeMetrics>,
    pub results: Vec<EvalResult>,
    pub total_cases: usize,
    pub total_correct: usize,
    pub accuracy: f64,
}

// ---------------------------------------------------------------------------
// Dataset loading
// ---------------------------------------------------------------------------

/// Load every `*.yaml`/`*.yml` case file in `dir`, sorted by case id.
/// Files named `eval_config*` are skipped.
pub fn load_dataset(dir: &Path) -> Result<Vec<EvalCase>, String> {
    let mut cases = Vec::new();

    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("failed to read dataset directory {}: {e}", dir.display()))?;

    for entry in entries {
        let entry = entry.map_err(|e| format!("failed to read directory entry: {e}"))?;
        let path = entry.path();

        let ext = path.extension().and_then(|e| e.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|f| f.to_str()) {
            if name.starts_with("eval_config") {
                continue;
            }
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let file_cases: Vec<EvalCase> = serde_yaml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;

        cases.extend(file_cases);
    }

    cases.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(cases)
}

// ---------------------------------------------------------------------------
// Run eval
// ---------------------------------------------------------------------------

/// Sanitize every case and compare against its expectation.
pub fn run_eval(cases: &[EvalCase], sanitizer: &Sanitizer, default_actions: &[Action]) -> Vec<EvalResult> {
    cases
        .iter()
        .map(|case| {
            let actions: Vec<Action> = if case.actions.is_empty() {
                default_actions.to_vec()
            } else {
                case.actions.iter().map(|n| Action::new(n.as_str())).collect()
            };
            let outcome = sanitizer.parse_response(&case.response, &actions);
            judge(case, &outcome)
        })
        .collect()
}

fn judge(case: &EvalCase, outcome: &ValidationOutcome) -> EvalResult {
    let actual = outcome.kind();
    let mut problems = Vec::new();

    if actual != case.expect.as_str() {
        problems.push(format!("got {actual}"));
    }
    match outcome {
        ValidationOutcome::Code(code) => {
            for fragment in &case.code_contains {
                if !code.contains(fragment.as_str()) {
                    problems.push(format!("code lacks {fragment:?}"));
                }
            }
        }
        ValidationOutcome::Error(message) => {
            if let Some(fragment) = &case.error_contains {
                if !message.contains(fragment.as_str()) {
                    problems.push(format!("message {message:?} lacks {fragment:?}"));
                }
            }
        }
        ValidationOutcome::Retry => {}
    }

    let detail = match outcome {
        ValidationOutcome::Error(message) if problems.is_empty() => message.clone(),
        _ => problems.join("; "),
    };

    EvalResult {
        case_id: case.id.clone(),
        expected: case.expect.as_str().to_string(),
        actual: actual.to_string(),
        correct: problems.is_empty(),
        detail,
    }
}

/// Per-outcome metrics. A case counts as a true positive for its expected
/// outcome only when the verdict matches; fragment checks affect
/// `correct` but not the confusion counts.
pub fn compute_metrics(results: &[EvalResult]) -> EvalReport {
    let total_cases = results.len();
    let total_correct = results.iter().filter(|r| r.correct).count();

    // (tp, fp, fn, expected total)
    let mut counts: HashMap<&str, (usize, usize, usize, usize)> = HashMap::new();
    for kind in ["code", "error", "retry"] {
        counts.insert(kind, (0, 0, 0, 0));
    }

    for r in results {
        if r.expected == r.actual {
            if let Some(entry) = counts.get_mut(r.expected.as_str()) {
                entry.0 += 1;
                entry.3 += 1;
            }
        } else {
            if let Some(entry) = counts.get_mut(r.actual.as_str()) {
                entry.1 += 1;
            }
            if let Some(entry) = counts.get_mut(r.expected.as_str()) {
                entry.2 += 1;
                entry.3 += 1;
            }
        }
    }

    let mut outcomes: Vec<OutcomeMetrics> = counts
        .into_iter()
        .map(|(outcome, (tp, fp, fn_count, total))| {
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_count);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            OutcomeMetrics {
                outcome: outcome.to_string(),
                tp,
                fp,
                fn_count,
                precision,
                recall,
                f1,
                total,
            }
        })
        .collect();
    outcomes.sort_by(|a, b| a.outcome.cmp(&b.outcome));

    EvalReport {
        outcomes,
        results: Vec::new(), // populated by caller if needed
        total_cases,
        total_correct,
        accuracy: ratio(total_correct, total_cases),
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}
