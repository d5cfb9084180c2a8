// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// scriptguard-eval: replay recorded model responses through the sanitizer,
// report per-outcome precision/recall/F1.
//
// Usage:
//   cargo run --bin scriptguard-eval -- --dataset schema/eval/
//   cargo run --bin scriptguard-eval -- --config scriptguard.yaml --dataset schema/eval/ --json

use std::path::PathBuf;

use clap::Parser;
use scriptguard::config::{self, FileSource};
use scriptguard::eval;
use scriptguard::pipeline::Sanitizer;

#[derive(Parser)]
#[command(name = "scriptguard-eval", about = "Scriptguard eval harness")]
struct Cli {
    /// Path to the scriptguard config YAML (built-in defaults if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the eval dataset directory
    #[arg(long)]
    dataset: PathBuf,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Only run cases expecting this outcome (code, error, retry)
    #[arg(long)]
    expect: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match config::load_config(&FileSource::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => config::default_config(),
    };

    let mut cases = match eval::load_dataset(&cli.dataset) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load dataset: {e}");
            std::process::exit(1);
        }
    };

    if let Some(ref expect) = cli.expect {
        cases.retain(|c| c.expect.as_str() == expect);
    }

    if cases.is_empty() {
        eprintln!("no eval cases found");
        std::process::exit(1);
    }

    eprintln!("running {} eval cases...", cases.len());

    let sanitizer = Sanitizer::from_config(&config);
    let results = eval::run_eval(&cases, &sanitizer, &config.policy.actions);
    let mut report = eval::compute_metrics(&results);

    if cli.json {
        report.results = results;
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!();
        println!("Scriptguard Eval Report");
        println!("=======================");
        println!();

        for outcome in &report.outcomes {
            println!("Outcome: {}", outcome.outcome);
            println!(
                "  TP={} FP={} FN={} (total={})",
                outcome.tp, outcome.fp, outcome.fn_count, outcome.total
            );
            println!(
                "  Precision={:.1}%  Recall={:.1}%  F1={:.1}%",
                outcome.precision * 100.0,
                outcome.recall * 100.0,
                outcome.f1 * 100.0
            );
            println!();
        }

        let failures: Vec<&eval::EvalResult> = results.iter().filter(|r| !r.correct).collect();
        if failures.is_empty() {
            println!("All {} cases passed.", report.total_cases);
        } else {
            println!(
                "{}/{} cases passed, {} failures:",
                report.total_correct,
                report.total_cases,
                failures.len()
            );
            println!();
            for f in &failures {
                println!(
                    "  FAIL {}: expected={}, actual={} ({})",
                    f.case_id, f.expected, f.actual, f.detail
                );
            }
        }
        println!();
        println!(
            "Accuracy: {:.1}% ({}/{})",
            report.accuracy * 100.0,
            report.total_correct,
            report.total_cases
        );
    }

    if report.total_correct < report.total_cases {
        std::process::exit(1);
    }
}
