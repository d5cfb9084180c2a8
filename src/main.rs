// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use scriptguard::action::Action;
use scriptguard::config::{self, Config, FileSource};
use scriptguard::outcome::ValidationOutcome;
use scriptguard::pipeline::Sanitizer;
use scriptguard::stream::{StreamEvent, StreamProcessor};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

const READ_BUF_SIZE: usize = 8 * 1024;

#[derive(Parser)]
#[command(name = "scriptguard", about = "Placeholder resolution and code sanitizing for LLM output")]
struct Cli {
    /// Path to the scriptguard.yaml config file (built-in defaults if omitted)
    #[arg(long, env = "SCRIPTGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a completion through placeholder resolution, then sanitize it
    Stream {
        /// Placeholder table YAML (key: value)
        #[arg(long, env = "SCRIPTGUARD_PLACEHOLDERS")]
        placeholders: Option<PathBuf>,

        /// Read the completion from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Action names (defaults to the configured actions)
        #[arg(long = "action")]
        actions: Vec<String>,
    },
    /// Sanitize a full model response and print the outcome as JSON
    Check {
        /// Read the response from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Action names (defaults to the configured actions)
        #[arg(long = "action")]
        actions: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match config::load_config(&FileSource::new(path)) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("failed to load config: {e}");
                std::process::exit(1);
            }
        },
        None => config::default_config(),
    };

    tracing::info!(
        version = %config.policy.version,
        environment = %config.runtime.environment,
        provider = config.runtime.stream.provider.as_str(),
        contract_hash = %config.contract_hash,
        "config loaded"
    );

    let code = match cli.command {
        Command::Stream {
            placeholders,
            input,
            actions,
        } => run_stream(&config, placeholders, input, &actions).await,
        Command::Check { input, actions } => run_check(&config, input, &actions).await,
    };
    std::process::exit(code);
}

async fn run_stream(
    config: &Config,
    placeholders: Option<PathBuf>,
    input: Option<PathBuf>,
    actions: &[String],
) -> i32 {
    let table = match placeholders {
        Some(path) => match config::load_placeholder_table(&FileSource::new(path)) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("failed to load placeholders: {e}");
                return 1;
            }
        },
        None => Default::default(),
    };
    tracing::info!(placeholders = table.len(), "placeholder table loaded");

    let body = match input {
        Some(path) => match tokio::fs::File::open(&path).await {
            Ok(file) => byte_stream(file),
            Err(e) => {
                tracing::error!(path = %path.display(), "failed to open input: {e}");
                return 1;
            }
        },
        None => byte_stream(tokio::io::stdin()),
    };

    let processor = StreamProcessor::from_config(config.runtime.stream.clone());
    let mut events = Box::pin(processor.process(body, Arc::new(table)));

    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Text(text) => {
                if stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()).is_err() {
                    tracing::warn!("stdout closed, stopping");
                    return 1;
                }
            }
            StreamEvent::Finished { response, reason } => {
                let _ = writeln!(stdout);
                tracing::info!(reason = reason.as_str(), response_len = response.len(), "stream finished");
                let outcome = sanitize(config, &response, actions);
                log_outcome(&outcome);
                return if matches!(outcome, ValidationOutcome::Code(_)) { 0 } else { 2 };
            }
            StreamEvent::Error(e) => {
                tracing::error!("stream failed: {e}");
                return 1;
            }
        }
    }
    tracing::error!("stream ended without a result");
    1
}

async fn run_check(config: &Config, input: Option<PathBuf>, actions: &[String]) -> i32 {
    let response = match input {
        Some(path) => tokio::fs::read_to_string(&path).await,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await.map(|_| buf)
        }
    };
    let response = match response {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("failed to read response: {e}");
            return 1;
        }
    };

    let outcome = sanitize(config, &response, actions);
    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("failed to serialize outcome: {e}");
            return 1;
        }
    }
    if outcome.is_code() {
        0
    } else {
        2
    }
}

fn sanitize(config: &Config, response: &str, actions: &[String]) -> ValidationOutcome {
    let actions: Vec<Action> = if actions.is_empty() {
        config.policy.actions.clone()
    } else {
        actions.iter().map(|a| Action::new(a.as_str())).collect()
    };
    Sanitizer::from_config(config).parse_response(response, &actions)
}

fn log_outcome(outcome: &ValidationOutcome) {
    match serde_json::to_string(outcome) {
        Ok(json) => tracing::info!(kind = outcome.kind(), outcome = %json, "response sanitized"),
        Err(e) => tracing::error!("failed to serialize outcome: {e}"),
    }
}

/// Read `reader` in chunks onto a channel so it can feed the processor.
fn byte_stream<R>(mut reader: R) -> ReceiverStream<Bytes>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("read failed: {e}");
                    break;
                }
            }
        }
    });
    ReceiverStream::new(rx)
}
