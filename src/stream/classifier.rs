// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Delta extractors
//
// Pull the model's text out of each provider SSE payload. Everything that is
// not text (role deltas, block starts, usage, pings) is control and
// ignored.

use std::sync::Arc;

use serde_json::Value;

use crate::config::StreamProvider;

use super::types::{ChunkType, SseChunk};

// ---------------------------------------------------------------------------
// Trait: DeltaExtractor
// ---------------------------------------------------------------------------

/// Classifies provider SSE chunks and extracts their text delta.
pub trait DeltaExtractor: Send + Sync {
    fn classify(&self, chunk: &SseChunk) -> ChunkType;
}

/// Extractor for an SSE provider. `None` for plain text input.
pub fn extractor_for(provider: StreamProvider) -> Option<Arc<dyn DeltaExtractor>> {
    match provider {
        StreamProvider::OpenAi => Some(Arc::new(OpenAiDeltaExtractor)),
        StreamProvider::Anthropic => Some(Arc::new(AnthropicDeltaExtractor)),
        StreamProvider::Text => None,
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// OpenAI chat-completions chunks.
///
/// - `data: {"choices":[{"delta":{"content":"Hello"}}]}` -> Text("Hello")
/// - `data: {"choices":[{"delta":{"role":"assistant"}}]}` -> Control
/// - `data: {"choices":[{"delta":{},"finish_reason":"stop"}]}` -> Control
/// - `data: {"error":{"message":"..."}}` -> UpstreamError
/// - `data: [DONE]` -> Done
pub struct OpenAiDeltaExtractor;

impl DeltaExtractor for OpenAiDeltaExtractor {
    fn classify(&self, chunk: &SseChunk) -> ChunkType {
        let data = chunk.data.trim();
        if data == "[DONE]" {
            return ChunkType::Done;
        }

        let json: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return ChunkType::NonSse,
        };

        if let Some(error) = json.get("error") {
            return ChunkType::UpstreamError(error_message(error));
        }

        let content = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str);

        match content {
            Some(text) if !text.is_empty() => ChunkType::Text(text.to_string()),
            _ => ChunkType::Control,
        }
    }
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

/// Anthropic messages chunks. The event type comes from the `event:` line,
/// or from the payload's `type` field when the line is absent.
///
/// - `content_block_delta` + `delta.type: "text_delta"` -> Text(delta.text)
/// - `message_stop` -> Done
/// - `error` -> UpstreamError
/// - everything else -> Control
pub struct AnthropicDeltaExtractor;

impl DeltaExtractor for AnthropicDeltaExtractor {
    fn classify(&self, chunk: &SseChunk) -> ChunkType {
        let json: Value = match serde_json::from_str(chunk.data.trim()) {
            Ok(v) => v,
            Err(_) => return ChunkType::NonSse,
        };

        let event = chunk
            .event
            .as_deref()
            .or_else(|| json.get("type").and_then(Value::as_str))
            .unwrap_or("");

        match event {
            "content_block_delta" => {
                let delta = json.get("delta");
                let is_text = delta.and_then(|d| d.get("type")).and_then(Value::as_str)
                    == Some("text_delta");
                match delta.and_then(|d| d.get("text")).and_then(Value::as_str) {
                    Some(text) if is_text && !text.is_empty() => ChunkType::Text(text.to_string()),
                    _ => ChunkType::Control,
                }
            }
            "message_stop" => ChunkType::Done,
            "error" => ChunkType::UpstreamError(
                json.get("error")
                    .map(error_message)
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            _ => ChunkType::Control,
        }
    }
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

// ---------------------------------------------------------------------------
// SSE line parsing
// ---------------------------------------------------------------------------

/// Parse one SSE line into a chunk. Only `data:` lines produce one; `event:`
/// lines are paired by the processor, comments and blank lines are skipped.
pub fn parse_sse_line(line: &str) -> Option<SseChunk> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?;
    Some(SseChunk {
        event: None,
        data: data.to_string(),
    })
}

/// Value of an `event:` line.
pub(super) fn parse_event_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix("event: ")
        .or_else(|| trimmed.strip_prefix("event:"))
        .map(str::trim)
}

/// Whether a body starts like an SSE stream (`data:` or `event:`).
pub fn is_sse_content(first_bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(first_bytes);
    let trimmed = text.trim_start();
    trimmed.starts_with("data:") || trimmed.starts_with("event:") || trimmed.starts_with(':')
}
