// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Stream types: parsed SSE chunks, their classification, the events handed
// to the consumer, and stream errors.

use std::fmt;

// ---------------------------------------------------------------------------
// SSE chunk representation
// ---------------------------------------------------------------------------

/// One `data:` payload from the upstream stream, with the `event:` line that
/// preceded it (Anthropic format) if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SseChunk {
    pub event: Option<String>,
    pub data: String,
}

// ---------------------------------------------------------------------------
// Chunk classification
// ---------------------------------------------------------------------------

/// What an SSE chunk means for the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkType {
    /// Model output text.
    Text(String),
    /// Framing or metadata (role deltas, block starts, pings). Ignored.
    Control,
    /// Upstream reported an error inside the stream.
    UpstreamError(String),
    /// Payload is not provider JSON. Ignored.
    NonSse,
    /// End of the model turn.
    Done,
}

// ---------------------------------------------------------------------------
// Output events
// ---------------------------------------------------------------------------

/// Why the processor finished a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Upstream ended (stream closed, `[DONE]` or `message_stop`).
    Completed,
    /// The code block closed and the rest of the response was not read.
    CodeBlockClosed,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Completed => "completed",
            FinishReason::CodeBlockClosed => "code_block_closed",
        }
    }
}

/// Item of the processor's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Placeholder-resolved text, ready to display.
    Text(String),
    /// Last event of a successful response. `response` is the raw model text
    /// received so far, placeholders unresolved, for the sanitizer.
    Finished {
        response: String,
        reason: FinishReason,
    },
    /// Last event of a failed response.
    Error(StreamError),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The raw response grew past `max_response_bytes`.
    ResponseTooLarge { limit: usize },
    /// No chunk arrived within `chunk_timeout_ms`.
    ChunkTimeout { timeout_ms: u64 },
    /// The provider sent an error event.
    Upstream { message: String },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::ResponseTooLarge { limit } => {
                write!(f, "response exceeded {limit} byte limit")
            }
            StreamError::ChunkTimeout { timeout_ms } => {
                write!(f, "no data from upstream for >{timeout_ms} ms")
            }
            StreamError::Upstream { message } => write!(f, "upstream error: {message}"),
        }
    }
}

impl std::error::Error for StreamError {}
