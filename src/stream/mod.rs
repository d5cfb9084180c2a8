// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Streaming driver for model responses
//
// Responsibilities:
// - Parse SSE event streams from OpenAI and Anthropic, or take plain text
// - Resolve placeholders in each text delta and forward the result at once
// - Cut the upstream stream once the generated code block has closed
// - Hand the raw response to the caller for sanitizing
// - Memory-bounded: 1MB max response by default
// - Timeout: 30s max between upstream chunks by default

mod classifier;
mod processor;
mod types;

pub use classifier::{
    extractor_for, is_sse_content, parse_sse_line, AnthropicDeltaExtractor, DeltaExtractor,
    OpenAiDeltaExtractor,
};
pub use processor::StreamProcessor;
pub use types::{ChunkType, FinishReason, SseChunk, StreamError, StreamEvent};
