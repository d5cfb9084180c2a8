// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Stream processor
//
// Takes the upstream completion byte stream, extracts text deltas, resolves
// placeholders in them and forwards the result immediately. The raw response
// is accumulated for the sanitizer and watched for the end of the code
// block, at which point the upstream stream is dropped.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::config::StreamConfig;
use crate::extract::StopDetector;
use crate::placeholder::{flush, resolve, PlaceholderTable, ResolveResult};

use super::classifier::{extractor_for, is_sse_content, parse_event_line, parse_sse_line, DeltaExtractor};
use super::types::{ChunkType, FinishReason, SseChunk, StreamError, StreamEvent};

/// Output channel depth. Bounded so a slow consumer applies back-pressure
/// to the upstream read.
const CHANNEL_CAPACITY: usize = 64;

/// Drives one response at a time through placeholder resolution and the
/// termination detector.
///
/// Cheap to clone into many tasks: it only holds shared config and the
/// provider extractor.
#[derive(Clone)]
pub struct StreamProcessor {
    extractor: Option<Arc<dyn DeltaExtractor>>,
    config: StreamConfig,
}

impl StreamProcessor {
    /// Processor with an explicit extractor. `None` treats every input as
    /// plain text.
    pub fn new(extractor: Option<Arc<dyn DeltaExtractor>>, config: StreamConfig) -> Self {
        Self { extractor, config }
    }

    /// Processor for the provider named in `config`.
    pub fn from_config(config: StreamConfig) -> Self {
        Self::new(extractor_for(config.provider), config)
    }

    /// Process one response.
    ///
    /// Emits zero or more `Text` events followed by exactly one `Finished`
    /// or `Error`. Dropping the returned stream stops the upstream read.
    pub fn process(
        &self,
        input: impl Stream<Item = Bytes> + Unpin + Send + 'static,
        table: Arc<PlaceholderTable>,
    ) -> impl Stream<Item = StreamEvent> {
        let (tx, rx) = mpsc::channel::<StreamEvent>(CHANNEL_CAPACITY);
        let extractor = self.extractor.clone();
        let config = self.config.clone();

        tokio::spawn(run(input, extractor, config, table, tx));

        ReceiverStream::new(rx)
    }
}

// ---------------------------------------------------------------------------
// Processing loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InputMode {
    Sse,
    Text,
}

/// Line prefixes that open an SSE body.
const SSE_PREFIXES: [&str; 3] = ["data:", "event:", ":"];

/// Input mode once the leading bytes settle it, `None` while they are still
/// ambiguous: only whitespace so far, or an unfinished first line that could
/// still become an SSE field.
pub(super) fn detect_mode(head: &[u8], has_extractor: bool) -> Option<InputMode> {
    if !has_extractor {
        return Some(InputMode::Text);
    }
    if is_sse_content(head) {
        return Some(InputMode::Sse);
    }
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let line_open = !text.contains('\n');
    if line_open && SSE_PREFIXES.iter().any(|prefix| prefix.starts_with(text)) {
        return None;
    }
    Some(InputMode::Text)
}

enum Flow {
    Continue,
    Stop(FinishReason),
    /// Error already reported, or the consumer is gone.
    Abort,
}

async fn run(
    mut input: impl Stream<Item = Bytes> + Unpin + Send + 'static,
    extractor: Option<Arc<dyn DeltaExtractor>>,
    config: StreamConfig,
    table: Arc<PlaceholderTable>,
    tx: mpsc::Sender<StreamEvent>,
) {
    let timeout = Duration::from_millis(config.chunk_timeout_ms);
    let mut state = ProcessingState::new(table);
    let mut mode: Option<InputMode> = None;
    // Leading bytes held back until the input mode is known.
    let mut head: Vec<u8> = Vec::new();

    let reason = loop {
        let chunk = match tokio::time::timeout(timeout, input.next()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                if mode.is_none() && !head.is_empty() {
                    let current = if extractor.is_some() && is_sse_content(&head) {
                        InputMode::Sse
                    } else {
                        InputMode::Text
                    };
                    mode = Some(current);
                    let decoded = state.feed(&std::mem::take(&mut head), current, extractor.as_deref());
                    match forward(&mut state, &decoded, &config, &tx).await {
                        Flow::Continue if decoded.done => break FinishReason::Completed,
                        Flow::Continue => {}
                        Flow::Stop(reason) => break reason,
                        Flow::Abort => return,
                    }
                }
                let decoded = state.finish_input(mode, extractor.as_deref());
                match forward(&mut state, &decoded, &config, &tx).await {
                    Flow::Continue => break FinishReason::Completed,
                    Flow::Stop(reason) => break reason,
                    Flow::Abort => return,
                }
            }
            Err(_) => {
                fail(
                    &tx,
                    StreamError::ChunkTimeout {
                        timeout_ms: config.chunk_timeout_ms,
                    },
                )
                .await;
                return;
            }
        };

        let (current, chunk) = match mode {
            Some(current) => (current, chunk),
            None => {
                head.extend_from_slice(&chunk);
                let Some(current) = detect_mode(&head, extractor.is_some()) else {
                    continue;
                };
                mode = Some(current);
                (current, Bytes::from(std::mem::take(&mut head)))
            }
        };

        let decoded = state.feed(&chunk, current, extractor.as_deref());
        match forward(&mut state, &decoded, &config, &tx).await {
            Flow::Continue if decoded.done => break FinishReason::Completed,
            Flow::Continue => {}
            Flow::Stop(reason) => break reason,
            Flow::Abort => return,
        }
    };

    let tail = flush(&state.resolver_buffer, &state.table);
    if !tail.is_empty() && tx.send(StreamEvent::Text(tail)).await.is_err() {
        return;
    }

    tracing::debug!(
        response_len = state.response.len(),
        reason = reason.as_str(),
        "response finished"
    );
    let _ = tx
        .send(StreamEvent::Finished {
            response: state.response,
            reason,
        })
        .await;
}

/// Resolve and forward text deltas in order. Stops at the first delta that
/// closes the code block or breaks a limit.
async fn forward(
    state: &mut ProcessingState,
    decoded: &Decoded,
    config: &StreamConfig,
    tx: &mpsc::Sender<StreamEvent>,
) -> Flow {
    for text in &decoded.texts {
        if state.response.len() + text.len() > config.max_response_bytes {
            fail(
                tx,
                StreamError::ResponseTooLarge {
                    limit: config.max_response_bytes,
                },
            )
            .await;
            return Flow::Abort;
        }
        state.response.push_str(text);

        let ResolveResult { content, buffer } = resolve(text, &state.resolver_buffer, &state.table);
        state.resolver_buffer = buffer;
        if !content.is_empty() && tx.send(StreamEvent::Text(content)).await.is_err() {
            return Flow::Abort;
        }

        if config.stop_at_closing_fence && state.stop.check(&state.response) {
            return Flow::Stop(FinishReason::CodeBlockClosed);
        }
    }

    if let Some(message) = &decoded.upstream_error {
        fail(
            tx,
            StreamError::Upstream {
                message: message.clone(),
            },
        )
        .await;
        return Flow::Abort;
    }

    Flow::Continue
}

/// Report `err` as the final event. A send failure means the consumer is
/// gone, which ends processing the same way.
async fn fail(tx: &mpsc::Sender<StreamEvent>, err: StreamError) {
    tracing::warn!(error = %err, "stream aborted");
    let _ = tx.send(StreamEvent::Error(err)).await;
}

// ---------------------------------------------------------------------------
// Processing state
// ---------------------------------------------------------------------------

/// Text pulled out of one input chunk.
#[derive(Debug, Default)]
struct Decoded {
    texts: Vec<String>,
    done: bool,
    upstream_error: Option<String>,
}

/// Mutable state of one response.
struct ProcessingState {
    table: Arc<PlaceholderTable>,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    utf8_carry: Vec<u8>,
    /// Partial SSE line.
    line_buffer: String,
    /// `event:` value waiting for its `data:` line.
    pending_event: Option<String>,
    /// Pending placeholder run.
    resolver_buffer: String,
    /// Raw model text received so far.
    response: String,
    /// Closing-fence search over `response`.
    stop: StopDetector,
}

impl ProcessingState {
    fn new(table: Arc<PlaceholderTable>) -> Self {
        Self {
            table,
            utf8_carry: Vec::new(),
            line_buffer: String::new(),
            pending_event: None,
            resolver_buffer: String::new(),
            response: String::new(),
            stop: StopDetector::new(),
        }
    }

    fn feed(&mut self, chunk: &[u8], mode: InputMode, extractor: Option<&dyn DeltaExtractor>) -> Decoded {
        self.utf8_carry.extend_from_slice(chunk);
        let text = decode_utf8(&mut self.utf8_carry);

        match (mode, extractor) {
            (InputMode::Sse, Some(extractor)) => {
                self.line_buffer.push_str(&text);
                self.drain_lines(extractor)
            }
            _ => Decoded {
                texts: if text.is_empty() { Vec::new() } else { vec![text] },
                ..Decoded::default()
            },
        }
    }

    /// End of input: whatever is carried is complete now.
    fn finish_input(&mut self, mode: Option<InputMode>, extractor: Option<&dyn DeltaExtractor>) -> Decoded {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.utf8_carry)).into_owned();

        match (mode, extractor) {
            (Some(InputMode::Sse), Some(extractor)) => {
                self.line_buffer.push_str(&rest);
                let mut decoded = self.drain_lines(extractor);
                let line = std::mem::take(&mut self.line_buffer);
                self.process_line(&line, extractor, &mut decoded);
                decoded
            }
            _ => Decoded {
                texts: if rest.is_empty() { Vec::new() } else { vec![rest] },
                ..Decoded::default()
            },
        }
    }

    fn drain_lines(&mut self, extractor: &dyn DeltaExtractor) -> Decoded {
        let mut decoded = Decoded::default();
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            self.process_line(&line, extractor, &mut decoded);
        }
        decoded
    }

    fn process_line(&mut self, line: &str, extractor: &dyn DeltaExtractor, decoded: &mut Decoded) {
        if decoded.done || decoded.upstream_error.is_some() {
            return;
        }
        if let Some(event) = parse_event_line(line) {
            self.pending_event = Some(event.to_string());
            return;
        }
        let Some(chunk) = parse_sse_line(line) else {
            return;
        };
        let chunk = SseChunk {
            event: self.pending_event.take(),
            data: chunk.data,
        };

        match extractor.classify(&chunk) {
            ChunkType::Text(text) => decoded.texts.push(text),
            ChunkType::Done => decoded.done = true,
            ChunkType::UpstreamError(message) => decoded.upstream_error = Some(message),
            ChunkType::NonSse => {
                tracing::debug!(data = %chunk.data, "ignoring non-provider SSE payload");
            }
            ChunkType::Control => {}
        }
    }
}

/// Decode the longest valid UTF-8 prefix of `carry`, leaving an incomplete
/// trailing sequence in place. Invalid bytes become U+FFFD.
fn decode_utf8(carry: &mut Vec<u8>) -> String {
    let mut out = String::with_capacity(carry.len());
    loop {
        match std::str::from_utf8(carry) {
            Ok(text) => {
                out.push_str(text);
                carry.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&carry[..valid]));
                match e.error_len() {
                    None => {
                        carry.drain(..valid);
                        return out;
                    }
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        carry.drain(..valid + len);
                    }
                }
            }
        }
    }
}
