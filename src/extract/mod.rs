// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

// Code extraction and streaming termination
//
// Model responses are a plan written in prose followed by a fenced code
// block, often followed by more prose explaining the code. Extraction finds
// where the code begins, drops the narrative and fences around it. The
// termination detector runs the same search over a partial response and
// reports once the code block has been closed.

use std::sync::OnceLock;

use regex::Regex;

/// Fence marker delimiting a code block.
pub const FENCE: &str = "```";

/// Line-start markers that open a code block: a scripting-language fence,
/// or the first token of a plausible statement.
fn code_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(```jsx?|```javascript|\(?async |function |const |let |var |// )")
            .expect("code start")
    })
}

fn fence_opener_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(```jsx?|```javascript)").expect("fence opener"))
}

fn closing_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```").expect("closing fence"))
}

/// `Plan:` followed by one or more numbered `N. step` lines.
fn plan_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Plan:\s?(\n[0-9]\. .*)+").expect("plan"))
}

/// Slice of `response` starting at the first code marker, with a fence
/// opener removed. `None` if no marker has appeared.
fn code_tail(response: &str) -> Option<&str> {
    let start = code_start_regex().find(response)?.start();
    let tail = &response[start..];
    Some(match fence_opener_regex().find(tail) {
        Some(opener) => &tail[opener.end()..],
        None => tail,
    })
}

/// Extract the code block from a full model response.
///
/// Everything before the first code marker is discarded (fence opener
/// included), the code is cut at the next fence, and a `Plan:` narrative is
/// removed if one survives. Returns `None` when no code marker exists; the
/// caller should ask for another generation.
pub fn extract_code(response: &str) -> Option<String> {
    let Some(tail) = code_tail(response) else {
        tracing::warn!(
            response_len = response.len(),
            "could not find the start of the code"
        );
        return None;
    };

    let code = tail.split(FENCE).next().unwrap_or_default();
    Some(plan_regex().replacen(code, 1, "").into_owned())
}

/// Whether a partial response has already closed its code block.
///
/// Returns `false` until a code marker has appeared. After that, a line
/// starting with a fence means the model has moved on to trailing prose and
/// streaming can stop.
pub fn should_stop(partial_response: &str) -> bool {
    StopDetector::new().check(partial_response)
}

/// Incremental [`should_stop`] for a response that only ever grows.
///
/// Remembers where the code starts and how far the closing-fence search got,
/// so each call only rescans the last (possibly incomplete) line plus the
/// text appended since the previous call.
#[derive(Debug, Clone, Default)]
pub struct StopDetector {
    /// Offset of the first code marker, once seen.
    code_start: Option<usize>,
    /// Start of the line that was still open at the previous call.
    scan_from: usize,
}

impl StopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same answer as `should_stop(response)`, provided every earlier call
    /// saw a prefix of `response`.
    pub fn check(&mut self, response: &str) -> bool {
        let from = self.scan_from.min(response.len());
        let code_start = match self.code_start {
            Some(start) => start,
            None => match code_start_regex().find_at(response, from) {
                Some(marker) => {
                    self.code_start = Some(marker.start());
                    marker.start()
                }
                None => {
                    self.scan_from = last_line_start(response);
                    return false;
                }
            },
        };

        // The opener can still grow (```js -> ```jsx), so it is re-read.
        let body_start = match fence_opener_regex().find(&response[code_start..]) {
            Some(opener) => code_start + opener.end(),
            None => code_start,
        };

        let stop = response[body_start..].starts_with(FENCE)
            || closing_fence_regex()
                .find_at(response, from.max(body_start))
                .is_some();
        self.scan_from = last_line_start(response);

        if stop {
            tracing::info!(
                response_len = response.len(),
                "code block closed, terminating stream"
            );
        }
        stop
    }
}

fn last_line_start(text: &str) -> usize {
    text.rfind('\n').map_or(0, |newline| newline + 1)
}
