//! Context-window management: token estimation and staged history
//! compression.
//!
//! Compression triggers at ≥ 80% of the token budget and rewrites toward
//! 60% to avoid oscillation, in three stages:
//! 1. summarize the oldest window of turns into a single synthetic
//!    prior-context summary message (preserving referenced file paths and
//!    tool names),
//! 2. elide tool-result bodies older than the last few iterations,
//! 3. truncate the summary itself.
//!
//! Invariants: the system prompt is never dropped or rewritten, the most
//! recent user turn is retained verbatim, tool-call/tool-result pairs are
//! never split, and compression is monotonic (an existing summary is folded
//! rather than re-expanded).

use serde_json::json;

use crate::ai::types::{Message, MessageRole};
use crate::config::ContextConfig;

/// Metadata key marking the synthetic prior-context summary message.
const SUMMARY_FLAG: &str = "context_summary";

/// Fallback token estimate: ~4 bytes per token.
const BYTES_PER_TOKEN: usize = 4;

/// Fixed per-message overhead (role framing, separators).
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Minimum number of trailing messages kept verbatim by stage 1.
const KEEP_TAIL: usize = 8;

/// Hard floor for the summary after stage-3 truncation, in bytes.
const SUMMARY_FLOOR_BYTES: usize = 512;

#[derive(Debug)]
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens
    }

    // ── Estimation ───────────────────────────────────────────────────────────

    /// Estimate the prompt cost of `messages` in tokens.
    pub fn estimate_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(estimate_message).sum()
    }

    /// True when the history has reached the compression threshold.
    pub fn should_compress(&self, messages: &[Message]) -> bool {
        let threshold = self.config.max_tokens * self.config.compress_at_percent / 100;
        self.estimate_tokens(messages) >= threshold
    }

    // ── Compression ──────────────────────────────────────────────────────────

    /// Rewrite `messages` so the estimate fits the target budget.
    pub fn compress(&self, messages: &[Message]) -> Vec<Message> {
        let target = self.config.max_tokens * self.config.compress_target_percent / 100;
        if self.estimate_tokens(messages) <= target {
            return messages.to_vec();
        }

        // ── Stage 1: summarize the oldest window ─────────────────────────────
        let mut result = self.summarize_window(messages);
        if self.estimate_tokens(&result) <= target {
            return result;
        }

        // ── Stage 2: elide old tool-result bodies ────────────────────────────
        elide_old_tool_results(&mut result, self.config.elide_after_iterations);
        if self.estimate_tokens(&result) <= target {
            return result;
        }

        // ── Stage 3: truncate the summary ────────────────────────────────────
        let current_tokens = self.estimate_tokens(&result);
        truncate_summary(&mut result, target, current_tokens);
        result
    }

    /// Replace everything between the system prefix and the keep-tail with
    /// one synthetic summary message.
    fn summarize_window(&self, messages: &[Message]) -> Vec<Message> {
        let prefix_end = messages
            .iter()
            .position(|m| m.role != MessageRole::System)
            .unwrap_or(messages.len());

        // Keep the trailing user turn and recent context verbatim.
        let last_user = messages
            .iter()
            .rposition(|m| m.role == MessageRole::User)
            .unwrap_or(prefix_end);
        let mut tail_start = messages
            .len()
            .saturating_sub(KEEP_TAIL)
            .min(last_user)
            .max(prefix_end);

        // Never split an assistant-with-calls from its observations.
        while tail_start > prefix_end && messages[tail_start].role == MessageRole::Tool {
            tail_start -= 1;
        }

        // Fold an existing summary instead of re-expanding it.
        let mut window = &messages[prefix_end..tail_start];
        let mut prior_summary = None;
        if let Some(first) = window.first() {
            if first.metadata.contains_key(SUMMARY_FLAG) {
                prior_summary = Some(first.content.clone());
                window = &window[1..];
            }
        }

        if window.is_empty() && prior_summary.is_none() {
            return messages.to_vec();
        }

        let summary_text = build_summary(prior_summary.as_deref(), window);
        let summary = Message::assistant(summary_text).with_metadata(SUMMARY_FLAG, json!(true));

        let mut result = Vec::with_capacity(prefix_end + 1 + (messages.len() - tail_start));
        result.extend_from_slice(&messages[..prefix_end]);
        result.push(summary);
        result.extend_from_slice(&messages[tail_start..]);
        result
    }
}

fn estimate_message(message: &Message) -> usize {
    let mut bytes = message.content.len();
    for call in &message.tool_calls {
        bytes += call.name.len() + call.arguments.to_string().len();
    }
    for result in &message.tool_results {
        bytes += result.content.len();
        if let Some(e) = &result.error {
            bytes += e.len();
        }
    }
    bytes / BYTES_PER_TOKEN + MESSAGE_OVERHEAD_TOKENS
}

/// Build the deterministic prior-context summary: turn counts, tool names,
/// referenced paths, and first-line snippets.
fn build_summary(prior: Option<&str>, window: &[Message]) -> String {
    let mut tool_names: Vec<String> = Vec::new();
    let mut paths: Vec<String> = Vec::new();
    let mut snippets: Vec<String> = Vec::new();

    for message in window {
        for call in &message.tool_calls {
            if !tool_names.contains(&call.name) {
                tool_names.push(call.name.clone());
            }
            for candidate in extract_paths(&call.arguments.to_string()) {
                if !paths.contains(&candidate) {
                    paths.push(candidate);
                }
            }
        }
        let first_line = message.content.lines().next().unwrap_or("").trim();
        if !first_line.is_empty() {
            let role = match message.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::Tool => "tool",
            };
            snippets.push(format!("{role}: {}", clip(first_line, 120)));
        }
        for candidate in extract_paths(&message.content) {
            if !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
    }

    let mut out = String::from("Prior-context summary");
    out.push_str(&format!(" ({} earlier turns condensed).\n", window.len()));
    if let Some(prior) = prior {
        out.push_str(prior);
        out.push('\n');
    }
    if !tool_names.is_empty() {
        out.push_str(&format!("Tools used: {}.\n", tool_names.join(", ")));
    }
    if !paths.is_empty() {
        out.push_str(&format!("Referenced paths: {}.\n", paths.join(", ")));
    }
    for snippet in snippets.iter().take(20) {
        out.push_str("- ");
        out.push_str(snippet);
        out.push('\n');
    }
    out
}

/// Pull absolute-path-looking tokens out of free text.
fn extract_paths(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
        .filter(|token| token.starts_with('/') && token.len() > 1 && !token.contains("//"))
        .map(|token| token.trim_end_matches([':', ')', ']', '}']).to_string())
        .collect()
}

fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

/// Replace old tool-result bodies with `<elided: N bytes>`, keeping the
/// most recent `keep_recent` tool observations intact.
fn elide_old_tool_results(messages: &mut [Message], keep_recent: usize) {
    let tool_positions: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == MessageRole::Tool)
        .map(|(i, _)| i)
        .collect();
    let elide_until = tool_positions.len().saturating_sub(keep_recent);

    for &index in tool_positions.iter().take(elide_until) {
        let message = &mut messages[index];
        let bytes = message.content.len();
        if bytes == 0 || message.content.starts_with("<elided:") {
            continue;
        }
        let placeholder = format!("<elided: {bytes} bytes>");
        message.content = placeholder.clone();
        for result in &mut message.tool_results {
            result.content = placeholder.clone();
        }
    }
}

/// Shrink the summary message until the estimate fits (or the floor is
/// reached).
fn truncate_summary(messages: &mut [Message], target: usize, current: usize) {
    let Some(summary) = messages
        .iter_mut()
        .find(|m| m.metadata.contains_key(SUMMARY_FLAG))
    else {
        return;
    };
    let over_bytes = current.saturating_sub(target) * BYTES_PER_TOKEN;
    let keep = summary
        .content
        .len()
        .saturating_sub(over_bytes)
        .max(SUMMARY_FLOOR_BYTES.min(summary.content.len()));
    summary.content = clip(&summary.content, keep);
}

// ─── Tests ───────────────────────────────────────────────────────────────────
