//! Server-Sent Events decoding for chat-completion streams.
//!
//! The relay forwards the provider's event stream untouched, so the client
//! strips the framing here:
//! - frames split across network chunks are buffered
//! - several frames in one chunk are all emitted
//! - comments, `event:` lines and keep-alives are ignored

use serde_json::Value;

/// Result of parsing one SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// Text appended to the document (`choices[0].delta.content`).
    Delta(String),
    /// End of stream (`[DONE]`).
    Done,
    /// The provider reported an error inside the stream.
    Error(String),
    /// A well-formed frame carrying nothing of interest (role-only deltas, usage, ...).
    Ignored,
}

/// Stateful SSE parser that buffers incomplete frames across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    utf8_buffer: Vec<u8>,
}

impl SseParser {
    /// Creates a new SSE parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes, keeping an incomplete trailing UTF-8 sequence for the next call.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Vec<ParseResult> {
        self.utf8_buffer.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.utf8_buffer) {
            Ok(valid) => valid.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Genuinely invalid bytes: replace everything buffered.
            Err(_) => self.utf8_buffer.len(),
        };

        let pending: Vec<u8> = self.utf8_buffer.drain(..valid_up_to).collect();
        let text = String::from_utf8_lossy(&pending).into_owned();
        self.feed(&text)
    }

    /// Feeds a chunk of text and returns all complete frames.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParseResult> {
        self.buffer.push_str(chunk);
        let mut results = Vec::new();

        while let Some((event_end, boundary_len)) = self.find_event_boundary() {
            let event_text: String = self.buffer.drain(..event_end + boundary_len).collect();
            if let Some(result) = Self::parse_event(&event_text[..event_end]) {
                results.push(result);
            }
        }

        results
    }

    /// Flush a final frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<ParseResult> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_event(&rest)
    }

    /// Earliest frame boundary as `(end of frame, boundary length)`.
    fn find_event_boundary(&self) -> Option<(usize, usize)> {
        let lf = self.buffer.find("\n\n").map(|pos| (pos, 2));
        let crlf = self.buffer.find("\r\n\r\n").map(|pos| (pos, 4));
        match (lf, crlf) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (a, b) => a.or(b),
        }
    }

    fn parse_event(event_text: &str) -> Option<ParseResult> {
        let data_lines: Vec<&str> = event_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(':'))
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();

        if data_lines.is_empty() {
            return None;
        }

        let data = data_lines.join("\n");
        if data.trim() == "[DONE]" {
            return Some(ParseResult::Done);
        }

        Some(Self::parse_json_event(&data))
    }

    fn parse_json_event(data: &str) -> ParseResult {
        let Ok(json) = serde_json::from_str::<Value>(data) else {
            tracing::debug!("Ignoring non-JSON SSE payload");
            return ParseResult::Ignored;
        };

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| error.as_str())
                .unwrap_or("Unknown error");
            return ParseResult::Error(message.to_string());
        }

        json.pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
            .map_or(ParseResult::Ignored, |content| ParseResult::Delta(content.to_string()))
    }
}
