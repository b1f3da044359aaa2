//! Incremental NDJSON decoder for streaming responses
//!
//! Chunk boundaries from the generation backend are arbitrary: a record may
//! be split across chunks, and so may a multi-byte UTF-8 character. The
//! decoder keeps two carry-over buffers between calls:
//! - `pending`: trailing bytes that do not yet form a complete character
//! - `carry`: decoded text after the last newline
//!
//! ```text
//! push(bytes):
//! 1. pending ← pending ++ bytes
//! 2. carry ← carry ++ decode(longest valid prefix of pending)
//!    (invalid sequences become U+FFFD, an incomplete tail stays in pending)
//! 3. split carry on '\n'; all but the last segment are complete lines,
//!    the last segment (possibly empty) becomes the new carry
//! ```

use crate::errors::{ClientError, Result};
use serde::Deserialize;

/// Maximum size of an unterminated line (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// One record of the `/api/generate` NDJSON stream
///
/// Metadata fields (`model`, `created_at`, durations, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    /// In-band error reported by the generation backend
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse a single complete line
///
/// Each line must be a JSON object; arrays and scalars are rejected even
/// though every field of [`GenerateChunk`] has a default.
pub fn parse_chunk(line: &str) -> Result<GenerateChunk> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| ClientError::Protocol(format!("could not parse line: {}", e)))?;

    if !value.is_object() {
        return Err(ClientError::Protocol(format!(
            "expected a JSON object, got: {}",
            value
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| ClientError::Protocol(format!("unexpected record shape: {}", e)))
}

/// Incremental line decoder
#[derive(Debug)]
pub struct LineDecoder {
    /// Bytes of an incomplete trailing character
    pending: Vec<u8>,

    /// Decoded text not yet terminated by a newline
    carry: String,

    /// Maximum size of the unterminated remainder
    max_buffer_size: usize,
}

impl LineDecoder {
    /// Create decoder with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create decoder with custom line size limit
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            pending: Vec::with_capacity(8),
            carry: String::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and return every line they complete, in order
    ///
    /// Blank lines are skipped and a trailing `\r` is stripped. Lines
    /// completed by this chunk are always returned; an oversized unterminated
    /// remainder is reported by [`check`](Self::check) and by the next call.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.check()?;

        self.pending.extend_from_slice(bytes);
        self.decode_pending();

        let lines = self.take_lines();
        if lines.is_empty() {
            self.check()?;
        }

        Ok(lines)
    }

    /// Fail if the unterminated remainder exceeds the size limit
    pub fn check(&self) -> Result<()> {
        if self.buffer_size() > self.max_buffer_size {
            return Err(ClientError::Protocol(format!(
                "line exceeds {} bytes without a newline",
                self.max_buffer_size
            )));
        }
        Ok(())
    }

    /// Flush the final unterminated segment at end of stream
    ///
    /// Bytes of a character that never completed are replaced with U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.carry.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }

        let rest = std::mem::take(&mut self.carry);
        let line = rest.trim_end_matches('\r');
        if line.trim().is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }

    /// Decode the longest valid prefix of `pending` into `carry`
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.carry.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.carry
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));

                    match e.error_len() {
                        // Invalid sequence: replace it and keep going
                        Some(len) => {
                            self.carry.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        // Incomplete tail: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Split complete lines off the front of `carry`
    fn take_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.carry.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        complete
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Bytes currently held back (pending bytes plus unterminated text)
    pub fn buffer_size(&self) -> usize {
        self.pending.len() + self.carry.len()
    }

    /// Clear the buffers
    pub fn clear(&mut self) {
        self.pending.clear();
        self.carry.clear();
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.carry.is_empty()
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut decoder = LineDecoder::new();

        let lines = decoder.push(b"{\"response\":\"Hi\"}\n").unwrap();
        assert_eq!(lines, vec![r#"{"response":"Hi"}"#]);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = LineDecoder::new();

        let first = decoder.push(br#"{"response":"Hel"}"#).unwrap();
        assert!(first.is_empty());
        let first = decoder.push(b"\n{\"respo").unwrap();
        assert_eq!(first, vec![r#"{"response":"Hel"}"#]);

        let second = decoder.push(b"nse\":\"lo\"}\n{\"done\":true}\n").unwrap();
        assert_eq!(second, vec![r#"{"response":"lo"}"#, r#"{"done":true}"#]);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_multibyte_character_split() {
        let mut decoder = LineDecoder::new();
        let line = "{\"response\":\"caf\u{e9} \u{1F600}\"}\n".as_bytes();

        // Split inside the two-byte é and inside the four-byte emoji
        let e_acute = line.iter().position(|&b| b == 0xC3).unwrap();
        let emoji = line.iter().position(|&b| b == 0xF0).unwrap();

        let mut lines = Vec::new();
        lines.extend(decoder.push(&line[..e_acute + 1]).unwrap());
        lines.extend(decoder.push(&line[e_acute + 1..emoji + 2]).unwrap());
        lines.extend(decoder.push(&line[emoji + 2..]).unwrap());

        assert_eq!(lines.len(), 1);
        let chunk = parse_chunk(&lines[0]).unwrap();
        assert_eq!(chunk.response, "caf\u{e9} \u{1F600}");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = LineDecoder::new();

        let lines = decoder.push(b"ab\xFFcd\n").unwrap();
        assert_eq!(lines, vec!["ab\u{FFFD}cd"]);
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let mut decoder = LineDecoder::new();

        let lines = decoder.push(b"\n  \n{\"done\":true}\r\n").unwrap();
        assert_eq!(lines, vec![r#"{"done":true}"#]);
    }

    #[test]
    fn test_finish_returns_unterminated_line() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.push(br#"{"done":true}"#).unwrap().is_empty());
        assert_eq!(decoder.finish().as_deref(), Some(r#"{"done":true}"#));
        assert!(decoder.is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_buffer_overflow() {
        let mut decoder = LineDecoder::with_capacity(100);

        let result = decoder.push(&[b'a'; 150]);
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[test]
    fn test_lines_before_oversized_tail_are_kept() {
        let mut decoder = LineDecoder::with_capacity(64);
        let mut data = b"{\"response\":\"a\"}\n{\"done\":true}\n".to_vec();
        data.extend_from_slice(&[b'x'; 100]);

        let lines = decoder.push(&data).unwrap();
        assert_eq!(lines, vec![r#"{"response":"a"}"#, r#"{"done":true}"#]);

        assert!(matches!(decoder.check(), Err(ClientError::Protocol(_))));
        assert!(matches!(decoder.push(b"\n"), Err(ClientError::Protocol(_))));
    }

    #[test]
    fn test_large_chunk_of_complete_lines_is_not_overflow() {
        let mut decoder = LineDecoder::with_capacity(64);
        let data = "{\"response\":\"x\"}\n".repeat(20);

        let lines = decoder.push(data.as_bytes()).unwrap();
        assert_eq!(lines.len(), 20);
    }

    #[test]
    fn test_clear() {
        let mut decoder = LineDecoder::new();

        decoder.push(b"partial").unwrap();
        assert!(!decoder.is_empty());

        decoder.clear();
        assert!(decoder.is_empty());
        assert_eq!(decoder.buffer_size(), 0);
    }

    #[test]
    fn test_parse_chunk_fields() {
        let chunk = parse_chunk(
            r#"{"model":"llama3.2","created_at":"2024-05-01T10:00:00Z","response":"Hel","done":false}"#,
        )
        .unwrap();
        assert_eq!(chunk.response, "Hel");
        assert!(!chunk.done);

        let last = parse_chunk(r#"{"done":true,"total_duration":123}"#).unwrap();
        assert!(last.done);
        assert!(last.response.is_empty());

        let failed = parse_chunk(r#"{"error":"model 'llama3.2' not found"}"#).unwrap();
        assert_eq!(failed.error.as_deref(), Some("model 'llama3.2' not found"));
    }

    #[test]
    fn test_parse_chunk_rejects_garbage() {
        assert!(matches!(parse_chunk("{\"respo"), Err(ClientError::Protocol(_))));
        assert!(matches!(parse_chunk("not json"), Err(ClientError::Protocol(_))));
    }

    #[test]
    fn test_parse_chunk_requires_an_object() {
        for line in ["[]", "[\"Hel\", false]", "42", "null", "\"done\""] {
            assert!(
                matches!(parse_chunk(line), Err(ClientError::Protocol(_))),
                "accepted {line}"
            );
        }
        assert_eq!(parse_chunk("{}").unwrap(), GenerateChunk::default());
    }
}
