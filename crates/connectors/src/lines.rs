//! Incremental line splitting for chunked response bodies.
//!
//! Chunks are split on `\n` at the byte level, so a multi-byte character
//! cut across two reads is reassembled before decoding. An unterminated
//! tail stays buffered until the next chunk (or [`LineDecoder::finish`]).

/// Marker prefixing data lines
pub const DATA_MARKER: &str = "data:";

/// Payload that ends a chunked stream without an explicit completion event
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Flush the residual unterminated line at end of input.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }

    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    // Lenient: a malformed sequence becomes U+FFFD instead of failing the stream.
    String::from_utf8_lossy(bytes).into_owned()
}

/// Meaning of one line of a chunked response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkedLine {
    Content(String),
    Done,
    Skip,
}

/// Interpret a complete line of a chunked response.
pub fn classify_line(line: &str) -> ChunkedLine {
    if line.trim().is_empty() {
        return ChunkedLine::Skip;
    }
    match strip_data_marker(line) {
        Some(payload) if payload.trim() == DONE_SENTINEL => ChunkedLine::Done,
        Some("") => ChunkedLine::Skip,
        Some(payload) => ChunkedLine::Content(payload.to_string()),
        None => ChunkedLine::Content(line.to_string()),
    }
}

/// Strip `data:` and one optional following space.
pub fn strip_data_marker(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_MARKER)
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_line_is_buffered_until_newline() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: Hel").is_empty());
        assert!(decoder.has_partial());

        let lines = decoder.push(b"lo\ndata: [DONE]\n");
        assert_eq!(lines, vec!["data: Hello", "data: [DONE]"]);
        assert!(!decoder.has_partial());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn chunk_boundaries_do_not_change_lines() {
        let body = "alpha\r\ndata: beta\n\ndata: gamma\nomega";
        let mut whole = LineDecoder::new();
        let mut expected = whole.push(body.as_bytes());
        expected.extend(whole.finish());

        for split in 1..body.len() {
            let mut decoder = LineDecoder::new();
            let mut lines = decoder.push(&body.as_bytes()[..split]);
            lines.extend(decoder.push(&body.as_bytes()[split..]));
            lines.extend(decoder.finish());
            assert_eq!(lines, expected, "split at {split}");
        }
        assert_eq!(expected, vec!["alpha", "data: beta", "", "data: gamma", "omega"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let bytes = "data: 你好\n".as_bytes();
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&bytes[..8]).is_empty());
        assert_eq!(decoder.push(&bytes[8..]), vec!["data: 你好"]);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"ok \xff\n");
        assert_eq!(lines, vec!["ok \u{fffd}"]);
    }

    #[test]
    fn classifies_data_sentinel_and_raw_lines() {
        assert_eq!(classify_line("data: Hello"), ChunkedLine::Content("Hello".into()));
        assert_eq!(classify_line("data:Hello"), ChunkedLine::Content("Hello".into()));
        assert_eq!(classify_line("data:  two"), ChunkedLine::Content(" two".into()));
        assert_eq!(classify_line("data: [DONE]"), ChunkedLine::Done);
        assert_eq!(classify_line("data: "), ChunkedLine::Skip);
        assert_eq!(classify_line("   "), ChunkedLine::Skip);
        assert_eq!(classify_line("plain text"), ChunkedLine::Content("plain text".into()));
    }
}
