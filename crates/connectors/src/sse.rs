//! Server-Sent Events framing for subscribe-style streams.
//!
//! Lines come from [`LineDecoder`](crate::lines::LineDecoder); `data:` fields
//! accumulate until a blank line dispatches the event. Comments (`:`) and
//! the `event`, `id` and `retry` fields carry nothing the chat store uses.

use crate::lines::strip_data_marker;

#[derive(Debug, Default)]
pub struct SseDecoder {
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns the event data when the line ends a frame.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(payload) = strip_data_marker(line) {
            self.data.push(payload.to_string());
        } else if line == "data" {
            self.data.push(String::new());
        }
        None
    }

    /// Flush a frame left open when the stream ended.
    pub fn finish(&mut self) -> Option<String> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(data)
    }
}
