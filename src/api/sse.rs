//! Incremental decoding of a `text/event-stream` body.
//!
//! Only the parts a message listener needs are kept: `data` lines are
//! collected, `event` names are honoured so that named events don't reach the
//! message handler, and `id`/`retry`/comments are skipped.

/// What the stream transport reports to its listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Opened,
    Message(String),
    TransportError(String),
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    event: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body and get back the data of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut dispatched = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if let Some(data) = self.process_line(line) {
                dispatched.push(data);
            }
        }
        dispatched
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = value.to_string(),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event = std::mem::take(&mut self.event);
        let data = std::mem::take(&mut self.data);

        if data.is_empty() {
            return None;
        }
        if !event.is_empty() && event != "message" {
            tracing::debug!("Skipping named SSE event '{}'", event);
            return None;
        }
        Some(data.join("\n"))
    }
}
