//! Server-sent-events framing.
//!
//! [`encode_event`] frames one text fragment as an event; [`SseDecoder`]
//! reassembles events from arbitrarily split byte chunks. Only the `data`
//! and `event` fields are interpreted; comments and other fields are skipped.

use crate::codec::utf8::Utf8Decoder;

/// A decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event` field, if one was sent.
    pub event: Option<String>,
    /// `data` lines joined with `\n`.
    pub data: String,
}

/// Frame a fragment as a single event.
///
/// A single-line fragment becomes exactly `data: <fragment>\n\n`. Embedded
/// line breaks produce one `data:` line per line, so a decoder rebuilds the
/// fragment with every `\r\n` or bare `\r` normalised to `\n`.
pub fn encode_event(fragment: &str) -> String {
    let normalised;
    let fragment = if fragment.contains('\r') {
        normalised = fragment.replace("\r\n", "\n").replace('\r', "\n");
        normalised.as_str()
    } else {
        fragment
    };

    let mut out = String::with_capacity(fragment.len() + 8);
    for line in fragment.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Incremental event-stream decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8Decoder,
    /// Text after the last complete line.
    line_buffer: String,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let text = self.utf8.decode(bytes);
        self.push_str(&text)
    }

    /// Feed decoded text, returning every event completed by it.
    pub fn push_str(&mut self, text: &str) -> Vec<SseEvent> {
        self.line_buffer.push_str(text);

        let mut events = Vec::new();
        while let Some(pos) = self.line_buffer.find('\n') {
            let mut line: String = self.line_buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end of stream: an unterminated final line and any pending
    /// data are dispatched as a last event.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let tail = self.utf8.finish();
        self.line_buffer.push_str(&tail);

        let line = std::mem::take(&mut self.line_buffer);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if !line.is_empty() {
            // A blank line here would dispatch, so the result is always None.
            let _ = self.process_line(line);
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
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
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: self.event.take(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(events: &[SseEvent]) -> Vec<&str> {
        events.iter().map(|e| e.data.as_str()).collect()
    }

    #[test]
    fn test_encode_single_line() {
        assert_eq!(encode_event("Hello"), "data: Hello\n\n");
    }

    #[test]
    fn test_encode_multiline_fragment_survives_decoding() {
        let framed = encode_event("line one\nline two\n");
        assert_eq!(framed, "data: line one\ndata: line two\ndata: \n\n");

        let mut decoder = SseDecoder::new();
        let events = decoder.push_str(&framed);
        assert_eq!(data(&events), vec!["line one\nline two\n"]);
    }

    #[test]
    fn test_encode_normalises_carriage_returns() {
        assert_eq!(encode_event("a\r\nb"), "data: a\ndata: b\n\n");

        let mut decoder = SseDecoder::new();
        let events = decoder.push_str(&(encode_event("x\r\ny") + &encode_event("p\rq")));
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["x\ny", "p\nq"]);
    }

    #[test]
    fn test_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push_str("data: He").is_empty());
        assert!(decoder.push_str("llo\n").is_empty());
        let events = decoder.push_str("\ndata: world\n\n");
        assert_eq!(data(&events), vec!["Hello", "world"]);
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push_str(": keep-alive\r\n\r\nevent: delta\r\ndata:x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("delta"));
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_finish_dispatches_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push_str("data: [DONE]").is_empty());
        let last = decoder.finish().map(|e| e.data);
        assert_eq!(last.as_deref(), Some("[DONE]"));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_multibyte_split_inside_event() {
        let framed = encode_event("héllo");
        let bytes = framed.as_bytes();
        let mut decoder = SseDecoder::new();
        let mut events = decoder.push_bytes(&bytes[..8]);
        events.extend(decoder.push_bytes(&bytes[8..]));
        assert_eq!(data(&events), vec!["héllo"]);
    }
}
