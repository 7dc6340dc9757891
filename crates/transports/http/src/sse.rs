//! Incremental Server-Sent Events parsing
//!
//! Chunks from the HTTP body are fed in as they arrive; complete events are
//! returned once their terminating blank line has been seen. Only the `data`
//! and `event` fields matter here. Comments (keep-alives), `id` and `retry`
//! lines are ignored.

/// One complete SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Buffering SSE parser
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let block = String::from_utf8_lossy(&block[..end]);
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }

    /// Bytes buffered but not yet terminated
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            "event" => event = Some(value.to_string()),
            _ => {}
        }
    }

    data.map(|data| SseEvent { event, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"position\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"position\":1}");
        assert_eq!(events[0].event, None);
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: {\"posi").is_empty());
        assert!(parser.push(b"tion\":2}\n").is_empty());
        let events = parser.push(b"\ndata: x\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"position\":2}");
        assert_eq!(events[1].data, "x");
    }

    #[test]
    fn test_keep_alive_comment_ignored() {
        let mut parser = SseParser::new();
        let events = parser.push(b":keep-alive\n\ndata: a\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a");
    }

    #[test]
    fn test_multi_line_data_and_event_name() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: tick\ndata: one\ndata: two\nid: 7\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("tick"));
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: crlf\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "crlf");
    }

    #[test]
    fn test_utf8_split_inside_codepoint() {
        let mut parser = SseParser::new();
        let bytes = "data: é\n\n".as_bytes();
        let (a, b) = bytes.split_at(7);
        assert!(parser.push(a).is_empty());
        let events = parser.push(b);
        assert_eq!(events[0].data, "é");
    }
}
