/// Server-Sent Events parsing for streaming model responses.
///
/// SSE format: events separated by a blank line, each containing optional
/// `event:` and one or more `data:` lines. Servers may use `\r\n` line endings.
use futures::{Stream, StreamExt};
use shared::ChatError;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use crate::decode::Utf8ChunkDecoder;

/// A single parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// The `data:` lines, joined with `\n`.
    pub data: String,
}

/// Incremental SSE parser that buffers incomplete events across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseParser {
    decoder: Utf8ChunkDecoder,
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the HTTP response. Returns any complete events found.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let text = self.decoder.push(chunk);
        self.buffer.push_str(&text);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..boundary + 2).collect();
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = self.decoder.finish();
        self.buffer.push_str(&rest);
        let block = std::mem::take(&mut self.buffer);
        parse_block(&block)
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event_type: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if let Some(val) = line.strip_prefix("event:") {
            event_type = Some(val.trim().to_string());
        } else if let Some(val) = line.strip_prefix("data:") {
            data_lines.push(val.strip_prefix(' ').unwrap_or(val));
        }
        // id:, retry: and `:` comments are ignored
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: event_type,
        data: data_lines.join("\n"),
    })
}

/// Adapt a byte stream into a stream of SSE events.
pub fn event_stream<S, B, E>(body: S) -> impl Stream<Item = Result<SseEvent, ChatError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        body: Pin<Box<S>>,
        parser: SseParser,
        pending: VecDeque<SseEvent>,
        done: bool,
    }

    let state = State {
        body: Box::pin(body),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let events = st.parser.feed(bytes.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.done = true;
                    st.pending.clear();
                    return Some((Err(ChatError::stream(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.parser.finish());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_sse() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: hello\n\ndata: world\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[1].data, "world");
    }

    #[test]
    fn test_crlf_and_event_type() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: message\r\ndata: {\"a\":1}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: hel").is_empty());
        let events = parser.feed(b"lo\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_split_inside_multibyte_character() {
        let payload = "data: niño\n\n".as_bytes();
        let cut = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut parser = SseParser::new();
        assert!(parser.feed(&payload[..cut]).is_empty());
        let events = parser.feed(&payload[cut..]);
        assert_eq!(events[0].data, "niño");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\ndata: a\ndata: b\n\n: only a comment\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: tail").is_empty());
        assert_eq!(parser.finish().unwrap().data, "tail");
        assert!(parser.finish().is_none());
    }

    #[tokio::test]
    async fn test_event_stream_over_chunks() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: uno\n\nda".to_vec()),
            Ok(b"ta: dos\n\n".to_vec()),
            Ok(b"data: tres".to_vec()),
        ];
        let events: Vec<String> = event_stream(futures::stream::iter(chunks))
            .map(|r| r.unwrap().data)
            .collect()
            .await;
        assert_eq!(events, vec!["uno", "dos", "tres"]);
    }
}
