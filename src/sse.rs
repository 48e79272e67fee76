//! Server-sent event decoding
//!
//! Reassembles a chunked byte stream into frames. Events are separated by a
//! blank line; only `data:` lines contribute to a frame's payload.

#[cfg(test)]
mod proptests;

use crate::client::TransportError;
use futures::stream::{Stream, StreamExt};
use std::collections::VecDeque;

/// Line prefix carrying event payload
pub const DATA_PREFIX: &str = "data:";

/// One logical server emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// `data:` line contents joined by `\n`
    pub data: String,
}

impl Frame {
    /// Build a frame from one event block, if it has any `data:` lines
    pub fn parse(block: &str) -> Option<Self> {
        let lines: Vec<&str> = block
            .lines()
            .filter_map(|line| line.strip_prefix(DATA_PREFIX))
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(Self {
                data: lines.join("\n"),
            })
        }
    }
}

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    utf8: Utf8Decoder,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; multi-byte characters may straddle calls
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let text = self.utf8.decode(bytes);
        self.push_str(&text)
    }

    /// Feed decoded text and return every frame it completes
    pub fn push_str(&mut self, chunk: &str) -> Vec<Frame> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        while let Some((end, delimiter_len)) = find_boundary(&self.buffer) {
            let rest = self.buffer.split_off(end + delimiter_len);
            let mut block = std::mem::replace(&mut self.buffer, rest);
            block.truncate(end);
            frames.extend(Frame::parse(&block));
        }
        frames
    }

    /// Flush the trailing partial event once the source is exhausted
    pub fn finish(&mut self) -> Option<Frame> {
        let tail = self.utf8.finish();
        self.buffer.push_str(&tail);
        let block = std::mem::take(&mut self.buffer);
        if block.is_empty() {
            None
        } else {
            Frame::parse(&block)
        }
    }
}

/// Earliest event boundary as `(offset, delimiter length)`
fn find_boundary(buffer: &str) -> Option<(usize, usize)> {
    let lf = buffer.find("\n\n").map(|i| (i, 2));
    let crlf = buffer.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Streaming UTF-8 decoder; holds back incomplete trailing sequences
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            let (valid_up_to, invalid_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };

            let rest = self.pending.split_off(valid_up_to);
            let valid = std::mem::replace(&mut self.pending, rest);
            out.push_str(&String::from_utf8_lossy(&valid));

            match invalid_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..len);
                }
                // Either everything decoded or the tail is an incomplete sequence
                None => break,
            }
        }

        out
    }

    fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Decode a byte stream into frames, in arrival order.
///
/// The stream ends after the source ends (flushing any unterminated event) or
/// after the first source error.
pub fn decode_stream<S>(source: S) -> impl Stream<Item = Result<Frame, TransportError>>
where
    S: Stream<Item = Result<Vec<u8>, TransportError>> + Unpin,
{
    struct State<T> {
        source: T,
        decoder: FrameDecoder,
        ready: VecDeque<Frame>,
        finished: bool,
    }

    let state = State {
        source,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }
            match state.source.next().await {
                Some(Ok(bytes)) => {
                    let frames = state.decoder.push_bytes(&bytes);
                    state.ready.extend(frames);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    state.ready.extend(state.decoder.finish());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str) -> Frame {
        Frame {
            data: data.to_string(),
        }
    }

    #[test]
    fn test_single_event() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push_str("data: hello\n\n"), vec![frame("hello")]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_partial_event_is_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_str("data: hel").is_empty());
        assert!(decoder.push_str("lo\n").is_empty());
        assert_eq!(decoder.push_str("\ndata: x"), vec![frame("hello")]);
        assert_eq!(decoder.finish(), Some(frame("x")));
    }

    #[test]
    fn test_multiple_data_lines_join_with_newline() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_str("event: message\ndata: one\ndata:two\nid: 7\n\n");
        assert_eq!(frames, vec![frame("one\ntwo")]);
    }

    #[test]
    fn test_only_one_space_is_stripped() {
        assert_eq!(Frame::parse("data:  indented"), Some(frame(" indented")));
        assert_eq!(Frame::parse("data:"), Some(frame("")));
    }

    #[test]
    fn test_blocks_without_data_yield_nothing() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_str("").is_empty());
        assert!(decoder.push_str(": keepalive\n\n\n\nevent: ping\n\n").is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_crlf_lines_and_delimiters() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_str("data: a\r\ndata: b\r\n\r\ndata: c\n\n");
        assert_eq!(frames, vec![frame("a\nb"), frame("c")]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "data: héllo 日本\n\n".as_bytes();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in bytes {
            frames.extend(decoder.push_bytes(std::slice::from_ref(byte)));
        }
        assert_eq!(frames, vec![frame("héllo 日本")]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_bytes(b"data: a\xffb\n\n");
        assert_eq!(frames, vec![frame("a\u{FFFD}b")]);
    }

    #[test]
    fn test_truncated_utf8_at_end_is_flushed_lossily() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_bytes(b"data: x\xe6\x97").is_empty());
        assert_eq!(decoder.finish(), Some(frame("x\u{FFFD}")));
    }

    #[tokio::test]
    async fn test_decode_stream_flushes_unterminated_tail() {
        let chunks = vec![
            Ok(b"data: {\"text\":\"a\"}\n\nda".to_vec()),
            Ok(b"ta: tail".to_vec()),
        ];
        let frames: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        let frames: Vec<Frame> = frames.into_iter().map(Result::unwrap).collect();
        assert_eq!(frames, vec![frame("{\"text\":\"a\"}"), frame("tail")]);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_error() {
        let chunks = vec![
            Ok(b"data: a\n\n".to_vec()),
            Err(TransportError::read("reset")),
            Ok(b"data: b\n\n".to_vec()),
        ];
        let items: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &frame("a"));
        assert!(items[1].is_err());
    }
}
