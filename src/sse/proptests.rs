//! Property-based tests for frame decoding
//!
//! Chunk boundaries are an artifact of the transport, so decoding a stream in
//! arbitrary pieces must yield exactly the frames of decoding it whole.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Payload line without newlines; includes multi-byte characters
fn arb_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 {}:\",é日本ß]{0,24}"
}

/// One event: one or more data lines, optionally preceded by a comment
fn arb_event() -> impl Strategy<Value = (Option<String>, Vec<String>)> {
    (
        proptest::option::of("[a-z ]{0,10}"),
        proptest::collection::vec(arb_line(), 1..4),
    )
}

fn render(events: &[(Option<String>, Vec<String>)], crlf: bool) -> String {
    let eol = if crlf { "\r\n" } else { "\n" };
    let mut out = String::new();
    for (comment, lines) in events {
        if let Some(comment) = comment {
            out.push_str(&format!(":{comment}{eol}"));
        }
        for line in lines {
            out.push_str(&format!("data: {line}{eol}"));
        }
        out.push_str(eol);
    }
    out
}

fn expected(events: &[(Option<String>, Vec<String>)]) -> Vec<Frame> {
    events
        .iter()
        .map(|(_, lines)| Frame {
            data: lines.join("\n"),
        })
        .collect()
}

fn decode_whole(bytes: &[u8]) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push_bytes(bytes);
    frames.extend(decoder.finish());
    frames
}

fn decode_chunked(bytes: &[u8], cuts: &[usize]) -> Vec<Frame> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    let mut start = 0;
    for point in points {
        frames.extend(decoder.push_bytes(&bytes[start..point]));
        start = point;
    }
    frames.extend(decoder.push_bytes(&bytes[start..]));
    frames.extend(decoder.finish());
    frames
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn chunked_decoding_matches_whole_decoding(
        events in proptest::collection::vec(arb_event(), 0..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
        crlf in any::<bool>(),
    ) {
        let stream = render(&events, crlf);
        let bytes = stream.as_bytes();

        let whole = decode_whole(bytes);
        prop_assert_eq!(&whole, &expected(&events));
        prop_assert_eq!(decode_chunked(bytes, &cuts), whole);
    }

    #[test]
    fn missing_final_delimiter_still_yields_last_frame(
        events in proptest::collection::vec(arb_event(), 1..6),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut stream = render(&events, false);
        // Drop the blank line terminating the last event
        stream.truncate(stream.len() - 1);

        prop_assert_eq!(decode_chunked(stream.as_bytes(), &cuts), expected(&events));
    }

    #[test]
    fn arbitrary_bytes_never_panic(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let _ = decode_chunked(&bytes, &cuts);
    }
}
